//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{required, Category, Price, ProductId, Stock, ValueError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    brand: String,
    category: Category,
    price: Price,
    description: String,
    image_filename: String,
    stock: Stock,
    created_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// Editable catalog fields, as submitted by the admin product form.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProductDraft {
    pub name: String,
    pub brand: String,
    pub category: Category,
    pub price: Decimal,
    pub description: String,
}

struct CleanDraft { name: String, brand: String, category: Category, price: Price, description: String }

impl ProductDraft {
    fn clean(&self) -> Result<CleanDraft, ValueError> {
        Ok(CleanDraft {
            name: required("name", &self.name)?,
            brand: required("brand", &self.brand)?,
            category: self.category,
            price: Price::new(self.price)?,
            description: required("description", &self.description)?,
        })
    }
}

impl Product {
    pub fn create(draft: &ProductDraft, image_filename: &str, stock: Stock) -> Result<Self, ValueError> {
        let d = draft.clean()?;
        let image_filename = required("image", image_filename)?;
        let id = ProductId::new();
        let mut product = Self {
            id, name: d.name, brand: d.brand, category: d.category, price: d.price,
            description: d.description, image_filename, stock, created_at: Utc::now(), events: vec![],
        };
        product.raise_event(DomainEvent::Product(ProductEvent::Created { product_id: id, name: product.name.clone() }));
        Ok(product)
    }

    /// Rebuilds a product from stored fields without raising events.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: ProductId, name: String, brand: String, category: Category, price: Price,
        description: String, image_filename: String, stock: Stock, created_at: DateTime<Utc>,
    ) -> Self {
        Self { id, name, brand, category, price, description, image_filename, stock, created_at, events: vec![] }
    }

    pub fn id(&self) -> ProductId { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn brand(&self) -> &str { &self.brand }
    pub fn category(&self) -> Category { self.category }
    pub fn price(&self) -> Price { self.price }
    pub fn description(&self) -> &str { &self.description }
    pub fn image_filename(&self) -> &str { &self.image_filename }
    pub fn stock(&self) -> Stock { self.stock }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn is_low_stock(&self) -> bool { self.stock.is_low() }

    pub fn revise(&mut self, draft: &ProductDraft) -> Result<(), ValueError> {
        let d = draft.clean()?;
        self.name = d.name;
        self.brand = d.brand;
        self.category = d.category;
        self.price = d.price;
        self.description = d.description;
        Ok(())
    }

    /// Points the product at a new image and returns the previous filename.
    pub fn replace_image(&mut self, filename: &str) -> Result<String, ValueError> {
        let filename = required("image", filename)?;
        Ok(std::mem::replace(&mut self.image_filename, filename))
    }

    pub fn set_stock(&mut self, stock: Stock) {
        if stock == self.stock { return; }
        let from = self.stock.value();
        self.stock = stock;
        self.raise_event(DomainEvent::Product(ProductEvent::StockAdjusted { product_id: self.id, from, to: stock.value() }));
    }

    pub fn remove_stock(&mut self, qty: u32) -> Result<(), ProductError> {
        let remaining = self.stock.subtract(qty).ok_or(ProductError::InsufficientStock {
            requested: qty,
            available: self.stock.value(),
        })?;
        self.set_stock(remaining);
        Ok(())
    }

    pub fn mark_deleted(&mut self) {
        self.raise_event(DomainEvent::Product(ProductEvent::Deleted { product_id: self.id }));
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },
}

#[cfg(test)]
pub(crate) fn sample_draft(name: &str, price: Decimal) -> ProductDraft {
    ProductDraft {
        name: name.into(),
        brand: "Acme".into(),
        category: Category::Phones,
        price,
        description: format!("{name} description"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_create() {
        let mut p = Product::create(&sample_draft("Pixel", Decimal::new(49900, 2)), "pixel.png", Stock::new(3)).unwrap();
        assert_eq!(p.name(), "Pixel");
        assert_eq!(p.price().amount(), Decimal::new(49900, 2));
        let events = p.take_events();
        assert!(matches!(events.as_slice(), [DomainEvent::Product(ProductEvent::Created { .. })]));
        assert!(p.take_events().is_empty());
    }

    #[test]
    fn test_create_requires_fields() {
        let mut draft = sample_draft("Pixel", Decimal::ONE);
        draft.brand = "  ".into();
        assert_eq!(Product::create(&draft, "x.png", Stock::default()).unwrap_err(), ValueError::Required("brand"));
        let draft = sample_draft("Pixel", Decimal::ONE);
        assert_eq!(Product::create(&draft, "", Stock::default()).unwrap_err(), ValueError::Required("image"));
        let draft = sample_draft("Pixel", Decimal::new(-1, 0));
        assert_eq!(Product::create(&draft, "x.png", Stock::default()).unwrap_err(), ValueError::NegativePrice);
    }

    #[test]
    fn test_stock_changes() {
        let mut p = Product::create(&sample_draft("Cam", Decimal::TEN), "cam.png", Stock::new(5)).unwrap();
        p.take_events();
        p.remove_stock(2).unwrap();
        assert_eq!(p.stock().value(), 3);
        assert_eq!(
            p.remove_stock(4).unwrap_err(),
            ProductError::InsufficientStock { requested: 4, available: 3 }
        );
        p.set_stock(Stock::new(3));
        let events = p.take_events();
        assert_eq!(events.len(), 1, "no-op stock update raises nothing");
        assert!(p.is_low_stock());
    }

    #[test]
    fn test_replace_image_returns_previous() {
        let mut p = Product::create(&sample_draft("Cam", Decimal::TEN), "old.png", Stock::new(1)).unwrap();
        assert_eq!(p.replace_image("new.png").unwrap(), "old.png");
        assert_eq!(p.image_filename(), "new.png");
    }
}
