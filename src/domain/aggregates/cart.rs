//! Cart Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::aggregates::Product;
use crate::domain::value_objects::{Price, ProductId};

/// Ordered cart contents, one entry per product.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    entries: Vec<CartEntry>,
}

/// A product reference with the display fields copied at add time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartEntry {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub image_filename: String,
    pub quantity: u32,
}

impl CartEntry {
    pub fn line_total(&self) -> Decimal { self.price.times(self.quantity) }
}

impl From<&Product> for CartEntry {
    fn from(p: &Product) -> Self {
        Self {
            product_id: p.id(),
            name: p.name().to_string(),
            price: p.price(),
            image_filename: p.image_filename().to_string(),
            quantity: 1,
        }
    }
}

impl Cart {
    pub fn new() -> Self { Self::default() }
    pub fn entries(&self) -> &[CartEntry] { &self.entries }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn get(&self, product_id: ProductId) -> Option<&CartEntry> {
        self.entries.iter().find(|e| e.product_id == product_id)
    }

    /// Total units across all entries.
    pub fn item_count(&self) -> u32 { self.entries.iter().map(|e| e.quantity).sum() }

    pub fn total(&self) -> Decimal { self.entries.iter().map(CartEntry::line_total).sum() }

    pub fn add(&mut self, product: &Product) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.product_id == product.id()) {
            existing.quantity = existing.quantity.saturating_add(1);
        } else {
            self.entries.push(CartEntry::from(product));
        }
    }

    /// Unknown ids are ignored.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 { return Err(CartError::InvalidQuantity); }
        if let Some(entry) = self.entries.iter_mut().find(|e| e.product_id == product_id) {
            entry.quantity = quantity;
        }
        Ok(())
    }

    pub fn remove(&mut self, product_id: ProductId) { self.entries.retain(|e| e.product_id != product_id); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("quantity must be at least 1")]
    InvalidQuantity,
}
