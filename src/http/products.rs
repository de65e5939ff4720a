//! Catalog, product administration and inventory handlers.

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::catalog::{ImageUpload, ProductView};
use crate::domain::aggregates::ProductDraft;
use crate::domain::value_objects::{Category, ProductId, Stock};
use crate::http::error::{AppError, Result};
use crate::http::guard::AdminUser;
use crate::http::paged;
use crate::http::state::AppState;
use crate::listing::{
    search_term, Direction, PageRequest, ProductFilter, ProductQuery, ProductSort, Sort, ADMIN_PAGE_SIZE,
    CATALOG_PAGE_SIZE,
};

#[derive(Debug, Default, Deserialize)]
pub struct ProductParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub name: Option<String>,
    pub sort: Option<ProductSort>,
    pub direction: Option<Direction>,
}

impl ProductParams {
    fn into_query(self, default_page_size: u32) -> Result<ProductQuery> {
        let category = search_term(self.category.as_deref())
            .map(|c| Category::from_str(&c))
            .transpose()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        Ok(ProductQuery {
            filter: ProductFilter {
                brand: search_term(self.brand.as_deref()),
                category,
                name: search_term(self.name.as_deref()),
            },
            sort: Sort::new(self.sort.unwrap_or_default(), self.direction.unwrap_or_default()),
            page: PageRequest::new(self.page.unwrap_or(1), self.per_page.unwrap_or(default_page_size)),
        })
    }
}

pub async fn list_products(State(s): State<AppState>, Query(p): Query<ProductParams>) -> Result<Response> {
    let query = p.into_query(CATALOG_PAGE_SIZE)?;
    Ok(paged(s.catalog.list(&query).await?))
}

pub async fn get_product(State(s): State<AppState>, Path(id): Path<ProductId>) -> Result<Json<ProductView>> {
    Ok(Json(s.catalog.get(id).await?))
}

/// Fields of the multipart product form. `image` is the only file part.
struct ProductForm {
    draft: ProductDraft,
    stock: Option<String>,
    image: Option<ImageUpload>,
}

async fn read_product_form(mut multipart: Multipart) -> Result<ProductForm> {
    let bad = |e: axum::extract::multipart::MultipartError| AppError::BadRequest(e.body_text());
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(bad)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(bad)?;
            if !filename.is_empty() || !bytes.is_empty() {
                image = Some(ImageUpload { filename, bytes: bytes.to_vec() });
            }
        } else {
            fields.insert(name, field.text().await.map_err(bad)?);
        }
    }

    let mut take = |key: &str| fields.remove(key).unwrap_or_default();
    let category = take("category");
    let category = Category::from_str(&category).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let price = take("price");
    let price = Decimal::from_str(price.trim()).map_err(|_| AppError::BadRequest(format!("invalid price: {price}")))?;
    let draft = ProductDraft {
        name: take("name"),
        brand: take("brand"),
        category,
        price,
        description: take("description"),
    };
    Ok(ProductForm { draft, stock: fields.remove("stock"), image })
}

fn parse_stock(raw: Option<&str>) -> Result<Stock> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| AppError::BadRequest("stock is required".into()))?;
    let value: i64 = raw.parse().map_err(|_| AppError::BadRequest(format!("invalid stock: {raw}")))?;
    Stock::try_from(value).map_err(|e| AppError::BadRequest(e.to_string()))
}

pub async fn create_product(
    State(s): State<AppState>,
    AdminUser(admin): AdminUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ProductView>)> {
    let form = read_product_form(multipart).await?;
    let stock = parse_stock(form.stock.as_deref())?;
    let image = form.image.ok_or_else(|| AppError::BadRequest("image is required".into()))?;
    let view = s.catalog.create(&form.draft, image, stock).await?;
    tracing::info!(admin_id = %admin.id, product_id = %view.product.id(), "product created");
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn update_product(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<ProductId>,
    multipart: Multipart,
) -> Result<Json<ProductView>> {
    let form = read_product_form(multipart).await?;
    Ok(Json(s.catalog.update(id, &form.draft, form.image).await?))
}

pub async fn delete_product(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    s.catalog.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Inventory listing: name search only, admin page size.
pub async fn list_inventory(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Query(p): Query<ProductParams>,
) -> Result<Response> {
    let params = ProductParams { brand: None, category: None, ..p };
    let query = params.into_query(ADMIN_PAGE_SIZE)?;
    Ok(paged(s.catalog.list(&query).await?))
}

#[derive(Debug, Deserialize)]
pub struct StockUpdate {
    pub stock: i64,
}

pub async fn set_stock(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<ProductId>,
    Json(update): Json<StockUpdate>,
) -> Result<Json<ProductView>> {
    Ok(Json(s.catalog.set_stock(id, update.stock).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_build_query() {
        let params = ProductParams {
            page: Some(2),
            per_page: None,
            brand: Some("  ".into()),
            category: Some("cameras".into()),
            name: Some(" nik ".into()),
            sort: Some(ProductSort::Price),
            direction: Some(Direction::Asc),
        };
        let query = params.into_query(CATALOG_PAGE_SIZE).unwrap();
        assert_eq!(query.filter.brand, None);
        assert_eq!(query.filter.category, Some(Category::Cameras));
        assert_eq!(query.filter.name.as_deref(), Some("nik"));
        assert_eq!(query.sort, Sort::new(ProductSort::Price, Direction::Asc));
        assert_eq!(query.page, PageRequest::new(2, 8));
    }

    #[test]
    fn test_params_defaults_and_bad_category() {
        let query = ProductParams::default().into_query(ADMIN_PAGE_SIZE).unwrap();
        assert_eq!(query.sort, Sort::new(ProductSort::Id, Direction::Desc));
        assert_eq!(query.page.per_page(), 5);
        let bad = ProductParams { category: Some("Toasters".into()), ..Default::default() };
        assert!(matches!(bad.into_query(8), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_parse_stock() {
        assert_eq!(parse_stock(Some(" 12 ")).unwrap(), Stock::new(12));
        assert!(parse_stock(Some("-1")).is_err());
        assert!(parse_stock(Some("many")).is_err());
        assert!(parse_stock(None).is_err());
    }
}
