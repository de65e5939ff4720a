//! Product catalog and inventory administration.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::aggregates::{Product, ProductDraft};
use crate::domain::value_objects::{ProductId, Stock, ValueError};
use crate::images::{validate_filename, ImageError, ImageStore};
use crate::listing::{Page, ProductQuery};
use crate::publisher::{publish_all, EventPublisher};
use crate::repository::{ProductRepository, Repository, RepositoryError};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Invalid(#[from] ValueError),
    #[error("product not found")]
    NotFound,
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Uploaded image file as received from the product form.
#[derive(Clone, Debug)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Product as shown to clients: the stored record plus display fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub image_url: String,
    pub low_stock: bool,
}

pub struct CatalogService {
    repo: Arc<dyn Repository>,
    images: Arc<dyn ImageStore>,
    events: Arc<dyn EventPublisher>,
}

impl CatalogService {
    pub fn new(repo: Arc<dyn Repository>, images: Arc<dyn ImageStore>, events: Arc<dyn EventPublisher>) -> Self {
        Self { repo, images, events }
    }

    pub fn view(&self, product: Product) -> ProductView {
        ProductView {
            image_url: self.images.public_url(product.image_filename()),
            low_stock: product.is_low_stock(),
            product,
        }
    }

    pub async fn list(&self, query: &ProductQuery) -> Result<Page<ProductView>, CatalogError> {
        Ok(self.repo.list_products(query).await?.map(|p| self.view(p)))
    }

    pub async fn get(&self, id: ProductId) -> Result<ProductView, CatalogError> {
        Ok(self.view(self.load(id).await?))
    }

    /// Validates the form, stores the image, then inserts the product.
    pub async fn create(&self, draft: &ProductDraft, image: ImageUpload, stock: Stock) -> Result<ProductView, CatalogError> {
        let filename = validate_filename(&image.filename)?;
        let mut product = Product::create(draft, &filename, stock)?;
        self.images.upload(&filename, image.bytes).await?;
        self.repo.insert_product(&product).await?;
        tracing::info!(product_id = %product.id(), name = product.name(), "product created");
        publish_all(self.events.as_ref(), product.take_events()).await;
        Ok(self.view(product))
    }

    /// Revises catalog fields and optionally swaps the image. The replaced
    /// image is deleted best-effort once the product row points elsewhere.
    pub async fn update(&self, id: ProductId, draft: &ProductDraft, image: Option<ImageUpload>) -> Result<ProductView, CatalogError> {
        let mut product = self.load(id).await?;
        product.revise(draft)?;

        let mut replaced = None;
        if let Some(image) = image {
            let filename = validate_filename(&image.filename)?;
            let stored = self.images.upload(&filename, image.bytes).await?;
            let previous = product.replace_image(&stored)?;
            if previous != stored {
                replaced = Some(previous);
            }
        }

        self.repo.update_product(&product).await.map_err(not_found)?;
        tracing::info!(product_id = %id, "product updated");

        if let Some(old) = replaced {
            if let Err(e) = self.images.delete(&old).await {
                tracing::warn!(product_id = %id, filename = %old, error = %e, "failed to delete replaced image");
            }
        }
        Ok(self.view(product))
    }

    /// Removes the product row. Its image stays in storage.
    pub async fn delete(&self, id: ProductId) -> Result<(), CatalogError> {
        let mut product = self.load(id).await?;
        self.repo.delete_product(id).await.map_err(not_found)?;
        product.mark_deleted();
        tracing::info!(product_id = %id, "product deleted");
        publish_all(self.events.as_ref(), product.take_events()).await;
        Ok(())
    }

    /// Sets an absolute stock level.
    pub async fn set_stock(&self, id: ProductId, stock: i64) -> Result<ProductView, CatalogError> {
        let stock = Stock::try_from(stock)?;
        let mut product = self.load(id).await?;
        product.set_stock(stock);
        self.repo.set_stock(id, stock).await.map_err(not_found)?;
        tracing::info!(product_id = %id, stock = stock.value(), "stock level set");
        publish_all(self.events.as_ref(), product.take_events()).await;
        Ok(self.view(product))
    }

    async fn load(&self, id: ProductId) -> Result<Product, CatalogError> {
        self.repo.get_product(id).await?.ok_or(CatalogError::NotFound)
    }
}

fn not_found(e: RepositoryError) -> CatalogError {
    match e {
        RepositoryError::NotFound => CatalogError::NotFound,
        other => CatalogError::Repository(other),
    }
}
