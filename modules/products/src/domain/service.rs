use std::sync::Arc;

use larder_db::{FilterClause, Page, QueryRequest, in_unit_of_work};
use sea_orm::DatabaseConnection;
use tracing::{info, instrument};
use uuid::Uuid;

use super::error::DomainError;
use super::product::Product;
use crate::infra::storage::ProductRepository;

/// Product catalogue use cases.
pub struct Service {
    db: DatabaseConnection,
    repo: Arc<ProductRepository>,
}

impl Service {
    #[must_use]
    pub fn new(db: DatabaseConnection, repo: Arc<ProductRepository>) -> Self {
        Self { db, repo }
    }

    /// # Errors
    /// `DomainError::Product` if the product is invalid, `DomainError::Repo` otherwise.
    #[instrument(skip_all, fields(product_id = %product.id))]
    pub async fn create(&self, product: Product) -> Result<Product, DomainError> {
        product.validate()?;
        let repo = Arc::clone(&self.repo);
        let product = in_unit_of_work(&self.db, move |tx| {
            Box::pin(async move {
                repo.add(tx, &product).await?;
                Ok(product)
            })
        })
        .await?;
        Ok(product)
    }

    /// # Errors
    /// `DomainError::Repo` with `NotFound` for unknown or discontinued products.
    pub async fn get(&self, id: Uuid) -> Result<Product, DomainError> {
        Ok(self.repo.get(&self.db, id).await?)
    }

    /// # Errors
    /// `DomainError::Repo` with a validation error for bad filters.
    pub async fn search(&self, request: &QueryRequest) -> Result<Page<Product>, DomainError> {
        Ok(self.repo.query(&self.db, request).await?)
    }

    /// Number of live products matching `filters`.
    ///
    /// # Errors
    /// `DomainError::Repo` with a validation error for bad filters.
    pub async fn count(&self, filters: &[FilterClause]) -> Result<u64, DomainError> {
        Ok(self.repo.count(&self.db, filters).await?)
    }

    /// Persist an edited product. `product.version` must be the version it was
    /// loaded at; the returned copy carries the new one.
    ///
    /// # Errors
    /// `DomainError::Product` for invalid edits, `DomainError::Repo` with
    /// `ConcurrentModification` if someone saved in between.
    #[instrument(skip_all, fields(product_id = %product.id, version = product.version))]
    pub async fn save(&self, mut product: Product) -> Result<Product, DomainError> {
        product.validate()?;
        let repo = Arc::clone(&self.repo);
        let staged = product.clone();
        let version = in_unit_of_work(&self.db, move |tx| {
            Box::pin(async move { repo.update(tx, &staged).await })
        })
        .await?;
        product.version = version;
        Ok(product)
    }

    /// Take a product off the catalogue. It stays in storage, invisible.
    ///
    /// # Errors
    /// `DomainError::Repo` with `NotFound` if it is unknown or already discontinued.
    #[instrument(skip_all, fields(%product_id))]
    pub async fn discontinue(&self, product_id: Uuid) -> Result<(), DomainError> {
        let repo = Arc::clone(&self.repo);
        in_unit_of_work(&self.db, move |tx| {
            Box::pin(async move { repo.delete(tx, product_id).await })
        })
        .await?;
        info!("product discontinued");
        Ok(())
    }
}
