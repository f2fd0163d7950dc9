//! Product persistence: single-table layout with JSON columns.

mod filters;
mod mapper;
pub mod migrations;

use std::sync::Arc;

use larder_db::{ConfigError, GenericRepository, LimitCfg};

pub use filters::product_filters;
pub use mapper::{PRODUCTS, ProductMapper};

pub type ProductRepository = GenericRepository<ProductMapper>;

/// Repository wired with the product filter table.
///
/// # Errors
/// `ConfigError` if the filter table fails validation.
pub fn product_repository(limits: LimitCfg) -> Result<ProductRepository, ConfigError> {
    GenericRepository::new(ProductMapper, Arc::new(product_filters()?), limits)
}
