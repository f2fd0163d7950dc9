//! Products bounded context.
//!
//! A `Product` keeps its tags and nutrition table inline, serialized as JSON
//! columns of the `products` row. Deleting a product only stamps
//! `discontinued_at`; discontinued products disappear from every read.

pub mod domain;
pub mod infra;

pub use domain::error::{DomainError, ProductError};
pub use domain::fields::ProductFields;
pub use domain::product::{Nutrition, Product, normalize_barcode};
pub use domain::service::Service;
pub use infra::storage::migrations::Migrator;
pub use infra::storage::{ProductRepository, product_filters, product_repository};
