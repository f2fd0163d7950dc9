use larder_db::RepoError;
use thiserror::Error;

/// Product invariant violations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProductError {
    #[error("product name must not be empty")]
    EmptyName,

    #[error("`{0}` is not a valid barcode")]
    InvalidBarcode(String),

    #[error("{nutrient} must be a non-negative number")]
    InvalidNutrient { nutrient: &'static str },
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error(transparent)]
    Product(#[from] ProductError),

    #[error(transparent)]
    Repo(#[from] RepoError),
}
