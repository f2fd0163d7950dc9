pub mod error;
pub mod fields;
pub mod product;
pub mod service;
