pub mod error;
pub mod fields;
pub mod recipe;
pub mod service;
