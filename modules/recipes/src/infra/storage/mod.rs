//! Recipe persistence: storage layout, mapper, filter table and migrations.

mod filters;
mod mapper;
pub mod migrations;

use std::sync::Arc;

use larder_db::{ConfigError, GenericRepository, LimitCfg};

pub use filters::recipe_filters;
pub use mapper::{RECIPES, RecipeMapper};

pub type RecipeRepository = GenericRepository<RecipeMapper>;

/// Repository wired with the recipe filter table.
///
/// # Errors
/// `ConfigError` if the filter table fails validation.
pub fn recipe_repository(limits: LimitCfg) -> Result<RecipeRepository, ConfigError> {
    GenericRepository::new(RecipeMapper, Arc::new(recipe_filters()?), limits)
}
