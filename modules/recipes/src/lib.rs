//! Recipes bounded context.
//!
//! `Recipe` aggregates own their tags, ingredients, ratings and nutrition facts.
//! Each collection lives in its own table keyed by the recipe id and is written and
//! loaded together with the recipe through the generic repository.

pub mod domain;
pub mod infra;

pub use domain::error::{DomainError, RecipeError};
pub use domain::fields::RecipeFields;
pub use domain::recipe::{
    Ingredient, MacroDivision, NutriFacts, Privacy, Rating, Recipe, RecipeParts, RecipePatch, Tag,
};
pub use domain::service::Service;
pub use infra::storage::migrations::Migrator;
pub use infra::storage::{RecipeRepository, recipe_filters, recipe_repository};
