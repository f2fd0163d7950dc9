use larder_db::RepoError;
use thiserror::Error;
use uuid::Uuid;

/// Aggregate invariant violations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecipeError {
    #[error("recipe name must not be empty")]
    EmptyName,

    #[error("total time must not be negative, got {0}")]
    NegativeTotalTime(i64),

    #[error("{axis} score {score} is out of range")]
    InvalidRating { axis: &'static str, score: u8 },

    #[error("user {user_id} rated the recipe more than once")]
    DuplicateRating { user_id: Uuid },
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error(transparent)]
    Recipe(#[from] RecipeError),

    #[error(transparent)]
    Repo(#[from] RepoError),
}
