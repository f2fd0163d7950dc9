use std::sync::Arc;

use larder_db::{Page, QueryRequest, UnitOfWork};
use sea_orm::DatabaseConnection;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::error::DomainError;
use super::recipe::{Rating, Recipe, RecipePatch};
use crate::infra::storage::RecipeRepository;

/// Recipe use cases. Every write runs in its own unit of work.
pub struct Service {
    db: DatabaseConnection,
    repo: Arc<RecipeRepository>,
}

impl Service {
    #[must_use]
    pub fn new(db: DatabaseConnection, repo: Arc<RecipeRepository>) -> Self {
        Self { db, repo }
    }

    /// # Errors
    /// `DomainError::Repo` on duplicate ids or storage failures.
    #[instrument(skip_all, fields(recipe_id = %recipe.id()))]
    pub async fn create(&self, recipe: &Recipe) -> Result<(), DomainError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        self.repo.add(uow.runner(), recipe).await?;
        uow.commit().await?;
        Ok(())
    }

    /// # Errors
    /// `DomainError::Repo` with `NotFound` for unknown ids.
    pub async fn get(&self, id: Uuid) -> Result<Recipe, DomainError> {
        Ok(self.repo.get(&self.db, id).await?)
    }

    /// # Errors
    /// `DomainError::Repo` with a validation error for bad filters.
    pub async fn search(&self, request: &QueryRequest) -> Result<Page<Recipe>, DomainError> {
        Ok(self.repo.query(&self.db, request).await?)
    }

    /// Add or replace the rating of one user.
    ///
    /// # Errors
    /// `DomainError::Recipe` for out-of-range scores, `DomainError::Repo` otherwise.
    #[instrument(skip_all, fields(%recipe_id, user_id = %rating.user_id))]
    pub async fn rate(&self, recipe_id: Uuid, rating: Rating) -> Result<Recipe, DomainError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let mut recipe = self.repo.get(uow.runner(), recipe_id).await?;
        recipe.rate(rating)?;
        let version = self.repo.update(uow.runner(), &recipe).await?;
        uow.commit().await?;
        recipe.set_version(version);
        Ok(recipe)
    }

    /// Patch a recipe the caller last saw at `expected_version`.
    ///
    /// # Errors
    /// `DomainError::Repo` with `ConcurrentModification` if the recipe changed since.
    #[instrument(skip_all, fields(%recipe_id, expected_version = expected_version))]
    pub async fn update_properties(
        &self,
        recipe_id: Uuid,
        expected_version: i64,
        patch: RecipePatch,
    ) -> Result<Recipe, DomainError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let mut recipe = self.repo.get(uow.runner(), recipe_id).await?;
        if recipe.version() != expected_version {
            debug!(stored_version = recipe.version(), "caller holds a stale copy");
        }
        recipe.set_version(expected_version);
        recipe.update_properties(patch)?;
        let version = self.repo.update(uow.runner(), &recipe).await?;
        uow.commit().await?;
        recipe.set_version(version);
        Ok(recipe)
    }

    /// # Errors
    /// `DomainError::Repo` with `NotFound` for unknown ids.
    #[instrument(skip_all, fields(%recipe_id))]
    pub async fn delete(&self, recipe_id: Uuid) -> Result<(), DomainError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        self.repo.delete(uow.runner(), recipe_id).await?;
        uow.commit().await?;
        Ok(())
    }
}
