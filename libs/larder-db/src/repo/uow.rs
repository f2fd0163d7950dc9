//! Unit of work: one transaction per business operation.
//!
//! Repositories never commit. Callers open a [`UnitOfWork`], pass
//! [`UnitOfWork::runner`] to every repository call, and commit or roll back at the
//! end. Writes are visible to later reads inside the same unit of work.

use std::future::Future;
use std::pin::Pin;

use sea_orm::{DatabaseTransaction, TransactionTrait};
use tracing::{debug, warn};

use crate::error::RepoError;

#[derive(Debug)]
#[must_use = "a unit of work rolls back when dropped without commit"]
pub struct UnitOfWork {
    tx: DatabaseTransaction,
}

impl UnitOfWork {
    /// Start a transaction on `db`.
    ///
    /// # Errors
    /// `RepoError::Storage` if the transaction cannot be started.
    pub async fn begin<D: TransactionTrait>(db: &D) -> Result<Self, RepoError> {
        let tx = db.begin().await.map_err(RepoError::storage)?;
        debug!("unit of work started");
        Ok(Self { tx })
    }

    /// Connection to hand to repository calls.
    pub fn runner(&self) -> &DatabaseTransaction {
        &self.tx
    }

    /// # Errors
    /// `RepoError::Storage` if the commit fails.
    pub async fn commit(self) -> Result<(), RepoError> {
        self.tx.commit().await.map_err(RepoError::storage)?;
        debug!("unit of work committed");
        Ok(())
    }

    /// # Errors
    /// `RepoError::Storage` if the rollback fails.
    pub async fn rollback(self) -> Result<(), RepoError> {
        self.tx.rollback().await.map_err(RepoError::storage)?;
        debug!("unit of work rolled back");
        Ok(())
    }
}

/// Run `f` inside a unit of work: commit on `Ok`, roll back on `Err`.
///
/// ```ignore
/// let id = in_unit_of_work(&db, |tx| {
///     Box::pin(async move {
///         repo.add(tx, &recipe).await?;
///         Ok(recipe.id())
///     })
/// })
/// .await?;
/// ```
///
/// # Errors
/// The closure's error, or `RepoError::Storage` if begin or commit fails.
pub async fn in_unit_of_work<D, F, T>(db: &D, f: F) -> Result<T, RepoError>
where
    D: TransactionTrait,
    F: for<'a> FnOnce(
        &'a DatabaseTransaction,
    ) -> Pin<Box<dyn Future<Output = Result<T, RepoError>> + Send + 'a>>,
{
    let uow = UnitOfWork::begin(db).await?;
    let res = f(uow.runner()).await;
    match res {
        Ok(v) => {
            uow.commit().await?;
            Ok(v)
        }
        Err(e) => {
            // The closure's error wins over a rollback failure.
            if let Err(rb) = uow.rollback().await {
                warn!(error = %rb, "rollback after failed unit of work also failed");
            }
            Err(e)
        }
    }
}
