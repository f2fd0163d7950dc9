use std::fmt;

use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigError;
use crate::query::{FilterError, PlanError};
use crate::repo::MappingError;

/// Error returned by every repository operation.
///
/// Storage driver errors never cross this boundary as-is: they are flattened into
/// [`RepoError::Storage`] at the point of execution.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("invalid query: {0}")]
    Validation(#[from] FilterError),

    #[error("cannot plan query: {0}")]
    Plan(PlanError),

    #[error("mapping integrity violated: {0}")]
    MappingIntegrity(#[from] MappingError),

    #[error("{entity} {id} already exists")]
    DuplicateIdentity { entity: &'static str, id: Uuid },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("{entity} {id} was modified concurrently (expected version {expected_version})")]
    ConcurrentModification {
        entity: &'static str,
        id: Uuid,
        expected_version: i64,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("storage failure: {message}")]
    Storage { message: String },
}

/// Stable error category, for callers that branch on the kind of failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Plan,
    Integrity,
    Concurrency,
    Configuration,
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Plan => "plan",
            ErrorKind::Integrity => "integrity",
            ErrorKind::Concurrency => "concurrency",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Storage => "storage",
        })
    }
}

impl RepoError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepoError::Validation(_) => ErrorKind::Validation,
            RepoError::Plan(_) => ErrorKind::Plan,
            RepoError::MappingIntegrity(_)
            | RepoError::DuplicateIdentity { .. }
            | RepoError::NotFound { .. } => ErrorKind::Integrity,
            RepoError::ConcurrentModification { .. } => ErrorKind::Concurrency,
            RepoError::Config(_) => ErrorKind::Configuration,
            RepoError::Storage { .. } => ErrorKind::Storage,
        }
    }

    /// Wrap a driver error, keeping only its message.
    #[must_use]
    #[allow(clippy::needless_pass_by_value)]
    pub fn storage(err: DbErr) -> Self {
        RepoError::Storage {
            message: err.to_string(),
        }
    }
}

// Validation failures found while planning surface as validation errors.
impl From<PlanError> for RepoError {
    fn from(e: PlanError) -> Self {
        match e {
            PlanError::Invalid(inner) => RepoError::Validation(inner),
            other => RepoError::Plan(other),
        }
    }
}
