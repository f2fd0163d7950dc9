use thiserror::Error;

use crate::query::operator::Operator;

/// Rejections raised while validating filter and sort input. Always raised before
/// any storage access.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("unknown filter key: {key}")]
    UnknownFilterKey { key: String },

    #[error("unknown operator: {operator}")]
    UnknownOperator { operator: String },

    #[error("operator `{operator}` is not allowed on `{key}`")]
    OperatorNotAllowed { key: String, operator: Operator },

    #[error("invalid value for `{key}`: {reason}")]
    ValueCoercion { key: String, reason: String },

    #[error("operator `{operator}` expects {expected}, got {got}")]
    InvalidOperatorArity {
        operator: Operator,
        expected: &'static str,
        got: String,
    },

    #[error("operator `{operator}` needs a text operand")]
    NonTextPattern { operator: Operator },

    #[error("filter key `{key}` may appear only once per conjunction")]
    DuplicateFilterKey { key: String },

    #[error("cannot sort by `{key}`: {reason}")]
    UnsortableKey { key: String, reason: &'static str },

    #[error("filter groups must not be empty")]
    EmptyGroup,
}

/// Failures assembling a query plan from validated input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error(transparent)]
    Invalid(#[from] FilterError),

    #[error("conflicting joins for `{alias}` on table `{target}`")]
    ConflictingJoin { alias: String, target: String },

    #[error("join `{alias}` depends on unknown relation `{relation}`")]
    UnresolvedJoin { alias: String, relation: String },
}
