//! Filter-to-query engine.
//!
//! - `operator`: operator vocabulary and predicate builders (the registry)
//! - `kind`: field kinds, filter values and coercion
//! - `filter`: transport-facing filter, sort and request types
//! - `mapping`: per-entity filter mapping tables
//! - `builder`/`plan`: pure plan construction
//! - `compile`: plan to `sea_query` statements

pub mod kind;

pub mod operator;

pub mod filter;

pub mod mapping;

mod builder;
mod compile;
mod errors;
mod plan;

pub use builder::QueryBuilder;
pub use compile::{ROOT_ID, TOTAL};
pub use errors::{FilterError, PlanError};
pub use filter::{FilterClause, FilterSpecification, QueryRequest, SortKey};
pub use kind::{CoercedValue, FieldKind, FilterValue, Scalar};
pub use mapping::{
    Cardinality, ColumnPath, FilterMapper, FilterMapperBuilder, FilterMapping, JoinSpec,
    ValidatedFilter, ValueCoercion,
};
pub use operator::{
    Operator, OperatorRegistry, OperatorSet, OperatorTag, PredicateBuilder, SortDir,
};
pub use plan::{PlannedPredicate, PlannedSort, PredicateNode, QueryPlan};
