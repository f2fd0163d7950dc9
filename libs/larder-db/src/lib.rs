//! Generic aggregate repository with a dynamic filter-to-query engine.
//!
//! Callers describe a query as data ([`QueryRequest`]: filter clauses, sort keys and
//! paging). Each entity declares which filter keys exist and how they map onto
//! columns and joins ([`FilterMapper`]). The engine validates the request, plans the
//! joins and lowers everything into parameterized SQL executed by
//! [`GenericRepository`], which maps rows back into domain aggregates through an
//! [`EntityMapper`].

pub mod config;
pub mod error;
pub mod query;
pub mod repo;

pub use config::{ConfigError, DbConfig, LimitCfg};
pub use error::{ErrorKind, RepoError};
pub use query::{
    Cardinality, FieldKind, FilterClause, FilterError, FilterMapper, FilterMapping,
    FilterSpecification, FilterValue, JoinSpec, Operator, OperatorSet, PlanError, QueryBuilder,
    QueryPlan, QueryRequest, Scalar, SortDir, SortKey,
};
pub use repo::{
    AggregateRecord, ChildTable, Children, Column, DeletePolicy, EntityDescriptor, EntityMapper,
    GenericRepository, MappingError, Page, RecordRow, UnitOfWork, in_unit_of_work,
};
