use std::collections::HashSet;

use tracing::debug;

use crate::config::LimitCfg;
use crate::query::errors::{FilterError, PlanError};
use crate::query::filter::{FilterClause, QueryRequest, SortKey};
use crate::query::mapping::{ColumnPath, FilterMapper, JoinSpec};
use crate::query::operator::SortDir;
use crate::query::plan::{PlannedPredicate, PlannedSort, PredicateNode, QueryPlan};

/// Stateless transformer from filters, sort and paging to a [`QueryPlan`].
///
/// Holds only borrowed, read-only configuration; building a plan never touches
/// storage.
#[derive(Clone, Copy, Debug)]
pub struct QueryBuilder<'m> {
    mapper: &'m FilterMapper,
    limits: LimitCfg,
}

impl<'m> QueryBuilder<'m> {
    #[must_use]
    pub fn new(mapper: &'m FilterMapper, limits: LimitCfg) -> Self {
        Self { mapper, limits }
    }

    /// Build a plan from a transport request.
    ///
    /// # Errors
    /// See [`QueryBuilder::build`].
    pub fn build_request(&self, request: &QueryRequest) -> Result<QueryPlan, PlanError> {
        self.build(
            &request.filters,
            &request.sort,
            request.limit,
            request.offset,
        )
    }

    /// Validate every clause and sort key against the mapper and assemble the plan.
    ///
    /// Top-level clauses are combined with AND. Joins needed by filters and sort
    /// keys are collected once each and ordered so every hop follows the relation
    /// it starts from. The primary key is appended as the last sort key unless a
    /// unique key already orders the rows.
    ///
    /// # Errors
    /// `PlanError::Invalid` wrapping any validation failure, `ConflictingJoin` when
    /// two mappings disagree on a join alias, `UnresolvedJoin` when a hop starts from
    /// a relation that is never joined.
    pub fn build(
        &self,
        clauses: &[FilterClause],
        sort: &[SortKey],
        limit: Option<u64>,
        offset: u64,
    ) -> Result<QueryPlan, PlanError> {
        let mut joins = JoinSet::default();
        let mut seen = HashSet::new();

        let mut nodes = self.lower_all(clauses, &mut joins, &mut seen)?;
        let predicate = match nodes.len() {
            0 => None,
            1 => nodes.pop(),
            _ => Some(PredicateNode::All(nodes)),
        };

        let sort = self.resolve_sort(sort, &mut joins)?;
        let joins = joins.ordered()?;
        let requires_deduplication = joins.iter().any(JoinSpec::fans_out);

        let plan = QueryPlan {
            base_entity: self.mapper.entity(),
            primary_key: self.mapper.primary_key(),
            joins,
            predicate,
            sort,
            limit: self.limits.clamp(limit),
            offset,
            requires_deduplication,
        };
        debug!(entity = plan.base_entity, "query plan:\n{plan}");
        Ok(plan)
    }

    fn lower_all(
        &self,
        clauses: &[FilterClause],
        joins: &mut JoinSet,
        seen: &mut HashSet<&'static str>,
    ) -> Result<Vec<PredicateNode>, PlanError> {
        clauses
            .iter()
            .map(|c| self.lower(c, joins, seen))
            .collect()
    }

    fn lower(
        &self,
        clause: &FilterClause,
        joins: &mut JoinSet,
        seen: &mut HashSet<&'static str>,
    ) -> Result<PredicateNode, PlanError> {
        match clause {
            FilterClause::Where(spec) => {
                let v = self
                    .mapper
                    .validate(&spec.key, &spec.operator, &spec.value)?;
                let mapping = v.mapping;
                if !mapping.is_repeatable() && !seen.insert(mapping.key()) {
                    return Err(FilterError::DuplicateFilterKey {
                        key: mapping.key().to_owned(),
                    }
                    .into());
                }
                for join in mapping.joins() {
                    joins.add(*join)?;
                }
                let column = mapping.path().expr(self.mapper.entity());
                let expr = v.builder.build(column, &v.value)?;
                Ok(PredicateNode::Leaf(PlannedPredicate {
                    key: mapping.key(),
                    operator: v.builder.operator(),
                    path: mapping.path(),
                    expr,
                }))
            }
            FilterClause::AllOf { all_of } => {
                if all_of.is_empty() {
                    return Err(FilterError::EmptyGroup.into());
                }
                Ok(PredicateNode::All(self.lower_all(all_of, joins, seen)?))
            }
            FilterClause::AnyOf { any_of } => {
                if any_of.is_empty() {
                    return Err(FilterError::EmptyGroup.into());
                }
                // Each alternative is its own conjunction.
                let children = any_of
                    .iter()
                    .map(|c| self.lower(c, joins, &mut HashSet::new()))
                    .collect::<Result<_, _>>()?;
                Ok(PredicateNode::Any(children))
            }
        }
    }

    fn resolve_sort(
        &self,
        keys: &[SortKey],
        joins: &mut JoinSet,
    ) -> Result<Vec<PlannedSort>, PlanError> {
        let pk = ColumnPath::root(self.mapper.primary_key());
        let mut sort: Vec<PlannedSort> = Vec::with_capacity(keys.len() + 1);
        let mut total_order = false;

        for key in keys {
            let mapping = self.mapper.resolve_sort(&key.key)?;
            if sort.iter().any(|s| s.path == mapping.path()) {
                continue;
            }
            for join in mapping.joins() {
                joins.add(*join)?;
            }
            total_order |= mapping.is_unique() || mapping.path() == pk;
            sort.push(PlannedSort {
                path: mapping.path(),
                direction: key.direction,
            });
        }

        if !total_order {
            sort.push(PlannedSort {
                path: pk,
                direction: SortDir::Asc,
            });
        }
        Ok(sort)
    }
}

/// Joins collected for one plan, keyed by alias.
#[derive(Default)]
struct JoinSet {
    joins: Vec<JoinSpec>,
}

impl JoinSet {
    fn add(&mut self, join: JoinSpec) -> Result<(), PlanError> {
        match self.joins.iter().find(|j| j.alias == join.alias) {
            Some(existing) if *existing == join => Ok(()),
            Some(_) => Err(PlanError::ConflictingJoin {
                alias: join.alias.to_owned(),
                target: join.target_table.to_owned(),
            }),
            None => {
                self.joins.push(join);
                Ok(())
            }
        }
    }

    /// Order joins so each hop comes after the relation it starts from.
    fn ordered(self) -> Result<Vec<JoinSpec>, PlanError> {
        let mut placed: Vec<JoinSpec> = Vec::with_capacity(self.joins.len());
        let mut pending = self.joins;
        while !pending.is_empty() {
            let before = pending.len();
            pending.retain(|j| {
                let ready = j
                    .from
                    .relation
                    .is_none_or(|rel| placed.iter().any(|p| p.alias == rel));
                if ready {
                    placed.push(*j);
                }
                !ready
            });
            if pending.len() == before {
                let stuck = pending[0];
                return Err(PlanError::UnresolvedJoin {
                    alias: stuck.alias.to_owned(),
                    relation: stuck.from.relation.unwrap_or_default().to_owned(),
                });
            }
        }
        Ok(placed)
    }
}
