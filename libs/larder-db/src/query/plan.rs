//! Executable query plan produced by [`QueryBuilder`](crate::query::QueryBuilder).

use std::fmt;

use sea_orm::Condition;
use sea_orm::sea_query::SimpleExpr;

use crate::query::mapping::{ColumnPath, JoinSpec};
use crate::query::operator::{Operator, SortDir};

/// Leaf predicate with its bound expression.
#[derive(Clone, Debug)]
pub struct PlannedPredicate {
    pub key: &'static str,
    pub operator: Operator,
    pub path: ColumnPath,
    pub expr: SimpleExpr,
}

/// Predicate tree. `All` is the implicit conjunction; `Any` only comes from an
/// explicit `any_of` group.
#[derive(Clone, Debug)]
pub enum PredicateNode {
    Leaf(PlannedPredicate),
    All(Vec<PredicateNode>),
    Any(Vec<PredicateNode>),
}

impl PredicateNode {
    #[must_use]
    pub fn to_condition(&self) -> Condition {
        match self {
            PredicateNode::Leaf(p) => Condition::all().add(p.expr.clone()),
            PredicateNode::All(children) => children
                .iter()
                .fold(Condition::all(), |acc, c| acc.add(c.to_condition())),
            PredicateNode::Any(children) => children
                .iter()
                .fold(Condition::any(), |acc, c| acc.add(c.to_condition())),
        }
    }

    fn explain(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match self {
            PredicateNode::Leaf(p) => writeln!(f, "{pad}{} {} ?", p.path, p.operator),
            PredicateNode::All(children) | PredicateNode::Any(children) => {
                let label = if matches!(self, PredicateNode::All(_)) {
                    "all"
                } else {
                    "any"
                };
                writeln!(f, "{pad}{label}:")?;
                for c in children {
                    c.explain(f, depth + 1)?;
                }
                Ok(())
            }
        }
    }
}

/// Resolved sort column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlannedSort {
    pub path: ColumnPath,
    pub direction: SortDir,
}

/// Immutable plan: root table, ordered joins, predicate tree, sort, paging and the
/// fan-out flag. Consumed by value by the executor.
#[derive(Clone, Debug)]
#[must_use]
pub struct QueryPlan {
    pub(crate) base_entity: &'static str,
    pub(crate) primary_key: &'static str,
    pub(crate) joins: Vec<JoinSpec>,
    pub(crate) predicate: Option<PredicateNode>,
    pub(crate) sort: Vec<PlannedSort>,
    pub(crate) limit: u64,
    pub(crate) offset: u64,
    pub(crate) requires_deduplication: bool,
}

impl QueryPlan {
    #[must_use]
    pub fn base_entity(&self) -> &'static str {
        self.base_entity
    }

    #[must_use]
    pub fn primary_key(&self) -> &'static str {
        self.primary_key
    }

    /// Joins in dependency order, each appearing once.
    #[must_use]
    pub fn joins(&self) -> &[JoinSpec] {
        &self.joins
    }

    #[must_use]
    pub fn predicate(&self) -> Option<&PredicateNode> {
        self.predicate.as_ref()
    }

    #[must_use]
    pub fn sort(&self) -> &[PlannedSort] {
        &self.sort
    }

    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// True when a one-to-many join can repeat root rows.
    #[must_use]
    pub fn requires_deduplication(&self) -> bool {
        self.requires_deduplication
    }
}

/// Human-readable explanation. Column paths and operators only, never values.
impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "from {} (key {})", self.base_entity, self.primary_key)?;
        for join in &self.joins {
            writeln!(f, "left join {join}")?;
        }
        if let Some(pred) = &self.predicate {
            f.write_str("where ")?;
            pred.explain(f, 0)?;
        }
        let sort = self
            .sort
            .iter()
            .map(|s| format!("{} {}", s.path, s.direction))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(f, "order by {sort}")?;
        write!(
            f,
            "limit {} offset {}{}",
            self.limit,
            self.offset,
            if self.requires_deduplication {
                " (distinct roots)"
            } else {
                ""
            }
        )
    }
}
