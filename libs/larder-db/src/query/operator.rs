//! Operator registry: the closed filter operator vocabulary and the predicate
//! builder behind each operator.
//!
//! Every builder receives the column expression and an already coerced value, checks
//! the operand arity and produces a `sea_query` expression. Values are always bound
//! parameters; pattern operators escape `%`, `_` and `\` before wrapping them.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use sea_orm::Value;
use sea_orm::sea_query::{Expr, Func, LikeExpr, Order, SimpleExpr};
use serde::{Deserialize, Serialize};

use crate::query::errors::FilterError;
use crate::query::kind::CoercedValue;

/// Filter operators understood by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    /// Case-insensitive substring match.
    Like,
    /// Substring match with the backend's default collation.
    Contains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
    Between,
}

impl Operator {
    pub const ALL: [Operator; 15] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::In,
        Operator::NotIn,
        Operator::Like,
        Operator::Contains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::IsNull,
        Operator::IsNotNull,
        Operator::Between,
    ];

    /// Wire name of the operator.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::Like => "like",
            Operator::Contains => "contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::IsNull => "is_null",
            Operator::IsNotNull => "is_not_null",
            Operator::Between => "between",
        }
    }

    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.tag() == tag)
    }

    /// Pattern operators only apply to text columns.
    #[must_use]
    pub const fn is_pattern(self) -> bool {
        matches!(
            self,
            Operator::Like | Operator::Contains | Operator::StartsWith | Operator::EndsWith
        )
    }

    const fn bit(self) -> u32 {
        1 << self as u32
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Operator name as received from the transport, before resolution.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorTag(Cow<'static, str>);

impl OperatorTag {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperatorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Operator> for OperatorTag {
    fn from(op: Operator) -> Self {
        OperatorTag(Cow::Borrowed(op.tag()))
    }
}

impl From<&str> for OperatorTag {
    fn from(s: &str) -> Self {
        OperatorTag(Cow::Owned(s.to_owned()))
    }
}

impl From<String> for OperatorTag {
    fn from(s: String) -> Self {
        OperatorTag(Cow::Owned(s))
    }
}

/// Sort direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    #[must_use]
    pub fn to_order(self) -> Order {
        match self {
            SortDir::Asc => Order::Asc,
            SortDir::Desc => Order::Desc,
        }
    }
}

impl fmt::Display for SortDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDir::Asc => f.write_str("asc"),
            SortDir::Desc => f.write_str("desc"),
        }
    }
}

/// Set of operators a filter mapping accepts.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct OperatorSet(u32);

impl OperatorSet {
    pub const EMPTY: OperatorSet = OperatorSet(0);
    /// `eq`, `ne`, `in`, `not_in`.
    pub const EQUALITY: OperatorSet = OperatorSet::of(&[
        Operator::Eq,
        Operator::Ne,
        Operator::In,
        Operator::NotIn,
    ]);
    /// Equality plus range comparisons and `between`.
    pub const ORDERED: OperatorSet = OperatorSet::EQUALITY.union(OperatorSet::of(&[
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::Between,
    ]));
    /// Equality plus the pattern operators.
    pub const TEXT: OperatorSet = OperatorSet::EQUALITY.union(OperatorSet::of(&[
        Operator::Like,
        Operator::Contains,
        Operator::StartsWith,
        Operator::EndsWith,
    ]));
    pub const NULLABLE: OperatorSet = OperatorSet::of(&[Operator::IsNull, Operator::IsNotNull]);
    /// `ne`, `not_in`.
    pub const NEGATED: OperatorSet = OperatorSet::of(&[Operator::Ne, Operator::NotIn]);

    #[must_use]
    pub const fn of(ops: &[Operator]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < ops.len() {
            bits |= ops[i].bit();
            i += 1;
        }
        OperatorSet(bits)
    }

    #[must_use]
    pub const fn union(self, other: OperatorSet) -> Self {
        OperatorSet(self.0 | other.0)
    }

    #[must_use]
    pub const fn without(self, other: OperatorSet) -> Self {
        OperatorSet(self.0 & !other.0)
    }

    #[must_use]
    pub const fn intersects(self, other: OperatorSet) -> bool {
        self.0 & other.0 != 0
    }

    #[must_use]
    pub const fn contains(self, op: Operator) -> bool {
        self.0 & op.bit() != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Operator> {
        Operator::ALL.into_iter().filter(move |op| self.contains(*op))
    }
}

impl fmt::Debug for OperatorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(Operator::tag)).finish()
    }
}

/// Builds the predicate fragment for one operator.
pub trait PredicateBuilder: Send + Sync {
    fn operator(&self) -> Operator;

    /// Build the predicate for `column <op> value`.
    ///
    /// # Errors
    /// `FilterError::InvalidOperatorArity` when the operand count does not fit the
    /// operator.
    fn build(&self, column: SimpleExpr, value: &CoercedValue) -> Result<SimpleExpr, FilterError>;
}

/* ---------- builders ---------- */

struct Compare {
    op: Operator,
    apply: fn(Expr, Value) -> SimpleExpr,
}

impl PredicateBuilder for Compare {
    fn operator(&self) -> Operator {
        self.op
    }

    fn build(&self, column: SimpleExpr, value: &CoercedValue) -> Result<SimpleExpr, FilterError> {
        let v = expect_one(self.op, value)?;
        Ok((self.apply)(Expr::expr(column), v))
    }
}

struct Membership {
    op: Operator,
    apply: fn(Expr, Vec<Value>) -> SimpleExpr,
}

impl PredicateBuilder for Membership {
    fn operator(&self) -> Operator {
        self.op
    }

    fn build(&self, column: SimpleExpr, value: &CoercedValue) -> Result<SimpleExpr, FilterError> {
        match value {
            CoercedValue::Many(items) if !items.is_empty() => {
                Ok((self.apply)(Expr::expr(column), items.clone()))
            }
            other => Err(arity(self.op, "a non-empty list", other)),
        }
    }
}

struct RangeBetween;

impl PredicateBuilder for RangeBetween {
    fn operator(&self) -> Operator {
        Operator::Between
    }

    fn build(&self, column: SimpleExpr, value: &CoercedValue) -> Result<SimpleExpr, FilterError> {
        match value {
            CoercedValue::Many(items) => match items.as_slice() {
                [low, high] => Ok(Expr::expr(column).between(low.clone(), high.clone())),
                _ => Err(arity(Operator::Between, "exactly two values", value)),
            },
            other => Err(arity(Operator::Between, "exactly two values", other)),
        }
    }
}

struct Pattern {
    op: Operator,
    fold_case: bool,
    shape: fn(&str) -> String,
}

impl PredicateBuilder for Pattern {
    fn operator(&self) -> Operator {
        self.op
    }

    fn build(&self, column: SimpleExpr, value: &CoercedValue) -> Result<SimpleExpr, FilterError> {
        let v = expect_one(self.op, value)?;
        let Value::String(Some(text)) = v else {
            return Err(FilterError::NonTextPattern { operator: self.op });
        };
        if self.fold_case {
            let pattern = (self.shape)(&text.to_lowercase());
            Ok(Expr::expr(Func::lower(column)).like(LikeExpr::new(pattern).escape('\\')))
        } else {
            let pattern = (self.shape)(&text);
            Ok(Expr::expr(column).like(LikeExpr::new(pattern).escape('\\')))
        }
    }
}

struct NullCheck {
    op: Operator,
    apply: fn(Expr) -> SimpleExpr,
}

impl PredicateBuilder for NullCheck {
    fn operator(&self) -> Operator {
        self.op
    }

    fn build(&self, column: SimpleExpr, value: &CoercedValue) -> Result<SimpleExpr, FilterError> {
        match value {
            CoercedValue::Null => Ok((self.apply)(Expr::expr(column))),
            other => Err(arity(self.op, "no value", other)),
        }
    }
}

fn expect_one(op: Operator, value: &CoercedValue) -> Result<Value, FilterError> {
    match value {
        CoercedValue::One(v) => Ok(v.clone()),
        other => Err(arity(op, "a single value", other)),
    }
}

fn arity(operator: Operator, expected: &'static str, got: &CoercedValue) -> FilterError {
    let got = match got {
        CoercedValue::Null => "null".to_owned(),
        CoercedValue::One(_) => "a single value".to_owned(),
        CoercedValue::Many(items) => format!("a list of {}", items.len()),
    };
    FilterError::InvalidOperatorArity {
        operator,
        expected,
        got,
    }
}

/* ---------- LIKE helpers ---------- */

fn like_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            c => out.push(c),
        }
    }
    out
}
fn like_contains(s: &str) -> String {
    format!("%{}%", like_escape(s))
}
fn like_starts(s: &str) -> String {
    format!("{}%", like_escape(s))
}
fn like_ends(s: &str) -> String {
    format!("%{}", like_escape(s))
}

/* ---------- registry ---------- */

static REGISTRY: LazyLock<OperatorRegistry> = LazyLock::new(OperatorRegistry::standard);

/// Process-wide table from operator to predicate builder. Read-only once built.
pub struct OperatorRegistry {
    builders: HashMap<Operator, Box<dyn PredicateBuilder>>,
}

impl OperatorRegistry {
    /// The shared registry holding every standard operator.
    #[must_use]
    pub fn global() -> &'static OperatorRegistry {
        &REGISTRY
    }

    fn standard() -> Self {
        let builders: Vec<Box<dyn PredicateBuilder>> = vec![
            Box::new(Compare {
                op: Operator::Eq,
                apply: |c, v| c.eq(v),
            }),
            Box::new(Compare {
                op: Operator::Ne,
                apply: |c, v| c.ne(v),
            }),
            Box::new(Compare {
                op: Operator::Gt,
                apply: |c, v| c.gt(v),
            }),
            Box::new(Compare {
                op: Operator::Gte,
                apply: |c, v| c.gte(v),
            }),
            Box::new(Compare {
                op: Operator::Lt,
                apply: |c, v| c.lt(v),
            }),
            Box::new(Compare {
                op: Operator::Lte,
                apply: |c, v| c.lte(v),
            }),
            Box::new(Membership {
                op: Operator::In,
                apply: |c, vs| c.is_in(vs),
            }),
            Box::new(Membership {
                op: Operator::NotIn,
                apply: |c, vs| c.is_not_in(vs),
            }),
            Box::new(Pattern {
                op: Operator::Like,
                fold_case: true,
                shape: like_contains,
            }),
            Box::new(Pattern {
                op: Operator::Contains,
                fold_case: false,
                shape: like_contains,
            }),
            Box::new(Pattern {
                op: Operator::StartsWith,
                fold_case: false,
                shape: like_starts,
            }),
            Box::new(Pattern {
                op: Operator::EndsWith,
                fold_case: false,
                shape: like_ends,
            }),
            Box::new(NullCheck {
                op: Operator::IsNull,
                apply: Expr::is_null,
            }),
            Box::new(NullCheck {
                op: Operator::IsNotNull,
                apply: Expr::is_not_null,
            }),
            Box::new(RangeBetween),
        ];
        Self {
            builders: builders.into_iter().map(|b| (b.operator(), b)).collect(),
        }
    }

    /// Resolve a wire tag to its predicate builder.
    ///
    /// # Errors
    /// `FilterError::UnknownOperator` when no operator carries the tag.
    pub fn resolve(&self, tag: &OperatorTag) -> Result<&dyn PredicateBuilder, FilterError> {
        Operator::from_tag(tag.as_str())
            .and_then(|op| self.builders.get(&op))
            .map(AsRef::as_ref)
            .ok_or_else(|| FilterError::UnknownOperator {
                operator: tag.to_string(),
            })
    }
}
