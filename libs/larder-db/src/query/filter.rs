//! Closed filter vocabulary handed over by the transport layer.

use serde::{Deserialize, Serialize};

use crate::query::kind::FilterValue;
use crate::query::operator::{Operator, OperatorTag, SortDir};

/// One `key <operator> value` condition on a domain key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterSpecification {
    pub key: String,
    pub operator: OperatorTag,
    #[serde(default = "null_value")]
    pub value: FilterValue,
}

fn null_value() -> FilterValue {
    FilterValue::Null
}

impl FilterSpecification {
    pub fn new(
        key: impl Into<String>,
        operator: impl Into<OperatorTag>,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self {
            key: key.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    /// `key is_null` / `key is_not_null` shorthand.
    pub fn null_check(key: impl Into<String>, operator: Operator) -> Self {
        Self {
            key: key.into(),
            operator: operator.into(),
            value: FilterValue::Null,
        }
    }
}

/// Node of the filter tree. A list of clauses is a conjunction; disjunction is only
/// ever expressed through an explicit `any_of` group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterClause {
    AnyOf { any_of: Vec<FilterClause> },
    AllOf { all_of: Vec<FilterClause> },
    Where(FilterSpecification),
}

impl FilterClause {
    pub fn any_of(clauses: impl IntoIterator<Item = FilterClause>) -> Self {
        FilterClause::AnyOf {
            any_of: clauses.into_iter().collect(),
        }
    }

    pub fn all_of(clauses: impl IntoIterator<Item = FilterClause>) -> Self {
        FilterClause::AllOf {
            all_of: clauses.into_iter().collect(),
        }
    }
}

impl From<FilterSpecification> for FilterClause {
    fn from(spec: FilterSpecification) -> Self {
        FilterClause::Where(spec)
    }
}

/// Domain sort key with direction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub key: String,
    #[serde(default)]
    pub direction: SortDir,
}

impl SortKey {
    pub fn asc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDir::Asc,
        }
    }

    pub fn desc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDir::Desc,
        }
    }
}

/// Everything `query` needs: filters, sort, paging and whether to count.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct QueryRequest {
    #[serde(default)]
    pub filters: Vec<FilterClause>,
    #[serde(default)]
    pub sort: Vec<SortKey>,
    /// `None` falls back to the configured default page size.
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub with_total: bool,
}

impl QueryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, clause: impl Into<FilterClause>) -> Self {
        self.filters.push(clause.into());
        self
    }

    pub fn sort(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_total(mut self) -> Self {
        self.with_total = true;
        self
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn transport_json_parses_into_clauses() {
        let json = r#"[
            {"key": "total_time", "operator": "lte", "value": 30},
            {"any_of": [
                {"key": "tag_name", "operator": "in", "value": ["vegan", "quick"]},
                {"key": "calories", "operator": "is_null"}
            ]}
        ]"#;
        let clauses: Vec<FilterClause> = serde_json::from_str(json).unwrap();
        assert_eq!(clauses.len(), 2);
        assert_eq!(
            clauses[0],
            FilterClause::Where(FilterSpecification::new("total_time", "lte", 30_i64))
        );
        let FilterClause::AnyOf { any_of } = &clauses[1] else {
            panic!("expected an any_of group");
        };
        assert_eq!(
            any_of[1],
            FilterClause::Where(FilterSpecification::null_check(
                "calories",
                Operator::IsNull
            ))
        );
    }

    #[test]
    fn sort_direction_defaults_to_ascending() {
        let key: SortKey = serde_json::from_str(r#"{"key": "name"}"#).unwrap();
        assert_eq!(key, SortKey::asc("name"));
    }
}
