//! Per-entity filter mapping tables.
//!
//! A [`FilterMapper`] maps every domain filter key of one aggregate type to a
//! storage column, the join chain that makes the column reachable, the operators
//! the key accepts and an optional value coercion. Mappers are built once at
//! startup, validated, and then only read.

use std::collections::{HashMap, HashSet};
use std::fmt;

use sea_orm::sea_query::{Alias, Expr, SimpleExpr};

use crate::config::ConfigError;
use crate::query::errors::FilterError;
use crate::query::kind::{CoercedValue, FieldKind, FilterValue, Scalar};
use crate::query::operator::{OperatorRegistry, OperatorSet, OperatorTag, PredicateBuilder};

/// Hook applied to every operand before it is coerced to the field kind.
pub type ValueCoercion = fn(Scalar) -> Result<Scalar, String>;

/// A column on the root table (`relation == None`) or on a joined relation alias.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColumnPath {
    pub relation: Option<&'static str>,
    pub column: &'static str,
}

impl ColumnPath {
    #[must_use]
    pub const fn root(column: &'static str) -> Self {
        Self {
            relation: None,
            column,
        }
    }

    #[must_use]
    pub const fn joined(relation: &'static str, column: &'static str) -> Self {
        Self {
            relation: Some(relation),
            column,
        }
    }

    /// Qualified column expression; root columns are qualified with `base_table`.
    #[must_use]
    pub fn expr(&self, base_table: &str) -> SimpleExpr {
        let relation = self.relation.unwrap_or(base_table);
        Expr::col((Alias::new(relation), Alias::new(self.column))).into()
    }
}

impl fmt::Display for ColumnPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.relation {
            Some(rel) => write!(f, "{rel}.{}", self.column),
            None => f.write_str(self.column),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cardinality {
    OneToOne,
    OneToMany,
}

/// One hop of a join graph: `LEFT JOIN target_table AS alias ON from = alias.to_column`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JoinSpec {
    pub alias: &'static str,
    pub target_table: &'static str,
    pub from: ColumnPath,
    pub to_column: &'static str,
    pub cardinality: Cardinality,
}

impl JoinSpec {
    #[must_use]
    pub const fn one_to_one(
        alias: &'static str,
        target_table: &'static str,
        from: ColumnPath,
        to_column: &'static str,
    ) -> Self {
        Self {
            alias,
            target_table,
            from,
            to_column,
            cardinality: Cardinality::OneToOne,
        }
    }

    #[must_use]
    pub const fn one_to_many(
        alias: &'static str,
        target_table: &'static str,
        from: ColumnPath,
        to_column: &'static str,
    ) -> Self {
        Self {
            alias,
            target_table,
            from,
            to_column,
            cardinality: Cardinality::OneToMany,
        }
    }

    #[must_use]
    pub fn fans_out(&self) -> bool {
        self.cardinality == Cardinality::OneToMany
    }
}

impl fmt::Display for JoinSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let card = match self.cardinality {
            Cardinality::OneToOne => "1:1",
            Cardinality::OneToMany => "1:n",
        };
        write!(
            f,
            "{} AS {} ON {} = {}.{} ({card})",
            self.target_table, self.alias, self.from, self.alias, self.to_column
        )
    }
}

/// Mapping of one domain filter key.
#[derive(Clone, Debug)]
pub struct FilterMapping {
    key: &'static str,
    path: ColumnPath,
    joins: Vec<JoinSpec>,
    kind: FieldKind,
    operators: OperatorSet,
    coercion: Option<ValueCoercion>,
    repeatable: bool,
    unique: bool,
}

impl FilterMapping {
    /// Map `key` to a root table column. The allowed operators default by kind:
    /// text keys get the pattern operators, numbers and timestamps the range
    /// operators, everything else equality.
    #[must_use]
    pub fn column(key: &'static str, column: &'static str, kind: FieldKind) -> Self {
        let operators = match kind {
            FieldKind::String => OperatorSet::TEXT,
            FieldKind::I64 | FieldKind::F64 | FieldKind::DateTimeUtc => OperatorSet::ORDERED,
            FieldKind::Bool | FieldKind::Uuid => OperatorSet::EQUALITY,
        };
        Self {
            key,
            path: ColumnPath::root(column),
            joins: Vec::new(),
            kind,
            operators,
            coercion: None,
            repeatable: false,
            unique: false,
        }
    }

    /// Append a join hop; the mapped column moves onto the hop's alias.
    ///
    /// A one-to-many hop drops `ne` and `not_in`: over a collection they would match
    /// any root owning a single non-matching child.
    #[must_use]
    pub fn through(mut self, join: JoinSpec) -> Self {
        if join.fans_out() {
            self.operators = self.operators.without(OperatorSet::NEGATED);
        }
        self.path.relation = Some(join.alias);
        self.joins.push(join);
        self
    }

    #[must_use]
    pub fn operators(mut self, operators: OperatorSet) -> Self {
        self.operators = operators;
        self
    }

    /// Additionally accept `is_null` / `is_not_null`.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.operators = self.operators.union(OperatorSet::NULLABLE);
        self
    }

    #[must_use]
    pub fn coerce_with(mut self, coercion: ValueCoercion) -> Self {
        self.coercion = Some(coercion);
        self
    }

    /// Allow the key several times in one conjunction, e.g. two range bounds.
    #[must_use]
    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }

    /// The column alone orders rows totally, so no primary-key tie-break is needed.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn key(&self) -> &'static str {
        self.key
    }

    #[must_use]
    pub fn path(&self) -> ColumnPath {
        self.path
    }

    #[must_use]
    pub fn joins(&self) -> &[JoinSpec] {
        &self.joins
    }

    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    #[must_use]
    pub fn allowed_operators(&self) -> OperatorSet {
        self.operators
    }

    #[must_use]
    pub fn is_repeatable(&self) -> bool {
        self.repeatable
    }

    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    #[must_use]
    pub fn fans_out(&self) -> bool {
        self.joins.iter().any(JoinSpec::fans_out)
    }

    fn coerce_scalar(&self, s: &Scalar) -> Result<sea_orm::Value, String> {
        match self.coercion {
            Some(hook) => self.kind.coerce(&hook(s.clone())?),
            None => self.kind.coerce(s),
        }
    }

    fn coerce(&self, value: &FilterValue) -> Result<CoercedValue, String> {
        Ok(match value {
            FilterValue::Null => CoercedValue::Null,
            FilterValue::Scalar(s) => CoercedValue::One(self.coerce_scalar(s)?),
            FilterValue::List(items) => CoercedValue::Many(
                items
                    .iter()
                    .map(|s| self.coerce_scalar(s))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    fn check(&self, entity: &str) -> Result<(), String> {
        if self.operators.is_empty() {
            return Err("allowed operator set is empty".to_owned());
        }
        if self.kind != FieldKind::String && self.operators.iter().any(|op| op.is_pattern()) {
            return Err(format!("pattern operators need a String column, got {}", self.kind));
        }
        if self.fans_out() && self.operators.intersects(OperatorSet::NEGATED) {
            return Err("`ne` and `not_in` cannot reach through a one-to-many join".to_owned());
        }
        let mut known: HashSet<&str> = HashSet::new();
        for join in &self.joins {
            if join.alias == entity {
                return Err(format!("join alias `{}` shadows the root table", join.alias));
            }
            if let Some(rel) = join.from.relation
                && !known.contains(rel)
            {
                return Err(format!(
                    "join `{}` starts from unknown relation `{rel}`",
                    join.alias
                ));
            }
            known.insert(join.alias);
        }
        if self.path.relation != self.joins.last().map(|j| j.alias) {
            return Err("column path does not sit on the last join".to_owned());
        }
        Ok(())
    }
}

/// Outcome of a successful [`FilterMapper::validate`] call.
pub struct ValidatedFilter<'m> {
    pub mapping: &'m FilterMapping,
    pub builder: &'static dyn PredicateBuilder,
    pub value: CoercedValue,
}

impl fmt::Debug for ValidatedFilter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedFilter")
            .field("key", &self.mapping.key)
            .field("operator", &self.builder.operator())
            .field("arity", &self.value.arity())
            .finish()
    }
}

/// Immutable filter mapping table for one aggregate type.
#[derive(Clone, Debug)]
pub struct FilterMapper {
    entity: &'static str,
    primary_key: &'static str,
    fields: HashMap<String, FilterMapping>,
}

impl FilterMapper {
    #[must_use]
    pub fn builder(entity: &'static str, primary_key: &'static str) -> FilterMapperBuilder {
        FilterMapperBuilder {
            entity,
            primary_key,
            mappings: Vec::new(),
        }
    }

    #[must_use]
    pub fn entity(&self) -> &'static str {
        self.entity
    }

    #[must_use]
    pub fn primary_key(&self) -> &'static str {
        self.primary_key
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FilterMapping> {
        self.fields.get(&key.to_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilterMapping> {
        self.fields.values()
    }

    /// Check one filter against the table and coerce its value.
    ///
    /// Checks run in order: key, operator existence, operator permission, value.
    ///
    /// # Errors
    /// `UnknownFilterKey`, `UnknownOperator`, `OperatorNotAllowed` or `ValueCoercion`.
    pub fn validate(
        &self,
        key: &str,
        operator: &OperatorTag,
        value: &FilterValue,
    ) -> Result<ValidatedFilter<'_>, FilterError> {
        let mapping = self.get(key).ok_or_else(|| FilterError::UnknownFilterKey {
            key: key.to_owned(),
        })?;
        let builder = OperatorRegistry::global().resolve(operator)?;
        if !mapping.operators.contains(builder.operator()) {
            return Err(FilterError::OperatorNotAllowed {
                key: mapping.key.to_owned(),
                operator: builder.operator(),
            });
        }
        let value = mapping
            .coerce(value)
            .map_err(|reason| FilterError::ValueCoercion {
                key: mapping.key.to_owned(),
                reason,
            })?;
        Ok(ValidatedFilter {
            mapping,
            builder,
            value,
        })
    }

    /// Resolve a sort key through the same table.
    ///
    /// # Errors
    /// `UnknownFilterKey` for unmapped keys, `UnsortableKey` for keys that sit behind
    /// a one-to-many join.
    pub fn resolve_sort(&self, key: &str) -> Result<&FilterMapping, FilterError> {
        let mapping = self.get(key).ok_or_else(|| FilterError::UnknownFilterKey {
            key: key.to_owned(),
        })?;
        if mapping.fans_out() {
            return Err(FilterError::UnsortableKey {
                key: mapping.key.to_owned(),
                reason: "the column belongs to an owned collection",
            });
        }
        Ok(mapping)
    }
}

#[must_use]
pub struct FilterMapperBuilder {
    entity: &'static str,
    primary_key: &'static str,
    mappings: Vec<FilterMapping>,
}

impl FilterMapperBuilder {
    pub fn insert(mut self, mapping: FilterMapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    /// Validate every mapping and freeze the table.
    ///
    /// # Errors
    /// `ConfigError::InvalidMapping` for an empty operator set, pattern operators on
    /// a non-text column, a broken join chain or a duplicated key.
    pub fn build(self) -> Result<FilterMapper, ConfigError> {
        let mut fields = HashMap::with_capacity(self.mappings.len());
        for mapping in self.mappings {
            let invalid = |reason: String| ConfigError::InvalidMapping {
                entity: self.entity.to_owned(),
                key: mapping.key.to_owned(),
                reason,
            };
            mapping.check(self.entity).map_err(invalid)?;
            let name = mapping.key.to_lowercase();
            if fields.contains_key(&name) {
                return Err(invalid("key is mapped twice".to_owned()));
            }
            fields.insert(name, mapping);
        }
        Ok(FilterMapper {
            entity: self.entity,
            primary_key: self.primary_key,
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::query::operator::Operator;

    const TAGS: JoinSpec =
        JoinSpec::one_to_many("tags", "note_labels", ColumnPath::root("id"), "note_id");

    fn lowercase(s: Scalar) -> Result<Scalar, String> {
        match s {
            Scalar::Text(t) => Ok(Scalar::Text(t.to_lowercase())),
            other => Ok(other),
        }
    }

    fn mapper() -> FilterMapper {
        FilterMapper::builder("notes", "id")
            .insert(FilterMapping::column("id", "id", FieldKind::Uuid).unique())
            .insert(FilterMapping::column("title", "title", FieldKind::String))
            .insert(FilterMapping::column("pages", "pages", FieldKind::I64).nullable())
            .insert(
                FilterMapping::column("label", "name", FieldKind::String)
                    .through(TAGS)
                    .operators(OperatorSet::of(&[Operator::Eq, Operator::In]))
                    .coerce_with(lowercase),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn validation_order_is_key_then_operator_then_value() {
        let m = mapper();

        let err = m
            .validate("nonexistent_field", &"approximately".into(), &1_i64.into())
            .unwrap_err();
        assert!(matches!(err, FilterError::UnknownFilterKey { .. }));

        let err = m
            .validate("pages", &"approximately".into(), &"x".into())
            .unwrap_err();
        assert!(matches!(err, FilterError::UnknownOperator { .. }));

        let err = m
            .validate("pages", &Operator::Like.into(), &"x".into())
            .unwrap_err();
        assert_eq!(
            err,
            FilterError::OperatorNotAllowed {
                key: "pages".to_owned(),
                operator: Operator::Like
            }
        );

        let err = m
            .validate("id", &Operator::Eq.into(), &"not-a-uuid".into())
            .unwrap_err();
        assert!(matches!(err, FilterError::ValueCoercion { ref key, .. } if key == "id"));
    }

    #[test]
    fn keys_are_case_insensitive_and_coercion_hook_runs() {
        let m = mapper();
        let v = m
            .validate("LABEL", &Operator::In.into(), &["Vegan", "QUICK"].into())
            .unwrap();
        assert_eq!(v.mapping.key(), "label");
        assert_eq!(
            v.value,
            CoercedValue::Many(vec!["vegan".into(), "quick".into()])
        );
    }

    #[test]
    fn sorting_behind_a_collection_is_rejected() {
        let m = mapper();
        assert!(m.resolve_sort("pages").is_ok());
        assert!(matches!(
            m.resolve_sort("label").unwrap_err(),
            FilterError::UnsortableKey { .. }
        ));
    }

    #[test]
    fn pattern_operators_on_numbers_are_a_config_error() {
        let err = FilterMapper::builder("notes", "id")
            .insert(FilterMapping::column("pages", "pages", FieldKind::I64).operators(OperatorSet::TEXT))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMapping { .. }));
    }

    #[test]
    fn empty_operator_set_and_duplicate_keys_are_config_errors() {
        assert!(
            FilterMapper::builder("notes", "id")
                .insert(
                    FilterMapping::column("pages", "pages", FieldKind::I64)
                        .operators(OperatorSet::EMPTY)
                )
                .build()
                .is_err()
        );
        assert!(
            FilterMapper::builder("notes", "id")
                .insert(FilterMapping::column("title", "title", FieldKind::String))
                .insert(FilterMapping::column("Title", "title", FieldKind::String))
                .build()
                .is_err()
        );
    }

    #[test]
    fn negations_never_reach_through_a_collection() {
        let text = FilterMapping::column("label", "name", FieldKind::String).through(TAGS);
        assert!(text.allowed_operators().contains(Operator::In));
        assert!(!text.allowed_operators().contains(Operator::Ne));
        assert!(!text.allowed_operators().contains(Operator::NotIn));

        let m = FilterMapper::builder("notes", "id")
            .insert(text)
            .build()
            .unwrap();
        let err = m
            .validate("label", &Operator::NotIn.into(), &["vegan"].into())
            .unwrap_err();
        assert_eq!(
            err,
            FilterError::OperatorNotAllowed {
                key: "label".to_owned(),
                operator: Operator::NotIn
            }
        );

        let err = FilterMapper::builder("notes", "id")
            .insert(
                FilterMapping::column("label", "name", FieldKind::String)
                    .through(TAGS)
                    .operators(OperatorSet::EQUALITY),
            )
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("one-to-many"), "{err}");
    }

    #[test]
    fn join_chain_must_start_from_a_known_relation() {
        let dangling =
            JoinSpec::one_to_one("author", "people", ColumnPath::joined("nowhere", "id"), "id");
        let err = FilterMapper::builder("notes", "id")
            .insert(FilterMapping::column("author_name", "name", FieldKind::String).through(dangling))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("nowhere"));
    }
}
