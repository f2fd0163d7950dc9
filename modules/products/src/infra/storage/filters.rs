use larder_db::{ConfigError, FieldKind, FilterMapper, FilterMapping, OperatorSet, Scalar};

use super::mapper::PRODUCTS;
use crate::domain::fields::ProductFields;
use crate::domain::product::normalize_barcode;

/// Barcodes are compared in their stored, digits-only form.
fn barcode(value: Scalar) -> Result<Scalar, String> {
    match value {
        Scalar::Text(s) => normalize_barcode(&s)
            .map(Scalar::Text)
            .ok_or_else(|| format!("`{s}` is not a barcode")),
        other => Err(format!("expected text, got {}", other.shape())),
    }
}

/// Filter table of the `products` entity.
///
/// # Errors
/// `ConfigError::InvalidMapping` if a mapping is inconsistent.
pub fn product_filters() -> Result<FilterMapper, ConfigError> {
    FilterMapper::builder(PRODUCTS.table, PRODUCTS.primary_key)
        .insert(FilterMapping::column(ProductFields::ID, "id", FieldKind::Uuid).unique())
        .insert(FilterMapping::column(
            ProductFields::NAME,
            "name",
            FieldKind::String,
        ))
        .insert(FilterMapping::column(ProductFields::BRAND, "brand", FieldKind::String).nullable())
        .insert(
            FilterMapping::column(ProductFields::BARCODE, "barcode", FieldKind::String)
                .operators(OperatorSet::EQUALITY)
                .nullable()
                .coerce_with(barcode),
        )
        .insert(
            FilterMapping::column(ProductFields::CATEGORY, "category", FieldKind::String)
                .nullable(),
        )
        .insert(FilterMapping::column(
            ProductFields::IS_FOOD,
            "is_food",
            FieldKind::Bool,
        ))
        .insert(
            FilterMapping::column(
                ProductFields::CREATED_AT,
                "created_at",
                FieldKind::DateTimeUtc,
            )
            .repeatable(),
        )
        .build()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use larder_db::{FilterError, Operator};

    use super::*;

    #[test]
    fn barcode_operands_are_normalized() {
        let m = product_filters().unwrap();

        assert!(
            m.validate(
                ProductFields::BARCODE,
                &Operator::Eq.into(),
                &"4006381 333931".into()
            )
            .is_ok()
        );
        let err = m
            .validate(ProductFields::BARCODE, &Operator::Eq.into(), &"n/a".into())
            .unwrap_err();
        assert!(matches!(err, FilterError::ValueCoercion { .. }));
    }

    #[test]
    fn booleans_only_compare_for_equality() {
        let m = product_filters().unwrap();

        let err = m
            .validate(ProductFields::IS_FOOD, &Operator::Gt.into(), &true.into())
            .unwrap_err();

        assert!(matches!(err, FilterError::OperatorNotAllowed { .. }));
    }
}
