use larder_db::{
    AggregateRecord, Children, Column, DeletePolicy, EntityDescriptor, EntityMapper, FieldKind,
    MappingError, RecordRow,
};

use crate::domain::product::Product;

pub static PRODUCTS: EntityDescriptor = EntityDescriptor {
    table: "products",
    primary_key: "id",
    version_column: "version",
    columns: &[
        Column::new("id", FieldKind::Uuid),
        Column::new("name", FieldKind::String),
        Column::new("brand", FieldKind::String),
        Column::new("barcode", FieldKind::String),
        Column::new("category", FieldKind::String),
        Column::new("is_food", FieldKind::Bool),
        // JSON documents
        Column::new("nutrition", FieldKind::String),
        Column::new("tags", FieldKind::String),
        Column::new("created_at", FieldKind::DateTimeUtc),
        Column::new("updated_at", FieldKind::DateTimeUtc),
    ],
    children: &[],
    delete_policy: DeletePolicy::Soft {
        column: "discontinued_at",
    },
};

/// Maps [`Product`] onto a single `products` row.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProductMapper;

impl EntityMapper for ProductMapper {
    type Aggregate = Product;

    fn descriptor(&self) -> &'static EntityDescriptor {
        &PRODUCTS
    }

    fn to_record(&self, product: &Product) -> Result<AggregateRecord, MappingError> {
        let mut root = RecordRow::new(PRODUCTS.table)
            .with("id", product.id)
            .with("name", product.name.as_str())
            .with("brand", product.brand.clone())
            .with("barcode", product.barcode.clone())
            .with("category", product.category.clone())
            .with("is_food", product.is_food)
            .with("created_at", product.created_at)
            .with("updated_at", product.updated_at);
        match &product.nutrition {
            Some(n) => root.set_json("nutrition", n)?,
            None => root.set("nutrition", Option::<String>::None),
        }
        root.set_json("tags", &product.tags)?;
        Ok(AggregateRecord::new(root, product.version))
    }

    fn to_children(&self, _product: &Product) -> Result<Children, MappingError> {
        Ok(Children::new())
    }

    fn to_aggregate(
        &self,
        record: AggregateRecord,
        _children: Children,
    ) -> Result<Product, MappingError> {
        let root = &record.root;
        let nutrition = match root.get_opt::<String>("nutrition")? {
            Some(_) => Some(root.get_json("nutrition")?),
            None => None,
        };
        let product = Product {
            id: record.id(&PRODUCTS)?,
            name: root.get("name")?,
            brand: root.get_opt("brand")?,
            barcode: root.get_opt("barcode")?,
            category: root.get_opt("category")?,
            is_food: root.get("is_food")?,
            nutrition,
            tags: root.get_json("tags")?,
            created_at: root.get("created_at")?,
            updated_at: root.get("updated_at")?,
            version: record.version,
        };
        product.validate().map_err(|e| MappingError::Invariant {
            table: PRODUCTS.table,
            reason: e.to_string(),
        })?;
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::domain::product::Nutrition;

    fn product() -> Product {
        let mut p = Product::new("Peanut butter").unwrap();
        p.brand = Some("Nutty".to_owned());
        p.set_barcode("8710398 500137").unwrap();
        p.add_tag("spread");
        p.add_tag("vegan");
        p.set_nutrition(Some(Nutrition {
            calories: 588.0,
            protein: 25.0,
            carbohydrate: 20.0,
            sugar: 9.0,
            total_fat: 50.0,
            saturated_fat: 10.0,
            sodium: 0.4,
        }))
        .unwrap();
        p
    }

    #[test]
    fn json_columns_round_trip() {
        let p = product();

        let record = ProductMapper.to_record(&p).unwrap();
        assert_eq!(
            record.root.get::<String>("tags").unwrap(),
            r#"["spread","vegan"]"#
        );

        let back = ProductMapper.to_aggregate(record, Children::new()).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn missing_nutrition_is_stored_as_null() {
        let mut p = product();
        p.nutrition = None;

        let record = ProductMapper.to_record(&p).unwrap();

        assert_eq!(record.root.get_opt::<String>("nutrition").unwrap(), None);
        assert_eq!(
            ProductMapper
                .to_aggregate(record, Children::new())
                .unwrap()
                .nutrition,
            None
        );
    }

    #[test]
    fn malformed_json_is_a_mapping_error() {
        let mut record = ProductMapper.to_record(&product()).unwrap();
        record.root.set("tags", "not json");

        let err = ProductMapper
            .to_aggregate(record, Children::new())
            .unwrap_err();

        assert!(matches!(
            err,
            MappingError::Serialization { column: "tags", .. }
        ));
    }

    #[test]
    fn stored_row_breaking_invariants_is_rejected() {
        let mut record = ProductMapper.to_record(&product()).unwrap();
        record.root.set("barcode", "12-34");

        let err = ProductMapper
            .to_aggregate(record, Children::new())
            .unwrap_err();

        assert!(matches!(err, MappingError::Invariant { .. }));
    }
}
