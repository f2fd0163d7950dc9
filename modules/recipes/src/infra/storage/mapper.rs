use std::collections::BTreeSet;

use larder_db::{
    AggregateRecord, ChildTable, Children, Column, DeletePolicy, EntityDescriptor, EntityMapper,
    FieldKind, MappingError, RecordRow,
};

use crate::domain::recipe::{Ingredient, NutriFacts, Privacy, Rating, Recipe, RecipeParts, Tag};

const FK: &str = "recipe_id";

pub(super) const TAGS: ChildTable = ChildTable {
    table: "recipe_tags",
    foreign_key: FK,
    columns: &[
        Column::new("category", FieldKind::String),
        Column::new("name", FieldKind::String),
    ],
    order_by: &["category", "name"],
};

pub(super) const INGREDIENTS: ChildTable = ChildTable {
    table: "recipe_ingredients",
    foreign_key: FK,
    columns: &[
        Column::new("position", FieldKind::I64),
        Column::new("name", FieldKind::String),
        Column::new("quantity", FieldKind::F64),
        Column::new("unit", FieldKind::String),
        Column::new("product_id", FieldKind::Uuid),
    ],
    order_by: &["position"],
};

pub(super) const RATINGS: ChildTable = ChildTable {
    table: "recipe_ratings",
    foreign_key: FK,
    columns: &[
        Column::new("user_id", FieldKind::Uuid),
        Column::new("taste", FieldKind::I64),
        Column::new("convenience", FieldKind::I64),
        Column::new("comment", FieldKind::String),
    ],
    order_by: &["user_id"],
};

pub(super) const NUTRITION: ChildTable = ChildTable {
    table: "recipe_nutrition",
    foreign_key: FK,
    columns: &[
        Column::new("calories", FieldKind::F64),
        Column::new("protein", FieldKind::F64),
        Column::new("carbohydrate", FieldKind::F64),
        Column::new("total_fat", FieldKind::F64),
    ],
    order_by: &[],
};

pub static RECIPES: EntityDescriptor = EntityDescriptor {
    table: "recipes",
    primary_key: "id",
    version_column: "version",
    columns: &[
        Column::new("id", FieldKind::Uuid),
        Column::new("author_id", FieldKind::Uuid),
        Column::new("name", FieldKind::String),
        Column::new("description", FieldKind::String),
        Column::new("instructions", FieldKind::String),
        Column::new("total_time", FieldKind::I64),
        Column::new("privacy", FieldKind::String),
        Column::new("created_at", FieldKind::DateTimeUtc),
        Column::new("updated_at", FieldKind::DateTimeUtc),
    ],
    children: &[TAGS, INGREDIENTS, RATINGS, NUTRITION],
    delete_policy: DeletePolicy::Hard,
};

/// Maps [`Recipe`] onto `recipes` plus one table per owned collection.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecipeMapper;

impl EntityMapper for RecipeMapper {
    type Aggregate = Recipe;

    fn descriptor(&self) -> &'static EntityDescriptor {
        &RECIPES
    }

    fn to_record(&self, recipe: &Recipe) -> Result<AggregateRecord, MappingError> {
        let root = RecordRow::new(RECIPES.table)
            .with("id", recipe.id())
            .with("author_id", recipe.author_id())
            .with("name", recipe.name())
            .with("description", recipe.description().map(str::to_owned))
            .with("instructions", recipe.instructions())
            .with("total_time", recipe.total_time())
            .with("privacy", recipe.privacy().as_str())
            .with("created_at", recipe.created_at())
            .with("updated_at", recipe.updated_at());
        Ok(AggregateRecord::new(root, recipe.version()))
    }

    fn to_children(&self, recipe: &Recipe) -> Result<Children, MappingError> {
        let id = recipe.id();
        let mut children = Children::new();
        for tag in recipe.tags() {
            children.push(
                RecordRow::new(TAGS.table)
                    .with(FK, id)
                    .with("category", tag.category())
                    .with("name", tag.name()),
            );
        }
        for (position, ingredient) in (0_i64..).zip(recipe.ingredients()) {
            children.push(
                RecordRow::new(INGREDIENTS.table)
                    .with(FK, id)
                    .with("position", position)
                    .with("name", ingredient.name.as_str())
                    .with("quantity", ingredient.quantity)
                    .with("unit", ingredient.unit.clone())
                    .with("product_id", ingredient.product_id),
            );
        }
        for rating in recipe.ratings() {
            children.push(
                RecordRow::new(RATINGS.table)
                    .with(FK, id)
                    .with("user_id", rating.user_id)
                    .with("taste", i64::from(rating.taste))
                    .with("convenience", i64::from(rating.convenience))
                    .with("comment", rating.comment.clone()),
            );
        }
        if let Some(facts) = recipe.nutri_facts() {
            children.push(
                RecordRow::new(NUTRITION.table)
                    .with(FK, id)
                    .with("calories", facts.calories)
                    .with("protein", facts.protein)
                    .with("carbohydrate", facts.carbohydrate)
                    .with("total_fat", facts.total_fat),
            );
        }
        Ok(children)
    }

    fn to_aggregate(
        &self,
        record: AggregateRecord,
        mut children: Children,
    ) -> Result<Recipe, MappingError> {
        let id = record.id(&RECIPES)?;
        let root = &record.root;

        let tags = children
            .take(&TAGS, id)?
            .iter()
            .map(|row| Ok(Tag::new(&row.get::<String>("category")?, &row.get::<String>("name")?)))
            .collect::<Result<BTreeSet<_>, MappingError>>()?;
        let ingredients = children
            .take(&INGREDIENTS, id)?
            .iter()
            .map(ingredient_from)
            .collect::<Result<Vec<_>, _>>()?;
        let ratings = children
            .take(&RATINGS, id)?
            .iter()
            .map(rating_from)
            .collect::<Result<Vec<_>, _>>()?;
        let nutri_facts = children
            .take_one(&NUTRITION, id)?
            .as_ref()
            .map(nutri_facts_from)
            .transpose()?;

        let parts = RecipeParts {
            id,
            author_id: root.get("author_id")?,
            name: root.get("name")?,
            description: root.get_opt("description")?,
            instructions: root.get("instructions")?,
            total_time: root.get_opt("total_time")?,
            privacy: privacy_from(root)?,
            created_at: root.get("created_at")?,
            updated_at: root.get("updated_at")?,
            tags,
            ingredients,
            ratings,
            nutri_facts,
            version: record.version,
        };
        Recipe::from_parts(parts).map_err(|e| MappingError::Invariant {
            table: RECIPES.table,
            reason: e.to_string(),
        })
    }
}

fn privacy_from(root: &RecordRow) -> Result<Privacy, MappingError> {
    let raw: String = root.get("privacy")?;
    Privacy::parse(&raw).ok_or_else(|| MappingError::InvalidValue {
        table: RECIPES.table,
        column: "privacy",
        reason: format!("unknown privacy `{raw}`"),
    })
}

fn ingredient_from(row: &RecordRow) -> Result<Ingredient, MappingError> {
    Ok(Ingredient {
        name: row.get("name")?,
        quantity: row.get_opt("quantity")?,
        unit: row.get_opt("unit")?,
        product_id: row.get_opt("product_id")?,
    })
}

fn score(row: &RecordRow, column: &'static str) -> Result<u8, MappingError> {
    let raw: i64 = row.get(column)?;
    u8::try_from(raw).map_err(|_| MappingError::InvalidValue {
        table: RATINGS.table,
        column,
        reason: format!("{raw} is not a score"),
    })
}

fn rating_from(row: &RecordRow) -> Result<Rating, MappingError> {
    Ok(Rating {
        user_id: row.get("user_id")?,
        taste: score(row, "taste")?,
        convenience: score(row, "convenience")?,
        comment: row.get_opt("comment")?,
    })
}

fn nutri_facts_from(row: &RecordRow) -> Result<NutriFacts, MappingError> {
    Ok(NutriFacts {
        calories: row.get("calories")?,
        protein: row.get("protein")?,
        carbohydrate: row.get("carbohydrate")?,
        total_fat: row.get("total_fat")?,
    })
}
