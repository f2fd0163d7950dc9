use larder_db::query::ColumnPath;
use larder_db::{
    ConfigError, FieldKind, FilterMapper, FilterMapping, JoinSpec, OperatorSet, Scalar,
};

use super::mapper::{INGREDIENTS, NUTRITION, RATINGS, RECIPES, TAGS};
use crate::domain::fields::RecipeFields;
use crate::domain::recipe::Privacy;

const ROOT_ID: ColumnPath = ColumnPath::root("id");

const TAG_JOIN: JoinSpec = JoinSpec::one_to_many("tags", TAGS.table, ROOT_ID, TAGS.foreign_key);
const INGREDIENT_JOIN: JoinSpec = JoinSpec::one_to_many(
    "ingredients",
    INGREDIENTS.table,
    ROOT_ID,
    INGREDIENTS.foreign_key,
);
const RATING_JOIN: JoinSpec =
    JoinSpec::one_to_many("ratings", RATINGS.table, ROOT_ID, RATINGS.foreign_key);
const NUTRITION_JOIN: JoinSpec =
    JoinSpec::one_to_one("nutrition", NUTRITION.table, ROOT_ID, NUTRITION.foreign_key);

/// Tags are stored lowercased; so are the operands.
fn lowercase(value: Scalar) -> Result<Scalar, String> {
    match value {
        Scalar::Text(s) => Ok(Scalar::Text(s.trim().to_lowercase())),
        other => Err(format!("expected text, got {}", other.shape())),
    }
}

fn privacy(value: Scalar) -> Result<Scalar, String> {
    match value {
        Scalar::Text(s) => {
            let s = s.trim().to_lowercase();
            match Privacy::parse(&s) {
                Some(p) => Ok(Scalar::Text(p.as_str().to_owned())),
                None => Err(format!("unknown privacy `{s}`")),
            }
        }
        other => Err(format!("expected text, got {}", other.shape())),
    }
}

/// Filter table of the `recipes` entity.
///
/// # Errors
/// `ConfigError::InvalidMapping` if a mapping is inconsistent.
pub fn recipe_filters() -> Result<FilterMapper, ConfigError> {
    FilterMapper::builder(RECIPES.table, RECIPES.primary_key)
        .insert(FilterMapping::column(RecipeFields::ID, "id", FieldKind::Uuid).unique())
        .insert(FilterMapping::column(
            RecipeFields::AUTHOR_ID,
            "author_id",
            FieldKind::Uuid,
        ))
        .insert(FilterMapping::column(
            RecipeFields::NAME,
            "name",
            FieldKind::String,
        ))
        .insert(
            FilterMapping::column(RecipeFields::TOTAL_TIME, "total_time", FieldKind::I64)
                .nullable()
                .repeatable(),
        )
        .insert(
            FilterMapping::column(RecipeFields::PRIVACY, "privacy", FieldKind::String)
                .operators(OperatorSet::EQUALITY)
                .coerce_with(privacy),
        )
        .insert(
            FilterMapping::column(
                RecipeFields::CREATED_AT,
                "created_at",
                FieldKind::DateTimeUtc,
            )
            .repeatable(),
        )
        .insert(
            FilterMapping::column(
                RecipeFields::UPDATED_AT,
                "updated_at",
                FieldKind::DateTimeUtc,
            )
            .repeatable(),
        )
        .insert(
            FilterMapping::column(RecipeFields::TAG_NAME, "name", FieldKind::String)
                .through(TAG_JOIN)
                .coerce_with(lowercase),
        )
        .insert(
            FilterMapping::column(RecipeFields::TAG_CATEGORY, "category", FieldKind::String)
                .through(TAG_JOIN)
                .coerce_with(lowercase),
        )
        .insert(
            FilterMapping::column(RecipeFields::INGREDIENT_NAME, "name", FieldKind::String)
                .through(INGREDIENT_JOIN),
        )
        .insert(
            FilterMapping::column(
                RecipeFields::INGREDIENT_PRODUCT_ID,
                "product_id",
                FieldKind::Uuid,
            )
            .through(INGREDIENT_JOIN),
        )
        .insert(
            FilterMapping::column(RecipeFields::CALORIES, "calories", FieldKind::F64)
                .through(NUTRITION_JOIN)
                .nullable()
                .repeatable(),
        )
        .insert(
            FilterMapping::column(RecipeFields::PROTEIN, "protein", FieldKind::F64)
                .through(NUTRITION_JOIN)
                .nullable()
                .repeatable(),
        )
        .insert(
            FilterMapping::column(RecipeFields::RATED_BY, "user_id", FieldKind::Uuid)
                .through(RATING_JOIN),
        )
        .build()
}
