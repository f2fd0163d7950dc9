/// Filter and sort keys accepted by recipe queries.
pub struct RecipeFields;

impl RecipeFields {
    pub const ID: &'static str = "id";
    pub const AUTHOR_ID: &'static str = "author_id";
    pub const NAME: &'static str = "name";
    pub const TOTAL_TIME: &'static str = "total_time";
    pub const PRIVACY: &'static str = "privacy";
    pub const CREATED_AT: &'static str = "created_at";
    pub const UPDATED_AT: &'static str = "updated_at";
    pub const TAG_NAME: &'static str = "tag_name";
    pub const TAG_CATEGORY: &'static str = "tag_category";
    pub const INGREDIENT_NAME: &'static str = "ingredient_name";
    pub const INGREDIENT_PRODUCT_ID: &'static str = "ingredient_product_id";
    pub const CALORIES: &'static str = "calories";
    pub const PROTEIN: &'static str = "protein";
    pub const RATED_BY: &'static str = "rated_by";
}
