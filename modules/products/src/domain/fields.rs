/// Filter and sort keys accepted by product queries.
pub struct ProductFields;

impl ProductFields {
    pub const ID: &'static str = "id";
    pub const NAME: &'static str = "name";
    pub const BRAND: &'static str = "brand";
    pub const BARCODE: &'static str = "barcode";
    pub const CATEGORY: &'static str = "category";
    pub const IS_FOOD: &'static str = "is_food";
    pub const CREATED_AT: &'static str = "created_at";
}
