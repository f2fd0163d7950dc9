use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::ProductError;

/// Nutrition per 100 g (or 100 ml) as printed on the package.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrition {
    pub calories: f64,
    pub protein: f64,
    pub carbohydrate: f64,
    pub sugar: f64,
    pub total_fat: f64,
    pub saturated_fat: f64,
    pub sodium: f64,
}

impl Nutrition {
    fn check(&self) -> Result<(), ProductError> {
        let fields = [
            ("calories", self.calories),
            ("protein", self.protein),
            ("carbohydrate", self.carbohydrate),
            ("sugar", self.sugar),
            ("total_fat", self.total_fat),
            ("saturated_fat", self.saturated_fat),
            ("sodium", self.sodium),
        ];
        match fields.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            Some((nutrient, _)) => Err(ProductError::InvalidNutrient {
                nutrient: *nutrient,
            }),
            None => Ok(()),
        }
    }
}

/// A purchasable product. Tags and nutrition are stored inline with the product.
#[derive(Clone, Debug, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub brand: Option<String>,
    /// Digits only; see [`normalize_barcode`].
    pub barcode: Option<String>,
    pub category: Option<String>,
    pub is_food: bool,
    pub nutrition: Option<Nutrition>,
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl Product {
    /// New food product with a fresh id, version 1.
    ///
    /// # Errors
    /// `ProductError::EmptyName` for a blank name.
    pub fn new(name: &str) -> Result<Self, ProductError> {
        let now = Utc::now();
        let product = Self {
            id: Uuid::new_v4(),
            name: name.trim().to_owned(),
            brand: None,
            barcode: None,
            category: None,
            is_food: true,
            nutrition: None,
            tags: BTreeSet::new(),
            created_at: now,
            updated_at: now,
            version: 1,
        };
        product.validate()?;
        Ok(product)
    }

    /// Check the invariants of a product assembled field by field.
    ///
    /// # Errors
    /// The first violated invariant.
    pub fn validate(&self) -> Result<(), ProductError> {
        if self.name.trim().is_empty() {
            return Err(ProductError::EmptyName);
        }
        if let Some(barcode) = &self.barcode
            && normalize_barcode(barcode).as_deref() != Some(barcode.as_str())
        {
            return Err(ProductError::InvalidBarcode(barcode.clone()));
        }
        if let Some(nutrition) = &self.nutrition {
            nutrition.check()?;
        }
        Ok(())
    }

    /// Set the barcode after normalizing it.
    ///
    /// # Errors
    /// `ProductError::InvalidBarcode` if `raw` is not an EAN/UPC-like code.
    pub fn set_barcode(&mut self, raw: &str) -> Result<(), ProductError> {
        let barcode =
            normalize_barcode(raw).ok_or_else(|| ProductError::InvalidBarcode(raw.to_owned()))?;
        self.barcode = Some(barcode);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Adds a tag, lowercased; returns whether it was new.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let added = self.tags.insert(tag.trim().to_lowercase());
        if added {
            self.updated_at = Utc::now();
        }
        added
    }

    /// # Errors
    /// `ProductError::InvalidNutrient` for negative or non-finite values.
    pub fn set_nutrition(&mut self, nutrition: Option<Nutrition>) -> Result<(), ProductError> {
        if let Some(n) = &nutrition {
            n.check()?;
        }
        self.nutrition = nutrition;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Strip separators from a barcode. Returns `None` unless 8 to 14 digits remain.
#[must_use]
pub fn normalize_barcode(raw: &str) -> Option<String> {
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .collect();
    let valid = (8..=14).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit());
    valid.then_some(digits)
}
