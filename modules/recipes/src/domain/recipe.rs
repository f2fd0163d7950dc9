//! The `Recipe` aggregate and its value objects.
//!
//! Derived values (rating averages, macro division) are computed lazily and
//! cached inside the aggregate. Every mutating method drops the cache, so a read
//! after a write always reflects the new state.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::RecipeError;

/// Highest score a rating axis accepts.
pub const MAX_SCORE: u8 = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    Public,
    #[default]
    Private,
}

impl Privacy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Privacy::Public => "public",
            Privacy::Private => "private",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Privacy::Public),
            "private" => Some(Privacy::Private),
            _ => None,
        }
    }
}

impl fmt::Display for Privacy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorised tag. Both parts are stored trimmed and lowercased.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    category: String,
    name: String,
}

impl Tag {
    #[must_use]
    pub fn new(category: &str, name: &str) -> Self {
        Self {
            category: category.trim().to_lowercase(),
            name: name.trim().to_lowercase(),
        }
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    /// Product this ingredient was picked from, if any.
    pub product_id: Option<Uuid>,
}

impl Ingredient {
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            quantity: None,
            unit: None,
            product_id: None,
        }
    }
}

/// One user's rating; a recipe holds at most one per user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: Uuid,
    pub taste: u8,
    pub convenience: u8,
    pub comment: Option<String>,
}

/// Nutrition facts per serving, in kcal and grams.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NutriFacts {
    pub calories: f64,
    pub protein: f64,
    pub carbohydrate: f64,
    pub total_fat: f64,
}

/// Share of each macronutrient in the total macronutrient mass, in percent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MacroDivision {
    pub carbohydrate: f64,
    pub protein: f64,
    pub total_fat: f64,
}

/// Every field of a recipe, used to create or rehydrate one.
#[derive(Clone, Debug, PartialEq)]
pub struct RecipeParts {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub instructions: String,
    pub total_time: Option<i64>,
    pub privacy: Privacy,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: BTreeSet<Tag>,
    pub ingredients: Vec<Ingredient>,
    pub ratings: Vec<Rating>,
    pub nutri_facts: Option<NutriFacts>,
    pub version: i64,
}

/// Partial update of the plain properties. `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecipePatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub instructions: Option<String>,
    pub total_time: Option<Option<i64>>,
    pub privacy: Option<Privacy>,
    pub tags: Option<BTreeSet<Tag>>,
    pub ingredients: Option<Vec<Ingredient>>,
    pub nutri_facts: Option<Option<NutriFacts>>,
}

#[derive(Clone, Debug, Default)]
struct Derived {
    taste: OnceLock<Option<f64>>,
    convenience: OnceLock<Option<f64>>,
    macros: OnceLock<Option<MacroDivision>>,
}

#[derive(Clone, Debug)]
pub struct Recipe {
    id: Uuid,
    author_id: Uuid,
    name: String,
    description: Option<String>,
    instructions: String,
    total_time: Option<i64>,
    privacy: Privacy,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    tags: BTreeSet<Tag>,
    ingredients: Vec<Ingredient>,
    ratings: Vec<Rating>,
    nutri_facts: Option<NutriFacts>,
    version: i64,
    derived: Derived,
}

impl Recipe {
    /// New private recipe with a fresh id, version 1.
    ///
    /// # Errors
    /// `RecipeError::EmptyName` for a blank name.
    pub fn create(author_id: Uuid, name: &str, instructions: &str) -> Result<Self, RecipeError> {
        let now = Utc::now();
        Self::from_parts(RecipeParts {
            id: Uuid::new_v4(),
            author_id,
            name: name.to_owned(),
            description: None,
            instructions: instructions.to_owned(),
            total_time: None,
            privacy: Privacy::default(),
            created_at: now,
            updated_at: now,
            tags: BTreeSet::new(),
            ingredients: Vec::new(),
            ratings: Vec::new(),
            nutri_facts: None,
            version: 1,
        })
    }

    /// Build a recipe from all of its fields, checking the aggregate invariants.
    ///
    /// # Errors
    /// `RecipeError` if a name, time or rating is out of range or a user rated twice.
    pub fn from_parts(parts: RecipeParts) -> Result<Self, RecipeError> {
        check_name(&parts.name)?;
        check_total_time(parts.total_time)?;
        let mut ratings = parts.ratings;
        for r in &ratings {
            check_rating(r)?;
        }
        ratings.sort_by_key(|r| r.user_id);
        if let Some(w) = ratings.windows(2).find(|w| w[0].user_id == w[1].user_id) {
            return Err(RecipeError::DuplicateRating {
                user_id: w[0].user_id,
            });
        }
        Ok(Self {
            id: parts.id,
            author_id: parts.author_id,
            name: parts.name,
            description: parts.description,
            instructions: parts.instructions,
            total_time: parts.total_time,
            privacy: parts.privacy,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
            tags: parts.tags,
            ingredients: parts.ingredients,
            ratings,
            nutri_facts: parts.nutri_facts,
            version: parts.version,
            derived: Derived::default(),
        })
    }

    #[must_use]
    pub fn into_parts(self) -> RecipeParts {
        RecipeParts {
            id: self.id,
            author_id: self.author_id,
            name: self.name,
            description: self.description,
            instructions: self.instructions,
            total_time: self.total_time,
            privacy: self.privacy,
            created_at: self.created_at,
            updated_at: self.updated_at,
            tags: self.tags,
            ingredients: self.ingredients,
            ratings: self.ratings,
            nutri_facts: self.nutri_facts,
            version: self.version,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn author_id(&self) -> Uuid {
        self.author_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Total preparation time in minutes.
    #[must_use]
    pub fn total_time(&self) -> Option<i64> {
        self.total_time
    }

    #[must_use]
    pub fn privacy(&self) -> Privacy {
        self.privacy
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    #[must_use]
    pub fn tags(&self) -> &BTreeSet<Tag> {
        &self.tags
    }

    #[must_use]
    pub fn ingredients(&self) -> &[Ingredient] {
        &self.ingredients
    }

    /// Ratings ordered by user id.
    #[must_use]
    pub fn ratings(&self) -> &[Rating] {
        &self.ratings
    }

    #[must_use]
    pub fn nutri_facts(&self) -> Option<&NutriFacts> {
        self.nutri_facts.as_ref()
    }

    /// Version loaded from storage; compared on update.
    #[must_use]
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Record the version returned by a successful update.
    pub fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    /* ---------- derived ---------- */

    #[must_use]
    pub fn average_taste_rating(&self) -> Option<f64> {
        *self
            .derived
            .taste
            .get_or_init(|| average(self.ratings.iter().map(|r| r.taste)))
    }

    #[must_use]
    pub fn average_convenience_rating(&self) -> Option<f64> {
        *self
            .derived
            .convenience
            .get_or_init(|| average(self.ratings.iter().map(|r| r.convenience)))
    }

    /// `None` without nutrition facts or when no macronutrient mass is recorded.
    #[must_use]
    pub fn macro_division(&self) -> Option<MacroDivision> {
        *self
            .derived
            .macros
            .get_or_init(|| self.nutri_facts.as_ref().and_then(macro_division))
    }

    /* ---------- mutations ---------- */

    /// Apply a partial update and touch `updated_at`.
    ///
    /// # Errors
    /// `RecipeError` if the patched name or time is invalid; nothing is changed then.
    pub fn update_properties(&mut self, patch: RecipePatch) -> Result<(), RecipeError> {
        if let Some(name) = &patch.name {
            check_name(name)?;
        }
        if let Some(total_time) = patch.total_time {
            check_total_time(total_time)?;
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(instructions) = patch.instructions {
            self.instructions = instructions;
        }
        if let Some(total_time) = patch.total_time {
            self.total_time = total_time;
        }
        if let Some(privacy) = patch.privacy {
            self.privacy = privacy;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(ingredients) = patch.ingredients {
            self.ingredients = ingredients;
        }
        if let Some(nutri_facts) = patch.nutri_facts {
            self.nutri_facts = nutri_facts;
        }
        self.touch();
        Ok(())
    }

    /// Add or replace the rating of `rating.user_id`.
    ///
    /// # Errors
    /// `RecipeError::InvalidRating` if a score exceeds [`MAX_SCORE`].
    pub fn rate(&mut self, rating: Rating) -> Result<(), RecipeError> {
        check_rating(&rating)?;
        match self
            .ratings
            .binary_search_by_key(&rating.user_id, |r| r.user_id)
        {
            Ok(i) => self.ratings[i] = rating,
            Err(i) => self.ratings.insert(i, rating),
        }
        self.touch();
        Ok(())
    }

    /// Remove the rating of `user_id`; returns whether one existed.
    pub fn delete_rating(&mut self, user_id: Uuid) -> bool {
        let before = self.ratings.len();
        self.ratings.retain(|r| r.user_id != user_id);
        let removed = self.ratings.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    pub fn add_tag(&mut self, tag: Tag) {
        if self.tags.insert(tag) {
            self.touch();
        }
    }

    pub fn remove_tag(&mut self, tag: &Tag) -> bool {
        let removed = self.tags.remove(tag);
        if removed {
            self.touch();
        }
        removed
    }

    pub fn set_nutri_facts(&mut self, nutri_facts: Option<NutriFacts>) {
        self.nutri_facts = nutri_facts;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.derived = Derived::default();
    }
}

// The derived cache is not part of the recipe's identity.
impl PartialEq for Recipe {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.author_id == other.author_id
            && self.name == other.name
            && self.description == other.description
            && self.instructions == other.instructions
            && self.total_time == other.total_time
            && self.privacy == other.privacy
            && self.created_at == other.created_at
            && self.updated_at == other.updated_at
            && self.tags == other.tags
            && self.ingredients == other.ingredients
            && self.ratings == other.ratings
            && self.nutri_facts == other.nutri_facts
            && self.version == other.version
    }
}

fn check_name(name: &str) -> Result<(), RecipeError> {
    if name.trim().is_empty() {
        return Err(RecipeError::EmptyName);
    }
    Ok(())
}

fn check_total_time(total_time: Option<i64>) -> Result<(), RecipeError> {
    match total_time {
        Some(t) if t < 0 => Err(RecipeError::NegativeTotalTime(t)),
        _ => Ok(()),
    }
}

fn check_rating(r: &Rating) -> Result<(), RecipeError> {
    for (axis, score) in [("taste", r.taste), ("convenience", r.convenience)] {
        if score > MAX_SCORE {
            return Err(RecipeError::InvalidRating { axis, score });
        }
    }
    Ok(())
}

fn average(scores: impl ExactSizeIterator<Item = u8>) -> Option<f64> {
    let n = scores.len();
    if n == 0 {
        return None;
    }
    let sum: u32 = scores.map(u32::from).sum();
    #[allow(clippy::cast_precision_loss)]
    Some(f64::from(sum) / n as f64)
}

fn macro_division(facts: &NutriFacts) -> Option<MacroDivision> {
    let total = facts.carbohydrate + facts.protein + facts.total_fat;
    if total <= 0.0 {
        return None;
    }
    Some(MacroDivision {
        carbohydrate: facts.carbohydrate / total * 100.0,
        protein: facts.protein / total * 100.0,
        total_fat: facts.total_fat / total * 100.0,
    })
}
