//! # Field Aliases
//!
//! Nutrient values were imported from several sources over time and the same
//! concept lives under different field names depending on the record.
//!
//! | Concept | Fields, in lookup order |
//! |---|---|
//! | calories | `calory`, `calorie`, `energy` |
//! | protein | `protein` |
//! | fat | `fat` |
//! | carbohydrate | `carbohydrate`, `carb`, `carbs` |
use serde_json::Value;

use crate::record::{FOOD_CATEGORIES, FOOD_CODE, FOOD_ID, FOOD_NAME, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nutrient {
    Calories,
    Protein,
    Fat,
    Carbohydrate,
}

impl Nutrient {
    pub const ALL: [Nutrient; 4] = [
        Nutrient::Calories,
        Nutrient::Protein,
        Nutrient::Fat,
        Nutrient::Carbohydrate,
    ];

    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            Nutrient::Calories => &["calory", "calorie", "energy"],
            Nutrient::Protein => &["protein"],
            Nutrient::Fat => &["fat"],
            Nutrient::Carbohydrate => &["carbohydrate", "carb", "carbs"],
        }
    }
}

pub const IMAGE_FIELDS: [&str; 3] = ["thumb_image_url", "image_url", "image"];

/// Fields returned for every item of a list response.
pub const LIST_PROJECTION: [&str; 15] = [
    FOOD_ID,
    FOOD_NAME,
    FOOD_CODE,
    "thumb_image_url",
    "image_url",
    "image",
    "calory",
    "calorie",
    "energy",
    "protein",
    "fat",
    "carbohydrate",
    "carb",
    "carbs",
    FOOD_CATEGORIES,
];

/// First alias of `nutrient` holding a displayable value, or `None`.
pub fn pick_display_value(record: &Record, nutrient: Nutrient) -> Option<&Value> {
    first_present(record, nutrient.aliases())
}

/// Preferred image reference for a record: thumbnail, then full image.
pub fn pick_image(record: &Record) -> Option<&Value> {
    first_present(record, &IMAGE_FIELDS)
}

fn first_present<'a>(record: &'a Record, fields: &[&str]) -> Option<&'a Value> {
    fields
        .iter()
        .filter_map(|field| record.get(*field))
        .find(|value| !is_blank(value))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}
