//! # Query Predicates
//!
//! Turns loosely typed search parameters into a predicate tree that any
//! [`DocumentStore`](crate::store::DocumentStore) can evaluate.
//!
//! ## Composition
//! - Free text: `name` or `code` contains the term (case-insensitive), or `id`
//!   equals the term when it reads as a number.
//! - Categories: comma separated list, the record must share at least one.
//! - Nutrient ranges: inclusive bounds tested against every alias field of the
//!   nutrient, any alias satisfying both bounds is a match.
//!
//! ## Untrusted input
//! Search terms are matched literally. Pattern metacharacters are escaped, so
//! `"(1+"` looks for those three characters instead of failing to compile.
//!
//! A range bound that is not a number makes the range unsatisfiable: the
//! request still succeeds but matches nothing.
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    fields::Nutrient,
    record::{FOOD_CATEGORIES, FOOD_CODE, FOOD_ID, FOOD_NAME, Record, ids_equal, to_number},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every record.
    All,
    /// Matches no record.
    Never,
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Contains {
        field: &'static str,
        pattern: TextPattern,
    },
    Equals {
        field: &'static str,
        value: Value,
    },
    In {
        field: &'static str,
        values: Vec<Value>,
    },
    Range {
        field: &'static str,
        min: Option<f64>,
        max: Option<f64>,
    },
}

/// Case-insensitive literal containment.
#[derive(Debug, Clone)]
pub struct TextPattern(Regex);

impl TextPattern {
    pub fn literal(term: &str) -> Option<Self> {
        RegexBuilder::new(&regex::escape(term))
            .case_insensitive(true)
            .build()
            .ok()
            .map(Self)
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.0.is_match(haystack)
    }
}

impl PartialEq for TextPattern {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

impl Predicate {
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Never => false,
            Predicate::And(parts) => parts.iter().all(|part| part.matches(record)),
            Predicate::Or(parts) => parts.iter().any(|part| part.matches(record)),
            Predicate::Contains { field, pattern } => any_element(record.get(*field), |value| {
                value.as_str().is_some_and(|text| pattern.is_match(text))
            }),
            Predicate::Equals { field, value } => {
                any_element(record.get(*field), |candidate| ids_equal(candidate, value))
            }
            Predicate::In { field, values } => any_element(record.get(*field), |candidate| {
                values.iter().any(|value| ids_equal(candidate, value))
            }),
            Predicate::Range { field, min, max } => any_element(record.get(*field), |value| {
                value.as_f64().is_some_and(|number| {
                    min.is_none_or(|min| number >= min) && max.is_none_or(|max| number <= max)
                })
            }),
        }
    }
}

// Array fields match when any of their elements does.
fn any_element(value: Option<&Value>, test: impl Fn(&Value) -> bool) -> bool {
    match value {
        None => false,
        Some(Value::Array(items)) => items.iter().any(test),
        Some(value) => test(value),
    }
}

pub fn build_search_predicate(term: &str) -> Predicate {
    if term.is_empty() {
        return Predicate::All;
    }

    let mut any = Vec::with_capacity(3);

    if let Some(pattern) = TextPattern::literal(term) {
        any.push(Predicate::Contains {
            field: FOOD_NAME,
            pattern: pattern.clone(),
        });
        any.push(Predicate::Contains {
            field: FOOD_CODE,
            pattern,
        });
    }

    if let Some(number) = parse_number(term) {
        any.push(Predicate::Equals {
            field: FOOD_ID,
            value: Value::Number(number),
        });
    }

    if any.is_empty() {
        Predicate::Never
    } else {
        Predicate::Or(any)
    }
}

pub fn build_category_predicate(category_csv: &str) -> Predicate {
    if category_csv.is_empty() {
        return Predicate::All;
    }

    let values = category_csv
        .split(',')
        .filter(|token| !token.is_empty())
        .map(|token| Value::String(token.to_string()))
        .collect();

    Predicate::In {
        field: FOOD_CATEGORIES,
        values,
    }
}

/// Range over every alias of `nutrient`. `None` when neither bound is given.
pub fn build_alias_range_predicate(
    nutrient: Nutrient,
    min: Option<&str>,
    max: Option<&str>,
) -> Option<Predicate> {
    let (min, max) = match (parse_bound(min), parse_bound(max)) {
        (Bound::Absent, Bound::Absent) => return None,
        (Bound::Invalid, _) | (_, Bound::Invalid) => return Some(Predicate::Never),
        (min, max) => (min.value(), max.value()),
    };

    let any = nutrient
        .aliases()
        .iter()
        .map(|&field| Predicate::Range { field, min, max })
        .collect();

    Some(Predicate::Or(any))
}

/// Conjunction of `parts`, or [`Predicate::All`] when nothing constrains.
pub fn compose_predicate(parts: impl IntoIterator<Item = Predicate>) -> Predicate {
    let mut all: Vec<Predicate> = parts
        .into_iter()
        .filter(|part| *part != Predicate::All)
        .collect();

    match all.len() {
        0 => Predicate::All,
        1 => all.pop().unwrap_or(Predicate::All),
        _ => Predicate::And(all),
    }
}

#[derive(Debug, Clone, Copy)]
enum Bound {
    Absent,
    Value(f64),
    Invalid,
}

impl Bound {
    fn value(self) -> Option<f64> {
        match self {
            Bound::Value(value) => Some(value),
            Bound::Absent | Bound::Invalid => None,
        }
    }
}

fn parse_bound(raw: Option<&str>) -> Bound {
    match raw {
        None | Some("") => Bound::Absent,
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(value) if !value.is_nan() => Bound::Value(value),
            _ => Bound::Invalid,
        },
    }
}

fn parse_number(term: &str) -> Option<serde_json::Number> {
    let trimmed = term.trim();

    if trimmed.is_empty() {
        return None;
    }

    trimmed.parse::<f64>().ok().and_then(to_number)
}

/// Raw `/foods` query string. Everything arrives as text and is interpreted
/// leniently.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub prefer_materials: Option<String>,
    pub min_calory: Option<String>,
    pub max_calory: Option<String>,
    pub min_protein: Option<String>,
    pub max_protein: Option<String>,
    pub min_fat: Option<String>,
    pub max_fat: Option<String>,
    pub min_carb: Option<String>,
    pub max_carb: Option<String>,
}

impl FoodQuery {
    /// Reads raw query pairs. A repeated parameter keeps its first value.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut params = Record::new();
        for (key, value) in pairs {
            params.entry(key).or_insert(Value::String(value));
        }

        serde_json::from_value(Value::Object(params)).unwrap_or_default()
    }

    pub fn range(&self, nutrient: Nutrient) -> (Option<&str>, Option<&str>) {
        let (min, max) = match nutrient {
            Nutrient::Calories => (&self.min_calory, &self.max_calory),
            Nutrient::Protein => (&self.min_protein, &self.max_protein),
            Nutrient::Fat => (&self.min_fat, &self.max_fat),
            Nutrient::Carbohydrate => (&self.min_carb, &self.max_carb),
        };

        (min.as_deref(), max.as_deref())
    }

    pub fn predicate(&self) -> Predicate {
        let search = build_search_predicate(self.search.as_deref().unwrap_or_default());
        let category = build_category_predicate(self.category.as_deref().unwrap_or_default());
        let ranges = Nutrient::ALL.into_iter().filter_map(|nutrient| {
            let (min, max) = self.range(nutrient);
            build_alias_range_predicate(nutrient, min, max)
        });

        compose_predicate([search, category].into_iter().chain(ranges))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    fn calories(min: &str, max: &str) -> Predicate {
        build_alias_range_predicate(Nutrient::Calories, Some(min), Some(max))
            .unwrap_or(Predicate::All)
    }

    #[test]
    fn test_empty_search_is_noop() {
        assert_eq!(build_search_predicate(""), Predicate::All);
    }

    #[test]
    fn test_search_matches_text_or_id() {
        let predicate = build_search_predicate("7");

        assert!(predicate.matches(&record(json!({"id": 7, "name": "Rice"}))));
        assert!(predicate.matches(&record(json!({"id": 1, "name": "7-Eleven Snack"}))));
        assert!(predicate.matches(&record(json!({"id": 2, "code": "X70"}))));
        assert!(!predicate.matches(&record(json!({"id": 8, "name": "Bread"}))));
    }

    #[test]
    fn test_search_is_case_insensitive_containment() {
        let predicate = build_search_predicate("rIcE");

        assert!(predicate.matches(&record(json!({"name": "Fried Rice Bowl"}))));
        assert!(!predicate.matches(&record(json!({"name": "Noodles"}))));
    }

    #[test]
    fn test_search_text_does_not_match_numeric_id() {
        let predicate = build_search_predicate("abc");

        assert!(!predicate.matches(&record(json!({"id": 7}))));
        assert!(matches!(predicate, Predicate::Or(ref parts) if parts.len() == 2));
    }

    #[test]
    fn test_search_metacharacters_are_literal() {
        let predicate = build_search_predicate("(1+");

        assert!(predicate.matches(&record(json!({"name": "combo (1+1)"}))));
        assert!(!predicate.matches(&record(json!({"name": "combo 11"}))));

        let wildcard = build_search_predicate(".*");
        assert!(!wildcard.matches(&record(json!({"name": "anything"}))));
        assert!(wildcard.matches(&record(json!({"name": "a.*b"}))));
    }

    #[test]
    fn test_search_ignores_non_string_fields() {
        let predicate = build_search_predicate("12");

        assert!(!predicate.matches(&record(json!({"id": 3, "code": 12}))));
        assert!(predicate.matches(&record(json!({"id": 12.0}))));
    }

    #[test]
    fn test_category_membership() {
        let predicate = build_category_predicate("a,b");

        assert!(predicate.matches(&record(json!({"categories": ["b", "c"]}))));
        assert!(!predicate.matches(&record(json!({"categories": ["c", "d"]}))));
        assert!(!predicate.matches(&record(json!({"name": "uncategorized"}))));
    }

    #[test]
    fn test_category_drops_empty_tokens() {
        assert_eq!(build_category_predicate(""), Predicate::All);
        assert_eq!(
            build_category_predicate(",a,,"),
            Predicate::In {
                field: FOOD_CATEGORIES,
                values: vec![json!("a")],
            }
        );
    }

    #[test]
    fn test_alias_range_any_alias() {
        let predicate = calories("100", "200");

        assert!(predicate.matches(&record(json!({"energy": 150}))));
        assert!(predicate.matches(&record(json!({"calorie": 100}))));
        assert!(predicate.matches(&record(json!({"calory": 200}))));
        assert!(!predicate.matches(&record(json!({"calory": 99}))));
        assert!(!predicate.matches(&record(json!({"energy": 201}))));
        assert!(predicate.matches(&record(json!({"calory": 99, "energy": 150}))));
    }

    #[test]
    fn test_alias_range_open_bounds() {
        let floor = build_alias_range_predicate(Nutrient::Protein, Some("10"), None);
        let ceiling = build_alias_range_predicate(Nutrient::Fat, Some(""), Some("5"));

        let floor = floor.unwrap_or(Predicate::Never);
        let ceiling = ceiling.unwrap_or(Predicate::Never);

        assert!(floor.matches(&record(json!({"protein": 1000}))));
        assert!(!floor.matches(&record(json!({"protein": 9.5}))));
        assert!(ceiling.matches(&record(json!({"fat": -1}))));
        assert!(!ceiling.matches(&record(json!({"fat": 5.01}))));
    }

    #[test]
    fn test_alias_range_absent_is_omitted() {
        assert_eq!(
            build_alias_range_predicate(Nutrient::Carbohydrate, None, None),
            None
        );
        assert_eq!(
            build_alias_range_predicate(Nutrient::Carbohydrate, Some(""), Some("")),
            None
        );
    }

    #[test]
    fn test_alias_range_invalid_bound_matches_nothing() {
        let predicate = build_alias_range_predicate(Nutrient::Calories, Some("abc"), Some("200"));

        assert_eq!(predicate, Some(Predicate::Never));
        assert_eq!(
            build_alias_range_predicate(Nutrient::Fat, None, Some("NaN")),
            Some(Predicate::Never)
        );
    }

    #[test]
    fn test_range_only_compares_numbers() {
        let predicate = calories("100", "200");

        assert!(!predicate.matches(&record(json!({"energy": "150"}))));
        assert!(!predicate.matches(&record(json!({"energy": null}))));
        assert!(predicate.matches(&record(json!({"energy": [50, 150]}))));
    }

    #[test]
    fn test_compose() {
        assert_eq!(compose_predicate(Vec::new()), Predicate::All);
        assert_eq!(
            compose_predicate([Predicate::All, Predicate::Never]),
            Predicate::Never
        );

        let both = compose_predicate([build_category_predicate("a"), calories("0", "10")]);
        assert!(both.matches(&record(json!({"categories": ["a"], "carbs": 3, "energy": 5}))));
        assert!(!both.matches(&record(json!({"categories": ["a"], "energy": 50}))));
        assert!(!both.matches(&record(json!({"categories": ["b"], "energy": 5}))));
    }

    #[test]
    fn test_food_query_predicate() {
        let query = FoodQuery {
            search: Some("soup".to_string()),
            category: Some("lunch".to_string()),
            min_carb: Some("10".to_string()),
            ..Default::default()
        };
        let predicate = query.predicate();

        assert!(predicate.matches(&record(json!({
            "name": "Tomato Soup",
            "categories": ["lunch"],
            "carbs": 12
        }))));
        assert!(!predicate.matches(&record(json!({
            "name": "Tomato Soup",
            "categories": ["lunch"],
            "carbs": 8
        }))));
        assert_eq!(FoodQuery::default().predicate(), Predicate::All);
    }

    #[test]
    fn test_first_repeated_parameter_wins() {
        let pairs = [
            ("page", "2"),
            ("pageSize", "5"),
            ("page", "9"),
            ("minCalory", "100"),
            ("unknown", "x"),
        ]
        .map(|(key, value)| (key.to_string(), value.to_string()));

        let query = FoodQuery::from_pairs(pairs);

        assert_eq!(query.page.as_deref(), Some("2"));
        assert_eq!(query.page_size.as_deref(), Some("5"));
        assert_eq!(query.range(Nutrient::Calories), (Some("100"), None));
        assert_eq!(query.search, None);
    }
}
