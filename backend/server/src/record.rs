//! # Records
//!
//! Food records are open-ended documents. Historical imports disagree on field
//! names and on whether `id` is a number or a string, so a record is kept as an
//! ordered map of field name to JSON value and passed through untouched.
use serde_json::{Map, Number, Value};

pub type Record = Map<String, Value>;

pub const FOOD_ID: &str = "id";
pub const FOOD_NAME: &str = "name";
pub const FOOD_CODE: &str = "code";
pub const FOOD_CATEGORIES: &str = "categories";
pub const FOOD_MATERIALS: &str = "materials";

/// Identity managed by the store itself, never exposed or written by callers.
pub const INTERNAL_ID: &str = "_id";

/// Canonicalizes an identifier into the representation used when it was stored.
///
/// Strings that survive a numeric round trip unchanged (`"42"`) become numbers.
/// Anything else (`"007"`, `"4.50"`, `"abc"`) is kept as is, as are values that
/// are already numbers and `null`.
pub fn normalize_id(raw: Value) -> Value {
    match raw {
        Value::String(text) => match numeric_id(&text) {
            Some(number) => Value::Number(number),
            None => Value::String(text),
        },
        other => other,
    }
}

/// Same as [`normalize_id`] for identifiers taken from a URL path.
pub fn normalize_path_id(raw: &str) -> Value {
    normalize_id(Value::String(raw.to_string()))
}

fn numeric_id(text: &str) -> Option<Number> {
    let parsed: f64 = text.trim().parse().ok()?;
    let number = to_number(parsed)?;

    (format_number(&number) == text).then_some(number)
}

pub(crate) fn to_number(value: f64) -> Option<Number> {
    if !value.is_finite() {
        return None;
    }

    if value.fract() == 0.0 && value.abs() <= 9_007_199_254_740_992.0 {
        return Some(Number::from(value as i64));
    }

    Number::from_f64(value)
}

fn format_number(number: &Number) -> String {
    match number.as_i64() {
        Some(integer) => integer.to_string(),
        None => number
            .as_f64()
            .and_then(to_number)
            .map(|n| match n.as_i64() {
                Some(integer) => integer.to_string(),
                None => n.to_string(),
            })
            .unwrap_or_else(|| number.to_string()),
    }
}

/// Compares two identifiers the way the store does: numbers by value, so that
/// `42` and `42.0` are the same id, everything else structurally.
pub fn ids_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => match (l.as_f64(), r.as_f64()) {
            (Some(l), Some(r)) => l == r,
            _ => l == r,
        },
        _ => left == right,
    }
}

/// Key under which a record is stored. Numbers and strings live in separate
/// key spaces so `42` and `"042"` never collide.
pub fn id_key(id: &Value) -> Option<String> {
    match id {
        Value::Number(number) => Some(format!("n:{}", format_number(number))),
        Value::String(text) => Some(format!("s:{text}")),
        _ => None,
    }
}

/// Projects a record onto `fields`, keeping the record's own field order.
pub fn project(record: Record, fields: &[&str]) -> Record {
    record
        .into_iter()
        .filter(|(key, _)| fields.contains(&key.as_str()))
        .collect()
}

pub fn strip_internal(mut record: Record) -> Record {
    record.shift_remove(INTERNAL_ID);
    record
}

/// Whether the record carries a non-empty `materials` sequence.
pub fn has_materials(record: &Record) -> bool {
    matches!(record.get(FOOD_MATERIALS), Some(Value::Array(items)) if !items.is_empty())
}
