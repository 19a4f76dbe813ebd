use axum::body::Bytes;
use serde_json::Value;

use crate::{
    error::AppError::{self, MalformedPayload},
    record::{FOOD_ID, INTERNAL_ID, Record, normalize_id},
};

/// Fields of a partial update. The store identity and the record id are never
/// writable and are dropped.
pub fn get_fields_from_body(body: &Bytes) -> Result<Record, AppError> {
    let mut fields: Record = serde_json::from_slice(body).map_err(|_| MalformedPayload)?;

    fields.shift_remove(INTERNAL_ID);
    fields.shift_remove(FOOD_ID);

    Ok(fields)
}

/// Normalized ids of a bulk delete. A payload without an `ids` list deletes
/// nothing.
pub fn get_ids_from_body(body: &Bytes) -> Result<Vec<Value>, AppError> {
    let payload: Value = serde_json::from_slice(body).map_err(|_| MalformedPayload)?;

    let ids = match payload.get("ids") {
        Some(Value::Array(ids)) => ids.iter().cloned().map(normalize_id).collect(),
        _ => Vec::new(),
    };

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_fields_drop_identity() {
        let body = Bytes::from(r#"{"_id": 3, "id": 9, "name": "Tea", "fat": null}"#);

        let fields = get_fields_from_body(&body).unwrap();

        assert_eq!(Value::Object(fields), json!({"name": "Tea", "fat": null}));
    }

    #[test]
    fn test_fields_keep_payload_order() {
        let body = Bytes::from(r#"{"id": 7, "a": 1, "_id": 2, "b": 2, "c": 3}"#);

        let fields = get_fields_from_body(&body).unwrap();
        let keys: Vec<&str> = fields.keys().map(String::as_str).collect();

        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_fields_must_be_an_object() {
        assert!(matches!(
            get_fields_from_body(&Bytes::from("[1, 2]")),
            Err(MalformedPayload)
        ));
        assert!(matches!(
            get_fields_from_body(&Bytes::from("{oops")),
            Err(MalformedPayload)
        ));
    }

    #[test]
    fn test_ids_are_normalized() {
        let body = Bytes::from(r#"{"ids": ["42", "007", 5, null]}"#);

        assert_eq!(
            get_ids_from_body(&body).unwrap(),
            vec![json!(42), json!("007"), json!(5), Value::Null]
        );
    }

    #[test]
    fn test_missing_ids_delete_nothing() {
        assert!(get_ids_from_body(&Bytes::from(r#"{"ids": "42"}"#)).unwrap().is_empty());
        assert!(get_ids_from_body(&Bytes::from("{}")).unwrap().is_empty());
        assert!(get_ids_from_body(&Bytes::from("nope")).is_err());
    }
}
