use anyhow::{Context, Result};
use food_server::{
    fields::{Nutrient, pick_display_value, pick_image},
    record::{FOOD_ID, Record, id_key, strip_internal},
};

use crate::models::Dump;

pub async fn read_source(source: &str) -> Result<String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let response = reqwest::get(source).await?.error_for_status()?;

        return Ok(response.text().await?);
    }

    tokio::fs::read_to_string(source)
        .await
        .with_context(|| format!("Failed to read {source}"))
}

pub fn parse_dump(text: &str) -> Result<Vec<Record>> {
    let dump: Dump = serde_json::from_str(text).context("Dump is not a list of foods")?;

    Ok(dump.into_records())
}

/// Drops the store identity a previous export may carry. `None` when the
/// record has no usable id.
pub fn prepare(record: Record) -> Option<Record> {
    record.get(FOOD_ID).and_then(id_key)?;

    Some(strip_internal(record))
}

pub fn missing_calories(record: &Record) -> bool {
    pick_display_value(record, Nutrient::Calories).is_none()
}

pub fn missing_image(record: &Record) -> bool {
    pick_image(record).is_none()
}
