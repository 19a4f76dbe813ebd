//! # Document Store
//!
//! Boundary to whatever holds the food collection. Implementations evaluate a
//! [`Predicate`] against their documents and report affected counts on writes.
//!
//! ## Ordering
//! - Natural order is insertion order, tracked by the store-managed `_id`.
//! - The preference order lists records with non-empty `materials` first and
//!   keeps natural order inside each group, so repeated requests page the same
//!   way.
//!
//! [`MemoryStore`] keeps everything in process and backs the tests. The Redis
//! backed store lives in [`crate::database`].
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{
    error::StoreError,
    query::Predicate,
    record::{FOOD_ID, INTERNAL_ID, Record, has_materials, ids_equal},
};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(&self, id: &Value) -> Result<Option<Record>, StoreError>;

    /// Matching records in natural order.
    async fn find(
        &self,
        filter: &Predicate,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Record>, StoreError>;

    async fn count(&self, filter: &Predicate) -> Result<u64, StoreError>;

    /// Matching records, materials-bearing ones first.
    async fn aggregate_with_preference(
        &self,
        filter: &Predicate,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Record>, StoreError>;

    /// One page in `ordering` together with the number of matching records,
    /// both taken from the same read of the collection where the store can.
    async fn find_page(
        &self,
        filter: &Predicate,
        ordering: Ordering,
        skip: u64,
        limit: u64,
    ) -> Result<(Vec<Record>, u64), StoreError> {
        let total = self.count(filter).await?;

        let records = match ordering {
            Ordering::Natural => self.find(filter, skip, limit).await?,
            Ordering::PreferMaterials => {
                self.aggregate_with_preference(filter, skip, limit).await?
            }
        };

        Ok((records, total))
    }

    /// Every value held by `field` across the collection, arrays flattened.
    async fn distinct(&self, field: &str) -> Result<Vec<Value>, StoreError>;

    /// Merges `fields` into the record. Returns the number of records matched.
    async fn update_one(&self, id: &Value, fields: Record) -> Result<u64, StoreError>;

    async fn delete_one(&self, id: &Value) -> Result<u64, StoreError>;

    async fn delete_many(&self, ids: &[Value]) -> Result<u64, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering {
    Natural,
    PreferMaterials,
}

/// Filters `records` (given in natural order), orders them and cuts the page.
pub(crate) fn select(
    records: impl IntoIterator<Item = Record>,
    filter: &Predicate,
    ordering: Ordering,
    skip: u64,
    limit: u64,
) -> Vec<Record> {
    select_with_total(records, filter, ordering, skip, limit).0
}

/// [`select`], also returning how many records matched before the cut.
pub(crate) fn select_with_total(
    records: impl IntoIterator<Item = Record>,
    filter: &Predicate,
    ordering: Ordering,
    skip: u64,
    limit: u64,
) -> (Vec<Record>, u64) {
    let mut matched: Vec<Record> = records
        .into_iter()
        .filter(|record| filter.matches(record))
        .collect();

    if ordering == Ordering::PreferMaterials {
        // stable, natural order survives inside each group
        matched.sort_by_key(|record| !has_materials(record));
    }

    let total = matched.len() as u64;
    let page = matched
        .into_iter()
        .skip(usize::try_from(skip).unwrap_or(usize::MAX))
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .collect();

    (page, total)
}

pub(crate) fn distinct_values<'a>(
    records: impl IntoIterator<Item = &'a Record>,
    field: &str,
) -> Vec<Value> {
    let mut seen: Vec<Value> = Vec::new();

    for value in records.into_iter().filter_map(|record| record.get(field)) {
        let candidates = match value {
            Value::Array(items) => items.as_slice(),
            other => std::slice::from_ref(other),
        };

        for candidate in candidates {
            if !seen.contains(candidate) {
                seen.push(candidate.clone());
            }
        }
    }

    seen
}

/// Applies a partial update, leaving store-managed identity alone.
pub(crate) fn merge(record: &mut Record, fields: Record) {
    for (key, value) in fields {
        if key == INTERNAL_ID {
            continue;
        }

        record.insert(key, value);
    }
}

fn same_id(record: &Record, id: &Value) -> bool {
    record
        .get(FOOD_ID)
        .is_some_and(|candidate| ids_equal(candidate, id))
}

/// In-process collection, natural order is the order of the vector.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<Record>>,
}

impl MemoryStore {
    pub fn new(records: impl IntoIterator<Item = Record>) -> Self {
        let records = records
            .into_iter()
            .enumerate()
            .map(|(seq, mut record)| {
                record
                    .entry(INTERNAL_ID)
                    .or_insert_with(|| Value::from(seq as u64 + 1));
                record
            })
            .collect();

        Self {
            records: RwLock::new(records),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(&self, id: &Value) -> Result<Option<Record>, StoreError> {
        let records = self.records.read().await;

        Ok(records.iter().find(|record| same_id(record, id)).cloned())
    }

    async fn find(
        &self,
        filter: &Predicate,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Record>, StoreError> {
        let records = self.records.read().await.clone();

        Ok(select(records, filter, Ordering::Natural, skip, limit))
    }

    async fn count(&self, filter: &Predicate) -> Result<u64, StoreError> {
        let records = self.records.read().await;

        Ok(records.iter().filter(|record| filter.matches(record)).count() as u64)
    }

    async fn aggregate_with_preference(
        &self,
        filter: &Predicate,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Record>, StoreError> {
        let records = self.records.read().await.clone();

        Ok(select(records, filter, Ordering::PreferMaterials, skip, limit))
    }

    async fn find_page(
        &self,
        filter: &Predicate,
        ordering: Ordering,
        skip: u64,
        limit: u64,
    ) -> Result<(Vec<Record>, u64), StoreError> {
        let records = self.records.read().await.clone();

        Ok(select_with_total(records, filter, ordering, skip, limit))
    }

    async fn distinct(&self, field: &str) -> Result<Vec<Value>, StoreError> {
        let records = self.records.read().await;

        Ok(distinct_values(records.iter(), field))
    }

    async fn update_one(&self, id: &Value, fields: Record) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;

        match records.iter_mut().find(|record| same_id(record, id)) {
            Some(record) => {
                merge(record, fields);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_one(&self, id: &Value) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;

        match records.iter().position(|record| same_id(record, id)) {
            Some(index) => {
                records.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, ids: &[Value]) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();

        records.retain(|record| !ids.iter().any(|id| same_id(record, id)));

        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::query::build_category_predicate;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    fn ids(records: &[Record]) -> Vec<Value> {
        records
            .iter()
            .filter_map(|record| record.get(FOOD_ID).cloned())
            .collect()
    }

    fn store() -> MemoryStore {
        MemoryStore::new([
            record(json!({"id": 1, "categories": ["a"]})),
            record(json!({"id": 2, "categories": ["b"], "materials": ["x"]})),
            record(json!({"id": "003", "categories": ["a", "b"], "materials": []})),
            record(json!({"id": 4, "categories": "a", "materials": ["y"]})),
        ])
    }

    #[test]
    fn test_select_prefers_materials_stably() {
        let records = vec![
            record(json!({"id": 1})),
            record(json!({"id": 2, "materials": ["x"]})),
            record(json!({"id": 3})),
            record(json!({"id": 4, "materials": ["y"]})),
        ];

        let ordered = select(records, &Predicate::All, Ordering::PreferMaterials, 0, 10);

        assert_eq!(ids(&ordered), vec![json!(2), json!(4), json!(1), json!(3)]);
    }

    #[test]
    fn test_select_skip_limit() {
        let records = (1..=5).map(|id| record(json!({"id": id})));

        let page = select(records, &Predicate::All, Ordering::Natural, 3, 10);

        assert_eq!(ids(&page), vec![json!(4), json!(5)]);
    }

    #[test]
    fn test_select_with_total_counts_before_the_cut() {
        let records = (1..=5).map(|id| record(json!({"id": id, "materials": [id]})));

        let (page, total) = select_with_total(records, &Predicate::All, Ordering::Natural, 4, 2);

        assert_eq!(ids(&page), vec![json!(5)]);
        assert_eq!(total, 5);
    }

    #[tokio::test]
    async fn test_memory_store_find_page() {
        let store = store();
        let filter = build_category_predicate("a");

        let (page, total) = store
            .find_page(&filter, Ordering::PreferMaterials, 1, 1)
            .await
            .unwrap();

        assert_eq!(ids(&page), vec![json!(1)]);
        assert_eq!(total, 3);

        let (beyond, total) = store
            .find_page(&filter, Ordering::Natural, 10, 5)
            .await
            .unwrap();

        assert!(beyond.is_empty());
        assert_eq!(total, 3);
    }

    #[test]
    fn test_distinct_flattens_arrays() {
        let records = [
            record(json!({"categories": ["a", "b"]})),
            record(json!({"categories": "c"})),
            record(json!({"categories": ["b", null]})),
            record(json!({"name": "none"})),
        ];

        let values = distinct_values(records.iter(), "categories");

        assert_eq!(values, vec![json!("a"), json!("b"), json!("c"), Value::Null]);
    }

    #[test]
    fn test_merge_keeps_internal_id() {
        let mut food = record(json!({"_id": 1, "id": 7, "fat": 2}));

        merge(&mut food, record(json!({"_id": 99, "fat": 3, "tag": "new"})));

        assert_eq!(
            Value::Object(food),
            json!({"_id": 1, "id": 7, "fat": 3, "tag": "new"})
        );
    }

    #[tokio::test]
    async fn test_memory_store_reads() {
        let store = store();
        let filter = build_category_predicate("a");

        assert_eq!(store.count(&filter).await.unwrap(), 3);
        assert_eq!(
            ids(&store.find(&filter, 0, 10).await.unwrap()),
            vec![json!(1), json!("003"), json!(4)]
        );
        assert_eq!(
            ids(&store.aggregate_with_preference(&filter, 0, 10).await.unwrap()),
            vec![json!(4), json!(1), json!("003")]
        );
        assert!(store.find_one(&json!(3)).await.unwrap().is_none());
        assert!(store.find_one(&json!("003")).await.unwrap().is_some());
        assert!(store.find_one(&json!(2.0)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_memory_store_writes() {
        let store = store();

        assert_eq!(
            store
                .update_one(&json!(2), record(json!({"name": "Tea"})))
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .update_one(&json!(42), record(json!({"name": "Ghost"})))
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            store.find_one(&json!(2)).await.unwrap().unwrap().get("name"),
            Some(&json!("Tea"))
        );

        assert_eq!(store.delete_one(&json!(1)).await.unwrap(), 1);
        assert_eq!(store.delete_one(&json!(1)).await.unwrap(), 0);
        assert_eq!(
            store
                .delete_many(&[json!(2), json!(404), json!("003")])
                .await
                .unwrap(),
            2
        );
        assert_eq!(store.len().await, 1);
    }
}
