//! # Redis
//!
//! Document storage for the food collection.
//!
//! ## Layout
//!
//! - `{db}:{collection}:docs`: hash of canonical id key to JSON document
//! - `{db}:{collection}:order`: sorted set of id keys scored by insertion sequence
//! - `{db}:{collection}:seq`: counter handing out the store-managed `_id`
//!
//! Id keys keep numeric and string ids apart (`n:42`, `s:007`), see
//! [`id_key`](crate::record::id_key).
//!
//! ## Queries
//!
//! - The collection is small (a few thousand foods), every query reads it in
//!   natural order and evaluates the predicate in process
//! - Nothing is cached between requests
//! - Partial updates merge in process and commit with a compare-and-set
//!   script. A document changed or deleted in between is re-read, or left
//!   deleted, so concurrent edits to different fields all land
use async_trait::async_trait;
use redis::{
    Client, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde_json::Value;
use tracing::debug;

use crate::{
    error::StoreError,
    query::Predicate,
    record::{FOOD_ID, INTERNAL_ID, Record, id_key},
    store::{DocumentStore, Ordering, distinct_values, merge, select, select_with_total},
};

const UPDATE_ATTEMPTS: usize = 32;

/// `HSET` only while the stored document still equals the one merged from.
/// Returns 0 when the document is gone, -1 when it changed in between.
const COMPARE_AND_SET: &str = r"
local current = redis.call('HGET', KEYS[1], ARGV[1])
if not current then
    return 0
end
if current ~= ARGV[2] then
    return -1
end
redis.call('HSET', KEYS[1], ARGV[1], ARGV[3])
return 1
";

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, StoreError> {
    let config = ConnectionManagerConfig::new().set_number_of_retries(1);

    let client = Client::open(redis_url)?;
    let connection_manager = client.get_connection_manager_with_config(config).await?;

    Ok(connection_manager)
}

#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    docs_key: String,
    order_key: String,
    seq_key: String,
    compare_and_set: Script,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager, namespace: &str) -> Self {
        Self {
            connection,
            docs_key: format!("{namespace}:docs"),
            order_key: format!("{namespace}:order"),
            seq_key: format!("{namespace}:seq"),
            compare_and_set: Script::new(COMPARE_AND_SET),
        }
    }

    /// Appends a record unless its id is already taken. Returns whether it was
    /// written.
    pub async fn insert(&self, mut record: Record) -> Result<bool, StoreError> {
        let Some(key) = record.get(FOOD_ID).and_then(id_key) else {
            return Ok(false);
        };

        let mut connection = self.connection.clone();

        let seq: u64 = redis::cmd("INCR")
            .arg(&self.seq_key)
            .query_async(&mut connection)
            .await?;
        record.insert(INTERNAL_ID.to_string(), Value::from(seq));

        let created: bool = redis::cmd("HSETNX")
            .arg(&self.docs_key)
            .arg(&key)
            .arg(serde_json::to_string(&record)?)
            .query_async(&mut connection)
            .await?;

        if created {
            let _: u64 = redis::cmd("ZADD")
                .arg(&self.order_key)
                .arg(seq)
                .arg(&key)
                .query_async(&mut connection)
                .await?;
        }

        Ok(created)
    }

    async fn load_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut connection = self.connection.clone();

        let doc: Option<String> = redis::cmd("HGET")
            .arg(&self.docs_key)
            .arg(key)
            .query_async(&mut connection)
            .await?;

        Ok(doc)
    }

    async fn load(&self, key: &str) -> Result<Option<Record>, StoreError> {
        self.load_raw(key)
            .await?
            .map(|doc| decode(&doc))
            .transpose()
    }

    async fn load_all(&self) -> Result<Vec<Record>, StoreError> {
        let mut connection = self.connection.clone();

        let keys: Vec<String> = redis::cmd("ZRANGE")
            .arg(&self.order_key)
            .arg(0)
            .arg(-1)
            .query_async(&mut connection)
            .await?;

        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let docs: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(&self.docs_key)
            .arg(&keys)
            .query_async(&mut connection)
            .await?;

        docs.into_iter().flatten().map(|doc| decode(&doc)).collect()
    }

    async fn delete_keys(&self, keys: Vec<String>) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut connection = self.connection.clone();

        let (deleted, _): (u64, u64) = redis::pipe()
            .atomic()
            .cmd("HDEL")
            .arg(&self.docs_key)
            .arg(&keys)
            .cmd("ZREM")
            .arg(&self.order_key)
            .arg(&keys)
            .query_async(&mut connection)
            .await?;

        Ok(deleted)
    }
}

fn decode(doc: &str) -> Result<Record, StoreError> {
    Ok(serde_json::from_str(doc)?)
}

/// Merges `fields` into a stored document and encodes the result.
fn merged(doc: &str, fields: &Record) -> Result<String, StoreError> {
    let mut record = decode(doc)?;
    merge(&mut record, fields.clone());

    Ok(serde_json::to_string(&record)?)
}

#[async_trait]
impl DocumentStore for RedisStore {
    async fn find_one(&self, id: &Value) -> Result<Option<Record>, StoreError> {
        match id_key(id) {
            Some(key) => self.load(&key).await,
            None => Ok(None),
        }
    }

    async fn find(
        &self,
        filter: &Predicate,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Record>, StoreError> {
        let records = self.load_all().await?;

        Ok(select(records, filter, Ordering::Natural, skip, limit))
    }

    async fn count(&self, filter: &Predicate) -> Result<u64, StoreError> {
        let records = self.load_all().await?;

        Ok(records.iter().filter(|record| filter.matches(record)).count() as u64)
    }

    async fn aggregate_with_preference(
        &self,
        filter: &Predicate,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Record>, StoreError> {
        let records = self.load_all().await?;

        Ok(select(records, filter, Ordering::PreferMaterials, skip, limit))
    }

    async fn find_page(
        &self,
        filter: &Predicate,
        ordering: Ordering,
        skip: u64,
        limit: u64,
    ) -> Result<(Vec<Record>, u64), StoreError> {
        let records = self.load_all().await?;

        Ok(select_with_total(records, filter, ordering, skip, limit))
    }

    async fn distinct(&self, field: &str) -> Result<Vec<Value>, StoreError> {
        let records = self.load_all().await?;

        Ok(distinct_values(records.iter(), field))
    }

    async fn update_one(&self, id: &Value, fields: Record) -> Result<u64, StoreError> {
        let Some(key) = id_key(id) else {
            return Ok(0);
        };

        let mut connection = self.connection.clone();

        for _ in 0..UPDATE_ATTEMPTS {
            let Some(current) = self.load_raw(&key).await? else {
                return Ok(0);
            };

            let next = merged(&current, &fields)?;

            let outcome: i64 = self
                .compare_and_set
                .key(&self.docs_key)
                .arg(&key)
                .arg(&current)
                .arg(&next)
                .invoke_async(&mut connection)
                .await?;

            match outcome {
                -1 => debug!("Document {key} changed during update, retrying"),
                0 => return Ok(0),
                _ => return Ok(1),
            }
        }

        Err(StoreError::Contended(key))
    }

    async fn delete_one(&self, id: &Value) -> Result<u64, StoreError> {
        let keys: Vec<String> = id_key(id).into_iter().collect();

        self.delete_keys(keys).await
    }

    async fn delete_many(&self, ids: &[Value]) -> Result<u64, StoreError> {
        let keys: Vec<String> = ids.iter().filter_map(id_key).collect();

        self.delete_keys(keys).await
    }
}
