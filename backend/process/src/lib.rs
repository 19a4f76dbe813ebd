//! # Food Ingestion
//!
//! Loads a dump of food records into the store the admin console reads.
//!
//! ## Flow
//!
//! 1. Read the dump from a file or an `http(s)` URL. Either a JSON list of
//!    records or an object with an `items` list (a saved `/foods` response).
//!
//! 2. Drop the store-managed `_id` an earlier export may carry and skip records
//!    without a number or string `id`.
//!
//! 3. Append records in dump order, natural order in the console follows it.
//!    Ids already present are left untouched so a dump can be replayed.
//!
//! 4. Report how many records were new, already present, skipped, and how many
//!    carry no calorie value under any of its field names or no image at all.
//!
//! Uses the same `REDIS_URL_ADMIN` / `REDIS_URL`, `FOOD_DB` and
//! `FOOD_COLLECTION` settings as the server.
use anyhow::Result;
use food_server::{
    config::Config,
    database::{RedisStore, init_redis},
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

pub mod models;
pub mod utils;

use utils::{missing_calories, missing_image, parse_dump, prepare, read_source};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub inserted: usize,
    pub existing: usize,
    pub skipped: usize,
    pub missing_calories: usize,
    pub missing_images: usize,
}

pub async fn load_foods(source: &str) -> Result<()> {
    let config = Config::load()?;

    let records = parse_dump(&read_source(source).await?)?;
    println!("Loaded Foods: {}\n", records.len());

    info!("Connecting to {}", config.namespace());
    let connection = init_redis(&config.redis_url_admin).await?;
    let store = RedisStore::new(connection, &config.namespace());

    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    let mut summary = Summary::default();

    for record in records {
        pb.inc(1);

        let Some(record) = prepare(record) else {
            summary.skipped += 1;
            continue;
        };

        if missing_calories(&record) {
            summary.missing_calories += 1;
        }

        if missing_image(&record) {
            summary.missing_images += 1;
        }

        if store.insert(record).await? {
            summary.inserted += 1;
        } else {
            summary.existing += 1;
        }
    }

    pb.finish_with_message("Done");

    if summary.inserted == 0 {
        println!("No new foods found.");
    } else {
        println!("Total New Foods: {}", summary.inserted);
    }
    println!("Already Present: {}", summary.existing);
    println!("Skipped Without Id: {}", summary.skipped);
    println!("Without Calories: {}", summary.missing_calories);
    println!("Without Image: {}", summary.missing_images);

    Ok(())
}
