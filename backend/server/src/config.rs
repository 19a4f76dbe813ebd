use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use anyhow::{Context, Result};
use tracing::{info, warn};

const EDIT_TOKEN: &str = "EDIT_TOKEN";
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub redis_url_admin: String,
    pub redis_url_readonly: String,
    pub database: String,
    pub collection: String,
    pub edit_token: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| {
            var(key).ok().or_else(|| {
                if key == EDIT_TOKEN {
                    read_secret(key)
                } else {
                    None
                }
            })
        })
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let redis_url_admin = lookup("REDIS_URL_ADMIN")
            .or_else(|| lookup("REDIS_URL"))
            .unwrap_or_else(|| {
                info!("REDIS_URL not set, using default: {DEFAULT_REDIS_URL}");
                DEFAULT_REDIS_URL.to_string()
            });

        let redis_url_readonly =
            lookup("REDIS_URL_READONLY").unwrap_or_else(|| redis_url_admin.clone());

        let edit_token = lookup(EDIT_TOKEN).filter(|token| !token.is_empty());
        if edit_token.is_none() {
            warn!("{EDIT_TOKEN} not set, edits and deletes are open to anyone");
        }

        Ok(Self {
            port: try_load(&lookup, "RUST_PORT", "8080")?,
            redis_url_admin,
            redis_url_readonly,
            database: try_load(&lookup, "FOOD_DB", "food_admin")?,
            collection: try_load(&lookup, "FOOD_COLLECTION", "foods")?,
            edit_token,
        })
    }

    /// Key prefix of the collection in the store.
    pub fn namespace(&self) -> String {
        format!("{}:{}", self.database, self.collection)
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T>
where
    T::Err: Display,
{
    lookup(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid {key} value: {e}"))
        .context("Environment misconfigured")
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
        })
        .ok()
}
