use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use super::{
    config::Config,
    database::{RedisStore, init_redis},
    store::DocumentStore,
};

pub struct AppState {
    pub config: Config,
    pub reader: Arc<dyn DocumentStore>,
    pub writer: Arc<dyn DocumentStore>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Arc<Self>> {
        let namespace = config.namespace();

        info!("Connecting to admin store...");
        let admin = init_redis(&config.redis_url_admin).await?;
        let writer: Arc<dyn DocumentStore> = Arc::new(RedisStore::new(admin, &namespace));

        // same target, same connection
        let reader: Arc<dyn DocumentStore> = if config.redis_url_readonly == config.redis_url_admin {
            writer.clone()
        } else {
            info!("Connecting to read-only store...");
            let readonly = init_redis(&config.redis_url_readonly).await?;
            Arc::new(RedisStore::new(readonly, &namespace))
        };

        Ok(Self::with_stores(config, reader, writer))
    }

    pub fn with_stores(
        config: Config,
        reader: Arc<dyn DocumentStore>,
        writer: Arc<dyn DocumentStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            reader,
            writer,
        })
    }

    pub fn edit_token(&self) -> Option<&str> {
        self.config.edit_token.as_deref()
    }
}
