//! Admin console backend for a collection of food-nutrition records.
//!
//! Operators search, filter and page through foods, tweak fields and delete
//! entries. Every mutation sits behind a shared edit token.
//!
//!
//!
//! # Endpoints
//!
//! | Method & Path | Purpose | Response |
//! |---|---|---|
//! | `GET /filters` | distinct category labels, sorted | `{categories}` |
//! | `GET /foods` | search, filter and paginate | `{items, total, page, pageSize}` |
//! | `GET /foods/{id}` | one record | `{item}` (`null` if absent) |
//! | `PATCH /foods/{id}` | merge fields into a record | `{item}` after the update |
//! | `DELETE /foods/{id}` | delete one record | `{deletedCount}` |
//! | `POST /foods/bulk-delete` | delete `{ids: [...]}` | `{deletedCount}` |
//!
//! `/foods` understands `search`, `category` (comma separated), `page`,
//! `pageSize` (at most 200), `preferMaterials` (`1` to list records with
//! materials first) and `min`/`max` bounds for `Calory`, `Protein`, `Fat` and
//! `Carb`.
//!
//!
//!
//! # Edit Token
//!
//! Mutating routes compare the `x-edit-token` header with the configured
//! `EDIT_TOKEN`. If no token is configured the console is **open to anyone**,
//! a warning is logged at start-up.
//!
//!
//!
//! # Notes
//!
//! ## Ids
//! Historical imports stored ids both as numbers and as strings. Ids coming
//! from paths and payloads go through [`record::normalize_id`] so `"42"` finds
//! the record stored as `42` while `"007"` stays a string.
//!
//! ## Nutrients
//! Calories may live under `calory`, `calorie` or `energy` and carbohydrates
//! under `carbohydrate`, `carb` or `carbs`. Range filters accept a record when
//! any of those fields is in range, see [`fields::Nutrient`].
//!
//!
//!
//! # Setup
//!
//! Run against a local Redis.
//! ```sh
//! REDIS_URL=redis://127.0.0.1:6379 EDIT_TOKEN=changeme RUST_LOG=info cargo run -p food-admin
//! ```
//!
//! Load a dump of foods.
//! ```sh
//! cargo run -p food-ingest -- foods.json
//! ```
use std::{sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    Router,
    http::{HeaderName, Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod fields;
pub mod paging;
pub mod query;
pub mod record;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;

use auth::EDIT_TOKEN_HEADER;
use config::Config;
use routes::{
    bulk_delete_handler, delete_handler, filters_handler, food_handler, foods_handler,
    update_handler,
};
use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(EDIT_TOKEN_HEADER)])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/filters", get(filters_handler))
        .route("/foods", get(foods_handler))
        .route("/foods/bulk-delete", post(bulk_delete_handler))
        .route(
            "/foods/{id}",
            get(food_handler)
                .patch(update_handler)
                .delete(delete_handler),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = AppState::new(config).await?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let app = router(state);

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
