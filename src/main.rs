// Forecast engine daemon
use sqlx::postgres::PgPoolOptions;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use forecast_engine::config::AppConfig;
use forecast_engine::db::queries::PgStore;
use forecast_engine::services::model_bank::ModelBank;
use forecast_engine::services::refresher::{self, RefresherState, SharedRefresherState};
use forecast_engine::services::seed;
use forecast_engine::services::variables::variable_names;

/// Maximum number of connections in the database pool.
const DB_POOL_MAX_CONNECTIONS: u32 = 5;
/// Minimum number of connections kept alive in the database pool.
const DB_POOL_MIN_CONNECTIONS: u32 = 2;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forecast_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    // Set up database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .min_connections(DB_POOL_MIN_CONNECTIONS)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    let store = Arc::new(PgStore::new(pool));

    // Seed known locations
    let data_dir = Path::new(&config.data_dir);
    match seed::load_seed_file(data_dir) {
        Ok(seeds) => {
            if seeds.is_empty() {
                tracing::warn!("No seed locations found in {}", data_dir.display());
            }
            if let Err(e) = seed::seed_locations(store.as_ref(), &seeds).await {
                tracing::error!("Failed to seed locations: {}", e);
            }
        }
        Err(e) => {
            tracing::error!(
                "Failed to load seed locations from {}: {}",
                data_dir.display(),
                e
            );
        }
    }

    // Load models
    let bank = Arc::new(ModelBank::new(&config.model_dir));
    let variables = variable_names();
    let loaded = bank.warm_up(&variables).await;
    if loaded == 0 {
        tracing::warn!(
            "No model artifacts found in {}; forecasts cannot be created until models are deployed",
            bank.base_dir().display()
        );
    }

    // Background refresher
    let refresher_state: SharedRefresherState = Arc::new(RwLock::new(RefresherState::new()));
    let refresher = tokio::spawn(refresher::run_refresher(
        store,
        bank,
        config.forecast_horizon_days,
        config.refresh_interval_secs,
        refresher_state.clone(),
    ));

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
    refresher.abort();

    let state = refresher_state.read().await;
    tracing::info!(
        "Forecast engine stopped after {} refresh cycles",
        state.total_cycles
    );
}
