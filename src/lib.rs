//! Forecast engine: per-variable model ensembles, condition classification and
//! reconciliation of predictions into persisted daily forecasts.

pub mod config;
pub mod db;
pub mod errors;
pub(crate) mod helpers;
pub mod services;

pub use config::AppConfig;
pub use db::ForecastStore;
pub use errors::{AppError, StoreError};
pub use services::forecast::{predict_and_store, StoredForecast};
pub use services::model_bank::ModelBank;
pub use services::prediction::{predict, PredictionError, PredictionResult};
