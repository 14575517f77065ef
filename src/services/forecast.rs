//! End-to-end forecast service.
//!
//! Composes prediction, location resolution and reconciliation:
//! `(lat, lon, date)` → [`PredictionResult`] → [`Location`] → stored
//! [`ForecastRecord`].

use chrono::{Datelike, NaiveDate};

use crate::db::models::{ForecastRecord, Location};
use crate::db::ForecastStore;
use crate::errors::AppError;
use crate::helpers::dec_to_f64;
use crate::services::locations::resolve_or_create;
use crate::services::model_bank::ModelBank;
use crate::services::prediction::{predict, PredictionResult};
use crate::services::reconcile::reconcile;

/// Outcome of one predict-and-store call.
#[derive(Debug, Clone)]
pub struct StoredForecast {
    pub location: Location,
    pub record: ForecastRecord,
    pub created: bool,
    pub prediction: PredictionResult,
}

/// 1-based day of year, as the models were trained on.
pub fn day_of_year(date: NaiveDate) -> u32 {
    date.ordinal()
}

/// Predict the forecast for `date` at (`lat`, `lon`) and persist it.
///
/// Inputs are validated before any storage access, so an invalid query never
/// creates a location.
pub async fn predict_and_store<S: ForecastStore>(
    store: &S,
    bank: &ModelBank,
    lat: f64,
    lon: f64,
    date: NaiveDate,
) -> Result<StoredForecast, AppError> {
    let prediction = predict(bank, lat, lon, day_of_year(date)).await?;
    let location = resolve_or_create(store, lat, lon).await?;
    let (record, created) = reconcile(store, &location, date, &prediction).await?;

    tracing::info!(
        "{} forecast for {} ({}) on {}: {}",
        if created { "Stored new" } else { "Updated" },
        location.city,
        location.id,
        date,
        record.condition_summary
    );

    Ok(StoredForecast {
        location,
        record,
        created,
        prediction,
    })
}

/// Re-predict and reconcile the forecast of an already stored location.
pub async fn refresh_location<S: ForecastStore>(
    store: &S,
    bank: &ModelBank,
    location: &Location,
    date: NaiveDate,
) -> Result<(ForecastRecord, bool), AppError> {
    let lat = dec_to_f64(location.latitude);
    let lon = dec_to_f64(location.longitude);
    let prediction = predict(bank, lat, lon, day_of_year(date)).await?;
    Ok(reconcile(store, location, date, &prediction).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::services::model_bank::test_support::*;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_of_year() {
        assert_eq!(day_of_year(date(2026, 1, 1)), 1);
        assert_eq!(day_of_year(date(2026, 4, 30)), 120);
        assert_eq!(day_of_year(date(2028, 12, 31)), 366);
    }

    #[tokio::test]
    async fn test_predict_and_store_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        write_constant_regressor(dir.path(), "temperature_surface", 28.0);
        write_constant_regressor(dir.path(), "snowfall", 0.0);
        write_classifier(
            dir.path(),
            json!({
                "feature_names": ["temperature_surface"],
                "classes": ["Cold", "Warm"],
                "model": { "type": "linear", "intercepts": [0.0, -20.0], "weights": [[0.0], [1.0]] }
            }),
        );
        let bank = ModelBank::new(dir.path());
        let store = MemoryStore::new();

        let stored = predict_and_store(&store, &bank, 25.6866, -100.3161, date(2026, 4, 30))
            .await
            .unwrap();

        assert!(stored.created);
        assert_eq!(stored.prediction.day, 120);
        assert_eq!(stored.record.condition_summary, "Warm");
        assert_eq!(stored.record.max_temp, dec("33.0"));
        assert_eq!(stored.record.snowfall_pred, Some(Decimal::ZERO));
        assert_eq!(stored.record.location_id, stored.location.id);
        assert_eq!(store.location_count().await, 1);

        let again = predict_and_store(&store, &bank, 25.6867, -100.3160, date(2026, 4, 30))
            .await
            .unwrap();
        assert!(!again.created);
        assert_eq!(again.location.id, stored.location.id);
        assert_eq!(store.forecast_count().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_input_touches_no_storage() {
        let dir = tempfile::tempdir().unwrap();
        let bank = ModelBank::new(dir.path());
        let store = MemoryStore::new();

        let err = predict_and_store(&store, &bank, 95.0, 0.0, date(2026, 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(store.location_count().await, 0);
    }

    #[tokio::test]
    async fn test_no_models_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let bank = ModelBank::new(dir.path());
        let store = MemoryStore::new();

        let err = predict_and_store(&store, &bank, 10.0, 10.0, date(2026, 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.forecast_count().await, 0);
    }

    #[tokio::test]
    async fn test_refresh_location_uses_stored_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        write_linear_regressor(dir.path(), "temperature_surface", 0.0, 1.0);
        let bank = ModelBank::new(dir.path());
        let store = MemoryStore::new();
        let location = resolve_or_create(&store, 12.5, 7.0).await.unwrap();

        let (record, created) = refresh_location(&store, &bank, &location, date(2026, 6, 1))
            .await
            .unwrap();
        assert!(created);
        assert_eq!(record.current_temp, dec("12.5"));
        assert_eq!(record.condition_summary, "Not Classified");
    }
}
