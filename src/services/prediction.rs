//! Prediction orchestration: features → regressors → classifier.

use serde::Serialize;
use thiserror::Error;

use super::classifier::classify;
use super::ensemble::{predict_variables, VariablePredictions};
use super::features::FeatureVector;
use super::model_bank::ModelBank;
use super::variables::variable_names;

#[derive(Debug, Error, PartialEq)]
pub enum PredictionError {
    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("day of year {0} outside [1, 366]")]
    DayOutOfRange(u32),
}

/// Raw model output for one (lat, lon, day) query.
///
/// Serializes flat: `{lat, lon, day, condition, <variable>: number|null, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub lat: f64,
    pub lon: f64,
    pub day: u32,
    pub condition: String,
    #[serde(flatten)]
    pub variables: VariablePredictions,
}

impl PredictionResult {
    /// Predicted value of `variable`; `None` when its model was unavailable.
    pub fn value(&self, variable: &str) -> Option<f64> {
        self.variables.get(variable).copied().flatten()
    }
}

pub fn validate_inputs(lat: f64, lon: f64, day_of_year: u32) -> Result<(), PredictionError> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(PredictionError::LatitudeOutOfRange(lat));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(PredictionError::LongitudeOutOfRange(lon));
    }
    if !(1..=366).contains(&day_of_year) {
        return Err(PredictionError::DayOutOfRange(day_of_year));
    }
    Ok(())
}

/// Predict every physical variable and the condition label.
///
/// Deterministic for a fixed artifact set; touches no storage.
pub async fn predict(
    bank: &ModelBank,
    lat: f64,
    lon: f64,
    day_of_year: u32,
) -> Result<PredictionResult, PredictionError> {
    validate_inputs(lat, lon, day_of_year)?;

    let features = FeatureVector::new(lat, lon, day_of_year);
    let variables = predict_variables(bank, &features, &variable_names()).await;
    let condition = classify(bank, &features, &variables).await;

    tracing::debug!(
        "Predicted ({}, {}) day {}: {} ({} of {} variables available)",
        lat,
        lon,
        day_of_year,
        condition,
        variables.values().filter(|v| v.is_some()).count(),
        variables.len()
    );

    Ok(PredictionResult {
        lat,
        lon,
        day: day_of_year,
        condition,
        variables,
    })
}
