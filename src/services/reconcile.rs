//! Mapping of raw predictions onto the stored daily forecast.
//!
//! Reconciliation runs in two passes over a [`ForecastFields`] set:
//!
//! 1. When the base temperature is available, the [`derivation_policy`] table
//!    fills the derived temperature columns and the fixed placeholder columns.
//! 2. Every physical variable whose destination is still empty is converted
//!    to its column type. Values that cannot be stored are logged and skipped.
//!
//! The result is then upserted. Only columns present in the field set are
//! written, so an update with a partial prediction keeps earlier values.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::db::models::{Field, FieldKind, FieldValue, ForecastFields, ForecastRecord, Location};
use crate::db::ForecastStore;
use crate::errors::StoreError;
use crate::helpers::try_f64_to_decimal;

use super::prediction::PredictionResult;
use super::variables::{BASE_TEMPERATURE_VARIABLE, PHYSICAL_VARIABLES};

/// Highest UV index label the column accepts.
const UV_INDEX_MAX: f64 = 15.0;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("no base temperature prediction; cannot create a new forecast")]
    MissingBaseTemperature,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a single predicted value could not be stored.
#[derive(Debug, Error, PartialEq)]
pub enum ConversionError {
    #[error("non-finite value {value} for {column}")]
    NonFinite { column: &'static str, value: f64 },

    #[error("value {value} does not fit NUMERIC({precision},{scale}) column {column}")]
    OutOfRange {
        column: &'static str,
        value: f64,
        precision: u32,
        scale: u32,
    },

    #[error("column {0} does not take numeric predictions")]
    NotNumeric(&'static str),
}

/// How one column is derived from the base temperature.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Base temperature plus a constant, in °C.
    Offset(f64),
    /// Placeholder value independent of the prediction.
    Fixed(FieldValue),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Derivation {
    pub field: Field,
    pub rule: Rule,
}

fn offset(field: Field, delta: f64) -> Derivation {
    Derivation {
        field,
        rule: Rule::Offset(delta),
    }
}

fn fixed(field: Field, value: FieldValue) -> Derivation {
    Derivation {
        field,
        rule: Rule::Fixed(value),
    }
}

/// Columns filled whenever a base temperature is available.
pub fn derivation_policy() -> Vec<Derivation> {
    vec![
        offset(Field::CurrentTemp, 0.0),
        offset(Field::MaxTemp, 5.0),
        offset(Field::MinTemp, -5.0),
        offset(Field::FeelsLikeTemp, 2.0),
        offset(Field::DewPoint, -5.0),
        fixed(Field::Humidity, FieldValue::Integer(70)),
        fixed(Field::PrecipitationProb, FieldValue::Integer(20)),
        fixed(Field::WindSpeed, FieldValue::Decimal(Decimal::new(100, 1))),
        fixed(Field::WindDirection, FieldValue::Text("SW".to_string())),
        fixed(Field::Visibility, FieldValue::Decimal(Decimal::new(100, 1))),
        fixed(Field::Pressure, FieldValue::Decimal(Decimal::new(101000, 2))),
        fixed(Field::Clouds, FieldValue::Decimal(Decimal::new(500, 1))),
    ]
}

/// Convert a predicted value to what `field`'s column stores.
pub fn convert_prediction(field: Field, value: f64) -> Result<FieldValue, ConversionError> {
    let column = field.column();
    if !value.is_finite() {
        return Err(ConversionError::NonFinite { column, value });
    }
    match field.kind() {
        FieldKind::Percent => Ok(FieldValue::Integer(value.clamp(0.0, 100.0).trunc() as i32)),
        FieldKind::UvLabel => {
            let index = value.clamp(0.0, UV_INDEX_MAX).trunc() as i32;
            Ok(FieldValue::Text(format!("Index {}", index)))
        }
        FieldKind::Decimal { precision, scale } => try_f64_to_decimal(value, precision, scale)
            .map(FieldValue::Decimal)
            .ok_or(ConversionError::OutOfRange {
                column,
                value,
                precision,
                scale,
            }),
        FieldKind::Text => Err(ConversionError::NotNumeric(column)),
    }
}

/// Compute the column values for one prediction.
pub fn build_fields(prediction: &PredictionResult) -> ForecastFields {
    let mut fields = ForecastFields::new();
    fields.set(
        Field::ConditionSummary,
        FieldValue::Text(prediction.condition.clone()),
    );

    if let Some(base) = prediction.value(BASE_TEMPERATURE_VARIABLE) {
        match convert_prediction(Field::CurrentTemp, base) {
            Ok(_) => apply_policy(&mut fields, base),
            Err(e) => tracing::warn!("Unusable base temperature, skipping derivations: {}", e),
        }
    }

    for variable in PHYSICAL_VARIABLES {
        let Some(destination) = variable.destination else {
            continue;
        };
        if fields.contains(destination) {
            continue;
        }
        let Some(value) = prediction.value(variable.name) else {
            continue;
        };
        match convert_prediction(destination, value) {
            Ok(v) => fields.set(destination, v),
            Err(e) => tracing::warn!("Skipping {}: {}", variable.name, e),
        }
    }

    fields
}

fn apply_policy(fields: &mut ForecastFields, base: f64) {
    for derivation in derivation_policy() {
        let value = match derivation.rule {
            Rule::Offset(delta) => convert_prediction(derivation.field, base + delta),
            Rule::Fixed(value) => Ok(value),
        };
        match value {
            Ok(v) => fields.set(derivation.field, v),
            Err(e) => tracing::warn!("Skipping derived {}: {}", derivation.field.column(), e),
        }
    }
}

/// Write `prediction` into the forecast for (`location`, `date`).
///
/// Returns the stored record and whether it was newly created. A new record
/// cannot be created without a base temperature; an existing one keeps its
/// previous values for every column the prediction could not fill.
pub async fn reconcile<S: ForecastStore>(
    store: &S,
    location: &Location,
    date: NaiveDate,
    prediction: &PredictionResult,
) -> Result<(ForecastRecord, bool), ReconcileError> {
    let fields = build_fields(prediction);

    match store.upsert_forecast(location, date, &fields).await {
        Ok((record, created)) => {
            tracing::debug!(
                "{} forecast for {} on {} ({} columns)",
                if created { "Created" } else { "Updated" },
                location.id,
                date,
                fields.len()
            );
            Ok((record, created))
        }
        Err(StoreError::MissingRequired(_)) if !fields.contains(Field::CurrentTemp) => {
            Err(ReconcileError::MissingBaseTemperature)
        }
        Err(e) => Err(e.into()),
    }
}
