//! Find-or-create of persisted locations by approximate coordinates.
//!
//! Two queries that land within [`LOCATION_TOLERANCE_DEG`] of an existing row
//! share it. The lookup and the insert are not serialized: two concurrent
//! callers for a fresh area may each create a row. Identical coordinates are
//! folded onto one row by the store's unique constraint.

use rust_decimal::Decimal;

use crate::db::models::{Location, NewLocation};
use crate::db::ForecastStore;
use crate::errors::StoreError;
use crate::helpers::try_f64_to_decimal;

/// Match tolerance on each axis, in degrees (0.01°).
pub const LOCATION_TOLERANCE_DEG: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Stored coordinate precision.
pub const COORDINATE_DP: u32 = 6;

/// Total digits of the NUMERIC coordinate columns.
const COORDINATE_PRECISION: u32 = 9;

/// Label for a location created from a bare coordinate query.
pub fn synthesized_label(lat: f64, lon: f64) -> String {
    format!("Forecast @ {:.4}, {:.4}", lat, lon)
}

/// Return the location within tolerance of (`lat`, `lon`), creating one when
/// none exists.
///
/// Coordinates must be finite and within [-90, 90] × [-180, 180].
/// When several rows match, the earliest created wins (ties broken by id),
/// which the store already guarantees through its ordering.
pub async fn resolve_or_create<S: ForecastStore>(
    store: &S,
    lat: f64,
    lon: f64,
) -> Result<Location, StoreError> {
    let invalid = || StoreError::InvalidCoordinates {
        latitude: lat,
        longitude: lon,
    };
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(invalid());
    }
    let latitude =
        try_f64_to_decimal(lat, COORDINATE_PRECISION, COORDINATE_DP).ok_or_else(invalid)?;
    let longitude =
        try_f64_to_decimal(lon, COORDINATE_PRECISION, COORDINATE_DP).ok_or_else(invalid)?;

    let matches = store
        .find_locations_near(latitude, longitude, LOCATION_TOLERANCE_DEG)
        .await?;

    if matches.len() > 1 {
        tracing::debug!(
            "{} locations within {}° of ({}, {}); using the oldest",
            matches.len(),
            LOCATION_TOLERANCE_DEG,
            latitude,
            longitude
        );
    }

    if let Some(existing) = matches.into_iter().next() {
        return Ok(existing);
    }

    let created = store
        .create_location(NewLocation {
            city: synthesized_label(lat, lon),
            state_province: None,
            country: None,
            latitude,
            longitude,
        })
        .await?;
    tracing::info!(
        "Created location {} at ({}, {})",
        created.id,
        created.latitude,
        created.longitude
    );
    Ok(created)
}
