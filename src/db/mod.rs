//! Storage boundary for locations and daily forecasts.
//!
//! The prediction pipeline only talks to storage through [`ForecastStore`].
//! `queries::PgStore` is the production implementation; `memory::MemoryStore`
//! keeps everything in-process.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::future::Future;

use crate::errors::StoreError;

pub mod memory;
pub mod models;
pub mod queries;

use models::{ForecastFields, ForecastRecord, Location, NewLocation};

pub trait ForecastStore: Send + Sync {
    /// Locations whose latitude and longitude both lie within ±`tolerance` of
    /// the query point, oldest first (`created_at`, then `id`).
    fn find_locations_near(
        &self,
        latitude: Decimal,
        longitude: Decimal,
        tolerance: Decimal,
    ) -> impl Future<Output = Result<Vec<Location>, StoreError>> + Send;

    /// Insert a location. If a row with the exact same coordinates already
    /// exists it is returned unchanged instead.
    fn create_location(
        &self,
        location: NewLocation,
    ) -> impl Future<Output = Result<Location, StoreError>> + Send;

    /// All locations, oldest first.
    fn list_locations(&self) -> impl Future<Output = Result<Vec<Location>, StoreError>> + Send;

    /// Atomically insert or update the forecast for (location, date).
    ///
    /// On update only the columns present in `fields` are written. On insert
    /// every required column must be present, otherwise
    /// [`StoreError::MissingRequired`] is returned. The boolean is `true` when a
    /// new row was created.
    fn upsert_forecast(
        &self,
        location: &Location,
        date: NaiveDate,
        fields: &ForecastFields,
    ) -> impl Future<Output = Result<(ForecastRecord, bool), StoreError>> + Send;
}
