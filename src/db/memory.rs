//! In-process [`ForecastStore`], used by tests and for running the pipeline
//! without a database.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::models::{ForecastFields, ForecastRecord, Location, NewLocation};
use super::ForecastStore;
use crate::errors::StoreError;

#[derive(Debug, Default)]
struct Inner {
    /// Insertion order doubles as creation order.
    locations: Vec<Location>,
    forecasts: HashMap<(Uuid, NaiveDate), ForecastRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn location_count(&self) -> usize {
        self.inner.lock().await.locations.len()
    }

    pub async fn forecast_count(&self) -> usize {
        self.inner.lock().await.forecasts.len()
    }

    #[cfg(test)]
    pub(crate) async fn get_forecast(
        &self,
        location_id: Uuid,
        date: NaiveDate,
    ) -> Option<ForecastRecord> {
        self.inner
            .lock()
            .await
            .forecasts
            .get(&(location_id, date))
            .cloned()
    }
}

impl ForecastStore for MemoryStore {
    async fn find_locations_near(
        &self,
        latitude: Decimal,
        longitude: Decimal,
        tolerance: Decimal,
    ) -> Result<Vec<Location>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .locations
            .iter()
            .filter(|loc| {
                (loc.latitude - latitude).abs() <= tolerance
                    && (loc.longitude - longitude).abs() <= tolerance
            })
            .cloned()
            .collect())
    }

    async fn create_location(&self, location: NewLocation) -> Result<Location, StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner
            .locations
            .iter()
            .find(|l| l.latitude == location.latitude && l.longitude == location.longitude)
        {
            return Ok(existing.clone());
        }

        let created = Location {
            id: Uuid::new_v4(),
            city: location.city,
            state_province: location.state_province,
            country: location.country,
            latitude: location.latitude,
            longitude: location.longitude,
            created_at: Utc::now(),
        };
        inner.locations.push(created.clone());
        Ok(created)
    }

    async fn list_locations(&self) -> Result<Vec<Location>, StoreError> {
        Ok(self.inner.lock().await.locations.clone())
    }

    async fn upsert_forecast(
        &self,
        location: &Location,
        date: NaiveDate,
        fields: &ForecastFields,
    ) -> Result<(ForecastRecord, bool), StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.forecasts.get_mut(&(location.id, date)) {
            Some(existing) => {
                existing.apply(fields);
                Ok((existing.clone(), false))
            }
            None => {
                let record = ForecastRecord::create(location.id, date, fields)?;
                inner.forecasts.insert((location.id, date), record.clone());
                Ok((record, true))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn new_location(lat: &str, lon: &str) -> NewLocation {
        NewLocation {
            city: "Test".to_string(),
            state_province: None,
            country: None,
            latitude: Decimal::from_str(lat).unwrap(),
            longitude: Decimal::from_str(lon).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_create_location_exact_duplicate_returns_existing() {
        let store = MemoryStore::new();
        let first = store
            .create_location(new_location("25.686600", "-100.316100"))
            .await
            .unwrap();
        let second = store
            .create_location(new_location("25.686600", "-100.316100"))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.location_count().await, 1);
    }

    #[tokio::test]
    async fn test_find_locations_near_is_inclusive_and_ordered() {
        let store = MemoryStore::new();
        let a = store
            .create_location(new_location("10.000000", "10.000000"))
            .await
            .unwrap();
        let b = store
            .create_location(new_location("10.010000", "9.990000"))
            .await
            .unwrap();
        store
            .create_location(new_location("10.020001", "10.000000"))
            .await
            .unwrap();

        let found = store
            .find_locations_near(
                Decimal::from_str("10.0").unwrap(),
                Decimal::from_str("10.0").unwrap(),
                Decimal::from_str("0.01").unwrap(),
            )
            .await
            .unwrap();
        let ids: Vec<Uuid> = found.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn test_upsert_forecast_rejects_incomplete_insert() {
        let store = MemoryStore::new();
        let loc = store
            .create_location(new_location("1.0", "1.0"))
            .await
            .unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let result = store
            .upsert_forecast(&loc, date, &ForecastFields::new())
            .await;
        assert!(matches!(result, Err(StoreError::MissingRequired(_))));
        assert_eq!(store.forecast_count().await, 0);
    }
}
