//! Start-up seeding of known locations from `locations.json`.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::db::models::{Location, NewLocation};
use crate::db::ForecastStore;
use crate::errors::StoreError;
use crate::helpers::f64_to_decimal_dp;

use super::locations::COORDINATE_DP;

/// File name looked up in the data directory.
pub const SEED_FILE_NAME: &str = "locations.json";

/// Errors that can occur while loading or applying the seed file.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("IO error reading seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid coordinates for '{city}': ({latitude}, {longitude})")]
    InvalidCoordinates {
        city: String,
        latitude: f64,
        longitude: f64,
    },
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// One entry of the seed file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeedLocation {
    pub city: String,
    #[serde(default)]
    pub state_province: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl SeedLocation {
    fn to_new_location(&self) -> Result<NewLocation, SeedError> {
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude)
        {
            return Err(SeedError::InvalidCoordinates {
                city: self.city.clone(),
                latitude: self.latitude,
                longitude: self.longitude,
            });
        }
        Ok(NewLocation {
            city: self.city.clone(),
            state_province: self.state_province.clone(),
            country: self.country.clone(),
            latitude: f64_to_decimal_dp(self.latitude, COORDINATE_DP),
            longitude: f64_to_decimal_dp(self.longitude, COORDINATE_DP),
        })
    }
}

pub fn parse_seed(json: &str) -> Result<Vec<SeedLocation>, SeedError> {
    Ok(serde_json::from_str(json)?)
}

/// Read `locations.json` from `dir`. A missing file yields no seeds.
pub fn load_seed_file(dir: &Path) -> Result<Vec<SeedLocation>, SeedError> {
    let path = dir.join(SEED_FILE_NAME);
    if !path.exists() {
        tracing::warn!("Seed file does not exist: {}", path.display());
        return Ok(Vec::new());
    }
    tracing::info!("Loading locations from {}", path.display());
    parse_seed(&std::fs::read_to_string(&path)?)
}

/// Insert each seed location unless one with the same coordinates exists.
///
/// Invalid entries are logged and skipped; storage failures abort.
pub async fn seed_locations<S: ForecastStore>(
    store: &S,
    seeds: &[SeedLocation],
) -> Result<Vec<Location>, SeedError> {
    let mut seeded = Vec::with_capacity(seeds.len());
    for seed in seeds {
        let new_location = match seed.to_new_location() {
            Ok(l) => l,
            Err(e) => {
                tracing::error!("Skipping seed location: {}", e);
                continue;
            }
        };
        let location = store.create_location(new_location).await?;
        tracing::info!(
            "Seeded location '{}' ({}, {}) → id={}",
            location.city,
            location.latitude,
            location.longitude,
            location.id
        );
        seeded.push(location);
    }
    Ok(seeded)
}
