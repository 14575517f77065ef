use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::errors::StoreError;

/// Default `uv_index` / `air_quality` label for rows the models never filled.
pub const DEFAULT_INDEX_LABEL: &str = "Low 0";

/// A tracked geographic location. Coordinates are stored with 6 decimal places
/// and are unique as a pair.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Location {
    pub id: Uuid,
    pub city: String,
    pub state_province: Option<String>,
    pub country: Option<String>,
    pub latitude: Decimal,
    pub longitude: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a location.
#[derive(Debug, Clone)]
pub struct NewLocation {
    pub city: String,
    pub state_province: Option<String>,
    pub country: Option<String>,
    pub latitude: Decimal,
    pub longitude: Decimal,
}

/// A daily forecast row, unique per (location, date).
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ForecastRecord {
    pub id: Uuid,
    pub location_id: Uuid,
    pub date: NaiveDate,

    pub current_temp: Decimal,
    pub condition_summary: String,
    pub max_temp: Decimal,
    pub min_temp: Decimal,
    pub feels_like_temp: Decimal,
    pub humidity: i32,
    pub precipitation_prob: i32,
    pub wind_speed: Decimal,
    pub wind_direction: String,
    pub visibility: Decimal,
    pub pressure: Decimal,
    pub uv_index: String,
    pub air_quality: String,
    pub dew_point: Decimal,
    pub clouds: Decimal,
    pub sunrise: NaiveTime,
    pub sunset: NaiveTime,
    pub summary: Option<String>,

    // Model-only science fields
    pub co_surface_conc: Option<Decimal>,
    pub total_precip_rate: Option<Decimal>,
    pub specific_humidity_pred: Option<Decimal>,
    pub skin_temperature: Option<Decimal>,
    pub avg_wind_speed_10m: Option<Decimal>,
    pub surface_pressure_pred: Option<Decimal>,
    pub cloud_area_pred: Option<Decimal>,
    pub frozen_precip: Option<Decimal>,
    pub snowfall_pred: Option<Decimal>,
    pub dust_concentration: Option<Decimal>,
    pub so2_concentration: Option<Decimal>,
    pub no2_concentration: Option<Decimal>,
    pub o3_concentration: Option<Decimal>,
    pub potential_vorticity: Option<Decimal>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Storage type of a forecast column, as far as reconciliation cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// NUMERIC(precision, scale)
    Decimal { precision: u32, scale: u32 },
    /// Integer percentage, 0..=100
    Percent,
    /// `"Index N"` label, N in 0..=15
    UvLabel,
    Text,
}

/// Forecast columns that reconciliation may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    ConditionSummary,
    CurrentTemp,
    MaxTemp,
    MinTemp,
    FeelsLikeTemp,
    Humidity,
    PrecipitationProb,
    WindSpeed,
    WindDirection,
    Visibility,
    Pressure,
    DewPoint,
    Clouds,
    UvIndex,
    CoSurfaceConc,
    TotalPrecipRate,
    SpecificHumidityPred,
    SkinTemperature,
    AvgWindSpeed10m,
    SurfacePressurePred,
    CloudAreaPred,
    FrozenPrecip,
    SnowfallPred,
    DustConcentration,
    So2Concentration,
    No2Concentration,
    O3Concentration,
    PotentialVorticity,
}

const UI_DECIMAL: FieldKind = FieldKind::Decimal {
    precision: 4,
    scale: 1,
};
const SCIENCE_DECIMAL: FieldKind = FieldKind::Decimal {
    precision: 12,
    scale: 6,
};

impl Field {
    /// Columns that must be non-null on every stored row.
    pub const REQUIRED: [Field; 13] = [
        Field::ConditionSummary,
        Field::CurrentTemp,
        Field::MaxTemp,
        Field::MinTemp,
        Field::FeelsLikeTemp,
        Field::Humidity,
        Field::PrecipitationProb,
        Field::WindSpeed,
        Field::WindDirection,
        Field::Visibility,
        Field::Pressure,
        Field::DewPoint,
        Field::Clouds,
    ];

    /// Every writable column, in table order.
    pub const ALL: [Field; 28] = [
        Field::ConditionSummary,
        Field::CurrentTemp,
        Field::MaxTemp,
        Field::MinTemp,
        Field::FeelsLikeTemp,
        Field::Humidity,
        Field::PrecipitationProb,
        Field::WindSpeed,
        Field::WindDirection,
        Field::Visibility,
        Field::Pressure,
        Field::DewPoint,
        Field::Clouds,
        Field::UvIndex,
        Field::CoSurfaceConc,
        Field::TotalPrecipRate,
        Field::SpecificHumidityPred,
        Field::SkinTemperature,
        Field::AvgWindSpeed10m,
        Field::SurfacePressurePred,
        Field::CloudAreaPred,
        Field::FrozenPrecip,
        Field::SnowfallPred,
        Field::DustConcentration,
        Field::So2Concentration,
        Field::No2Concentration,
        Field::O3Concentration,
        Field::PotentialVorticity,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Field::ConditionSummary => "condition_summary",
            Field::CurrentTemp => "current_temp",
            Field::MaxTemp => "max_temp",
            Field::MinTemp => "min_temp",
            Field::FeelsLikeTemp => "feels_like_temp",
            Field::Humidity => "humidity",
            Field::PrecipitationProb => "precipitation_prob",
            Field::WindSpeed => "wind_speed",
            Field::WindDirection => "wind_direction",
            Field::Visibility => "visibility",
            Field::Pressure => "pressure",
            Field::DewPoint => "dew_point",
            Field::Clouds => "clouds",
            Field::UvIndex => "uv_index",
            Field::CoSurfaceConc => "co_surface_conc",
            Field::TotalPrecipRate => "total_precip_rate",
            Field::SpecificHumidityPred => "specific_humidity_pred",
            Field::SkinTemperature => "skin_temperature",
            Field::AvgWindSpeed10m => "avg_wind_speed_10m",
            Field::SurfacePressurePred => "surface_pressure_pred",
            Field::CloudAreaPred => "cloud_area_pred",
            Field::FrozenPrecip => "frozen_precip",
            Field::SnowfallPred => "snowfall_pred",
            Field::DustConcentration => "dust_concentration",
            Field::So2Concentration => "so2_concentration",
            Field::No2Concentration => "no2_concentration",
            Field::O3Concentration => "o3_concentration",
            Field::PotentialVorticity => "potential_vorticity",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Field::ConditionSummary | Field::WindDirection => FieldKind::Text,
            Field::Humidity | Field::PrecipitationProb => FieldKind::Percent,
            Field::UvIndex => FieldKind::UvLabel,
            Field::Pressure => FieldKind::Decimal {
                precision: 7,
                scale: 2,
            },
            Field::CurrentTemp
            | Field::MaxTemp
            | Field::MinTemp
            | Field::FeelsLikeTemp
            | Field::WindSpeed
            | Field::Visibility
            | Field::DewPoint
            | Field::Clouds => UI_DECIMAL,
            _ => SCIENCE_DECIMAL,
        }
    }
}

/// A value destined for one forecast column.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Decimal(Decimal),
    Integer(i32),
    Text(String),
}

/// The set of columns one reconciliation computed. Columns absent from the map
/// are left untouched on update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastFields {
    values: BTreeMap<Field, FieldValue>,
}

impl ForecastFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: Field, value: FieldValue) {
        self.values.insert(field, value);
    }

    pub fn contains(&self, field: Field) -> bool {
        self.values.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn decimal(&self, field: Field) -> Option<Decimal> {
        match self.values.get(&field) {
            Some(FieldValue::Decimal(d)) => Some(*d),
            Some(FieldValue::Integer(i)) => Some(Decimal::from(*i)),
            _ => None,
        }
    }

    pub fn integer(&self, field: Field) -> Option<i32> {
        match self.values.get(&field) {
            Some(FieldValue::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn text(&self, field: Field) -> Option<&str> {
        match self.values.get(&field) {
            Some(FieldValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Required columns this field set cannot fill on its own.
    pub fn missing_required(&self) -> Vec<&'static str> {
        Field::REQUIRED
            .iter()
            .filter(|f| !self.contains(**f))
            .map(|f| f.column())
            .collect()
    }
}

impl ForecastRecord {
    /// Build a new row from a complete field set plus structural defaults.
    pub fn create(
        location_id: Uuid,
        date: NaiveDate,
        fields: &ForecastFields,
    ) -> Result<Self, StoreError> {
        let missing = fields.missing_required();
        if !missing.is_empty() {
            return Err(StoreError::MissingRequired(missing));
        }

        let now = Utc::now();
        let mut record = Self {
            id: Uuid::new_v4(),
            location_id,
            date,
            current_temp: Decimal::ZERO,
            condition_summary: String::new(),
            max_temp: Decimal::ZERO,
            min_temp: Decimal::ZERO,
            feels_like_temp: Decimal::ZERO,
            humidity: 0,
            precipitation_prob: 0,
            wind_speed: Decimal::ZERO,
            wind_direction: String::new(),
            visibility: Decimal::ZERO,
            pressure: Decimal::ZERO,
            uv_index: DEFAULT_INDEX_LABEL.to_string(),
            air_quality: DEFAULT_INDEX_LABEL.to_string(),
            dew_point: Decimal::ZERO,
            clouds: Decimal::ZERO,
            sunrise: default_sunrise(),
            sunset: default_sunset(),
            summary: None,
            co_surface_conc: None,
            total_precip_rate: None,
            specific_humidity_pred: None,
            skin_temperature: None,
            avg_wind_speed_10m: None,
            surface_pressure_pred: None,
            cloud_area_pred: None,
            frozen_precip: None,
            snowfall_pred: None,
            dust_concentration: None,
            so2_concentration: None,
            no2_concentration: None,
            o3_concentration: None,
            potential_vorticity: None,
            created_at: now,
            updated_at: now,
        };
        record.apply(fields);
        Ok(record)
    }

    /// Overwrite the columns present in `fields`, leaving the rest untouched.
    pub fn apply(&mut self, fields: &ForecastFields) {
        for (field, value) in &fields.values {
            match (field, value) {
                (Field::ConditionSummary, FieldValue::Text(s)) => {
                    self.condition_summary = s.clone()
                }
                (Field::WindDirection, FieldValue::Text(s)) => self.wind_direction = s.clone(),
                (Field::UvIndex, FieldValue::Text(s)) => self.uv_index = s.clone(),
                (Field::Humidity, FieldValue::Integer(i)) => self.humidity = *i,
                (Field::PrecipitationProb, FieldValue::Integer(i)) => {
                    self.precipitation_prob = *i
                }
                (Field::CurrentTemp, FieldValue::Decimal(d)) => self.current_temp = *d,
                (Field::MaxTemp, FieldValue::Decimal(d)) => self.max_temp = *d,
                (Field::MinTemp, FieldValue::Decimal(d)) => self.min_temp = *d,
                (Field::FeelsLikeTemp, FieldValue::Decimal(d)) => self.feels_like_temp = *d,
                (Field::WindSpeed, FieldValue::Decimal(d)) => self.wind_speed = *d,
                (Field::Visibility, FieldValue::Decimal(d)) => self.visibility = *d,
                (Field::Pressure, FieldValue::Decimal(d)) => self.pressure = *d,
                (Field::DewPoint, FieldValue::Decimal(d)) => self.dew_point = *d,
                (Field::Clouds, FieldValue::Decimal(d)) => self.clouds = *d,
                (Field::CoSurfaceConc, FieldValue::Decimal(d)) => self.co_surface_conc = Some(*d),
                (Field::TotalPrecipRate, FieldValue::Decimal(d)) => {
                    self.total_precip_rate = Some(*d)
                }
                (Field::SpecificHumidityPred, FieldValue::Decimal(d)) => {
                    self.specific_humidity_pred = Some(*d)
                }
                (Field::SkinTemperature, FieldValue::Decimal(d)) => {
                    self.skin_temperature = Some(*d)
                }
                (Field::AvgWindSpeed10m, FieldValue::Decimal(d)) => {
                    self.avg_wind_speed_10m = Some(*d)
                }
                (Field::SurfacePressurePred, FieldValue::Decimal(d)) => {
                    self.surface_pressure_pred = Some(*d)
                }
                (Field::CloudAreaPred, FieldValue::Decimal(d)) => self.cloud_area_pred = Some(*d),
                (Field::FrozenPrecip, FieldValue::Decimal(d)) => self.frozen_precip = Some(*d),
                (Field::SnowfallPred, FieldValue::Decimal(d)) => self.snowfall_pred = Some(*d),
                (Field::DustConcentration, FieldValue::Decimal(d)) => {
                    self.dust_concentration = Some(*d)
                }
                (Field::So2Concentration, FieldValue::Decimal(d)) => {
                    self.so2_concentration = Some(*d)
                }
                (Field::No2Concentration, FieldValue::Decimal(d)) => {
                    self.no2_concentration = Some(*d)
                }
                (Field::O3Concentration, FieldValue::Decimal(d)) => {
                    self.o3_concentration = Some(*d)
                }
                (Field::PotentialVorticity, FieldValue::Decimal(d)) => {
                    self.potential_vorticity = Some(*d)
                }
                (field, value) => {
                    tracing::warn!(
                        "Ignoring value {:?} of the wrong type for column {}",
                        value,
                        field.column()
                    );
                    continue;
                }
            }
        }
        self.updated_at = Utc::now();
    }
}

pub fn default_sunrise() -> NaiveTime {
    NaiveTime::from_hms_opt(6, 0, 0).unwrap_or(NaiveTime::MIN)
}

pub fn default_sunset() -> NaiveTime {
    NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN)
}
