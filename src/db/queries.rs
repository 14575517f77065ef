use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row};
use uuid::Uuid;

use super::models::{Field, FieldKind, ForecastFields, ForecastRecord, Location, NewLocation};
use super::ForecastStore;
use crate::errors::StoreError;

const LOCATION_COLUMNS: &str =
    "id, city, state_province, country, latitude, longitude, created_at";

const FORECAST_COLUMNS: &str = "id, location_id, date,
    current_temp, condition_summary, max_temp, min_temp, feels_like_temp,
    humidity, precipitation_prob, wind_speed, wind_direction, visibility, pressure,
    uv_index, air_quality, dew_point, clouds, sunrise, sunset, summary,
    co_surface_conc, total_precip_rate, specific_humidity_pred, skin_temperature,
    avg_wind_speed_10m, surface_pressure_pred, cloud_area_pred, frozen_precip,
    snowfall_pred, dust_concentration, so2_concentration, no2_concentration,
    o3_concentration, potential_vorticity, created_at, updated_at";

/// Postgres-backed [`ForecastStore`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `UPDATE` that overwrites only the columns bound non-null ($3..).
fn update_forecast_sql() -> String {
    let assignments: Vec<String> = Field::ALL
        .iter()
        .enumerate()
        .map(|(i, f)| format!("{col} = COALESCE(${n}, {col})", col = f.column(), n = i + 3))
        .collect();
    format!(
        "UPDATE daily_forecasts SET {}, updated_at = NOW()
         WHERE location_id = $1 AND date = $2
         RETURNING {}, false AS created",
        assignments.join(", "),
        FORECAST_COLUMNS
    )
}

/// `INSERT` for a new row. Structural defaults (uv_index, air_quality,
/// sunrise, sunset) come from the column defaults when not bound. A concurrent
/// writer that inserted the same key first is overwritten column by column.
fn insert_forecast_sql() -> String {
    let columns: Vec<&str> = Field::ALL.iter().map(|f| f.column()).collect();
    let placeholders: Vec<String> = Field::ALL
        .iter()
        .enumerate()
        .map(|(i, f)| match f {
            // NOT NULL with a column default: fall back to it when unbound.
            Field::UvIndex => format!("COALESCE(${}, 'Low 0')", i + 4),
            _ => format!("${}", i + 4),
        })
        .collect();
    let conflict_updates: Vec<String> = Field::ALL
        .iter()
        .enumerate()
        .map(|(i, f)| match f {
            // EXCLUDED already carries the default; use the raw parameter.
            Field::UvIndex => format!(
                "{col} = COALESCE(${n}, daily_forecasts.{col})",
                col = f.column(),
                n = i + 4
            ),
            _ => format!(
                "{col} = COALESCE(EXCLUDED.{col}, daily_forecasts.{col})",
                col = f.column()
            ),
        })
        .collect();
    format!(
        "INSERT INTO daily_forecasts (id, location_id, date, {}, created_at, updated_at)
         VALUES ($1, $2, $3, {}, NOW(), NOW())
         ON CONFLICT (location_id, date) DO UPDATE SET {}, updated_at = NOW()
         RETURNING {}, (xmax = 0) AS created",
        columns.join(", "),
        placeholders.join(", "),
        conflict_updates.join(", "),
        FORECAST_COLUMNS
    )
}

/// Bind every writable column in `Field::ALL` order, as NULL when unset.
fn bind_fields<'q>(
    mut query: sqlx::query::Query<'q, Postgres, PgArguments>,
    fields: &ForecastFields,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    for field in Field::ALL {
        query = match field.kind() {
            FieldKind::Decimal { .. } => query.bind(fields.decimal(field)),
            FieldKind::Percent => query.bind(fields.integer(field)),
            FieldKind::UvLabel | FieldKind::Text => {
                query.bind(fields.text(field).map(str::to_string))
            }
        };
    }
    query
}

fn record_from_row(row: &PgRow) -> Result<(ForecastRecord, bool), StoreError> {
    let record = ForecastRecord::from_row(row)?;
    let created: bool = row.try_get("created")?;
    Ok((record, created))
}

impl ForecastStore for PgStore {
    async fn find_locations_near(
        &self,
        latitude: Decimal,
        longitude: Decimal,
        tolerance: Decimal,
    ) -> Result<Vec<Location>, StoreError> {
        let locations = sqlx::query_as::<_, Location>(&format!(
            "SELECT {LOCATION_COLUMNS}
             FROM locations
             WHERE latitude BETWEEN $1 - $3 AND $1 + $3
               AND longitude BETWEEN $2 - $3 AND $2 + $3
             ORDER BY created_at, id"
        ))
        .bind(latitude)
        .bind(longitude)
        .bind(tolerance)
        .fetch_all(&self.pool)
        .await?;
        Ok(locations)
    }

    async fn create_location(&self, location: NewLocation) -> Result<Location, StoreError> {
        // The no-op DO UPDATE makes RETURNING yield the existing row on an
        // exact-coordinate collision.
        let created = sqlx::query_as::<_, Location>(&format!(
            "INSERT INTO locations ({LOCATION_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, NOW())
             ON CONFLICT (latitude, longitude) DO UPDATE SET latitude = EXCLUDED.latitude
             RETURNING {LOCATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&location.city)
        .bind(&location.state_province)
        .bind(&location.country)
        .bind(location.latitude)
        .bind(location.longitude)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn list_locations(&self) -> Result<Vec<Location>, StoreError> {
        let locations = sqlx::query_as::<_, Location>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(locations)
    }

    async fn upsert_forecast(
        &self,
        location: &Location,
        date: NaiveDate,
        fields: &ForecastFields,
    ) -> Result<(ForecastRecord, bool), StoreError> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM daily_forecasts
             WHERE location_id = $1 AND date = $2
             FOR UPDATE",
        )
        .bind(location.id)
        .bind(date)
        .fetch_optional(&mut *tx)
        .await?;

        let row = if existing.is_some() {
            let sql = update_forecast_sql();
            let query = sqlx::query(&sql).bind(location.id).bind(date);
            bind_fields(query, fields).fetch_one(&mut *tx).await?
        } else {
            let missing = fields.missing_required();
            if !missing.is_empty() {
                return Err(StoreError::MissingRequired(missing));
            }
            let sql = insert_forecast_sql();
            let query = sqlx::query(&sql)
                .bind(Uuid::new_v4())
                .bind(location.id)
                .bind(date);
            bind_fields(query, fields).fetch_one(&mut *tx).await?
        };

        let result = record_from_row(&row)?;
        tx.commit().await?;
        Ok(result)
    }
}
