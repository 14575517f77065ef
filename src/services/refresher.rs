//! Background refresh of stored forecasts.
//!
//! Every cycle re-predicts today plus the following `horizon_days - 1` days
//! for each stored location and reconciles the results, so forecasts pick up
//! newly deployed models without anyone calling `predict_and_store`.
//!
//! State is in-memory (`Arc<RwLock<RefresherState>>`) and resets on restart.

use chrono::{DateTime, Days, NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::db::ForecastStore;
use crate::errors::StoreError;
use crate::services::forecast::refresh_location;
use crate::services::model_bank::ModelBank;

/// Lower bound on the sleep between cycles (seconds).
const REFRESHER_MIN_INTERVAL_SECS: u64 = 60;

/// Sleep after the location listing itself failed (seconds).
const REFRESHER_ERROR_RETRY_SECS: u64 = 60;

/// Counts for one refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub locations: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct RefresherState {
    pub last_cycle_completed_at: Option<DateTime<Utc>>,
    pub last_cycle_duration_ms: Option<u64>,
    pub total_cycles: u64,
    pub last_cycle: CycleSummary,
}

impl RefresherState {
    pub fn new() -> Self {
        Self {
            last_cycle_completed_at: None,
            last_cycle_duration_ms: None,
            total_cycles: 0,
            last_cycle: CycleSummary::default(),
        }
    }
}

impl Default for RefresherState {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedRefresherState = Arc<RwLock<RefresherState>>;

/// `today` and the following days, `horizon_days` dates in total.
pub fn forecast_dates(today: NaiveDate, horizon_days: u32) -> Vec<NaiveDate> {
    (0..u64::from(horizon_days))
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .collect()
}

/// Refresh every stored location for each of `dates`.
///
/// Per-forecast failures are logged and counted; only a failure to list the
/// locations aborts the cycle.
pub async fn refresh_all<S: ForecastStore>(
    store: &S,
    bank: &ModelBank,
    dates: &[NaiveDate],
) -> Result<CycleSummary, StoreError> {
    let locations = store.list_locations().await?;
    let mut summary = CycleSummary {
        locations: locations.len(),
        ..CycleSummary::default()
    };

    for location in &locations {
        let refreshes = dates
            .iter()
            .map(|date| refresh_location(store, bank, location, *date));
        let results = futures::future::join_all(refreshes).await;

        for (date, result) in dates.iter().zip(results) {
            match result {
                Ok((_, true)) => summary.created += 1,
                Ok((_, false)) => summary.updated += 1,
                Err(e) => {
                    tracing::warn!(
                        "Refresher: failed to refresh {} ({}) for {}: {}",
                        location.city,
                        location.id,
                        date,
                        e
                    );
                    summary.failed += 1;
                }
            }
        }
    }

    Ok(summary)
}

/// Run one cycle and publish its outcome to `state`.
pub async fn run_cycle<S: ForecastStore>(
    store: &S,
    bank: &ModelBank,
    horizon_days: u32,
    state: &SharedRefresherState,
) -> Result<CycleSummary, StoreError> {
    let cycle_start = Utc::now();
    let dates = forecast_dates(cycle_start.date_naive(), horizon_days);
    let summary = refresh_all(store, bank, &dates).await?;
    let duration_ms = (Utc::now() - cycle_start).num_milliseconds().max(0) as u64;

    {
        let mut s = state.write().await;
        s.last_cycle = summary.clone();
        s.last_cycle_completed_at = Some(Utc::now());
        s.last_cycle_duration_ms = Some(duration_ms);
        s.total_cycles += 1;
    }

    tracing::info!(
        "Refresher: cycle complete in {}ms ({} locations, {} created, {} updated, {} failed)",
        duration_ms,
        summary.locations,
        summary.created,
        summary.updated,
        summary.failed
    );
    Ok(summary)
}

/// Run the refresher until process exit.
///
/// Should be spawned via `tokio::spawn(run_refresher(...))`.
pub async fn run_refresher<S: ForecastStore + 'static>(
    store: Arc<S>,
    bank: Arc<ModelBank>,
    horizon_days: u32,
    interval_secs: u64,
    state: SharedRefresherState,
) {
    let interval_secs = interval_secs.max(REFRESHER_MIN_INTERVAL_SECS);
    tracing::info!(
        "Forecast refresher started ({} day horizon, every {}s)",
        horizon_days,
        interval_secs
    );

    loop {
        let sleep_duration = match run_cycle(store.as_ref(), &bank, horizon_days, &state).await {
            Ok(_) => interval_secs,
            Err(e) => {
                tracing::error!("Refresher: failed to list locations: {}", e);
                REFRESHER_ERROR_RETRY_SECS
            }
        };

        tracing::debug!(
            "Refresher: next cycle at {}",
            Utc::now() + chrono::Duration::seconds(sleep_duration as i64)
        );
        sleep_secs(sleep_duration).await;
    }
}

async fn sleep_secs(secs: u64) {
    tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
}
