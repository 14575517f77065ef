use crate::services::prediction::PredictionError;
use crate::services::reconcile::ReconcileError;

/// Errors raised at the storage boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A new forecast row would leave required columns unset.
    #[error("Missing required forecast fields: {}", .0.join(", "))]
    MissingRequired(Vec<&'static str>),

    /// Coordinates that cannot identify a stored location.
    #[error("Invalid coordinates: ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
}

/// Top-level error for the end-to-end predict-and-store operation.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => AppError::DatabaseError(e),
            StoreError::MissingRequired(fields) => {
                AppError::Validation(format!("missing required fields: {}", fields.join(", ")))
            }
            e @ StoreError::InvalidCoordinates { .. } => AppError::BadRequest(e.to_string()),
        }
    }
}

impl From<PredictionError> for AppError {
    fn from(err: PredictionError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::MissingBaseTemperature => AppError::Validation(err.to_string()),
            ReconcileError::Store(e) => e.into(),
        }
    }
}
