use chrono::{DateTime, Utc};
use thiserror::Error;

use studio_client::ClientError;
use studio_common::StudioError;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error(transparent)]
    Input(#[from] StudioError),

    #[error(transparent)]
    Store(#[from] ClientError),

    #[error("Conflicting readings for {field} at {time}: {first} vs {second}")]
    PivotConflict {
        time: DateTime<Utc>,
        field: String,
        first: f64,
        second: f64,
    },

    #[error("Export error: {0}")]
    Export(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DashboardError {
    /// Whether the user can fix the failure by changing the selection
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            DashboardError::Input(StudioError::InvalidWindow { .. })
                | DashboardError::Input(StudioError::UnknownSensor(_))
        )
    }
}

pub type DashboardResult<T> = Result<T, DashboardError>;
