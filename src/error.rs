use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MonitorError>;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Invalid appliance: {0}")]
    InvalidAppliance(String),
    #[error("Not enough data for prediction: need {required} days, have {available}")]
    InsufficientData { required: usize, available: usize },
    #[error("Prediction error: {0}")]
    PredictionError(String),
    #[error("Storage unavailable at {}: {source}", path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MonitorError {
    pub fn storage(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        MonitorError::StorageUnavailable {
            path: path.into(),
            source: source.into(),
        }
    }
}
