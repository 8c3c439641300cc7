pub mod aggregation;
pub mod archive;
pub mod billing;
pub mod forecaster;
pub mod ledger;
pub mod sampler;
pub mod session_controller;
pub mod tabular;

use crate::error::Result;
use crate::models::*;

/// Source of consumption readings for the sampler
pub trait SampleSource: Send + Sync {
    /// Next reading in kW, or `None` to skip this interval.
    fn next_sample(&self, appliance: Appliance) -> Option<f64>;
}

/// Service for managing monitor configuration
pub trait ConfigService {
    fn load_config(&self) -> Result<MonitorConfig>;
    fn save_config(&self, config: &MonitorConfig) -> Result<()>;
    fn get_config_path(&self) -> Result<std::path::PathBuf>;
}

/// Service for consumption forecasts
pub trait AnalyticsService {
    fn forecast_next_day(&self, records: &[DailyRecord]) -> Result<Forecast>;
    fn forecast_next_month(&self, records: &[DailyRecord]) -> Result<Forecast>;
}
