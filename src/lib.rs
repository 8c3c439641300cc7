//! Per-appliance electricity monitoring.
//!
//! Samplers feed a shared [`AggregationStore`](services::aggregation::AggregationStore);
//! stopping a session folds its samples into a [`DailyRecord`](models::DailyRecord)
//! on the CSV ledger, which the forecaster and monthly bill read back.

pub mod error;
pub mod models;
pub mod monitor;
pub mod services;

pub use error::{MonitorError, Result};
pub use monitor::EnergyMonitor;
