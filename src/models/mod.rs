pub mod config;

pub use config::{FileConfigService, MonitorConfig};

use crate::error::MonitorError;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Appliances the monitor knows about. The set is closed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Appliance {
    AirConditioner,
    WashingMachine,
    Refrigerator,
}

impl Appliance {
    pub const ALL: [Appliance; 3] = [
        Appliance::AirConditioner,
        Appliance::WashingMachine,
        Appliance::Refrigerator,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Appliance::AirConditioner => "AirConditioner",
            Appliance::WashingMachine => "WashingMachine",
            Appliance::Refrigerator => "Refrigerator",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Appliance::AirConditioner => 0,
            Appliance::WashingMachine => 1,
            Appliance::Refrigerator => 2,
        }
    }
}

impl fmt::Display for Appliance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Appliance {
    type Err = MonitorError;

    /// Accepts `AirConditioner`, `airconditioner`, `air_conditioner` and `air-conditioner`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && *c != ' ')
            .flat_map(|c| c.to_lowercase())
            .collect();

        Appliance::ALL
            .into_iter()
            .find(|appliance| appliance.name().to_lowercase() == normalized)
            .ok_or_else(|| MonitorError::InvalidAppliance(s.to_string()))
    }
}

/// A single consumption reading in kW
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionSample {
    pub timestamp: DateTime<Utc>,
    pub consumption: f64,
}

impl ConsumptionSample {
    pub fn now(consumption: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            consumption,
        }
    }
}

/// One finalized billing entry, produced when a monitoring session stops.
///
/// Field names on disk match the ledger's CSV header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Time")]
    pub time: NaiveTime,
    #[serde(rename = "Appliance")]
    pub appliance: Appliance,
    #[serde(rename = "TotalConsumptionKW")]
    pub total_consumption_kw: f64,
    #[serde(rename = "CostINR")]
    pub cost: f64,
    #[serde(rename = "TotalTimeSeconds")]
    pub total_time_seconds: f64,
}

/// Raised once when an appliance's running total reaches the alert threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub appliance: Appliance,
    pub running_total_kw: f64,
    pub threshold_kw: f64,
    pub raised_at: DateTime<Utc>,
}

/// Projected consumption and its cost
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub forecast_consumption: f64,
    pub forecast_cost: f64,
}

/// Outcome of a session control call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    MonitoringStarted,
    MonitoringStopped,
    AllAppliancesStopped,
}

impl SessionStatus {
    pub fn message(&self) -> &'static str {
        match self {
            SessionStatus::MonitoringStarted => "Monitoring started",
            SessionStatus::MonitoringStopped => "Monitoring stopped",
            SessionStatus::AllAppliancesStopped => "All appliances stopped",
        }
    }
}

/// Per-appliance line of the monthly bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillLine {
    pub appliance: Appliance,
    pub total_consumption_kw: f64,
    pub cost: f64,
    pub total_time_seconds: f64,
    pub average_consumption_kw: f64,
}

/// Monthly bill summary over the current daily ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBill {
    pub lines: Vec<BillLine>,
    pub total_consumption_kw: f64,
    pub total_cost: f64,
    pub total_time_seconds: f64,
    /// Mean of the per-appliance averages
    pub average_consumption_kw: f64,
    pub current_date: NaiveDate,
}
