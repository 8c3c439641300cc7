use crate::error::Result;
use crate::models::*;
use crate::services::aggregation::AggregationStore;
use crate::services::archive::ArchiveStore;
use crate::services::billing::monthly_bill;
use crate::services::forecaster::Forecaster;
use crate::services::ledger::DailyLedger;
use crate::services::sampler::{Sampler, UniformSampleSource};
use crate::services::session_controller::SessionController;
use crate::services::{AnalyticsService, SampleSource};
use chrono::Local;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Entry point for request handlers and the CLI.
///
/// Appliances arrive as names and are rejected with `InvalidAppliance` when
/// they are not part of the known set.
pub struct EnergyMonitor {
    config: MonitorConfig,
    controller: SessionController,
    forecaster: Forecaster,
}

impl EnergyMonitor {
    /// Open the ledgers under `data_dir` and sample with the simulated meter.
    pub async fn open(data_dir: &Path, config: MonitorConfig) -> Result<Self> {
        let source = Arc::new(UniformSampleSource::new(
            config.sample_min_kw,
            config.sample_max_kw,
        ));
        Self::with_source(data_dir, config, source).await
    }

    pub async fn with_source(
        data_dir: &Path,
        config: MonitorConfig,
        source: Arc<dyn SampleSource>,
    ) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(AggregationStore::new(config.alert_threshold_kw));
        let archive = ArchiveStore::new(config.archive_path(data_dir));
        let ledger =
            DailyLedger::open(config.daily_path(data_dir), archive, config.rate_per_kwh).await?;
        let sampler = Sampler::new(store.clone(), source, config.sample_interval());

        Ok(Self {
            forecaster: Forecaster::new(config.rate_per_kwh),
            controller: SessionController::new(store, Arc::new(ledger), sampler),
            config,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub async fn start_session(&self, appliance: &str) -> Result<SessionStatus> {
        self.controller.start(appliance.parse()?).await
    }

    pub async fn stop_session(&self, appliance: &str) -> Result<SessionStatus> {
        self.controller.stop(appliance.parse()?).await?;
        Ok(SessionStatus::MonitoringStopped)
    }

    pub async fn stop_all_sessions(&self) -> Result<SessionStatus> {
        self.controller.stop_all().await?;
        Ok(SessionStatus::AllAppliancesStopped)
    }

    pub fn latest_sample(&self, appliance: &str) -> Result<ConsumptionSample> {
        Ok(self.controller.store().latest_sample(appliance.parse()?))
    }

    pub fn alert_raised(&self, appliance: &str) -> Result<bool> {
        Ok(self.controller.store().alert_raised(appliance.parse()?))
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<AlertEvent> {
        self.controller.store().subscribe_alerts()
    }

    /// `None` when the ledger holds no records.
    pub async fn daily_records(&self) -> Option<Vec<DailyRecord>> {
        let records = self.controller.ledger().records().await;
        (!records.is_empty()).then_some(records)
    }

    /// `None` when nothing has ever been archived.
    pub async fn archived_records(&self) -> Result<Option<Vec<DailyRecord>>> {
        self.controller.ledger().archive().read_all().await
    }

    pub async fn forecast_next_day(&self) -> Result<Forecast> {
        let records = self.controller.ledger().records().await;
        self.forecaster.forecast_next_day(&records)
    }

    pub async fn forecast_next_month(&self) -> Result<Forecast> {
        let records = self.controller.ledger().records().await;
        self.forecaster.forecast_next_month(&records)
    }

    pub async fn monthly_bill(&self) -> Option<MonthlyBill> {
        let records = self.controller.ledger().records().await;
        monthly_bill(&records, Local::now().date_naive())
    }

    /// Archive the daily ledger and start a fresh one.
    pub async fn reset_data(&self) -> Result<usize> {
        self.controller.ledger().reset_all().await
    }
}
