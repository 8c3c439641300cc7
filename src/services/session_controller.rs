use super::aggregation::AggregationStore;
use super::ledger::DailyLedger;
use super::sampler::{Sampler, SamplerHandle};
use crate::error::Result;
use crate::models::{Appliance, DailyRecord, SessionStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Starts and stops per-appliance monitoring sessions.
///
/// Control calls are serialized: a `start` never runs while a `stop` is
/// still materializing the previous session.
pub struct SessionController {
    store: Arc<AggregationStore>,
    ledger: Arc<DailyLedger>,
    sampler: Sampler,
    samplers: Mutex<HashMap<Appliance, SamplerHandle>>,
}

impl SessionController {
    pub fn new(store: Arc<AggregationStore>, ledger: Arc<DailyLedger>, sampler: Sampler) -> Self {
        Self {
            store,
            ledger,
            sampler,
            samplers: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<AggregationStore> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<DailyLedger> {
        &self.ledger
    }

    /// Begin monitoring; a second start on an active session changes nothing.
    pub async fn start(&self, appliance: Appliance) -> Result<SessionStatus> {
        let mut samplers = self.samplers.lock().await;

        if self.store.is_session_active(appliance) {
            log::debug!("{appliance} is already being monitored");
            return Ok(SessionStatus::MonitoringStarted);
        }

        // A previous stop could not persist its record; finish it before reusing the buffer.
        if self.store.has_pending_record(appliance) {
            self.ledger.materialize(&self.store, appliance).await?;
        }

        // An old task must be gone before the buffer opens, or its last reading lands here.
        if let Some(stale) = samplers.remove(&appliance) {
            stale.shutdown().await;
        }
        self.store.set_session_active(appliance, true);
        samplers.insert(appliance, self.sampler.spawn(appliance));

        log::info!("Started monitoring {appliance}");
        Ok(SessionStatus::MonitoringStarted)
    }

    /// End monitoring and synchronously write the session's record.
    ///
    /// Returns `None` when there was nothing to stop. If the record cannot be
    /// persisted the samples stay buffered and the next `stop` retries.
    pub async fn stop(&self, appliance: Appliance) -> Result<Option<DailyRecord>> {
        let mut samplers = self.samplers.lock().await;

        let was_active = self.store.set_session_active(appliance, false);
        if let Some(handle) = samplers.remove(&appliance) {
            handle.shutdown().await;
        }

        if !was_active && !self.store.has_pending_record(appliance) {
            return Ok(None);
        }

        let record = self.ledger.materialize(&self.store, appliance).await?;
        log::info!("Stopped monitoring {appliance}");
        Ok(Some(record))
    }

    /// Stop every appliance, continuing past failures and reporting the first one.
    pub async fn stop_all(&self) -> Result<Vec<DailyRecord>> {
        let mut records = Vec::new();
        let mut first_error = None;

        for appliance in Appliance::ALL {
            match self.stop(appliance).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => {
                    log::error!("Failed to stop {appliance}: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(records),
        }
    }

    pub fn active_appliances(&self) -> Vec<Appliance> {
        Appliance::ALL
            .into_iter()
            .filter(|appliance| self.store.is_session_active(*appliance))
            .collect()
    }
}
