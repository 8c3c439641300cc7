use crate::models::{AlertEvent, Appliance, ConsumptionSample};
use chrono::Utc;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::time::Instant;

const ALERT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct ApplianceState {
    samples: Vec<ConsumptionSample>,
    running_total: f64,
    active: bool,
    started: Option<Instant>,
    ended: Option<Instant>,
    alert_raised: bool,
}

/// Everything materialization needs from a closed session
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub samples: Vec<ConsumptionSample>,
    pub started: Option<Instant>,
    pub ended: Option<Instant>,
}

impl SessionSnapshot {
    /// Sum of the buffered sample values. Records are built from this, not the running total.
    pub fn total_consumption(&self) -> f64 {
        self.samples.iter().fold(0.0, |acc, s| acc + s.consumption)
    }

    pub fn duration_seconds(&self) -> f64 {
        match (self.started, self.ended) {
            (Some(start), Some(end)) => end.saturating_duration_since(start).as_secs_f64(),
            _ => 0.0,
        }
    }
}

/// Shared per-appliance monitoring state behind one lock.
///
/// Samplers and the session controller hold it through an `Arc`; every
/// mutation goes through the methods below.
pub struct AggregationStore {
    state: Mutex<[ApplianceState; 3]>,
    alert_threshold_kw: f64,
    alerts: broadcast::Sender<AlertEvent>,
}

impl AggregationStore {
    pub fn new(alert_threshold_kw: f64) -> Self {
        let (alerts, _) = broadcast::channel(ALERT_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(Default::default()),
            alert_threshold_kw,
            alerts,
        }
    }

    fn lock(&self) -> MutexGuard<'_, [ApplianceState; 3]> {
        // Every critical section leaves the state consistent, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a sample and fold it into the running total.
    pub fn record_sample(&self, appliance: Appliance, value: f64) {
        let mut state = self.lock();
        self.push_sample(&mut state[appliance.index()], appliance, value);
    }

    /// Like `record_sample`, but drops the value when the session has already closed.
    pub fn record_sample_if_active(&self, appliance: Appliance, value: f64) -> bool {
        let mut state = self.lock();
        let entry = &mut state[appliance.index()];
        if !entry.active {
            log::debug!("Discarding late sample {value:.3} kW for inactive {appliance}");
            return false;
        }
        self.push_sample(entry, appliance, value);
        true
    }

    fn push_sample(&self, entry: &mut ApplianceState, appliance: Appliance, value: f64) {
        let value = value.max(0.0);
        entry.samples.push(ConsumptionSample::now(value));
        entry.running_total += value;
        log::debug!(
            "{appliance}: sample {value:.3} kW, running total {:.3} kW",
            entry.running_total
        );

        if entry.running_total >= self.alert_threshold_kw && !entry.alert_raised {
            entry.alert_raised = true;
            log::warn!(
                "{appliance} reached {:.2} kW (threshold {:.2} kW)",
                entry.running_total,
                self.alert_threshold_kw
            );
            // No subscribers is fine; the flag stays observable.
            let _ = self.alerts.send(AlertEvent {
                appliance,
                running_total_kw: entry.running_total,
                threshold_kw: self.alert_threshold_kw,
                raised_at: Utc::now(),
            });
        }
    }

    pub fn running_total(&self, appliance: Appliance) -> f64 {
        self.lock()[appliance.index()].running_total
    }

    /// Most recent sample, or a zero reading stamped now when nothing is buffered.
    pub fn latest_sample(&self, appliance: Appliance) -> ConsumptionSample {
        self.lock()[appliance.index()]
            .samples
            .last()
            .copied()
            .unwrap_or_else(|| ConsumptionSample::now(0.0))
    }

    pub fn samples(&self, appliance: Appliance) -> Vec<ConsumptionSample> {
        self.lock()[appliance.index()].samples.clone()
    }

    /// Drop buffered samples and reset the running total and alert flag.
    pub fn clear_samples(&self, appliance: Appliance) {
        let mut state = self.lock();
        let entry = &mut state[appliance.index()];
        entry.samples.clear();
        entry.running_total = 0.0;
        entry.alert_raised = false;
    }

    /// Set the session flag and return its previous value.
    ///
    /// Activating stamps a fresh start instant; deactivating an active
    /// session stamps the end instant. Repeating either is a no-op.
    pub fn set_session_active(&self, appliance: Appliance, active: bool) -> bool {
        let mut state = self.lock();
        let entry = &mut state[appliance.index()];
        let was_active = entry.active;
        match (was_active, active) {
            (false, true) => {
                entry.active = true;
                entry.started = Some(Instant::now());
                entry.ended = None;
            }
            (true, false) => {
                entry.active = false;
                entry.ended = Some(Instant::now());
            }
            _ => {}
        }
        was_active
    }

    pub fn is_session_active(&self, appliance: Appliance) -> bool {
        self.lock()[appliance.index()].active
    }

    /// A closed session whose record has not been written yet.
    pub fn has_pending_record(&self, appliance: Appliance) -> bool {
        let state = self.lock();
        let entry = &state[appliance.index()];
        !entry.active && entry.ended.is_some()
    }

    pub fn snapshot(&self, appliance: Appliance) -> SessionSnapshot {
        let state = self.lock();
        let entry = &state[appliance.index()];
        SessionSnapshot {
            samples: entry.samples.clone(),
            started: entry.started,
            ended: entry.ended,
        }
    }

    /// Called once the session's record is durable.
    pub fn finish_session(&self, appliance: Appliance) {
        let mut state = self.lock();
        let entry = &mut state[appliance.index()];
        entry.samples.clear();
        entry.running_total = 0.0;
        entry.alert_raised = false;
        entry.started = None;
        entry.ended = None;
    }

    pub fn alert_raised(&self, appliance: Appliance) -> bool {
        self.lock()[appliance.index()].alert_raised
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<AlertEvent> {
        self.alerts.subscribe()
    }
}
