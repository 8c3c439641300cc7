use super::aggregation::AggregationStore;
use super::SampleSource;
use crate::models::Appliance;
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Simulated meter: uniform readings in `[min_kw, max_kw)`
#[derive(Debug, Clone)]
pub struct UniformSampleSource {
    min_kw: f64,
    max_kw: f64,
}

impl UniformSampleSource {
    pub fn new(min_kw: f64, max_kw: f64) -> Self {
        Self { min_kw, max_kw }
    }
}

impl Default for UniformSampleSource {
    fn default() -> Self {
        Self::new(0.5, 2.0)
    }
}

impl SampleSource for UniformSampleSource {
    fn next_sample(&self, _appliance: Appliance) -> Option<f64> {
        Some(rand::thread_rng().gen_range(self.min_kw..self.max_kw))
    }
}

/// Replays fixed readings per appliance, then goes quiet.
#[derive(Debug, Default)]
pub struct ScriptedSampleSource {
    scripts: Mutex<HashMap<Appliance, VecDeque<f64>>>,
}

impl ScriptedSampleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(self, appliance: Appliance, values: impl IntoIterator<Item = f64>) -> Self {
        self.push_values(appliance, values);
        self
    }

    pub fn push_values(&self, appliance: Appliance, values: impl IntoIterator<Item = f64>) {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(appliance)
            .or_default()
            .extend(values);
    }
}

impl SampleSource for ScriptedSampleSource {
    fn next_sample(&self, appliance: Appliance) -> Option<f64> {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&appliance)
            .and_then(VecDeque::pop_front)
    }
}

/// Launches one sampling task per monitored appliance
#[derive(Clone)]
pub struct Sampler {
    store: Arc<AggregationStore>,
    source: Arc<dyn SampleSource>,
    interval: Duration,
}

impl Sampler {
    pub fn new(
        store: Arc<AggregationStore>,
        source: Arc<dyn SampleSource>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            source,
            interval,
        }
    }

    /// Start sampling `appliance` until its session closes or the handle is cancelled.
    pub fn spawn(&self, appliance: Appliance) -> SamplerHandle {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let sampler = self.clone();
        let task = tokio::spawn(async move {
            sampler.sampling_loop(appliance, cancel_rx).await;
        });
        SamplerHandle {
            appliance,
            cancel: cancel_tx,
            task,
        }
    }

    async fn sampling_loop(&self, appliance: Appliance, mut cancel: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::debug!("Sampler for {appliance} running every {:?}", self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                // Fires on cancel and when the handle is dropped.
                _ = cancel.changed() => break,
            }

            if *cancel.borrow() || !self.store.is_session_active(appliance) {
                break;
            }

            if let Some(value) = self.source.next_sample(appliance) {
                self.store.record_sample_if_active(appliance, value);
            }
        }
        log::debug!("Sampler for {appliance} stopped");
    }
}

/// Cancellation handle for a running sampler task
pub struct SamplerHandle {
    appliance: Appliance,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SamplerHandle {
    pub fn cancel(&self) {
        // Receiver gone means the task already exited.
        let _ = self.cancel.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel and wait for the task to exit.
    pub async fn shutdown(self) {
        self.cancel();
        if let Err(e) = self.task.await {
            log::error!("Sampler task for {} failed: {e}", self.appliance);
        }
    }
}
