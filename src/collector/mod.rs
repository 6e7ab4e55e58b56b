//! Collection engine.
//!
//! A [`Collector`] owns the resolved device list and one [`StatusSource`].
//! It runs in one of two modes:
//!
//! - **push**: [`Collector::start`] spawns one [`Scheduler`] per device, each
//!   writing into a shared [`PushSink`] on its own interval.
//! - **pull**: the collector is registered with a [`Registry`] and
//!   [`Collector::collect_round`] runs once per scrape, fanning out to every
//!   device concurrently and reporting through the scrape's [`Observer`].
//!
//! [`Registry`]: plugwatch_sdk::Registry

mod counter;
mod round;
mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use plugwatch_adapters::StatusSource;
use plugwatch_sdk::{Collect, CollectError, Observer, PushSink};
use plugwatch_types::DeviceConfig;
use tokio::sync::watch;
use tracing::{info, warn};

pub use counter::CounterDeltas;
pub use round::{DeviceFailure, FailureCause, RoundError};
pub use scheduler::{Scheduler, SchedulerHandle, SchedulerState, TickStats};

/// Polls a fixed set of devices through one status source.
pub struct Collector {
    devices: Vec<Arc<DeviceConfig>>,
    source: Arc<dyn StatusSource>,
}

impl Collector {
    pub fn new(devices: Vec<DeviceConfig>, source: Arc<dyn StatusSource>) -> Self {
        Self {
            devices: devices.into_iter().map(Arc::new).collect(),
            source,
        }
    }

    pub fn devices(&self) -> impl Iterator<Item = &DeviceConfig> {
        self.devices.iter().map(|d| d.as_ref())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Spawn one scheduler per device. They all stop on the same signal.
    pub fn start(
        &self,
        sink: Arc<dyn PushSink>,
        stop: watch::Receiver<bool>,
    ) -> Vec<SchedulerHandle> {
        self.devices
            .iter()
            .map(|device| {
                Scheduler::new(Arc::clone(device), Arc::clone(&self.source), Arc::clone(&sink))
                    .spawn(stop.clone())
            })
            .collect()
    }

    /// Start every scheduler and wait until all of them have stopped.
    pub async fn run(
        &self,
        sink: Arc<dyn PushSink>,
        stop: watch::Receiver<bool>,
    ) -> Vec<TickStats> {
        let handles = self.start(sink, stop);
        info!(devices = handles.len(), "schedulers started");

        let mut stats = Vec::with_capacity(handles.len());
        for handle in handles {
            let device = handle.device().to_string();
            match handle.join().await {
                Ok(s) => stats.push(s),
                Err(err) => warn!(device = %device, error = %err, "scheduler task failed"),
            }
        }

        info!(devices = stats.len(), "schedulers stopped");
        stats
    }
}

#[async_trait]
impl Collect for Collector {
    async fn collect(
        &self,
        observer: Arc<dyn Observer>,
        deadline: Option<Instant>,
    ) -> Result<(), CollectError> {
        self.collect_round(observer, deadline)
            .await
            .map(|_| ())
            .map_err(|e| Box::new(e) as CollectError)
    }
}
