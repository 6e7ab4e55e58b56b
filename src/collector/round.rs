//! Pull-mode collection rounds.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use plugwatch_adapters::{normalize, FetchError};
use plugwatch_sdk::Observer;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::Collector;

/// Why one device contributed nothing to a round.
#[derive(Debug, Error)]
pub enum FailureCause {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("collection task failed: {0}")]
    Task(String),
}

/// A device that failed during a round.
#[derive(Debug)]
pub struct DeviceFailure {
    pub device: String,
    pub cause: FailureCause,
}

impl fmt::Display for DeviceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.device, self.cause)
    }
}

/// Every device failure of one round, joined into a single error.
///
/// `Display` renders one line per failed device, in completion order.
#[derive(Debug, Error)]
pub struct RoundError {
    pub failures: Vec<DeviceFailure>,
    /// Devices that were observed successfully in the same round.
    pub succeeded: usize,
}

impl RoundError {
    /// Whether `device` is among the failures.
    pub fn contains(&self, device: &str) -> bool {
        self.failures.iter().any(|f| f.device == device)
    }
}

impl fmt::Display for RoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

impl Collector {
    /// Fetch every device concurrently and report successes to `observer`.
    ///
    /// Each fetch is bounded by its device timeout, further capped by
    /// `deadline`, so the round lasts at most as long as the slowest device's
    /// budget. A failing device never cancels the others. Returns the number
    /// of devices observed, or the joined failures when any device failed.
    pub async fn collect_round(
        &self,
        observer: Arc<dyn Observer>,
        deadline: Option<Instant>,
    ) -> Result<usize, RoundError> {
        let started = Instant::now();
        let failures = Arc::new(Mutex::new(Vec::new()));
        let mut names = HashMap::with_capacity(self.devices.len());
        let mut tasks = JoinSet::new();

        for device in &self.devices {
            let device = Arc::clone(device);
            let source = Arc::clone(&self.source);
            let observer = Arc::clone(&observer);
            let failures = Arc::clone(&failures);
            let name = device.name.clone();

            let handle = tasks.spawn(async move {
                match source.fetch_status(&device, deadline).await {
                    Ok(status) => {
                        for observation in normalize(&device.name, &status) {
                            observer.record(&observation);
                        }
                        true
                    }
                    Err(err) => {
                        warn!(
                            device = %device.name,
                            address = %device.address,
                            kind = err.kind(),
                            error = %err,
                            "failed to get plug status"
                        );
                        failures.lock().push(DeviceFailure {
                            device: device.name.clone(),
                            cause: err.into(),
                        });
                        false
                    }
                }
            });
            names.insert(handle.id(), name);
        }

        let mut succeeded = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => succeeded += 1,
                Ok(false) => {}
                Err(err) => {
                    let device = names
                        .get(&err.id())
                        .cloned()
                        .unwrap_or_else(|| "<unknown>".to_string());
                    warn!(device = %device, error = %err, "collection task failed");
                    failures.lock().push(DeviceFailure {
                        device,
                        cause: FailureCause::Task(err.to_string()),
                    });
                }
            }
        }

        let failures = std::mem::take(&mut *failures.lock());
        debug!(
            devices = self.devices.len(),
            succeeded,
            failed = failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "collection round complete"
        );

        if failures.is_empty() {
            Ok(succeeded)
        } else {
            Err(RoundError {
                failures,
                succeeded,
            })
        }
    }
}
