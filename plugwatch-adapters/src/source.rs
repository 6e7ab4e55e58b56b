//! The seam between the collection engine and concrete device clients.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use plugwatch_types::{DeviceConfig, DeviceStatus};

use crate::FetchError;

/// Something that can fetch the current status of a device.
///
/// Implementations perform exactly one bounded attempt per call; retries are
/// left to the next collection round.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetch one status snapshot.
    ///
    /// The request is bounded by the smaller of `device.timeout` and the
    /// time left until `deadline`.
    async fn fetch_status(
        &self,
        device: &DeviceConfig,
        deadline: Option<Instant>,
    ) -> Result<DeviceStatus, FetchError>;
}

/// Time budget for one fetch: the device timeout, capped by a parent deadline.
///
/// A deadline in the past yields a zero budget.
pub fn effective_timeout(timeout: Duration, deadline: Option<Instant>) -> Duration {
    match deadline {
        Some(deadline) => timeout.min(deadline.saturating_duration_since(Instant::now())),
        None => timeout,
    }
}
