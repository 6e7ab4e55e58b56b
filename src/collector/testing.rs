//! Fakes shared by the collector tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use plugwatch_adapters::{effective_timeout, FetchError, StatusSource};
use plugwatch_sdk::{Observer, PushSink};
use plugwatch_types::{Attributes, DeviceConfig, DeviceStatus, MeterReading};

/// What a fake device does when polled.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(DeviceStatus),
    Fail,
    /// Never answers; gives up with `Timeout` once the fetch budget elapses.
    Hang,
    /// Answers after a delay, ignoring the fetch budget.
    Slow(Duration, DeviceStatus),
    /// Never completes at all.
    Pending,
}

/// Scripted `StatusSource`.
#[derive(Default)]
pub struct FakeSource {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    steady: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<(String, tokio::time::Instant)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply used whenever no scripted reply is queued.
    pub fn device(self, name: &str, reply: Reply) -> Self {
        self.steady.lock().insert(name.to_string(), reply);
        self
    }

    /// Replies consumed in order before the steady reply.
    pub fn script(self, name: &str, replies: Vec<Reply>) -> Self {
        self.scripts
            .lock()
            .insert(name.to_string(), replies.into_iter().collect());
        self
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls.lock().iter().filter(|(n, _)| n == name).count()
    }

    pub fn call_times(&self, name: &str) -> Vec<tokio::time::Instant> {
        self.calls
            .lock()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, name: &str) -> Reply {
        let scripted = self
            .scripts
            .lock()
            .get_mut(name)
            .and_then(|queue| queue.pop_front());
        scripted
            .or_else(|| self.steady.lock().get(name).cloned())
            .unwrap_or(Reply::Fail)
    }
}

#[async_trait]
impl StatusSource for FakeSource {
    async fn fetch_status(
        &self,
        device: &DeviceConfig,
        deadline: Option<Instant>,
    ) -> Result<DeviceStatus, FetchError> {
        self.calls
            .lock()
            .push((device.name.clone(), tokio::time::Instant::now()));
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let result = match self.next_reply(&device.name) {
            Reply::Status(status) => Ok(status),
            Reply::Fail => Err(FetchError::Transport("connection refused".to_string())),
            Reply::Hang => {
                tokio::time::sleep(effective_timeout(device.timeout, deadline)).await;
                Err(FetchError::Timeout)
            }
            Reply::Slow(delay, status) => {
                tokio::time::sleep(delay).await;
                Ok(status)
            }
            Reply::Pending => std::future::pending().await,
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// One call made on a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct Write {
    pub op: &'static str,
    pub name: &'static str,
    pub attributes: Attributes,
    pub value: f64,
}

/// Sink recording every push and pull call.
#[derive(Default)]
pub struct RecordingSink {
    writes: Mutex<Vec<Write>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().clone()
    }

    /// Names of every device that contributed at least one write.
    pub fn devices(&self) -> BTreeSet<String> {
        self.writes
            .lock()
            .iter()
            .filter_map(|w| w.attributes.get("name").map(str::to_string))
            .collect()
    }

    /// Values written for `metric` by `device`, in call order.
    pub fn values(&self, metric: &str, device: &str) -> Vec<f64> {
        self.writes
            .lock()
            .iter()
            .filter(|w| w.name == metric && w.attributes.get("name") == Some(device))
            .map(|w| w.value)
            .collect()
    }

    fn push(&self, op: &'static str, name: &'static str, attributes: &Attributes, value: f64) {
        self.writes.lock().push(Write {
            op,
            name,
            attributes: attributes.clone(),
            value,
        });
    }
}

impl PushSink for RecordingSink {
    fn set_gauge(&self, name: &'static str, attributes: &Attributes, value: f64) {
        self.push("gauge", name, attributes, value);
    }

    fn add_counter(&self, name: &'static str, attributes: &Attributes, delta: f64) {
        self.push("counter", name, attributes, delta);
    }
}

impl Observer for RecordingSink {
    fn observe(&self, name: &'static str, attributes: &Attributes, value: f64) {
        self.push("observe", name, attributes, value);
    }
}

/// A one-meter plug reading.
pub fn status(power: f64, total: u64) -> DeviceStatus {
    let mut status = DeviceStatus::with_meters(vec![MeterReading::new(power, total)]);
    status.temperature = 31.2;
    status.uptime = 86_400;
    status
}

pub fn device(name: &str, interval: Duration, timeout: Duration) -> DeviceConfig {
    DeviceConfig::new(name, format!("{name}.local"))
        .with_interval(interval)
        .with_timeout(timeout)
}
