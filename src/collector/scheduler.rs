//! Per-device polling loop used in push mode.

use std::sync::Arc;
use std::time::Instant;

use plugwatch_adapters::{normalize, FetchError, StatusSource};
use plugwatch_sdk::PushSink;
use plugwatch_types::DeviceConfig;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::counter::CounterDeltas;

/// Where a scheduler currently is in its tick cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Created, first tick not yet reached.
    Idle,
    /// Waiting for the next tick.
    Waiting,
    /// Status request in flight.
    Fetching,
    Normalizing,
    /// Writing observations into the sink.
    Reporting,
    /// Loop exited after the stop signal.
    Stopped,
}

/// Counters returned when a scheduler exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub ticks: u64,
    pub failures: u64,
}

/// Polls one device on its own interval and pushes the results into a sink.
///
/// The first poll happens immediately. Ticks never overlap: a fetch that
/// outlives the interval delays the next tick and missed ticks are skipped.
/// Cumulative energy totals are written to the sink as per-tick increments.
pub struct Scheduler {
    device: Arc<DeviceConfig>,
    source: Arc<dyn StatusSource>,
    sink: Arc<dyn PushSink>,
}

impl Scheduler {
    pub fn new(
        device: Arc<DeviceConfig>,
        source: Arc<dyn StatusSource>,
        sink: Arc<dyn PushSink>,
    ) -> Self {
        Self {
            device,
            source,
            sink,
        }
    }

    pub fn device(&self) -> &DeviceConfig {
        &self.device
    }

    /// Run the loop on a new task until `stop` flips to `true`.
    pub fn spawn(self, stop: watch::Receiver<bool>) -> SchedulerHandle {
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let device = self.device.name.clone();
        let task = tokio::spawn(self.run(stop, state_tx));

        SchedulerHandle {
            device,
            state: state_rx,
            task,
        }
    }

    /// Run the loop on the current task.
    ///
    /// The stop signal is checked while waiting for a tick and while a fetch
    /// is in flight; an interrupted fetch is dropped without reporting.
    pub async fn run(
        self,
        mut stop: watch::Receiver<bool>,
        state: watch::Sender<SchedulerState>,
    ) -> TickStats {
        let mut ticker = tokio::time::interval(self.device.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut counters = CounterDeltas::new();
        let mut stats = TickStats::default();

        debug!(
            device = %self.device.name,
            interval_ms = self.device.interval.as_millis() as u64,
            timeout_ms = self.device.timeout.as_millis() as u64,
            "scheduler started"
        );

        loop {
            state.send_replace(SchedulerState::Waiting);
            tokio::select! {
                biased;
                _ = stopped(&mut stop) => break,
                _ = ticker.tick() => {}
            }

            stats.ticks += 1;
            let outcome = tokio::select! {
                biased;
                _ = stopped(&mut stop) => break,
                outcome = self.tick(&state, &mut counters) => outcome,
            };
            if outcome.is_err() {
                stats.failures += 1;
            }
        }

        state.send_replace(SchedulerState::Stopped);
        debug!(
            device = %self.device.name,
            ticks = stats.ticks,
            failures = stats.failures,
            "scheduler stopped"
        );
        stats
    }

    async fn tick(
        &self,
        state: &watch::Sender<SchedulerState>,
        counters: &mut CounterDeltas,
    ) -> Result<usize, FetchError> {
        let started = Instant::now();
        debug!(device = %self.device.name, "tick");

        state.send_replace(SchedulerState::Fetching);
        let status = match self.source.fetch_status(&self.device, None).await {
            Ok(status) => status,
            Err(err) => {
                warn!(
                    device = %self.device.name,
                    address = %self.device.address,
                    kind = err.kind(),
                    error = %err,
                    "failed to get plug status"
                );
                return Err(err);
            }
        };

        state.send_replace(SchedulerState::Normalizing);
        let mut observations = normalize(&self.device.name, &status);

        state.send_replace(SchedulerState::Reporting);
        for observation in &mut observations {
            counters.apply(observation);
            self.sink.record(observation);
        }

        debug!(
            device = %self.device.name,
            observations = observations.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tick complete"
        );
        Ok(observations.len())
    }
}

/// Handle to a spawned [`Scheduler`].
pub struct SchedulerHandle {
    device: String,
    state: watch::Receiver<SchedulerState>,
    task: JoinHandle<TickStats>,
}

impl SchedulerHandle {
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Current state of the loop.
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Receiver notified on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    /// Wait for the loop to exit.
    pub async fn join(self) -> Result<TickStats, JoinError> {
        self.task.await
    }
}

/// Resolves once the stop flag is set or its sender is gone.
pub(crate) async fn stopped(stop: &mut watch::Receiver<bool>) {
    while !*stop.borrow_and_update() {
        if stop.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::collector::testing::{device, status, FakeSource, RecordingSink, Reply};
    use plugwatch_types::{PLUG_POWER, PLUG_TEMPERATURE, PLUG_TOTAL_POWER};

    fn scheduler(
        source: &Arc<FakeSource>,
        sink: &Arc<RecordingSink>,
        interval: Duration,
        timeout: Duration,
    ) -> Scheduler {
        Scheduler::new(
            Arc::new(device("desk", interval, timeout)),
            source.clone(),
            sink.clone(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_immediately_then_every_interval() {
        let source = Arc::new(FakeSource::new().device("desk", Reply::Status(status(42.5, 1000))));
        let sink = Arc::new(RecordingSink::new());
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = scheduler(&source, &sink, Duration::from_secs(10), Duration::from_secs(2))
            .spawn(stop_rx);
        tokio::time::sleep(Duration::from_secs(25)).await;
        stop_tx.send(true).unwrap();

        let stats = handle.join().await.unwrap();
        assert_eq!(stats, TickStats { ticks: 3, failures: 0 });
        assert_eq!(source.calls("desk"), 3);
        assert_eq!(sink.values(PLUG_TEMPERATURE, "desk"), vec![31.2; 3]);
        assert_eq!(sink.values(PLUG_POWER, "desk"), vec![42.5; 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_does_not_stop_the_loop() {
        let source = Arc::new(
            FakeSource::new()
                .script("desk", vec![Reply::Fail])
                .device("desk", Reply::Status(status(10.0, 5))),
        );
        let sink = Arc::new(RecordingSink::new());
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = scheduler(&source, &sink, Duration::from_secs(10), Duration::from_secs(2))
            .spawn(stop_rx);
        tokio::time::sleep(Duration::from_secs(25)).await;
        stop_tx.send(true).unwrap();

        let stats = handle.join().await.unwrap();
        assert_eq!(stats, TickStats { ticks: 3, failures: 1 });
        assert_eq!(sink.values(PLUG_TEMPERATURE, "desk").len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_totals_are_pushed_as_increments() {
        let source = Arc::new(
            FakeSource::new()
                .script("desk", vec![Reply::Status(status(1.0, 1000))])
                .device("desk", Reply::Status(status(1.0, 1060))),
        );
        let sink = Arc::new(RecordingSink::new());
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = scheduler(&source, &sink, Duration::from_secs(10), Duration::from_secs(2))
            .spawn(stop_rx);
        tokio::time::sleep(Duration::from_secs(25)).await;
        stop_tx.send(true).unwrap();
        handle.join().await.unwrap();

        assert_eq!(
            sink.values(PLUG_TOTAL_POWER, "desk"),
            vec![1000.0, 60.0, 0.0]
        );
        assert!(sink
            .writes()
            .iter()
            .filter(|w| w.name == PLUG_TOTAL_POWER)
            .all(|w| w.op == "counter"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_a_stuck_fetch() {
        let source = Arc::new(FakeSource::new().device("desk", Reply::Pending));
        let sink = Arc::new(RecordingSink::new());
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = scheduler(&source, &sink, Duration::from_secs(10), Duration::from_secs(2))
            .spawn(stop_rx);
        let state = handle.subscribe();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.state(), SchedulerState::Fetching);

        stop_tx.send(true).unwrap();
        let stats = tokio::time::timeout(Duration::from_millis(100), handle.join())
            .await
            .expect("scheduler did not stop")
            .unwrap();

        assert_eq!(stats.ticks, 1);
        assert_eq!(*state.borrow(), SchedulerState::Stopped);
        assert!(sink.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_never_overlaps_next_tick() {
        let source = Arc::new(FakeSource::new().device(
            "desk",
            Reply::Slow(Duration::from_secs(25), status(1.0, 1)),
        ));
        let sink = Arc::new(RecordingSink::new());
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = scheduler(&source, &sink, Duration::from_secs(10), Duration::from_secs(2))
            .spawn(stop_rx);
        tokio::time::sleep(Duration::from_secs(60)).await;
        stop_tx.send(true).unwrap();
        let stats = handle.join().await.unwrap();

        assert!(stats.ticks >= 2);
        assert_eq!(source.max_in_flight(), 1);
        let starts = source.call_times("desk");
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(25));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_stop_sender_stops_loop() {
        let source = Arc::new(FakeSource::new().device("desk", Reply::Status(status(1.0, 1))));
        let sink = Arc::new(RecordingSink::new());
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = scheduler(&source, &sink, Duration::from_secs(10), Duration::from_secs(2))
            .spawn(stop_rx);
        drop(stop_tx);

        let stats = tokio::time::timeout(Duration::from_secs(1), handle.join())
            .await
            .expect("scheduler did not stop")
            .unwrap();
        assert!(stats.ticks <= 1);
    }
}
