//! Sink interfaces the collection engine writes observations into.

use std::sync::Arc;

use plugwatch_types::{Attributes, Observation, ValueKind};

/// Eager, retained metric interface.
///
/// Values are visible to scrapers as soon as they are written and stay
/// until overwritten (gauges) or incremented (counters).
pub trait PushSink: Send + Sync {
    /// Replace the value of a gauge series.
    fn set_gauge(&self, name: &'static str, attributes: &Attributes, value: f64);

    /// Increment a counter series.
    fn add_counter(&self, name: &'static str, attributes: &Attributes, delta: f64);

    /// Apply a normalized observation according to its kind.
    fn record(&self, observation: &Observation) {
        match observation.kind {
            ValueKind::Gauge => {
                self.set_gauge(observation.name, &observation.attributes, observation.value)
            }
            ValueKind::Counter => {
                self.add_counter(observation.name, &observation.attributes, observation.value)
            }
        }
    }
}

/// On-demand metric interface, valid only inside a collection callback.
///
/// Observed values belong to the current scrape and are never cached.
pub trait Observer: Send + Sync {
    /// Report the current value of a series.
    fn observe(&self, name: &'static str, attributes: &Attributes, value: f64);

    /// Report a normalized observation.
    ///
    /// Counter observations carry the cumulative value, which is what an
    /// observable counter reports.
    fn record(&self, observation: &Observation) {
        self.observe(observation.name, &observation.attributes, observation.value);
    }
}

/// Push sink that forwards every write to several sinks.
#[derive(Default, Clone)]
pub struct Fanout {
    sinks: Vec<Arc<dyn PushSink>>,
}

impl Fanout {
    /// Create an empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    pub fn with(mut self, sink: Arc<dyn PushSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl PushSink for Fanout {
    fn set_gauge(&self, name: &'static str, attributes: &Attributes, value: f64) {
        for sink in &self.sinks {
            sink.set_gauge(name, attributes, value);
        }
    }

    fn add_counter(&self, name: &'static str, attributes: &Attributes, delta: f64) {
        for sink in &self.sinks {
            sink.add_counter(name, attributes, delta);
        }
    }
}

impl std::fmt::Debug for Fanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fanout")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
