use std::collections::HashMap;

use plugwatch_types::{Attributes, Observation, ValueKind};

/// Turns cumulative device totals into counter increments.
///
/// Owned by a single scheduler task. The first total seen for a series is
/// added in full; a total lower than the previous one means the device
/// restarted its count, so the new total is added as-is.
#[derive(Debug, Default)]
pub struct CounterDeltas {
    last: HashMap<(&'static str, Attributes), f64>,
}

impl CounterDeltas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite a counter observation's value into the increment since the
    /// previous tick. Gauges pass through untouched.
    pub fn apply(&mut self, observation: &mut Observation) {
        if observation.kind != ValueKind::Counter {
            return;
        }

        let total = observation.value;
        let key = (observation.name, observation.attributes.clone());
        let previous = self.last.insert(key, total);

        observation.value = match previous {
            Some(prev) if total >= prev => total - prev,
            _ => total,
        };
    }

    /// Number of tracked series.
    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}
