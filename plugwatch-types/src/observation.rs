//! Normalized observations - the contract between normalizer and sinks.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// How a sink should apply an observation's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ValueKind {
    /// Replace the current value.
    Gauge,
    /// Add to a monotonic counter.
    Counter,
}

/// An ordered label set.
///
/// Insertion order is kept so that rendered output is stable; keys are
/// expected to be unique and [`Attributes::with`] replaces an existing key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    /// Create an empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute set carrying only the device name.
    pub fn device(name: &str) -> Self {
        Self::new().with("name", name)
    }

    /// Add or replace an attribute.
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        let value = value.to_string();
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key.to_string(), value)),
        }
        self
    }

    /// Look up an attribute value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One normalized measurement.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Observation {
    /// Metric name, one of the `PLUG_*` constants.
    pub name: &'static str,
    /// Label set; always contains `name`, meter-level values also `meter`.
    pub attributes: Attributes,
    /// Numeric value.
    pub value: f64,
    /// How the value is applied.
    pub kind: ValueKind,
}

impl Observation {
    /// A gauge observation.
    pub fn gauge(name: &'static str, attributes: Attributes, value: f64) -> Self {
        Self {
            name,
            attributes,
            value,
            kind: ValueKind::Gauge,
        }
    }

    /// A counter observation.
    pub fn counter(name: &'static str, attributes: Attributes, value: f64) -> Self {
        Self {
            name,
            attributes,
            value,
            kind: ValueKind::Counter,
        }
    }
}

/// Fixed boolean mapping used for every flag metric.
pub fn bool_value(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}
