//! Metric names and descriptors exposed by the exporter.

use crate::ValueKind;

pub const PLUG_POWER: &str = "plug_power";
pub const PLUG_POWER_VALID: &str = "plug_power_valid";
pub const PLUG_OVERPOWER: &str = "plug_overpower";
pub const PLUG_TOTAL_POWER: &str = "plug_total_power";
pub const PLUG_TEMPERATURE: &str = "plug_temperature";
pub const PLUG_UPTIME: &str = "plug_uptime";
pub const PLUG_HAS_UPDATE: &str = "plug_has_update";

/// Static description of one metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDesc {
    pub name: &'static str,
    pub help: &'static str,
    /// UCUM-style unit, `"1"` for dimensionless flags.
    pub unit: &'static str,
    pub kind: ValueKind,
}

/// Every metric family produced by the normalizer, in exposition order.
pub static PLUG_METRICS: [MetricDesc; 7] = [
    MetricDesc {
        name: PLUG_POWER,
        help: "Current real AC power being drawn, in Watts",
        unit: "W",
        kind: ValueKind::Gauge,
    },
    MetricDesc {
        name: PLUG_POWER_VALID,
        help: "Whether power metering self-checks OK",
        unit: "1",
        kind: ValueKind::Gauge,
    },
    MetricDesc {
        name: PLUG_OVERPOWER,
        help: "Value in Watts, on which an overpower condition is detected",
        unit: "W",
        kind: ValueKind::Gauge,
    },
    MetricDesc {
        name: PLUG_TOTAL_POWER,
        help: "Total energy consumed by the attached electrical appliance in Watt-minute",
        unit: "Wmin",
        kind: ValueKind::Counter,
    },
    MetricDesc {
        name: PLUG_TEMPERATURE,
        help: "Internal device temperature in °C",
        unit: "°C",
        kind: ValueKind::Gauge,
    },
    MetricDesc {
        name: PLUG_UPTIME,
        help: "Seconds elapsed since boot",
        unit: "s",
        kind: ValueKind::Gauge,
    },
    MetricDesc {
        name: PLUG_HAS_UPDATE,
        help: "Whether a firmware update is available",
        unit: "1",
        kind: ValueKind::Gauge,
    },
];

/// Look up the descriptor of a known metric.
pub fn describe(name: &str) -> Option<&'static MetricDesc> {
    PLUG_METRICS.iter().find(|desc| desc.name == name)
}
