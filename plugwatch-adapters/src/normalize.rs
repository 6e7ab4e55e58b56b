//! Mapping of device status payloads onto normalized observations.

use plugwatch_types::{
    bool_value, Attributes, DeviceStatus, Observation, PLUG_HAS_UPDATE, PLUG_OVERPOWER,
    PLUG_POWER, PLUG_POWER_VALID, PLUG_TEMPERATURE, PLUG_TOTAL_POWER, PLUG_UPTIME,
};

/// Observations emitted per device, independent of meter count.
pub const DEVICE_OBSERVATIONS: usize = 3;

/// Observations emitted per meter.
pub const METER_OBSERVATIONS: usize = 4;

/// Turn one device status into its observations.
///
/// Device-level gauges come first (temperature, uptime, has-update), then
/// four observations per meter in index order: power, power-valid and
/// overpower gauges followed by the cumulative total as a counter. The
/// result always has `3 + 4 * meters` entries.
pub fn normalize(device_name: &str, status: &DeviceStatus) -> Vec<Observation> {
    let mut out =
        Vec::with_capacity(DEVICE_OBSERVATIONS + METER_OBSERVATIONS * status.meters.len());
    let device = Attributes::device(device_name);

    out.push(Observation::gauge(
        PLUG_TEMPERATURE,
        device.clone(),
        status.temperature,
    ));
    out.push(Observation::gauge(
        PLUG_UPTIME,
        device.clone(),
        status.uptime as f64,
    ));
    out.push(Observation::gauge(
        PLUG_HAS_UPDATE,
        device.clone(),
        bool_value(status.has_update()),
    ));

    for (index, meter) in status.meters.iter().enumerate() {
        let attrs = device.clone().with("meter", index);

        out.push(Observation::gauge(PLUG_POWER, attrs.clone(), meter.power));
        out.push(Observation::gauge(
            PLUG_POWER_VALID,
            attrs.clone(),
            bool_value(meter.is_valid),
        ));
        out.push(Observation::gauge(
            PLUG_OVERPOWER,
            attrs.clone(),
            meter.overpower,
        ));
        out.push(Observation::counter(
            PLUG_TOTAL_POWER,
            attrs,
            meter.total as f64,
        ));
    }

    out
}
