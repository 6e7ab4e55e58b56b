//! Decoded device status payloads.

use alloc::vec::Vec;

/// A snapshot of one device at one instant, as reported by its `/status`
/// endpoint.
///
/// Fields missing from the payload decode to their zero value; fields with
/// the wrong JSON type are a decode failure.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceStatus {
    /// Device serial number.
    pub serial: u64,

    /// Power-measurement channels, in device order.
    pub meters: Vec<MeterReading>,

    /// Internal device temperature in °C.
    pub temperature: f64,

    /// Whether the device reports an overtemperature condition.
    pub overtemperature: bool,

    /// Firmware update information.
    pub update: UpdateInfo,

    /// Seconds elapsed since boot.
    pub uptime: u64,
}

impl DeviceStatus {
    /// Create a status with the given meters and every other field zeroed.
    pub fn with_meters(meters: Vec<MeterReading>) -> Self {
        Self {
            meters,
            ..Default::default()
        }
    }

    /// Whether a firmware update is pending.
    pub fn has_update(&self) -> bool {
        self.update.has_update
    }
}

/// One power-measurement channel of a device.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MeterReading {
    /// Instantaneous power in W.
    pub power: f64,

    /// Power value in W above which an overpower condition triggers.
    pub overpower: f64,

    /// Whether the metering self-check passed.
    pub is_valid: bool,

    /// Cumulative energy in W·min.
    pub total: u64,
}

impl MeterReading {
    /// Create a valid meter reading.
    pub fn new(power: f64, total: u64) -> Self {
        Self {
            power,
            overpower: 0.0,
            is_valid: true,
            total,
        }
    }
}

/// Firmware update section of the status payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct UpdateInfo {
    pub has_update: bool,
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_payload() {
        let json = r#"{
            "serial": 123,
            "meters": [{"power": 42.5, "is_valid": true, "overpower": 0.0, "total": 1000}],
            "temperature": 31.2,
            "overtemperature": false,
            "update": {"has_update": true},
            "uptime": 86400
        }"#;

        let status: DeviceStatus = serde_json::from_str(json).unwrap();

        assert_eq!(status.serial, 123);
        assert_eq!(status.meters.len(), 1);
        assert_eq!(status.meters[0].power, 42.5);
        assert!(status.meters[0].is_valid);
        assert_eq!(status.meters[0].total, 1000);
        assert_eq!(status.temperature, 31.2);
        assert!(status.has_update());
        assert_eq!(status.uptime, 86400);
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let json = r#"{"serial": 1, "wifi_sta": {"connected": true}, "meters": []}"#;
        let status: DeviceStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.serial, 1);
        assert!(status.meters.is_empty());
    }

    #[test]
    fn test_decode_missing_fields_default_to_zero() {
        let status: DeviceStatus = serde_json::from_str("{}").unwrap();
        assert_eq!(status, DeviceStatus::default());
    }

    #[test]
    fn test_decode_rejects_wrong_types() {
        let result = serde_json::from_str::<DeviceStatus>(r#"{"meters": "nope"}"#);
        assert!(result.is_err());

        let result = serde_json::from_str::<DeviceStatus>(r#"{"uptime": -5}"#);
        assert!(result.is_err());
    }
}
