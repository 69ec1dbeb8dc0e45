//! Device identity and consumer-facing sensor metadata.

use crate::{ConnectorConfig, MeasurementSet, Slot};
use serde::Serialize;

/// Credentials plus the device the connector talks about.
///
/// `user_id` and `token` are fixed at construction. `device_id` and
/// `device_name` are refined after the first successful fetch because the
/// server's canonical id may differ from the requested filter.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    user_id: String,
    token: String,
    device_id: Option<String>,
    device_name: String,
}

impl DeviceIdentity {
    /// Creates an identity from a validated configuration.
    #[must_use]
    pub fn from_config(config: &ConnectorConfig) -> Self {
        Self {
            user_id: config.client_id().to_string(),
            token: config.api_token().to_string(),
            device_id: config.device_id().map(str::to_string),
            device_name: String::new(),
        }
    }

    /// Returns the user (client) id.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Returns the API token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns the device id, if known.
    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Returns the device name; empty until the first successful fetch.
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Adopts the server's canonical device id and title.
    pub fn refine(&mut self, device_id: impl Into<String>, device_name: impl Into<String>) {
        self.device_id = Some(device_id.into());
        self.device_name = device_name.into();
    }
}

impl std::fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceIdentity")
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .field("device_id", &self.device_id)
            .field("device_name", &self.device_name)
            .finish()
    }
}

/// Static description of the physical device for display consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// Canonical device id.
    pub identifier: String,
    /// Device title as reported by the service.
    pub name: String,
    /// Manufacturer label.
    pub manufacturer: &'static str,
    /// Model label.
    pub model: &'static str,
}

impl DeviceInfo {
    /// Manufacturer reported for every device.
    pub const MANUFACTURER: &'static str = "OIOT";
    /// Model reported for every device.
    pub const MODEL: &'static str = "Basic";

    /// Creates device info for the given id and name.
    #[must_use]
    pub fn new(identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            manufacturer: Self::MANUFACTURER,
            model: Self::MODEL,
        }
    }
}

/// Per-slot sensor description derived from a device and its latest readings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorInfo {
    /// Stable id, `<device_id>_<slot>`.
    pub unique_id: String,
    /// Counter slot.
    pub slot: Slot,
    /// Display name; the counter title once readings are known.
    pub name: String,
    /// Unit of measurement, if readings are known.
    pub unit: Option<String>,
    /// Current value, if readings are available.
    pub value: Option<f64>,
    /// Counters only ever grow.
    pub state_class: &'static str,
}

impl SensorInfo {
    /// Name used before any reading has been seen.
    pub const DEFAULT_NAME: &'static str = "Water consumption";
    /// State class of a metering counter.
    pub const STATE_CLASS: &'static str = "total_increasing";

    /// Returns the stable unique id for a device slot.
    #[must_use]
    pub fn unique_id(device_id: &str, slot: Slot) -> String {
        format!("{device_id}_{slot}")
    }

    /// Describes `slot` of `device_id`, filling readings from `set` when present.
    #[must_use]
    pub fn describe(device_id: &str, slot: Slot, set: Option<&MeasurementSet>) -> Self {
        let measurement = set.map(|set| set.get(slot));
        Self {
            unique_id: Self::unique_id(device_id, slot),
            slot,
            name: measurement.map_or_else(
                || Self::DEFAULT_NAME.to_string(),
                |m| m.title().to_string(),
            ),
            unit: measurement.map(|m| m.dimension().to_string()),
            value: measurement.map(|m| m.value()),
            state_class: Self::STATE_CLASS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Measurement;

    fn config(device_id: Option<&str>) -> ConnectorConfig {
        ConnectorConfig::new("1001", "secret", device_id).unwrap()
    }

    #[test]
    fn test_identity_from_config() {
        let identity = DeviceIdentity::from_config(&config(Some("42")));
        assert_eq!(identity.user_id(), "1001");
        assert_eq!(identity.token(), "secret");
        assert_eq!(identity.device_id(), Some("42"));
        assert_eq!(identity.device_name(), "");
    }

    #[test]
    fn test_identity_refine() {
        let mut identity = DeviceIdentity::from_config(&config(None));
        assert_eq!(identity.device_id(), None);
        identity.refine("42", "Meter");
        assert_eq!(identity.device_id(), Some("42"));
        assert_eq!(identity.device_name(), "Meter");
    }

    #[test]
    fn test_identity_debug_hides_token() {
        let identity = DeviceIdentity::from_config(&config(None));
        let debug = format!("{identity:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_sensor_without_readings() {
        let sensor = SensorInfo::describe("42", Slot::Two, None);
        assert_eq!(sensor.unique_id, "42_2");
        assert_eq!(sensor.name, SensorInfo::DEFAULT_NAME);
        assert!(sensor.value.is_none());
        assert!(sensor.unit.is_none());
    }

    #[test]
    fn test_sensor_with_readings() {
        let set = MeasurementSet::try_from_fn::<()>(|slot| {
            Ok(Measurement::new(slot, format!("Counter {slot}"), 3.0, "m3"))
        })
        .unwrap();
        let sensor = SensorInfo::describe("42", Slot::One, Some(&set));
        assert_eq!(sensor.unique_id, "42_1");
        assert_eq!(sensor.name, "Counter 1");
        assert_eq!(sensor.unit.as_deref(), Some("m3"));
        assert_eq!(sensor.value, Some(3.0));
        assert_eq!(sensor.state_class, "total_increasing");
    }

    #[test]
    fn test_device_info_labels() {
        let info = DeviceInfo::new("42", "Meter");
        assert_eq!(info.manufacturer, "OIOT");
        assert_eq!(info.model, "Basic");
    }
}
