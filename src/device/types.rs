use std::time::SystemTime;
use serde::{Deserialize, Serialize};

/// A single advertisement as delivered by the platform scanning capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub device_id: String,
    pub name: Option<String>,
    pub signal_strength: Option<i16>, // dBm
    pub transmit_power: Option<i16>, // dBm
}

impl Advertisement {
    /// Turns this advertisement into the observation stored in the registry.
    ///
    /// Returns `None` when the platform did not assign an id, such an event can not be keyed.
    pub fn into_observation(self, observed_at: SystemTime) -> Option<DeviceObservation> {
        if self.device_id.is_empty() {
            return None;
        }

        Some(DeviceObservation {
            id: self.device_id,
            name: self.name,
            signal_strength: self.signal_strength,
            transmit_power: self.transmit_power,
            observed_at,
        })
    }
}

/// The most recent advertisement seen for one physical device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceObservation {
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "rssi")]
    pub signal_strength: Option<i16>,
    #[serde(rename = "txPower")]
    pub transmit_power: Option<i16>,
    #[serde(rename = "timestamp", with = "epoch_millis")]
    pub observed_at: SystemTime,
}

impl DeviceObservation {
    /// The name to show to a user, `None` if the device did not advertise a usable one.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }

    pub fn signal_quality(&self) -> Option<SignalQuality> {
        self.signal_strength.map(SignalQuality::from_rssi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalQuality {
    Excellent,
    Good,
    Fair,
    Weak,
    VeryWeak,
}

impl SignalQuality {
    pub fn from_rssi(rssi: i16) -> SignalQuality {
        match rssi {
            r if r > -60 => SignalQuality::Excellent,
            r if r > -70 => SignalQuality::Good,
            r if r > -80 => SignalQuality::Fair,
            r if r > -90 => SignalQuality::Weak,
            _ => SignalQuality::VeryWeak,
        }
    }

    /// Number of filled bars out of `SIGNAL_BARS`
    pub fn bars(&self) -> usize {
        match self {
            SignalQuality::Excellent => 5,
            SignalQuality::Good => 4,
            SignalQuality::Fair => 3,
            SignalQuality::Weak => 2,
            SignalQuality::VeryWeak => 1,
        }
    }
}

impl std::fmt::Display for SignalQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            SignalQuality::Excellent => "Excellent",
            SignalQuality::Good => "Good",
            SignalQuality::Fair => "Fair",
            SignalQuality::Weak => "Weak",
            SignalQuality::VeryWeak => "Very Weak",
        };

        write!(f, "{}", result)
    }
}

// Timestamps are persisted as milliseconds since the unix epoch
mod epoch_millis {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    use serde::{de, Deserialize, Deserializer, Serializer};

    use crate::device::constants::MAX_TIMESTAMP_MILLIS;

    pub fn serialize<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = time
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_millis())
            .unwrap_or(0);

        serializer.serialize_u64(u64::try_from(millis).unwrap_or(MAX_TIMESTAMP_MILLIS))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SystemTime, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        if millis > MAX_TIMESTAMP_MILLIS {
            return Err(de::Error::custom(format!("timestamp out of range: {}", millis)));
        }

        UNIX_EPOCH
            .checked_add(Duration::from_millis(millis))
            .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {}", millis)))
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};
    use super::*;

    fn advertisement(id: &str) -> Advertisement {
        Advertisement {
            device_id: id.to_string(),
            name: Some("Tag".to_string()),
            signal_strength: Some(-40),
            transmit_power: None,
        }
    }

    #[test]
    fn advertisement_without_id_is_dropped() {
        assert_eq!(advertisement("").into_observation(SystemTime::now()), None);
    }

    #[test]
    fn advertisement_keeps_absent_fields_absent() {
        let at = UNIX_EPOCH + Duration::from_millis(1_700_000_000_000);
        let observation = advertisement("AA:BB").into_observation(at).unwrap();

        assert_eq!(observation.id, "AA:BB");
        assert_eq!(observation.name.as_deref(), Some("Tag"));
        assert_eq!(observation.signal_strength, Some(-40));
        assert_eq!(observation.transmit_power, None);
        assert_eq!(observation.observed_at, at);
    }

    #[test]
    fn persisted_form_uses_millisecond_timestamps() {
        let observation = DeviceObservation {
            id: "AA:BB".to_string(),
            name: None,
            signal_strength: Some(-65),
            transmit_power: Some(4),
            observed_at: UNIX_EPOCH + Duration::from_millis(1_700_000_000_123),
        };

        let json = serde_json::to_value(&observation).unwrap();
        assert_eq!(json, serde_json::json!({
            "id": "AA:BB",
            "name": null,
            "rssi": -65,
            "txPower": 4,
            "timestamp": 1_700_000_000_123_u64,
        }));
    }

    #[test]
    fn out_of_range_timestamp_is_rejected() {
        let json = r#"{"id":"AA","name":null,"rssi":null,"txPower":null,"timestamp":18446744073709551615}"#;
        assert!(serde_json::from_str::<DeviceObservation>(json).is_err());
    }

    #[test]
    fn empty_name_has_no_display_name() {
        let mut observation = advertisement("AA").into_observation(SystemTime::now()).unwrap();
        observation.name = Some(String::new());
        assert_eq!(observation.display_name(), None);
    }

    #[test]
    fn signal_quality_thresholds() {
        assert_eq!(SignalQuality::from_rssi(-59), SignalQuality::Excellent);
        assert_eq!(SignalQuality::from_rssi(-60), SignalQuality::Good);
        assert_eq!(SignalQuality::from_rssi(-75), SignalQuality::Fair);
        assert_eq!(SignalQuality::from_rssi(-89), SignalQuality::Weak);
        assert_eq!(SignalQuality::from_rssi(-90), SignalQuality::VeryWeak);
        assert_eq!(SignalQuality::VeryWeak.bars(), 1);
        assert_eq!(SignalQuality::VeryWeak.to_string(), "Very Weak");
    }
}
