//! Defines shared data structures for the Bluetooth module.

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::core::bluetooth::transport::Advertisement;

/// Connection state of the glove link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No link is held
    #[default]
    Disconnected,
    /// A connect attempt is in flight
    Connecting,
    /// The link is up and commands may be written
    Connected,
    /// The last attempt failed or the link was lost
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        };
        f.write_str(text)
    }
}

/// Represents a discovered glove
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GloveDevice {
    /// Platform-specific identifier, stable for one run. The only key used for equality.
    pub id: String,
    /// The advertised name of the device
    pub name: String,
    /// The MAC address, when the platform exposes one
    pub mac_address: Option<String>,
    /// Last known battery level (0-100)
    pub battery_level: u8,
    /// Cached copy of the connection manager's state at last observation
    pub connection_state: ConnectionState,
    /// The signal strength (RSSI) of the first advertisement seen
    pub signal_strength: i16,
    /// Set on every successful transition into Connected
    pub last_connected: Option<DateTime<Local>>,
    /// Firmware version, when the device reported one
    pub firmware_version: Option<String>,
}

impl GloveDevice {
    /// Creates a new GloveDevice instance
    pub fn new(id: impl Into<String>, name: impl Into<String>, signal_strength: i16) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mac_address: None,
            battery_level: 0,
            connection_state: ConnectionState::Disconnected,
            signal_strength,
            last_connected: None,
            firmware_version: None,
        }
    }

    /// Builds a device record from an advertisement that passed the name filter
    pub fn from_advertisement(advertisement: &Advertisement) -> Self {
        let mut device = Self::new(
            advertisement.id.clone(),
            advertisement.name.clone().unwrap_or_default(),
            advertisement.rssi.unwrap_or(0),
        );
        device.mac_address = advertisement.mac_address.clone();
        device
    }
}

impl PartialEq for GloveDevice {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for GloveDevice {}

/// Returns true if the advertised name matches the glove prefix (case-insensitive).
/// Nameless advertisements never match.
pub fn matches_name_prefix(name: Option<&str>, prefix: &str) -> bool {
    match name {
        Some(name) if !name.is_empty() => name
            .get(..prefix.len())
            .map(|head| head.eq_ignore_ascii_case(prefix))
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_prefix_is_case_insensitive() {
        assert!(matches_name_prefix(Some("BlueBuzzah-L"), "BlueBuzzah"));
        assert!(matches_name_prefix(Some("bluebuzzah right"), "BlueBuzzah"));
        assert!(!matches_name_prefix(Some("My BlueBuzzah"), "BlueBuzzah"));
        assert!(!matches_name_prefix(Some("Blue"), "BlueBuzzah"));
    }

    #[test]
    fn test_nameless_advertisement_never_matches() {
        assert!(!matches_name_prefix(None, "BlueBuzzah"));
        assert!(!matches_name_prefix(Some(""), "BlueBuzzah"));
    }

    #[test]
    fn test_devices_compare_by_id_only() {
        let a = GloveDevice::new("id-1", "BlueBuzzah A", -40);
        let mut b = GloveDevice::new("id-1", "renamed", -90);
        b.battery_level = 80;
        assert_eq!(a, b);
        assert_ne!(a, GloveDevice::new("id-2", "BlueBuzzah A", -40));
    }
}
