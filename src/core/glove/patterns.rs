//! Vibration pattern model and the built-in preset catalog

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Actuator configuration. Numeric fields are range-checked at the encode boundary, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VibrationPattern {
    /// Stable across persistence
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// 0-100
    pub intensity: i32,
    /// Pulse length in milliseconds
    pub duration_ms: i32,
    pub frequency_hz: i32,
    /// When set the actuator runs without pulsing and `interval_ms` is ignored
    pub is_continuous: bool,
    /// Gap between pulses in milliseconds
    pub interval_ms: i32,
    /// True while this pattern drives the actuator. Only the vibration controller sets it.
    pub is_active: bool,
}

impl Default for VibrationPattern {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: String::new(),
            description: None,
            intensity: 50,
            duration_ms: 1000,
            frequency_hz: 100,
            is_continuous: true,
            interval_ms: 500,
            is_active: false,
        }
    }
}

impl VibrationPattern {
    /// Continuous pattern with the given parameters
    pub fn continuous(name: &str, description: &str, intensity: i32, duration_ms: i32, frequency_hz: i32) -> Self {
        Self {
            name: name.to_string(),
            description: Some(description.to_string()),
            intensity,
            duration_ms,
            frequency_hz,
            is_continuous: true,
            ..Self::default()
        }
    }

    /// Pulsed pattern with the given parameters
    pub fn pulsed(
        name: &str,
        description: &str,
        intensity: i32,
        duration_ms: i32,
        frequency_hz: i32,
        interval_ms: i32,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: Some(description.to_string()),
            intensity,
            duration_ms,
            frequency_hz,
            is_continuous: false,
            interval_ms,
            ..Self::default()
        }
    }

    /// Short pulse used by the connection test
    pub fn test_pulse() -> Self {
        Self {
            name: "Test".to_string(),
            intensity: 50,
            duration_ms: 200,
            frequency_hz: 100,
            is_continuous: false,
            ..Self::default()
        }
    }
}

/// The five built-in presets, in display order
pub fn default_patterns() -> Vec<VibrationPattern> {
    vec![
        VibrationPattern::continuous("Gentle", "Low intensity, continuous vibration", 30, 1000, 80),
        VibrationPattern::continuous("Moderate", "Medium intensity, continuous vibration", 50, 1000, 100),
        VibrationPattern::continuous("Strong", "High intensity, continuous vibration", 75, 1000, 120),
        VibrationPattern::pulsed("Pulsed", "Medium intensity, pulsed vibration", 50, 500, 100, 500),
        VibrationPattern::pulsed("Rapid Pulse", "Medium intensity, rapid pulsed vibration", 60, 200, 120, 200),
    ]
}
