//! Glove command frames
//! Encodes vibration commands and decodes battery telemetry.
//!
//! Frame layout (placeholder until the hardware protocol is published):
//!
//! ```text
//! start: [0x01][intensity 0..=100][duration_ms u16 LE][frequency 0..=255][mode 0x00 continuous | 0x01 pulsed]
//! stop:  [0x00]
//! ```

use crate::core::bluetooth::constants::{OPCODE_START, OPCODE_STOP, START_FRAME_LEN};
use crate::core::glove::patterns::VibrationPattern;

/// Glove commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GloveCommand {
    /// Start the actuator with already range-checked parameters
    Start {
        intensity: u8,
        duration_ms: u16,
        frequency_hz: u8,
        continuous: bool,
    },
    /// Stop the actuator (0x00)
    Stop,
}

impl GloveCommand {
    /// Build a start command, clamping intensity and frequency and wrapping the duration to 16 bits
    pub fn start(pattern: &VibrationPattern) -> Self {
        Self::Start {
            intensity: pattern.intensity.clamp(0, 100) as u8,
            duration_ms: (pattern.duration_ms & 0xFFFF) as u16,
            frequency_hz: pattern.frequency_hz.clamp(0, 255) as u8,
            continuous: pattern.is_continuous,
        }
    }

    /// Convert the command to its byte representation
    pub fn to_bytes(&self) -> Vec<u8> {
        match *self {
            Self::Start {
                intensity,
                duration_ms,
                frequency_hz,
                continuous,
            } => {
                let [lo, hi] = duration_ms.to_le_bytes();
                let mode = if continuous { 0x00 } else { 0x01 };
                vec![OPCODE_START, intensity, lo, hi, frequency_hz, mode]
            }
            Self::Stop => vec![OPCODE_STOP],
        }
    }
}

/// Frame codec seam. Swap the implementation to speak a different wire protocol.
pub trait FrameCodec: Send + Sync {
    fn encode_start(&self, pattern: &VibrationPattern) -> Vec<u8>;

    fn encode_stop(&self) -> Vec<u8>;

    /// First byte of the battery characteristic. Values above 100 pass through untouched.
    fn decode_battery_level(&self, data: &[u8]) -> Option<u8>;
}

/// The placeholder six-byte protocol
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderCodec;

impl PlaceholderCodec {
    pub fn start_frame(pattern: &VibrationPattern) -> [u8; START_FRAME_LEN] {
        let mut frame = [0u8; START_FRAME_LEN];
        frame.copy_from_slice(&GloveCommand::start(pattern).to_bytes());
        frame
    }
}

impl FrameCodec for PlaceholderCodec {
    fn encode_start(&self, pattern: &VibrationPattern) -> Vec<u8> {
        Self::start_frame(pattern).to_vec()
    }

    fn encode_stop(&self) -> Vec<u8> {
        GloveCommand::Stop.to_bytes()
    }

    fn decode_battery_level(&self, data: &[u8]) -> Option<u8> {
        data.first().copied()
    }
}
