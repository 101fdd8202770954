//! Constants used throughout the glove bridge
//! UUIDs, name filters and timeouts for talking to the glove.
//! The GATT layout is a placeholder until the hardware documentation lands.

use uuid::Uuid;

/// Advertised name prefix of the glove, matched case-insensitively
pub const DEVICE_NAME_PREFIX: &str = "BlueBuzzah";

/// Primary service carrying every glove characteristic
pub const UUID_PRIMARY_SERVICE: Uuid = Uuid::from_u128(0x00001800_0000_1000_8000_00805f9b34fb);

/// Vibration control characteristic (write)
pub const UUID_VIBRATION_CONTROL_CHAR: Uuid = Uuid::from_u128(0x00002a00_0000_1000_8000_00805f9b34fb);

/// Battery level characteristic (read)
pub const UUID_BATTERY_LEVEL_CHAR: Uuid = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);

/// Device status and firmware characteristic
pub const UUID_DEVICE_STATUS_CHAR: Uuid = Uuid::from_u128(0x00002a26_0000_1000_8000_00805f9b34fb);

/// Pattern configuration characteristic
pub const UUID_PATTERN_CONFIG_CHAR: Uuid = Uuid::from_u128(0x00002a29_0000_1000_8000_00805f9b34fb);

/// Scan duration in seconds
pub const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 10;

/// Timeout for a single connect attempt in seconds
pub const CONNECTION_TIMEOUT_SECS: u64 = 15;

/// Capacity of the event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Start opcode of the vibration frame
pub const OPCODE_START: u8 = 0x01;

/// Stop opcode of the vibration frame
pub const OPCODE_STOP: u8 = 0x00;

/// Length of an encoded start frame in bytes
pub const START_FRAME_LEN: usize = 6;
