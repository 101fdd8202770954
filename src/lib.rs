//! Haptic glove bridge library
//! Discovers, connects to and drives a BLE vibrotactile therapy glove.

pub mod config;
pub mod core;
pub mod logging;
pub mod state;
pub mod storage;
pub mod utils;
