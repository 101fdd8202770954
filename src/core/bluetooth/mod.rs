//! Bluetooth functionality for the haptic glove
//! This module handles scanning, connecting and characteristic I/O
//! behind the `Transport` seam.

mod bluest_transport;
mod connection;
pub mod constants;
mod registry;
mod transport;
mod types;

#[cfg(test)]
pub(crate) mod mock;

// Re-export types that should be publicly accessible
pub use bluest_transport::BluestTransport;
pub use connection::ConnectionManager;
pub use constants::*; // Re-export all constants
pub use registry::DeviceRegistry;
pub use transport::{
    Advertisement, CharacteristicHandle, ConnectParameters, PeerHandle, Transport, TransportError, TransportEvent,
};
pub use types::{ConnectionState, GloveDevice, matches_name_prefix};
