//! Radio transport abstraction
//! The connection manager only talks to the radio through [`Transport`].
//! `BluestTransport` is the production implementation; tests script a mock.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Bluetooth radio is not available")]
    Unavailable,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Characteristic not found: {0}")]
    CharacteristicNotFound(Uuid),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Transport I/O error: {0}")]
    Io(String),
}

/// A received advertisement, before any filtering
#[derive(Debug, Clone)]
pub struct Advertisement {
    pub id: String,
    pub name: Option<String>,
    pub mac_address: Option<String>,
    pub rssi: Option<i16>,
}

/// Transport-level handle of a peer the radio knows about
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerHandle {
    pub id: String,
}

impl PeerHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Resolved GATT characteristic on a connected peer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CharacteristicHandle {
    pub peer_id: String,
    pub service: Uuid,
    pub characteristic: Uuid,
}

/// Link options passed on connect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectParameters {
    /// Let the radio reconnect on its own after a drop
    pub auto_connect: bool,
    /// Force a direct LE link instead of letting the stack pick
    pub force_direct: bool,
}

impl ConnectParameters {
    /// The only mode the glove is driven in: no auto-reconnect, direct LE link
    pub const fn direct() -> Self {
        Self {
            auto_connect: false,
            force_direct: true,
        }
    }
}

/// Asynchronous lifecycle notifications raised by the radio
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    DeviceConnected(String),
    DeviceDisconnected(String),
    DeviceConnectionLost { id: String, reason: String },
}

/// Radio central role: scanning, link management and characteristic I/O.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Whether the radio is powered and usable
    async fn is_radio_enabled(&self) -> bool;

    /// Scan until `timeout` elapses or `cancel` fires, pushing every advertisement into `discovered`
    async fn start_scan(
        &self,
        timeout: Duration,
        cancel: CancellationToken,
        discovered: mpsc::UnboundedSender<Advertisement>,
    ) -> Result<(), TransportError>;

    /// Stop a scan started by [`Transport::start_scan`]
    async fn stop_scan(&self);

    /// Peers the radio already holds a link to
    async fn connected_devices(&self) -> Result<Vec<PeerHandle>, TransportError>;

    /// Peers seen during the last scan
    async fn discovered_devices(&self) -> Vec<PeerHandle>;

    async fn connect(
        &self,
        peer: &PeerHandle,
        parameters: ConnectParameters,
        cancel: CancellationToken,
    ) -> Result<(), TransportError>;

    async fn disconnect(&self, peer: &PeerHandle) -> Result<(), TransportError>;

    /// Look up a characteristic; `Ok(None)` when the service or characteristic is absent
    async fn get_characteristic(
        &self,
        peer: &PeerHandle,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Option<CharacteristicHandle>, TransportError>;

    async fn write_characteristic(
        &self,
        handle: &CharacteristicHandle,
        data: &[u8],
    ) -> Result<(), TransportError>;

    async fn read_characteristic(&self, handle: &CharacteristicHandle) -> Result<Vec<u8>, TransportError>;

    /// Subscribe to lifecycle notifications
    fn events(&self) -> broadcast::Receiver<TransportEvent>;
}
