//! Bluetooth connection handling for the glove
//! Owns the single link, the connection state machine and the per-scan device registry.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Local;
use log::{debug, error, info, warn};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::registry::DeviceRegistry;
use crate::core::bluetooth::transport::{Advertisement, ConnectParameters, PeerHandle, Transport, TransportEvent};
use crate::core::bluetooth::types::{ConnectionState, GloveDevice, matches_name_prefix};
use crate::core::events::{EventBus, GloveEvent};
use crate::storage::GloveStore;

#[derive(Default)]
struct LinkState {
    state: ConnectionState,
    /// Id of the device the last connect() was aimed at
    target_id: Option<String>,
    /// Transport-level link, present only while the radio holds one
    peer: Option<PeerHandle>,
    device: Option<GloveDevice>,
}

/// Connection manager for the glove
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    events: EventBus,
    name_prefix: String,
    registry: Mutex<DeviceRegistry>,
    link: Mutex<LinkState>,
    /// Serializes scan, connect and disconnect against the transport
    operation_lock: tokio::sync::Mutex<()>,
    store: Option<Arc<dyn GloveStore>>,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn Transport>, events: EventBus, name_prefix: impl Into<String>) -> Self {
        Self {
            transport,
            events,
            name_prefix: name_prefix.into(),
            registry: Mutex::new(DeviceRegistry::new()),
            link: Mutex::new(LinkState::default()),
            operation_lock: tokio::sync::Mutex::new(()),
            store: None,
        }
    }

    /// Persist the last connected device through `store`
    pub fn with_store(mut self, store: Arc<dyn GloveStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn link(&self) -> MutexGuard<'_, LinkState> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry(&self) -> MutexGuard<'_, DeviceRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies a transition; publishes only when the state actually changes.
    fn set_state(&self, link: &mut LinkState, new_state: ConnectionState) {
        if link.state == new_state {
            return;
        }
        info!("Connection state: {} -> {}", link.state, new_state);
        link.state = new_state;
        if let Some(device) = link.device.as_mut() {
            device.connection_state = new_state;
        }
        self.events.publish(GloveEvent::ConnectionStateChanged(new_state));
    }

    pub fn state(&self) -> ConnectionState {
        self.link().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Returns the currently connected device
    pub fn connected_device(&self) -> Option<GloveDevice> {
        self.link().device.clone()
    }

    /// Devices found by the last scan, in discovery order
    pub fn discovered_devices(&self) -> Vec<GloveDevice> {
        self.registry().snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GloveEvent> {
        self.events.subscribe()
    }

    /// Scans for gloves until `timeout` elapses or `cancel` fires.
    /// Never fails: a disabled radio yields an empty list and scan errors yield what was found so far.
    pub async fn scan(&self, timeout: Duration, cancel: CancellationToken) -> Vec<GloveDevice> {
        let _operation = self.operation_lock.lock().await;
        self.registry().clear();

        if !self.transport.is_radio_enabled().await {
            warn!("Bluetooth radio is off, skipping scan.");
            return Vec::new();
        }

        info!("Starting bluetooth scan ({:?})", timeout);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scan = self.transport.start_scan(timeout, cancel, tx);

        // Process discovered devices in real-time
        let result = loop {
            tokio::select! {
                result = &mut scan => break result,
                Some(advertisement) = rx.recv() => self.on_advertisement(advertisement),
            }
        };
        while let Ok(advertisement) = rx.try_recv() {
            self.on_advertisement(advertisement);
        }

        if let Err(e) = result {
            error!("Scan error: {}", e);
        }

        let devices = self.registry().snapshot();
        info!("Scan finished, {} glove(s) found.", devices.len());
        devices
    }

    /// Asks the transport to end a running scan early
    pub async fn stop_scan(&self) {
        info!("Stopping Bluetooth scan.");
        self.transport.stop_scan().await;
    }

    fn on_advertisement(&self, advertisement: Advertisement) {
        if !matches_name_prefix(advertisement.name.as_deref(), &self.name_prefix) {
            debug!("Ignoring device {} ({:?})", advertisement.id, advertisement.name);
            return;
        }

        let (device, was_new) = self
            .registry()
            .add_if_absent(GloveDevice::from_advertisement(&advertisement));
        if was_new {
            info!(
                "Found glove: ID: {}, Name: {}, RSSI: {}",
                device.id, device.name, device.signal_strength
            );
            self.events.publish(GloveEvent::DeviceDiscovered(device));
        }
    }

    /// Connects to `device`. No internal retry; the caller decides whether to try again.
    pub async fn connect(&self, device: &mut GloveDevice, cancel: CancellationToken) -> bool {
        let _operation = self.operation_lock.lock().await;

        let previous = {
            let mut link = self.link();
            link.target_id = Some(device.id.clone());
            self.set_state(&mut link, ConnectionState::Connecting);
            link.device = None;
            link.peer.take()
        };
        device.connection_state = ConnectionState::Connecting;

        if let Some(previous) = previous.filter(|p| p.id != device.id) {
            info!("Dropping link to {} before switching devices", previous.id);
            if let Err(e) = self.transport.disconnect(&previous).await {
                warn!("Failed to drop previous link {}: {}", previous.id, e);
            }
        }

        let Some(peer) = self.resolve_peer(&device.id).await else {
            warn!("Device {} is neither connected nor discovered", device.id);
            self.fail_connect(device);
            return false;
        };

        info!("Initiating connection to {}...", peer.id);
        match self.transport.connect(&peer, ConnectParameters::direct(), cancel).await {
            Ok(()) => {
                let accepted = {
                    let mut link = self.link();
                    // A link loss seen while connecting already moved us to Error.
                    let still_connecting = link.state == ConnectionState::Connecting
                        && link.target_id.as_deref() == Some(device.id.as_str());
                    if still_connecting {
                        device.last_connected = Some(Local::now());
                        device.connection_state = ConnectionState::Connected;
                        link.peer = Some(peer.clone());
                        link.device = Some(device.clone());
                        self.set_state(&mut link, ConnectionState::Connected);
                    } else {
                        device.connection_state = link.state;
                    }
                    still_connecting
                };

                if !accepted {
                    warn!("Link to {} dropped while connecting", device.id);
                    if let Err(e) = self.transport.disconnect(&peer).await {
                        warn!("Failed to release link {}: {}", peer.id, e);
                    }
                    return false;
                }

                info!("Device {} successfully connected.", device.id);
                self.persist_last_device(device.clone());
                true
            }
            Err(e) => {
                error!("Connection error: {}", e);
                self.fail_connect(device);
                false
            }
        }
    }

    fn fail_connect(&self, device: &mut GloveDevice) {
        device.connection_state = ConnectionState::Error;
        let mut link = self.link();
        link.peer = None;
        link.device = None;
        self.set_state(&mut link, ConnectionState::Error);
    }

    /// Already-connected peers win over discovered ones
    async fn resolve_peer(&self, id: &str) -> Option<PeerHandle> {
        let connected = match self.transport.connected_devices().await {
            Ok(connected) => connected,
            Err(e) => {
                warn!("Could not list connected devices: {}", e);
                Vec::new()
            }
        };
        if let Some(peer) = connected.into_iter().find(|p| p.id == id) {
            debug!("Device {} is already connected at the radio level", id);
            return Some(peer);
        }
        self.transport
            .discovered_devices()
            .await
            .into_iter()
            .find(|p| p.id == id)
    }

    /// Disconnects from the current device. Local state is cleared whatever the transport reports.
    pub async fn disconnect(&self) {
        let _operation = self.operation_lock.lock().await;

        let peer = self.link().peer.clone();
        match peer {
            Some(peer) => {
                info!("Disconnecting from device {}", peer.id);
                if let Err(e) = self.transport.disconnect(&peer).await {
                    error!("Disconnect error: {}", e);
                }
            }
            None => debug!("No device connected"),
        }

        let mut link = self.link();
        link.peer = None;
        link.device = None;
        link.target_id = None;
        self.set_state(&mut link, ConnectionState::Disconnected);
    }

    /// Applies an asynchronous notification from the radio.
    /// Only events for the held peer, or a loss of the device being connected, change state.
    pub fn handle_transport_event(&self, event: TransportEvent) {
        let mut link = self.link();
        let held = link.peer.as_ref().map(|p| p.id.clone());
        match event {
            TransportEvent::DeviceConnected(id) => {
                // connect() enters Connected itself once the peer is recorded
                if held.as_deref() == Some(id.as_str()) {
                    self.set_state(&mut link, ConnectionState::Connected);
                } else {
                    debug!("Ignoring connected event for {}", id);
                }
            }
            TransportEvent::DeviceDisconnected(id) => {
                if held.as_deref() != Some(id.as_str()) {
                    debug!("Ignoring disconnect of {}, not the held link", id);
                    return;
                }
                link.peer = None;
                link.device = None;
                self.set_state(&mut link, ConnectionState::Disconnected);
            }
            TransportEvent::DeviceConnectionLost { id, reason } => {
                let attempting =
                    link.state == ConnectionState::Connecting && link.target_id.as_deref() == Some(id.as_str());
                if held.as_deref() != Some(id.as_str()) && !attempting {
                    debug!("Ignoring link loss of unrelated device {}", id);
                    return;
                }
                warn!("Lost connection to {}: {}", id, reason);
                link.peer = None;
                link.device = None;
                self.set_state(&mut link, ConnectionState::Error);
            }
        }
    }

    /// Forwards transport notifications into the state machine until the transport goes away
    pub fn spawn_event_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let mut events = self.transport.events();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => manager.handle_transport_event(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Transport event listener lagged, {} event(s) skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Transport event stream ended");
                        break;
                    }
                }
            }
        })
    }

    /// Writes to a characteristic of the connected device; false when there is no link or the write fails
    pub async fn write_characteristic(&self, service: Uuid, characteristic: Uuid, data: &[u8]) -> bool {
        let peer = self.link().peer.clone();
        let Some(peer) = peer else {
            debug!("Write to {} skipped, no device connected", characteristic);
            return false;
        };

        let handle = match self.transport.get_characteristic(&peer, service, characteristic).await {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                warn!("Characteristic {} not found on {}", characteristic, peer.id);
                return false;
            }
            Err(e) => {
                error!("Characteristic lookup error: {}", e);
                return false;
            }
        };

        match self.transport.write_characteristic(&handle, data).await {
            Ok(()) => {
                debug!("Wrote {:02X?} to {}", data, characteristic);
                true
            }
            Err(e) => {
                error!("Write error: {}", e);
                false
            }
        }
    }

    /// Reads a characteristic of the connected device; None when there is no link or the read fails
    pub async fn read_characteristic(&self, service: Uuid, characteristic: Uuid) -> Option<Vec<u8>> {
        let peer = self.link().peer.clone();
        let peer = peer?;

        let handle = match self.transport.get_characteristic(&peer, service, characteristic).await {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                warn!("Characteristic {} not found on {}", characteristic, peer.id);
                return None;
            }
            Err(e) => {
                error!("Characteristic lookup error: {}", e);
                return None;
            }
        };

        match self.transport.read_characteristic(&handle).await {
            Ok(data) => Some(data),
            Err(e) => {
                error!("Read error: {}", e);
                None
            }
        }
    }

    /// Caches a fresh battery reading on the connected device
    pub fn record_battery_level(&self, level: u8) {
        if let Some(device) = self.link().device.as_mut() {
            device.battery_level = level;
        }
    }

    fn persist_last_device(&self, device: GloveDevice) {
        let Some(store) = self.store.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = store.save_last_device(&device).await {
                warn!("Failed to save last device {}: {}", device.id, e);
            }
        });
    }
}
