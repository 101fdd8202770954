//! [`Transport`] over the `bluest` crate

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bluest::{Adapter, Characteristic, ConnectionEvent, Device};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use regex::Regex;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::transport::{
    Advertisement, CharacteristicHandle, ConnectParameters, PeerHandle, Transport, TransportError, TransportEvent,
};

impl From<bluest::Error> for TransportError {
    fn from(e: bluest::Error) -> Self {
        TransportError::Io(e.to_string())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Devices seen by the last scan, plus the ones we hold a link to.
/// A rescan clears only the scanned set.
struct DeviceCache<D> {
    scanned: HashMap<String, D>,
    linked: HashMap<String, D>,
}

impl<D: Clone> DeviceCache<D> {
    fn new() -> Self {
        Self {
            scanned: HashMap::new(),
            linked: HashMap::new(),
        }
    }

    fn clear_scanned(&mut self) {
        self.scanned.clear();
    }

    fn insert_scanned(&mut self, id: String, device: D) {
        self.scanned.insert(id, device);
    }

    fn link(&mut self, id: &str, device: D) {
        self.linked.insert(id.to_string(), device);
    }

    fn unlink(&mut self, id: &str) {
        self.linked.remove(id);
    }

    fn get(&self, id: &str) -> Option<D> {
        self.linked.get(id).or_else(|| self.scanned.get(id)).cloned()
    }

    fn scanned_ids(&self) -> Vec<String> {
        self.scanned.keys().cloned().collect()
    }
}

pub struct BluestTransport {
    adapter: Adapter,
    connection_timeout: Duration,
    devices: Arc<Mutex<DeviceCache<Device>>>,
    characteristics: Mutex<HashMap<CharacteristicHandle, Characteristic>>,
    scan_cancel: Mutex<Option<CancellationToken>>,
    /// One connection watcher per linked device
    watchers: Mutex<HashMap<String, CancellationToken>>,
    /// Devices we asked to disconnect, so the watcher reports a clean disconnect instead of a loss
    requested_disconnects: Arc<Mutex<HashSet<String>>>,
    events: broadcast::Sender<TransportEvent>,
}

impl BluestTransport {
    /// Opens the default adapter
    pub async fn new(connection_timeout: Duration) -> Result<Self> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| anyhow!("No Bluetooth adapter found"))?;
        info!("Bluetooth adapter opened.");
        let (events, _) = broadcast::channel(32);

        Ok(Self {
            adapter,
            connection_timeout,
            devices: Arc::new(Mutex::new(DeviceCache::new())),
            characteristics: Mutex::new(HashMap::new()),
            scan_cancel: Mutex::new(None),
            watchers: Mutex::new(HashMap::new()),
            requested_disconnects: Arc::new(Mutex::new(HashSet::new())),
            events,
        })
    }

    fn device(&self, id: &str) -> Result<Device, TransportError> {
        lock(&self.devices)
            .get(id)
            .ok_or_else(|| TransportError::DeviceNotFound(id.to_string()))
    }

    fn forget_characteristics(&self, peer_id: &str) {
        lock(&self.characteristics).retain(|handle, _| handle.peer_id != peer_id);
    }

    fn cached_characteristic(&self, handle: &CharacteristicHandle) -> Result<Characteristic, TransportError> {
        lock(&self.characteristics)
            .get(handle)
            .cloned()
            .ok_or(TransportError::CharacteristicNotFound(handle.characteristic))
    }

    /// Watches the link and reports how it ended
    fn spawn_connection_watcher(&self, device: Device) {
        let id = device.id().to_string();
        let token = CancellationToken::new();
        if let Some(previous) = lock(&self.watchers).insert(id.clone(), token.clone()) {
            previous.cancel();
        }

        let adapter = self.adapter.clone();
        let events = self.events.clone();
        let requested = self.requested_disconnects.clone();
        let devices = self.devices.clone();

        tokio::spawn(async move {
            let mut connection_events = match adapter.device_connection_events(&device).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Connection events unavailable for {}: {}", id, e);
                    return;
                }
            };

            loop {
                tokio::select! {
                    event = connection_events.next() => match event {
                        Some(ConnectionEvent::Disconnected) => {
                            lock(&devices).unlink(&id);
                            let was_requested = lock(&requested).remove(&id);
                            let event = if was_requested {
                                TransportEvent::DeviceDisconnected(id.clone())
                            } else {
                                TransportEvent::DeviceConnectionLost {
                                    id: id.clone(),
                                    reason: "link dropped".to_string(),
                                }
                            };
                            if events.send(event).is_err() {
                                debug!("No listener for link events of {}", id);
                            }
                            break;
                        }
                        Some(_) => debug!("Device {} reported connected", id),
                        None => break,
                    },
                    _ = token.cancelled() => break,
                }
            }
            debug!("Connection watcher for {} finished", id);
        });
    }
}

#[async_trait]
impl Transport for BluestTransport {
    async fn is_radio_enabled(&self) -> bool {
        match self.adapter.is_available().await {
            Ok(available) => available,
            Err(e) => {
                error!("Failed to query adapter availability: {}", e);
                false
            }
        }
    }

    async fn start_scan(
        &self,
        timeout: Duration,
        cancel: CancellationToken,
        discovered: mpsc::UnboundedSender<Advertisement>,
    ) -> Result<(), TransportError> {
        if !self.is_radio_enabled().await {
            return Err(TransportError::Unavailable);
        }
        let scan_cancel = cancel.child_token();
        if let Some(previous) = lock(&self.scan_cancel).replace(scan_cancel.clone()) {
            previous.cancel();
        }
        lock(&self.devices).clear_scanned();

        info!("Starting bluetooth scan");
        let mut scan_stream = self.adapter.scan(&[]).await?;
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                result = scan_stream.next() => match result {
                    Some(discovered_device) => {
                        let device = discovered_device.device;
                        let id = device.id().to_string();
                        let name = discovered_device
                            .adv_data
                            .local_name
                            .clone()
                            .or_else(|| device.name().ok());
                        debug!("Found device - Device: {:?}, RSSI: {:?}", device, discovered_device.rssi);

                        let advertisement = Advertisement {
                            mac_address: extract_mac_address(&id),
                            id: id.clone(),
                            name,
                            rssi: discovered_device.rssi,
                        };
                        lock(&self.devices).insert_scanned(id, device);
                        if discovered.send(advertisement).is_err() {
                            info!("Scan listener went away.");
                            break;
                        }
                    }
                    None => {
                        info!("Bluetooth scan stream has ended.");
                        break;
                    }
                },
                _ = &mut deadline => {
                    info!("Scan time bound of {:?} reached.", timeout);
                    break;
                }
                _ = scan_cancel.cancelled() => {
                    info!("Scan cancelled.");
                    break;
                }
            }
        }

        lock(&self.scan_cancel).take();
        Ok(())
    }

    async fn stop_scan(&self) {
        match lock(&self.scan_cancel).take() {
            Some(token) => token.cancel(),
            None => info!("No active scan to stop."),
        }
    }

    async fn connected_devices(&self) -> Result<Vec<PeerHandle>, TransportError> {
        let connected = self.adapter.connected_devices().await?;
        let mut devices = lock(&self.devices);
        Ok(connected
            .into_iter()
            .map(|device| {
                let id = device.id().to_string();
                devices.insert_scanned(id.clone(), device);
                PeerHandle::new(id)
            })
            .collect())
    }

    async fn discovered_devices(&self) -> Vec<PeerHandle> {
        lock(&self.devices)
            .scanned_ids()
            .into_iter()
            .map(PeerHandle::new)
            .collect()
    }

    async fn connect(
        &self,
        peer: &PeerHandle,
        parameters: ConnectParameters,
        cancel: CancellationToken,
    ) -> Result<(), TransportError> {
        let device = self.device(&peer.id)?;
        if parameters.auto_connect {
            warn!("Auto-connect is not supported by bluest, connecting once.");
        }
        debug!("Connect parameters for {}: {:?}", peer.id, parameters);

        if device.is_connected().await {
            info!("Device {} already connected.", peer.id);
        } else {
            info!("Initiating connection to {}...", peer.id);
            tokio::select! {
                result = tokio::time::timeout(self.connection_timeout, self.adapter.connect_device(&device)) => {
                    match result {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => return Err(e.into()),
                        Err(_) => return Err(TransportError::Timeout(self.connection_timeout)),
                    }
                }
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            }
        }

        lock(&self.devices).link(&peer.id, device.clone());
        self.spawn_connection_watcher(device);
        if self.events.send(TransportEvent::DeviceConnected(peer.id.clone())).is_err() {
            debug!("No listener for connect event of {}", peer.id);
        }
        Ok(())
    }

    async fn disconnect(&self, peer: &PeerHandle) -> Result<(), TransportError> {
        let device = self.device(&peer.id)?;
        self.forget_characteristics(&peer.id);

        if device.is_connected().await {
            info!("Disconnecting from device {}", peer.id);
            lock(&self.requested_disconnects).insert(peer.id.clone());
            if let Err(e) = self.adapter.disconnect_device(&device).await {
                lock(&self.requested_disconnects).remove(&peer.id);
                return Err(e.into());
            }
            info!("Successfully disconnected");
        } else {
            info!("Device {} not connected", peer.id);
        }
        lock(&self.devices).unlink(&peer.id);
        Ok(())
    }

    async fn get_characteristic(
        &self,
        peer: &PeerHandle,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Option<CharacteristicHandle>, TransportError> {
        let handle = CharacteristicHandle {
            peer_id: peer.id.clone(),
            service,
            characteristic,
        };
        if lock(&self.characteristics).contains_key(&handle) {
            return Ok(Some(handle));
        }

        let device = self.device(&peer.id)?;
        let services = device.services().await?;
        let Some(glove_service) = services.iter().find(|s| s.uuid() == service).cloned() else {
            for available in &services {
                info!("Available service: {}", available.uuid());
            }
            warn!("Service not found: {}", service);
            return Ok(None);
        };

        for candidate in glove_service.characteristics().await? {
            if candidate.uuid() == characteristic {
                debug!("Found characteristic: {}", characteristic);
                lock(&self.characteristics).insert(handle.clone(), candidate);
                return Ok(Some(handle));
            }
        }
        Ok(None)
    }

    async fn write_characteristic(&self, handle: &CharacteristicHandle, data: &[u8]) -> Result<(), TransportError> {
        let characteristic = self.cached_characteristic(handle)?;
        characteristic.write(data).await?;
        Ok(())
    }

    async fn read_characteristic(&self, handle: &CharacteristicHandle) -> Result<Vec<u8>, TransportError> {
        let characteristic = self.cached_characteristic(handle)?;
        Ok(characteristic.read().await?)
    }

    fn events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }
}

/// Pulls a MAC address out of a platform device id, when it embeds one
fn extract_mac_address(device_id: &str) -> Option<String> {
    let re = Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").ok()?;
    re.find_iter(device_id)
        .last()
        .map(|m| m.as_str().to_uppercase())
}
