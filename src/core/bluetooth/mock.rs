//! Scriptable in-memory transport for unit tests

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::constants::{UUID_BATTERY_LEVEL_CHAR, UUID_PRIMARY_SERVICE, UUID_VIBRATION_CONTROL_CHAR};
use crate::core::bluetooth::transport::{
    Advertisement, CharacteristicHandle, ConnectParameters, PeerHandle, Transport, TransportError, TransportEvent,
};

pub(crate) struct MockTransport {
    pub radio_enabled: AtomicBool,
    pub fail_scan: AtomicBool,
    pub fail_connect: AtomicBool,
    pub fail_write: AtomicBool,
    pub fail_read: AtomicBool,
    pub fail_disconnect: AtomicBool,
    /// Raise `DeviceDisconnected` from `disconnect`, as the radio watcher does
    pub echo_disconnects: AtomicBool,
    pub connect_delay: Mutex<Option<Duration>>,
    pub advertisements: Mutex<Vec<Advertisement>>,
    pub discovered: Mutex<Vec<PeerHandle>>,
    pub connected: Mutex<Vec<PeerHandle>>,
    pub battery: Mutex<Vec<u8>>,
    writes: Mutex<Vec<Vec<u8>>>,
    calls: Mutex<Vec<&'static str>>,
    last_parameters: Mutex<Option<ConnectParameters>>,
    events: broadcast::Sender<TransportEvent>,
}

impl MockTransport {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            radio_enabled: AtomicBool::new(true),
            fail_scan: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            fail_write: AtomicBool::new(false),
            fail_read: AtomicBool::new(false),
            fail_disconnect: AtomicBool::new(false),
            echo_disconnects: AtomicBool::new(false),
            connect_delay: Mutex::new(None),
            advertisements: Mutex::new(Vec::new()),
            discovered: Mutex::new(Vec::new()),
            connected: Mutex::new(Vec::new()),
            battery: Mutex::new(vec![0x55]),
            writes: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            last_parameters: Mutex::new(None),
            events,
        }
    }

    /// A transport that already saw `id` during a scan
    pub fn with_discovered(id: &str) -> Self {
        let transport = Self::new();
        transport.discover(id);
        transport
    }

    pub fn discover(&self, id: &str) {
        self.discovered.lock().unwrap().push(PeerHandle::new(id));
    }

    pub fn slow_connects(&self, delay: Duration) {
        *self.connect_delay.lock().unwrap() = Some(delay);
    }

    pub fn advertise(&self, id: &str, name: Option<&str>, rssi: i16) {
        self.advertisements.lock().unwrap().push(Advertisement {
            id: id.to_string(),
            name: name.map(str::to_string),
            mac_address: None,
            rssi: Some(rssi),
        });
    }

    pub fn set(flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, name: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|c| *c == name)
    }

    pub fn last_parameters(&self) -> Option<ConnectParameters> {
        *self.last_parameters.lock().unwrap()
    }

    pub fn raise(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn is_linked(&self, id: &str) -> bool {
        self.connected.lock().unwrap().iter().any(|p| p.id == id)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn is_radio_enabled(&self) -> bool {
        self.radio_enabled.load(Ordering::SeqCst)
    }

    async fn start_scan(
        &self,
        timeout: Duration,
        cancel: CancellationToken,
        discovered: mpsc::UnboundedSender<Advertisement>,
    ) -> Result<(), TransportError> {
        self.record("start_scan");
        let advertisements = self.advertisements.lock().unwrap().clone();
        for advertisement in advertisements {
            let _ = discovered.send(advertisement);
        }
        if self.fail_scan.load(Ordering::SeqCst) {
            return Err(TransportError::Io("scan aborted".into()));
        }
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {}
            _ = cancel.cancelled() => {}
        }
        Ok(())
    }

    async fn stop_scan(&self) {
        self.record("stop_scan");
    }

    async fn connected_devices(&self) -> Result<Vec<PeerHandle>, TransportError> {
        Ok(self.connected.lock().unwrap().clone())
    }

    async fn discovered_devices(&self) -> Vec<PeerHandle> {
        self.discovered.lock().unwrap().clone()
    }

    async fn connect(
        &self,
        peer: &PeerHandle,
        parameters: ConnectParameters,
        cancel: CancellationToken,
    ) -> Result<(), TransportError> {
        self.record("connect");
        *self.last_parameters.lock().unwrap() = Some(parameters);
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        let delay = *self.connect_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            }
        }
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Timeout(Duration::from_secs(15)));
        }
        if !self.is_linked(&peer.id) {
            self.connected.lock().unwrap().push(peer.clone());
        }
        Ok(())
    }

    async fn disconnect(&self, peer: &PeerHandle) -> Result<(), TransportError> {
        self.record("disconnect");
        self.connected.lock().unwrap().retain(|p| p.id != peer.id);
        if self.fail_disconnect.load(Ordering::SeqCst) {
            return Err(TransportError::Io("disconnect failed".into()));
        }
        if self.echo_disconnects.load(Ordering::SeqCst) {
            self.raise(TransportEvent::DeviceDisconnected(peer.id.clone()));
        }
        Ok(())
    }

    async fn get_characteristic(
        &self,
        peer: &PeerHandle,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Option<CharacteristicHandle>, TransportError> {
        if !self.is_linked(&peer.id) {
            return Err(TransportError::DeviceNotFound(peer.id.clone()));
        }
        let known = service == UUID_PRIMARY_SERVICE
            && (characteristic == UUID_VIBRATION_CONTROL_CHAR || characteristic == UUID_BATTERY_LEVEL_CHAR);
        Ok(known.then(|| CharacteristicHandle {
            peer_id: peer.id.clone(),
            service,
            characteristic,
        }))
    }

    async fn write_characteristic(&self, _handle: &CharacteristicHandle, data: &[u8]) -> Result<(), TransportError> {
        self.record("write");
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(TransportError::Io("write failed".into()));
        }
        self.writes.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn read_characteristic(&self, _handle: &CharacteristicHandle) -> Result<Vec<u8>, TransportError> {
        self.record("read");
        if self.fail_read.load(Ordering::SeqCst) {
            return Err(TransportError::Io("read failed".into()));
        }
        Ok(self.battery.lock().unwrap().clone())
    }

    fn events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }
}
