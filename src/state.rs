//! Application state management
//! Builds the transport, connection manager, vibration controller and store, and wires them together.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::bluetooth::{BluestTransport, ConnectionManager, GloveDevice, Transport};
use crate::core::events::EventBus;
use crate::core::glove::VibrationController;
use crate::storage::{GloveStore, JsonFileStore};

/// Application state
pub struct AppState {
    pub config: AppConfig,
    pub events: EventBus,
    pub connection: Arc<ConnectionManager>,
    pub vibration: Arc<VibrationController>,
    pub store: Arc<dyn GloveStore>,
    listener: JoinHandle<()>,
}

impl AppState {
    /// Opens the system adapter and stores data under `data_dir`
    pub async fn new(config: AppConfig, data_dir: PathBuf) -> Result<Self> {
        info!("Initializing bluetooth transport...");
        let transport = BluestTransport::new(config.glove.connection_timeout()).await?;
        let store = JsonFileStore::new(data_dir);
        Ok(Self::with_transport(config, Arc::new(transport), Arc::new(store)))
    }

    /// Wires the components over an existing transport. Must run inside a tokio runtime.
    pub fn with_transport(config: AppConfig, transport: Arc<dyn Transport>, store: Arc<dyn GloveStore>) -> Self {
        let events = EventBus::new(config.glove.event_channel_capacity);
        let connection = Arc::new(
            ConnectionManager::new(transport, events.clone(), config.glove.device_name_prefix.clone())
                .with_store(store.clone()),
        );
        let vibration = Arc::new(VibrationController::new(connection.clone(), events.clone()).with_store(store.clone()));
        let listener = connection.spawn_event_listener();
        info!("Application state ready.");

        Self {
            config,
            events,
            connection,
            vibration,
            store,
            listener,
        }
    }

    /// Scans for the configured time
    pub async fn scan(&self, cancel: CancellationToken) -> Vec<GloveDevice> {
        self.connection.scan(self.config.glove.scan_timeout(), cancel).await
    }

    pub async fn last_device(&self) -> Option<GloveDevice> {
        self.store.get_last_device().await
    }

    /// Stops any vibration and drops the link
    pub async fn shutdown(&self) {
        if self.connection.is_connected() {
            self.vibration.stop().await;
        }
        self.connection.disconnect().await;
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        self.listener.abort();
    }
}
