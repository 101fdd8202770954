//! Vibration controller for the glove
//! The only component that writes to the vibration-control characteristic.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};

use crate::core::bluetooth::constants::{UUID_BATTERY_LEVEL_CHAR, UUID_PRIMARY_SERVICE, UUID_VIBRATION_CONTROL_CHAR};
use crate::core::bluetooth::ConnectionManager;
use crate::core::events::{EventBus, GloveEvent};
use crate::core::glove::commands::{FrameCodec, PlaceholderCodec};
use crate::core::glove::patterns::{VibrationPattern, default_patterns};
use crate::core::glove::session::TherapySession;
use crate::storage::GloveStore;

#[derive(Default)]
struct ActiveSlot {
    /// Controller-owned copy of the running pattern
    current: Option<VibrationPattern>,
    session: Option<TherapySession>,
}

pub struct VibrationController {
    connection: Arc<ConnectionManager>,
    codec: Arc<dyn FrameCodec>,
    events: EventBus,
    slot: Mutex<ActiveSlot>,
    /// Serializes start, stop and set_intensity
    command_lock: tokio::sync::Mutex<()>,
    store: Option<Arc<dyn GloveStore>>,
}

impl VibrationController {
    pub fn new(connection: Arc<ConnectionManager>, events: EventBus) -> Self {
        Self::with_codec(connection, events, Arc::new(PlaceholderCodec))
    }

    pub fn with_codec(connection: Arc<ConnectionManager>, events: EventBus, codec: Arc<dyn FrameCodec>) -> Self {
        Self {
            connection,
            codec,
            events,
            slot: Mutex::new(ActiveSlot::default()),
            command_lock: tokio::sync::Mutex::new(()),
            store: None,
        }
    }

    /// Record therapy sessions and read saved patterns through `store`
    pub fn with_store(mut self, store: Arc<dyn GloveStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn slot(&self) -> MutexGuard<'_, ActiveSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_vibrating(&self) -> bool {
        self.slot().current.is_some()
    }

    /// The running pattern, with `is_active` set
    pub fn current_pattern(&self) -> Option<VibrationPattern> {
        self.slot().current.clone()
    }

    pub fn default_patterns(&self) -> Vec<VibrationPattern> {
        default_patterns()
    }

    /// Built-in presets followed by any saved patterns
    pub async fn available_patterns(&self) -> Vec<VibrationPattern> {
        let mut patterns = default_patterns();
        if let Some(store) = &self.store {
            patterns.extend(store.get_patterns().await);
        }
        patterns
    }

    /// Starts `pattern` on the glove. False when not connected or the write fails.
    pub async fn start(&self, pattern: &VibrationPattern) -> bool {
        let _command = self.command_lock.lock().await;
        self.start_locked(pattern.clone()).await
    }

    async fn start_locked(&self, mut pattern: VibrationPattern) -> bool {
        if !self.connection.is_connected() {
            warn!("Cannot start vibration: glove not connected");
            return false;
        }

        let frame = self.codec.encode_start(&pattern);
        if !self
            .connection
            .write_characteristic(UUID_PRIMARY_SERVICE, UUID_VIBRATION_CONTROL_CHAR, &frame)
            .await
        {
            warn!("Failed to start pattern {}", pattern.name);
            return false;
        }

        info!(
            "Started pattern {} (intensity {}, {} ms, {} Hz)",
            pattern.name, pattern.intensity, pattern.duration_ms, pattern.frequency_hz
        );
        pattern.is_active = true;
        {
            let mut slot = self.slot();
            if slot.session.is_none() {
                let device_id = self.connection.connected_device().map(|d| d.id);
                slot.session = Some(TherapySession::begin(&pattern, device_id));
            }
            slot.current = Some(pattern);
        }
        self.events.publish(GloveEvent::VibrationStateChanged(true));
        true
    }

    /// Stops the actuator. The stop frame is sent even when nothing is running.
    pub async fn stop(&self) -> bool {
        let _command = self.command_lock.lock().await;
        if !self.connection.is_connected() {
            warn!("Cannot stop vibration: glove not connected");
            return false;
        }

        let frame = self.codec.encode_stop();
        if !self
            .connection
            .write_characteristic(UUID_PRIMARY_SERVICE, UUID_VIBRATION_CONTROL_CHAR, &frame)
            .await
        {
            warn!("Failed to stop vibration");
            return false;
        }

        let session = {
            let mut slot = self.slot();
            if let Some(pattern) = slot.current.as_mut() {
                pattern.is_active = false;
            }
            slot.current = None;
            slot.session.take()
        };
        info!("Vibration stopped");
        if let Some(mut session) = session {
            session.complete();
            self.record_session(session);
        }
        self.events.publish(GloveEvent::VibrationStateChanged(false));
        true
    }

    /// Changes the intensity of the running pattern by restarting it
    pub async fn set_intensity(&self, intensity: i32) -> bool {
        let _command = self.command_lock.lock().await;
        let pattern = {
            let mut slot = self.slot();
            let Some(current) = slot.current.as_mut() else {
                debug!("No active pattern to adjust");
                return false;
            };
            current.intensity = intensity.clamp(0, 100);
            current.clone()
        };
        self.start_locked(pattern).await
    }

    /// Short pulse followed by a stop; reports whether the pulse started
    pub async fn test_connection(&self) -> bool {
        let pattern = VibrationPattern::test_pulse();
        let started = self.start(&pattern).await;
        if started {
            tokio::time::sleep(Duration::from_millis(pattern.duration_ms.max(0) as u64)).await;
            self.stop().await;
        }
        started
    }

    /// Reads the battery characteristic and caches the value on the connected device
    pub async fn battery_level(&self) -> Option<u8> {
        let data = self
            .connection
            .read_characteristic(UUID_PRIMARY_SERVICE, UUID_BATTERY_LEVEL_CHAR)
            .await?;
        let level = self.codec.decode_battery_level(&data)?;
        if level > 100 {
            debug!("Battery reading {} is outside 0-100", level);
        }
        self.connection.record_battery_level(level);
        Some(level)
    }

    fn record_session(&self, session: TherapySession) {
        let Some(store) = self.store.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = store.save_session(&session).await {
                warn!("Failed to save therapy session {}: {}", session.id, e);
            }
        });
    }
}
