//! Events produced for the presentation layer
//! Every subscriber gets its own receiver; delivery order matches publish order.

use log::trace;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::core::bluetooth::{ConnectionState, GloveDevice};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum GloveEvent {
    ConnectionStateChanged(ConnectionState),
    DeviceDiscovered(GloveDevice),
    VibrationStateChanged(bool),
}

impl GloveEvent {
    /// Event name as seen by the frontend
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionStateChanged(_) => "connection-state-changed",
            Self::DeviceDiscovered(_) => "device-discovered",
            Self::VibrationStateChanged(_) => "vibration-state-changed",
        }
    }
}

/// Cloneable publisher shared by the connection manager and the vibration controller
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GloveEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GloveEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: GloveEvent) {
        let name = event.name();
        // No subscribers is not an error.
        if self.tx.send(event).is_err() {
            trace!("No listeners for {} event", name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_sees_events_in_order() {
        let bus = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(GloveEvent::ConnectionStateChanged(ConnectionState::Connecting));
        bus.publish(GloveEvent::VibrationStateChanged(true));

        for rx in [&mut first, &mut second] {
            assert!(matches!(
                rx.try_recv(),
                Ok(GloveEvent::ConnectionStateChanged(ConnectionState::Connecting))
            ));
            assert!(matches!(rx.try_recv(), Ok(GloveEvent::VibrationStateChanged(true))));
        }
    }

    #[test]
    fn test_publish_without_listeners() {
        let bus = EventBus::new(1);
        bus.publish(GloveEvent::VibrationStateChanged(false));
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(GloveEvent::VibrationStateChanged(true)).unwrap();
        assert_eq!(json["event"], "vibration-state-changed");
        assert_eq!(json["payload"], true);
    }
}
