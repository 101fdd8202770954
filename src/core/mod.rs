//! Core functionality for the haptic glove bridge

pub mod bluetooth;
pub mod events;
pub mod glove;

// Re-export commonly used types
pub use bluetooth::{ConnectionManager, ConnectionState, GloveDevice};
pub use events::{EventBus, GloveEvent};
pub use glove::{VibrationController, VibrationPattern};
