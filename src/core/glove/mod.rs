//! Glove therapy logic
//! Vibration patterns, the command codec, therapy sessions and the vibration controller.

mod commands;
mod controller;
mod patterns;
mod session;

pub use commands::{FrameCodec, GloveCommand, PlaceholderCodec};
pub use controller::VibrationController;
pub use patterns::{VibrationPattern, default_patterns};
pub use session::TherapySession;
