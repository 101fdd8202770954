//! Persistence collaborator
//! The core saves through [`GloveStore`] and never waits on the outcome for its own correctness.

mod json_store;

pub use json_store::JsonFileStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::bluetooth::GloveDevice;
use crate::core::glove::{TherapySession, VibrationPattern};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait GloveStore: Send + Sync {
    /// Insert or replace a session by id
    async fn save_session(&self, session: &TherapySession) -> Result<(), StoreError>;

    /// Sessions newest first; `limit == 0` returns all
    async fn session_history(&self, limit: usize) -> Vec<TherapySession>;

    async fn session_by_id(&self, session_id: &str) -> Option<TherapySession>;

    async fn delete_session(&self, session_id: &str) -> Result<(), StoreError>;

    /// Insert or replace a pattern by id
    async fn save_pattern(&self, pattern: &VibrationPattern) -> Result<(), StoreError>;

    async fn get_patterns(&self) -> Vec<VibrationPattern>;

    async fn delete_pattern(&self, pattern_id: &str) -> Result<(), StoreError>;

    async fn save_last_device(&self, device: &GloveDevice) -> Result<(), StoreError>;

    async fn get_last_device(&self) -> Option<GloveDevice>;

    async fn clear_all(&self) -> Result<(), StoreError>;
}
