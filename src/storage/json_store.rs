use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{error, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::sync::Mutex;

use crate::core::bluetooth::GloveDevice;
use crate::core::glove::{TherapySession, VibrationPattern};
use crate::storage::{GloveStore, StoreError};

const SESSIONS_FILE_NAME: &str = "therapy_sessions.json";
const PATTERNS_FILE_NAME: &str = "vibration_patterns.json";
const LAST_DEVICE_FILE_NAME: &str = "last_device.json";

/// Only the newest sessions are kept
const MAX_SESSIONS: usize = 100;

/// Stores each collection as a pretty-printed JSON file under one directory
pub struct JsonFileStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles on the files.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read_json<T: DeserializeOwned>(&self, file_name: &str) -> Option<T> {
        let file_path = self.dir.join(file_name);
        if !file_path.exists() {
            return None;
        }
        let json = match fs::read_to_string(&file_path).await {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to read {:?}: {}", file_path, e);
                return None;
            }
        };
        if json.trim().is_empty() {
            return None;
        }
        match serde_json::from_str(&json) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring unreadable {:?}: {}", file_path, e);
                None
            }
        }
    }

    async fn write_json<T: Serialize + ?Sized>(&self, file_name: &str, value: &T) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;
        let file_path = self.dir.join(file_name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&file_path, json).await?;
        info!("Saved {:?}", file_path);
        Ok(())
    }

    async fn remove_file(&self, file_name: &str) -> Result<(), StoreError> {
        let file_path = self.dir.join(file_name);
        match fs::remove_file(&file_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_sessions(&self) -> Vec<TherapySession> {
        let mut sessions: Vec<TherapySession> = self.read_json(SESSIONS_FILE_NAME).await.unwrap_or_default();
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        sessions
    }
}

#[async_trait]
impl GloveStore for JsonFileStore {
    async fn save_session(&self, session: &TherapySession) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut sessions = self.load_sessions().await;
        sessions.retain(|s| s.id != session.id);
        sessions.push(session.clone());
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        sessions.truncate(MAX_SESSIONS);
        self.write_json(SESSIONS_FILE_NAME, &sessions).await
    }

    async fn session_history(&self, limit: usize) -> Vec<TherapySession> {
        let mut sessions = self.load_sessions().await;
        if limit > 0 {
            sessions.truncate(limit);
        }
        sessions
    }

    async fn session_by_id(&self, session_id: &str) -> Option<TherapySession> {
        self.load_sessions().await.into_iter().find(|s| s.id == session_id)
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut sessions = self.load_sessions().await;
        let before = sessions.len();
        sessions.retain(|s| s.id != session_id);
        if sessions.len() == before {
            return Ok(());
        }
        self.write_json(SESSIONS_FILE_NAME, &sessions).await
    }

    async fn save_pattern(&self, pattern: &VibrationPattern) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut patterns = self.get_patterns().await;
        patterns.retain(|p| p.id != pattern.id);
        let mut stored = pattern.clone();
        stored.is_active = false;
        patterns.push(stored);
        self.write_json(PATTERNS_FILE_NAME, &patterns).await
    }

    async fn get_patterns(&self) -> Vec<VibrationPattern> {
        self.read_json(PATTERNS_FILE_NAME).await.unwrap_or_default()
    }

    async fn delete_pattern(&self, pattern_id: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut patterns = self.get_patterns().await;
        let before = patterns.len();
        patterns.retain(|p| p.id != pattern_id);
        if patterns.len() == before {
            return Ok(());
        }
        self.write_json(PATTERNS_FILE_NAME, &patterns).await
    }

    async fn save_last_device(&self, device: &GloveDevice) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.write_json(LAST_DEVICE_FILE_NAME, device).await
    }

    async fn get_last_device(&self) -> Option<GloveDevice> {
        self.read_json(LAST_DEVICE_FILE_NAME).await
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.remove_file(SESSIONS_FILE_NAME).await?;
        self.remove_file(PATTERNS_FILE_NAME).await?;
        self.remove_file(LAST_DEVICE_FILE_NAME).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::glove::default_patterns;
    use chrono::{Duration, Local};

    fn temp_store() -> JsonFileStore {
        let dir = std::env::temp_dir().join(format!("glove-store-{}", uuid::Uuid::new_v4()));
        JsonFileStore::new(dir)
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = temp_store();
        assert!(store.get_patterns().await.is_empty());
        assert!(store.session_history(0).await.is_empty());
        assert!(store.get_last_device().await.is_none());
    }

    #[tokio::test]
    async fn test_save_pattern_upserts_by_id() {
        let store = temp_store();
        let mut pattern = default_patterns().remove(1);
        store.save_pattern(&pattern).await.unwrap();

        pattern.intensity = 65;
        pattern.is_active = true;
        store.save_pattern(&pattern).await.unwrap();

        let saved = store.get_patterns().await;
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].intensity, 65);
        assert!(!saved[0].is_active);

        store.delete_pattern(&pattern.id).await.unwrap();
        assert!(store.get_patterns().await.is_empty());
        let _ = std::fs::remove_dir_all(store.dir());
    }

    #[tokio::test]
    async fn test_session_history_newest_first_with_limit() {
        let store = temp_store();
        let pattern = default_patterns().remove(0);
        let mut ids = Vec::new();
        for minutes_ago in [30, 10, 20] {
            let mut session = TherapySession::begin(&pattern, None);
            session.start_time = Local::now() - Duration::minutes(minutes_ago);
            ids.push((minutes_ago, session.id.clone()));
            store.save_session(&session).await.unwrap();
        }

        let history = store.session_history(0).await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].id, ids[1].1);
        assert_eq!(history[2].id, ids[0].1);

        assert_eq!(store.session_history(2).await.len(), 2);
        assert!(store.session_by_id(&ids[2].1).await.is_some());

        store.delete_session(&ids[2].1).await.unwrap();
        assert!(store.session_by_id(&ids[2].1).await.is_none());
        let _ = std::fs::remove_dir_all(store.dir());
    }

    #[tokio::test]
    async fn test_session_history_is_capped() {
        let store = temp_store();
        let pattern = default_patterns().remove(0);
        for i in 0..(MAX_SESSIONS + 5) {
            let mut session = TherapySession::begin(&pattern, None);
            session.start_time = Local::now() - Duration::seconds(i as i64);
            store.save_session(&session).await.unwrap();
        }
        assert_eq!(store.session_history(0).await.len(), MAX_SESSIONS);
        let _ = std::fs::remove_dir_all(store.dir());
    }

    #[tokio::test]
    async fn test_last_device_and_clear_all() {
        let store = temp_store();
        let device = GloveDevice::new("dev-1", "BlueBuzzah L", -42);
        store.save_last_device(&device).await.unwrap();
        store.save_pattern(&default_patterns()[0]).await.unwrap();

        let loaded = store.get_last_device().await.unwrap();
        assert_eq!(loaded.id, "dev-1");
        assert_eq!(loaded.signal_strength, -42);

        store.clear_all().await.unwrap();
        assert!(store.get_last_device().await.is_none());
        assert!(store.get_patterns().await.is_empty());
        let _ = std::fs::remove_dir_all(store.dir());
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_empty() {
        let store = temp_store();
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.dir().join(PATTERNS_FILE_NAME), "{not json").unwrap();
        assert!(store.get_patterns().await.is_empty());
        let _ = std::fs::remove_dir_all(store.dir());
    }
}
