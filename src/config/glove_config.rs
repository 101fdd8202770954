use std::path::Path;
use std::time::Duration;

use crate::core::bluetooth::{
    CONNECTION_TIMEOUT_SECS, DEFAULT_SCAN_TIMEOUT_SECS, DEVICE_NAME_PREFIX, EVENT_CHANNEL_CAPACITY,
};
use crate::utils::ensure_directory_exists;
use anyhow::Result;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

const CONFIG_FILE_NAME: &str = "glove_config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GloveConfig {
    /// Advertised-name prefix a device must carry to be treated as a glove (case-insensitive)
    pub device_name_prefix: String,

    /// How long a scan runs when the caller does not stop it
    pub scan_timeout_secs: u64,

    /// Upper bound on a single connection attempt
    pub connection_timeout_secs: u64,

    /// Buffered events per subscriber before slow listeners start lagging
    pub event_channel_capacity: usize,

    /// Log filter: off, error, warn, info, debug or trace
    pub log_level: String,
}

impl Default for GloveConfig {
    fn default() -> Self {
        GloveConfig {
            device_name_prefix: DEVICE_NAME_PREFIX.to_string(),
            scan_timeout_secs: DEFAULT_SCAN_TIMEOUT_SECS,
            connection_timeout_secs: CONNECTION_TIMEOUT_SECS,
            event_channel_capacity: EVENT_CHANNEL_CAPACITY,
            log_level: "info".to_string(),
        }
    }
}

impl GloveConfig {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Loads the config from `config_dir`, falling back to defaults when no file exists.
    pub async fn load_config(config_dir: &Path) -> Result<Self> {
        let file_path = config_dir.join(CONFIG_FILE_NAME);

        if !file_path.exists() {
            warn!("Config file not found at {:?}, using default.", file_path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(&file_path).await?;
        let config: Self = serde_json::from_str(&config_json)?;

        info!("Config loaded from {:?}", file_path);
        Ok(config)
    }

    /// Saves the current config into `config_dir`.
    pub async fn save_config(&self, config_dir: &Path) -> Result<()> {
        ensure_directory_exists(config_dir).await?;
        let file_path = config_dir.join(CONFIG_FILE_NAME);

        let config_json = match serde_json::to_string_pretty(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize glove config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(&file_path, config_json).await?;

        info!("Glove config saved to {:?}.", file_path);
        Ok(())
    }
}
