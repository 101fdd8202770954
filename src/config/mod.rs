pub mod glove_config;

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::config::glove_config::GloveConfig;

const APP_DIR_NAME: &str = "haptic-glove-bridge";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub glove: GloveConfig,
}

impl AppConfig {
    pub async fn load(config_dir: &Path) -> Result<Self> {
        Ok(AppConfig {
            glove: GloveConfig::load_config(config_dir).await?,
        })
    }

    pub async fn save(&self, config_dir: &Path) -> Result<()> {
        self.glove.save_config(config_dir).await
    }
}

/// Per-user configuration directory of the bridge
pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| anyhow!("No configuration directory available on this platform"))
}

/// Per-user data directory, where sessions and patterns are stored
pub fn data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| anyhow!("No data directory available on this platform"))
}
