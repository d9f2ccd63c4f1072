use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

pub const API_URL_ENV: &str = "ENTIGRAPH_API_URL";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    #[serde(default)]
    pub trust_invalid_server_cert: bool,
    /// Worker pool size for `entity restore` when `--workers` is not given.
    #[serde(default = "default_workers")]
    pub default_workers: usize,
    #[serde(default = "default_retries")]
    pub request_retries: u32,
}

fn default_workers() -> usize {
    10
}

fn default_retries() -> u32 {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "https://api.entigraph.io".to_string(),
            trust_invalid_server_cert: false,
            default_workers: default_workers(),
            request_retries: default_retries(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;

        let mut config = if config_path.exists() {
            info!("Loading config from: {:?}", config_path);
            let contents =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;
            Self::from_json(&contents)?
        } else {
            warn!("Config file not found, using defaults");
            let config = Self::default();
            config.save()?;
            config
        };

        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.is_empty() {
                config.api_url = url;
            }
        }
        config.api_url = config.api_url.trim_end_matches('/').to_string();
        Ok(config)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("Failed to parse config file")
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path()?;
        let config_dir = config_path
            .parent()
            .context("Failed to get config directory")?;

        std::fs::create_dir_all(config_dir).context("Failed to create config directory")?;

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents).context("Failed to write config file")?;

        info!("Config saved to: {:?}", config_path);
        Ok(())
    }

    pub fn clear() -> Result<()> {
        let config_path = Self::config_file_path()?;
        if config_path.exists() {
            std::fs::remove_file(&config_path).context("Failed to remove config file")?;
            info!("Removed config file: {:?}", config_path);
        }
        Ok(())
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(config_dir.join("entigraph"))
    }

    fn config_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}
