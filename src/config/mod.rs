use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub discord: DiscordConfig,
    pub transcription: TranscriptionConfig,
    pub minutes: MinutesConfig,
    pub google: GoogleConfig,
    pub server: ServerConfig,
    pub recording: RecordingConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Bot token used by the gateway adapter.
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub api_key: String,
    pub model: String,
    /// Override for self-hosted Whisper-compatible endpoints.
    pub endpoint: Option<String>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "whisper-1".to_string(),
            endpoint: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MinutesConfig {
    /// Falls back to `transcription.api_key` when empty.
    pub api_key: String,
    pub model: String,
    pub endpoint: Option<String>,
}

impl Default for MinutesConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4.1-mini-2025-04-14".to_string(),
            endpoint: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://localhost:8000/oauth2callback".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Sessions are force-stopped after this many seconds (default: 1 hour).
    pub max_duration_seconds: u64,
    /// Delete the exported audio file once the pipeline finishes.
    pub cleanup_exports: bool,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            max_duration_seconds: 3600,
            cleanup_exports: true,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: Option<PathBuf>,
    pub recordings_dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = global::config_file()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = global::config_file()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(path.clone()),
            None => global::db_file(),
        }
    }

    pub fn recordings_dir(&self) -> Result<PathBuf> {
        match &self.storage.recordings_dir {
            Some(path) => Ok(path.clone()),
            None => global::recordings_dir(),
        }
    }

    /// API key for the minutes formatter, defaulting to the transcription key.
    pub fn minutes_api_key(&self) -> &str {
        if self.minutes.api_key.is_empty() {
            &self.transcription.api_key
        } else {
            &self.minutes.api_key
        }
    }
}
