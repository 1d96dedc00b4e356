use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const CONFIG_DIR_PREFIX: &str = "gsheet-integration";

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4";
const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000/callback";
const DEFAULT_EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub google: GoogleConfig,
    pub storage: StorageConfig,
}

/// Google endpoints and token handling.
///
/// The endpoint URLs only need changing when pointing the tool at a test
/// double of the Google APIs.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GoogleConfig {
    pub auth_url: String,
    pub token_url: String,
    pub api_base_url: String,
    pub redirect_uri: String,
    /// Tokens expiring within this many seconds are treated as expired.
    pub expiry_margin_secs: i64,
    pub timeout_secs: Option<u64>,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            api_base_url: SHEETS_API_URL.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            expiry_margin_secs: DEFAULT_EXPIRY_MARGIN_SECS,
            timeout_secs: None,
        }
    }
}

impl GoogleConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides the default option store location in the XDG data directory.
    pub options_path: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            debug!(path = ?config_path, "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        if config.google.expiry_margin_secs < 0 {
            return Err(AppError::Config(
                "google.expiry_margin_secs must not be negative".to_string(),
            ));
        }

        Ok(config)
    }

    fn xdg_dirs() -> xdg::BaseDirectories {
        xdg::BaseDirectories::with_prefix(CONFIG_DIR_PREFIX)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        let xdg_dirs = Self::xdg_dirs();
        xdg_dirs
            .place_config_file("config.toml")
            .map_err(|e| AppError::Config(format!("Failed to create config directory: {}", e)))
    }

    /// Get the option store path, honouring `storage.options_path`
    pub fn options_file(&self) -> Result<PathBuf> {
        if let Some(path) = &self.storage.options_path {
            return Ok(path.clone());
        }

        let xdg = Self::xdg_dirs();
        xdg.place_data_file("options.json")
            .map_err(|e| AppError::Config(format!("Failed to create data directory: {}", e)))
    }
}
