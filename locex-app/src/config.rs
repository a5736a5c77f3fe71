//! Configuration file loading and override resolution.
//!
//! Priority, highest first: command-line flag, environment variable (both
//! arrive through clap), config file, compiled default.

use crate::cli::Cli;
use anyhow::{Context, Result};
use locex_experiment::RunConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub api: ApiConfig,
    pub run: RunConfig,
    pub audio: AudioConfig,
    pub display: DisplayConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            api: ApiConfig::default(),
            run: RunConfig::default(),
            audio: AudioConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub username: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.into(),
            username: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub enabled: bool,
    pub volume: f32,
    /// Output device name; the host default when unset or not found.
    pub device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: locex_audio::DEFAULT_VOLUME,
            device: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub fullscreen: bool,
    pub font_path: Option<PathBuf>,
    pub icon_path: Option<PathBuf>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            fullscreen: true,
            font_path: None,
            icon_path: None,
        }
    }
}

/// `<config dir>/locex/config.toml`, e.g. `~/.config/locex/config.toml` on Linux.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("locex").join("config.toml"))
}

impl AppConfig {
    /// Loads `explicit` if given (it must exist), else the default path if
    /// present, else compiled defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        config.sanitize();
        Ok(config)
    }

    /// Applies values given on the command line or through the environment.
    pub fn with_overrides(mut self, cli: &Cli) -> Self {
        if let Some(url) = &cli.api_url {
            self.api.base_url = url.clone();
        }
        if let Some(username) = &cli.username {
            self.api.username = Some(username.clone());
        }
        self
    }

    fn sanitize(&mut self) {
        if !(0.0..=1.0).contains(&self.audio.volume) {
            warn!(volume = self.audio.volume, "Volume outside 0..1, clamping");
            self.audio.volume = self.audio.volume.clamp(0.0, 1.0);
        }
        if self.log_level.trim().is_empty() {
            self.log_level = "info".into();
        }
    }
}
