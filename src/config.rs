//! Persistent user settings.
//!
//! Stored as TOML at `<config_dir>/tuneshelf/config.toml`. Every field has a
//! default so partial files (or none at all) load cleanly.

use crate::{expand_tilde, player::EngineConfig};
use anyhow::{Context, Result, anyhow};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, str::FromStr, time::Duration};

const APP_DIR: &str = "tuneshelf";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_seek_step_secs")]
    pub seek_step_secs: u64,
    #[serde(default)]
    pub auto_advance: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
}

fn default_poll_interval_ms() -> u64 {
    crate::REFRESH_RATE.as_millis() as u64
}

fn default_seek_step_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            seek_step_secs: default_seek_step_secs(),
            auto_advance: false,
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

impl Settings {
    pub fn config_dir() -> Result<PathBuf> {
        // XDG_CONFIG_HOME wins so tests can point the config somewhere disposable
        let base = match std::env::var("XDG_CONFIG_HOME") {
            Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
            _ => dirs::config_dir().ok_or_else(|| anyhow!("Unable to find config directory"))?,
        };
        Ok(base.join(APP_DIR))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn exists() -> Result<bool> {
        Ok(Self::config_path()?.exists())
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)?;
        toml::from_str(&contents).with_context(|| format!("Invalid config at {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(Self::config_path()?, contents)?;
        Ok(())
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = |expected: &str| anyhow!("{key} expects {expected}, got '{value}'");

        match key {
            "poll_interval_ms" => {
                self.poll_interval_ms = value.parse().map_err(|_| invalid("milliseconds"))?
            }
            "seek_step_secs" => {
                self.seek_step_secs = value.parse().map_err(|_| invalid("seconds"))?
            }
            "auto_advance" => {
                self.auto_advance = value.parse().map_err(|_| invalid("true or false"))?
            }
            "log_level" => {
                LevelFilter::from_str(value).map_err(|_| invalid("a log level"))?;
                self.log_level = value.to_string();
            }
            "log_file" => self.log_file = Some(value.to_string()),
            _ => {
                return Err(anyhow!("Unknown configuration key: {key}"));
            }
        }
        Ok(())
    }

    /// A zero interval would spin the engine thread, so it is raised to 1ms.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }

    pub fn seek_step(&self) -> Duration {
        Duration::from_secs(self.seek_step_secs)
    }

    /// Unknown level names fall back to `Info`.
    pub fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(&self.log_level).unwrap_or(LevelFilter::Info)
    }

    pub fn log_file_path(&self) -> Result<PathBuf> {
        match &self.log_file {
            Some(path) => expand_tilde(path),
            None => dirs::cache_dir()
                .map(|dir| dir.join(APP_DIR).join("tuneshelf.log"))
                .ok_or_else(|| anyhow!("Unable to find cache directory")),
        }
    }
}
