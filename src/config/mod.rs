// SPDX-License-Identifier: MPL-2.0
//! This module handles the player's configuration, loading user preferences
//! from a `settings.toml` file.
//!
//! Command-line flags always take precedence over the file; the file only
//! supplies values that have no flag (device names, sync tuning, log filter).
//!
//! # Examples
//!
//! ```no_run
//! use fbplay::config;
//! use std::path::Path;
//!
//! // Load existing configuration
//! let config = config::load().unwrap_or_default();
//! println!("sync window: {}", config.sync_window());
//!
//! // Or from a specific path
//! let custom = config::load_from_path(Path::new("./settings.toml")).unwrap_or_default();
//! println!("audio device: {:?}", custom.audio_device);
//! ```

mod defaults;

pub use defaults::*;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "settings.toml";
const APP_NAME: &str = "fbplay";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Output device name as reported by the audio host; `None` uses the default device.
    #[serde(default)]
    pub audio_device: Option<String>,
    /// Framebuffer device path; the `FBDEV` environment variable wins over this.
    #[serde(default)]
    pub framebuffer: Option<String>,
    #[serde(default)]
    pub sync_window: Option<u32>,
    #[serde(default)]
    pub warmup_frames: Option<u32>,
    #[serde(default)]
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio_device: None,
            framebuffer: None,
            sync_window: Some(DEFAULT_SYNC_WINDOW),
            warmup_frames: Some(DEFAULT_WARMUP_FRAMES),
            log_filter: None,
        }
    }
}

impl Config {
    /// Correction window size, falling back to the default.
    #[must_use]
    pub fn sync_window(&self) -> u32 {
        self.sync_window.unwrap_or(DEFAULT_SYNC_WINDOW)
    }

    /// Warm-up length used by startup drift capture.
    #[must_use]
    pub fn warmup_frames(&self) -> u32 {
        self.warmup_frames.unwrap_or(DEFAULT_WARMUP_FRAMES)
    }

    /// Resolves the framebuffer device: `env_override`, then the file, then `/dev/fb0`.
    #[must_use]
    pub fn framebuffer_path(&self, env_override: Option<String>) -> PathBuf {
        env_override
            .filter(|path| !path.is_empty())
            .or_else(|| self.framebuffer.clone())
            .map_or_else(|| PathBuf::from(DEFAULT_FRAMEBUFFER), PathBuf::from)
    }

    /// Tracing filter directive, falling back to the default.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

fn get_default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut path| {
        path.push(APP_NAME);
        path.push(CONFIG_FILE);
        path
    })
}

pub fn load() -> Result<Config> {
    if let Some(path) = get_default_config_path() {
        if path.exists() {
            return load_from_path(&path);
        }
    }
    Ok(Config::default())
}

pub fn load_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content).unwrap_or_default())
}
