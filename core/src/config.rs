//! Configuration management (config.toml)
//!
//! Handles loading, saving, and providing defaults for core settings.
//! Settings are stored in TOML format in the platform-specific config directory.
//! Every field has a serde default so partial files are accepted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::video::{MAX_SCALE_FACTOR, SamplerMode};

/// Configuration file errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Core configuration.
///
/// Contains all tunable settings organized into sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CoreConfig {
    /// Emulation loop pacing
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Audio pipeline settings
    #[serde(default)]
    pub audio: AudioConfig,
    /// Video pipeline settings
    #[serde(default)]
    pub video: VideoConfig,
}

/// Emulation loop pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Presentation cap in Hz (default: 60.0)
    #[serde(default = "default_refresh_hz")]
    pub display_refresh_hz: f64,
    /// Maximum catch-up frames per tick (default: 5)
    #[serde(default = "default_max_frame_skip")]
    pub max_frame_skip: u32,
    /// Request real-time scheduling for the emulation thread (default: true)
    #[serde(default = "default_true")]
    pub realtime_priority: bool,
    /// Real-time computation budget per tick in milliseconds (default: 7)
    #[serde(default = "default_computation_ms")]
    pub computation_budget_ms: u32,
    /// Real-time constraint per tick in milliseconds (default: 30)
    #[serde(default = "default_constraint_ms")]
    pub constraint_ms: u32,
}

/// Audio pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Whether audio is produced at all (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Extra ticks of ring buffer headroom (default: 3)
    #[serde(default = "default_slack_buffers")]
    pub slack_buffers: u32,
    /// Override the output sample rate (default: native rate)
    #[serde(default)]
    pub output_sample_rate: Option<u32>,
    /// Override the output block size in frames (default: one tick)
    #[serde(default)]
    pub block_frames: Option<u32>,
}

/// Video pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Whether frames are handed to the renderer (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Sampling used by the scale filter (default: nearest)
    #[serde(default)]
    pub sampler: SamplerMode,
    /// Integer output scale (default: 1, range: 1-8)
    #[serde(default = "default_scale")]
    pub scale: u32,
}

fn default_true() -> bool {
    true
}
fn default_refresh_hz() -> f64 {
    60.0
}
fn default_max_frame_skip() -> u32 {
    5
}
fn default_computation_ms() -> u32 {
    7
}
fn default_constraint_ms() -> u32 {
    30
}
fn default_slack_buffers() -> u32 {
    3
}
fn default_scale() -> u32 {
    1
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            display_refresh_hz: default_refresh_hz(),
            max_frame_skip: default_max_frame_skip(),
            realtime_priority: default_true(),
            computation_budget_ms: default_computation_ms(),
            constraint_ms: default_constraint_ms(),
        }
    }
}

impl SchedulerConfig {
    /// Minimum interval between presented frames
    pub fn refresh_interval(&self) -> Duration {
        let hz = if self.display_refresh_hz.is_finite() && self.display_refresh_hz > 0.0 {
            self.display_refresh_hz
        } else {
            default_refresh_hz()
        };
        Duration::from_secs_f64(1.0 / hz)
    }

    pub fn computation_budget(&self) -> Duration {
        Duration::from_millis(self.computation_budget_ms as u64)
    }

    pub fn constraint(&self) -> Duration {
        Duration::from_millis(self.constraint_ms as u64)
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            slack_buffers: default_slack_buffers(),
            output_sample_rate: None,
            block_frames: None,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            sampler: SamplerMode::default(),
            scale: default_scale(),
        }
    }
}

impl VideoConfig {
    /// Scale clamped to the supported range
    pub fn clamped_scale(&self) -> u32 {
        self.scale.clamp(1, MAX_SCALE_FACTOR)
    }
}

/// Returns the platform-specific configuration directory.
///
/// On Windows: `%APPDATA%\emucore\config`
/// On macOS: `~/Library/Application Support/io.emucore.emucore`
/// On Linux: `~/.config/emucore`
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.emucore", "", "emucore")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Loads the configuration from the platform config directory.
///
/// Returns default values if the file doesn't exist or cannot be parsed.
pub fn load() -> CoreConfig {
    let Some(path) = config_dir().map(|dir| dir.join("config.toml")) else {
        return CoreConfig::default();
    };
    match load_from(&path) {
        Ok(config) => config,
        Err(ConfigError::Read { .. }) => CoreConfig::default(),
        Err(e) => {
            tracing::warn!("{e}; using defaults");
            CoreConfig::default()
        }
    }
}

/// Loads the configuration from an explicit path.
pub fn load_from(path: &Path) -> Result<CoreConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Saves the configuration to the platform config directory.
///
/// Creates the directory if it doesn't exist. Does nothing when no home
/// directory can be determined.
pub fn save(config: &CoreConfig) -> Result<(), ConfigError> {
    match config_dir() {
        Some(dir) => save_to(config, &dir.join("config.toml")),
        None => Ok(()),
    }
}

/// Saves the configuration to an explicit path, creating parent directories.
pub fn save_to(config: &CoreConfig, path: &Path) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(write_err)
}
