//! Application configuration.
//!
//! The persisted record mirrors what the control surface edits: output
//! folder, replace mode, the capture target (explicit region or monitor
//! index), and cursor visibility. Recording sessions take a snapshot of it
//! at start and never observe later edits.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where recordings are written.
    pub save_path: PathBuf,

    /// Delete previous recordings before starting a new one.
    pub replace_mode: bool,

    /// Explicit capture rectangle `(x, y, width, height)`.
    pub record_region: Option<(i32, i32, u32, u32)>,

    /// Zero-based monitor index to capture.
    pub selected_monitor: Option<usize>,

    /// Draw the pointer glyph into recorded frames.
    pub show_cursor: bool,

    /// Default recording parameters.
    pub recording: RecordingDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default recording parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingDefaults {
    /// Target FPS for recordings.
    pub fps: u32,

    /// Forced capture backend ("compositor" or "screenshot"); probed when unset.
    pub backend: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "reelcap=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            save_path: default_save_path(),
            replace_mode: false,
            record_region: None,
            selected_monitor: None,
            show_cursor: true,
            recording: RecordingDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RecordingDefaults {
    fn default() -> Self {
        Self {
            fps: 30,
            backend: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from `path`, falling back to defaults.
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    /// Save config to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Select an explicit region. Clears any monitor selection.
    pub fn set_region(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.record_region = Some((x, y, width, height));
        self.selected_monitor = None;
    }

    /// Select a monitor by index. Clears any explicit region.
    pub fn select_monitor(&mut self, index: usize) {
        self.selected_monitor = Some(index);
        self.record_region = None;
    }

    /// Return to the default capture target.
    pub fn clear_selection(&mut self) {
        self.record_region = None;
        self.selected_monitor = None;
    }

    /// Clear a saved monitor index that no longer exists.
    ///
    /// Returns `true` if the selection was dropped.
    pub fn drop_stale_monitor(&mut self, monitor_count: usize) -> bool {
        match self.selected_monitor {
            Some(index) if index >= monitor_count => {
                tracing::warn!(
                    index,
                    monitor_count,
                    "Saved monitor selection is out of range, resetting"
                );
                self.selected_monitor = None;
                true
            }
            _ => false,
        }
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"));
    base.join("reelcap").join("config.json")
}

/// Default recordings directory.
fn default_save_path() -> PathBuf {
    std::env::var("XDG_VIDEOS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join("Videos"))
        .join("reelcap")
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}
