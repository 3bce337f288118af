//! Configuration management with YAML support

use anyhow::{bail, Result};
use chrono::{FixedOffset, Local, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the index document inside the storage directory
pub const INDEX_FILE_NAME: &str = "index.json";

/// Subdirectory holding copies of previous sessions' indexes
pub const SESSIONS_DIR_NAME: &str = "sessions";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

/// Where the index and the event log live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_dir")]
    pub dir: String,

    #[serde(default = "default_event_log")]
    pub event_log: String,

    /// Keep a copy of the previous session's index when a new session starts
    #[serde(default)]
    pub retain_previous_sessions: bool,
}

/// Rendering and truncation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// "local", "utc", or a fixed offset such as "+05:30"
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_preview_length")]
    pub preview_length: usize,

    #[serde(default = "default_max_chars_per_message")]
    pub max_chars_per_message: usize,

    #[serde(default = "default_max_total_chars")]
    pub max_total_chars: usize,
}

// Default value functions
fn default_storage_dir() -> String {
    "~/.claude/context-recall".to_string()
}

fn default_event_log() -> String {
    "~/.claude/recall-events.log".to_string()
}

fn default_timezone() -> String {
    "local".to_string()
}

fn default_preview_length() -> usize {
    80
}

fn default_max_chars_per_message() -> usize {
    1000
}

fn default_max_total_chars() -> usize {
    8000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
            event_log: default_event_log(),
            retain_previous_sessions: false,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            preview_length: default_preview_length(),
            max_chars_per_message: default_max_chars_per_message(),
            max_total_chars: default_max_total_chars(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./recall.yaml (current directory)
    /// 3. ~/.config/recall/recall.yaml
    pub fn load(path: &str) -> Result<Self> {
        let search_paths = vec![
            shellexpand::tilde(path).to_string(),
            "recall.yaml".to_string(),
            shellexpand::tilde("~/.config/recall/recall.yaml").to_string(),
        ];

        for search_path in &search_paths {
            if Path::new(search_path).exists() {
                let content = std::fs::read_to_string(search_path)?;
                let config: Config = serde_yaml::from_str(&content)?;
                return Ok(config);
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    /// Configuration rooted at an explicit storage directory
    pub fn with_storage_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let mut config = Config::default();
        config.storage.dir = dir.to_string_lossy().to_string();
        config.storage.event_log = dir.join("recall-events.log").to_string_lossy().to_string();
        config
    }

    /// Storage directory, expanding ~ to home directory
    pub fn storage_dir(&self) -> PathBuf {
        expand_path(&self.storage.dir)
    }

    /// Full path of the index document
    pub fn index_path(&self) -> PathBuf {
        self.storage_dir().join(INDEX_FILE_NAME)
    }

    /// Directory for retained previous-session indexes
    pub fn sessions_dir(&self) -> PathBuf {
        self.storage_dir().join(SESSIONS_DIR_NAME)
    }

    pub fn event_log_path(&self) -> PathBuf {
        expand_path(&self.storage.event_log)
    }

    /// Resolve the configured time zone to a fixed offset for this invocation
    pub fn timezone(&self) -> Result<FixedOffset> {
        parse_timezone(&self.display.timezone)
    }
}

fn expand_path(path: &str) -> PathBuf {
    if path.starts_with('~') && dirs::home_dir().is_none() {
        // No home directory: fall back to a path relative to the working dir
        return PathBuf::from(path.trim_start_matches('~').trim_start_matches('/'));
    }
    PathBuf::from(shellexpand::tilde(path).to_string())
}

/// Parse "local", "utc"/"z", or "+HH:MM" / "-HH:MM" / "+HHMM"
pub fn parse_timezone(value: &str) -> Result<FixedOffset> {
    let value = value.trim();
    match value.to_ascii_lowercase().as_str() {
        "local" => return Ok(Local::now().offset().fix()),
        "utc" | "z" | "gmt" => return Ok(Utc.fix()),
        _ => {}
    }

    let (sign, rest) = match value.chars().next() {
        Some('+') => (1, &value[1..]),
        Some('-') => (-1, &value[1..]),
        _ => bail!("Invalid timezone '{}': expected local, utc, or +HH:MM", value),
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        bail!("Invalid timezone '{}': expected local, utc, or +HH:MM", value);
    }

    let hours: i32 = digits[..2].parse()?;
    let minutes: i32 = digits[2..].parse()?;
    if hours > 23 || minutes > 59 {
        bail!("Invalid timezone '{}': offset out of range", value);
    }

    match FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)) {
        Some(offset) => Ok(offset),
        None => bail!("Invalid timezone '{}': offset out of range", value),
    }
}
