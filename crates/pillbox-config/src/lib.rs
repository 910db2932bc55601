#![deny(unsafe_code)]

//! Configuration loading and validation for pillbox.
//!
//! Loads TOML configuration files and validates them. Provides the
//! [`AppConfig`] type as the central configuration structure shared by the
//! CLI, the TUI host, and the core library.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Asset server connection.
    #[serde(default)]
    pub server: ServerConfig,

    /// Tag serialization and search.
    #[serde(default)]
    pub tags: TagsConfig,

    /// Caret-driven autocomplete.
    #[serde(default)]
    pub autocomplete: AutocompleteConfig,

    /// Quick-edit stepper tuning.
    #[serde(default)]
    pub editor: EditorConfig,

    /// Logging and notification configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection settings for the asset server that backs browsing, search,
/// previews, metadata and group files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL, e.g. `http://127.0.0.1:8188`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8188".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// Tag text settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagsConfig {
    /// Separator placed between serialized tags.
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Maximum number of results requested from the tag search endpoint.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            separator: default_separator(),
            search_limit: default_search_limit(),
        }
    }
}

fn default_separator() -> String {
    ", ".to_string()
}

fn default_search_limit() -> usize {
    20
}

/// Caret autocomplete settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutocompleteConfig {
    /// Whether free-text surfaces get autocomplete at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Quiet period after the last keystroke before a lookup is issued.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Minimum length of the word under the caret.
    #[serde(default = "default_min_word_len")]
    pub min_word_len: usize,
}

impl Default for AutocompleteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: default_debounce_ms(),
            min_word_len: default_min_word_len(),
        }
    }
}

impl AutocompleteConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    150
}

fn default_min_word_len() -> usize {
    2
}

/// Strength stepper tuning for the quick editor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Base increment for one step.
    #[serde(default = "default_strength_step")]
    pub strength_step: f64,

    /// Increment for one step while a modifier is held.
    #[serde(default = "default_strength_step_large")]
    pub strength_step_large: f64,

    /// Horizontal drag distance (in cells) that counts as one step.
    #[serde(default = "default_drag_pixels_per_step")]
    pub drag_pixels_per_step: i32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            strength_step: default_strength_step(),
            strength_step_large: default_strength_step_large(),
            drag_pixels_per_step: default_drag_pixels_per_step(),
        }
    }
}

fn default_strength_step() -> f64 {
    0.05
}

fn default_strength_step_large() -> f64 {
    0.25
}

fn default_drag_pixels_per_step() -> i32 {
    8
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// How long a user-visible notification stays on screen.
    #[serde(default = "default_notification_ttl_secs")]
    pub notification_ttl_secs: u64,

    /// Ring buffer size for captured notifications.
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            notification_ttl_secs: default_notification_ttl_secs(),
            notification_capacity: default_notification_capacity(),
        }
    }
}

impl LoggingConfig {
    pub fn notification_ttl(&self) -> Duration {
        Duration::from_secs(self.notification_ttl_secs)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_notification_ttl_secs() -> u64 {
    4
}

fn default_notification_capacity() -> usize {
    32
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.server.base_url.as_str();
        if base.is_empty() {
            return Err(ConfigError::Validation(
                "server.base_url must not be empty".to_string(),
            ));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "server.base_url must start with http:// or https://, got {base:?}"
            )));
        }
        if self.server.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "server.timeout_secs must be non-zero".to_string(),
            ));
        }

        if self.tags.separator.is_empty() {
            return Err(ConfigError::Validation(
                "tags.separator must not be empty".to_string(),
            ));
        }
        if self.tags.search_limit == 0 {
            return Err(ConfigError::Validation(
                "tags.search_limit must be at least 1".to_string(),
            ));
        }

        if self.autocomplete.min_word_len == 0 {
            return Err(ConfigError::Validation(
                "autocomplete.min_word_len must be at least 1".to_string(),
            ));
        }

        let editor = &self.editor;
        if editor.strength_step <= 0.0 || editor.strength_step_large <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "editor step sizes must be positive, got {} and {}",
                editor.strength_step, editor.strength_step_large
            )));
        }
        if editor.strength_step_large < editor.strength_step {
            return Err(ConfigError::Validation(format!(
                "editor.strength_step_large ({}) must not be smaller than editor.strength_step ({})",
                editor.strength_step_large, editor.strength_step
            )));
        }
        if editor.drag_pixels_per_step <= 0 {
            return Err(ConfigError::Validation(
                "editor.drag_pixels_per_step must be positive".to_string(),
            ));
        }

        if self.logging.notification_capacity == 0 {
            return Err(ConfigError::Validation(
                "logging.notification_capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
