//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use std::path::PathBuf;

use pillbox_config::AppConfig;
use tempfile::TempDir;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .base_url(&server.base_url())
///     .debounce_ms(0)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn base_url(mut self, url: &str) -> Self {
        self.config.server.base_url = url.to_string();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.server.timeout_secs = secs;
        self
    }

    pub fn separator(mut self, separator: &str) -> Self {
        self.config.tags.separator = separator.to_string();
        self
    }

    pub fn search_limit(mut self, limit: usize) -> Self {
        self.config.tags.search_limit = limit;
        self
    }

    pub fn autocomplete_enabled(mut self, enabled: bool) -> Self {
        self.config.autocomplete.enabled = enabled;
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.autocomplete.debounce_ms = ms;
        self
    }

    pub fn min_word_len(mut self, len: usize) -> Self {
        self.config.autocomplete.min_word_len = len;
        self
    }

    pub fn strength_steps(mut self, step: f64, large: f64) -> Self {
        self.config.editor.strength_step = step;
        self.config.editor.strength_step_large = large;
        self
    }

    pub fn drag_pixels_per_step(mut self, pixels: i32) -> Self {
        self.config.editor.drag_pixels_per_step = pixels;
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A TOML config written into a temp directory that lives as long as the
/// value. The directory is removed on drop, even on panic.
pub struct TempConfig {
    pub path: PathBuf,
    _dir: TempDir,
}

impl TempConfig {
    pub async fn with_toml(toml_content: &str) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let path = dir.path().join("pillbox.toml");
        tokio::fs::write(&path, toml_content)
            .await
            .expect("failed to write test config");
        Self { path, _dir: dir }
    }

    /// Overwrite the file, e.g. to test reloading.
    pub async fn write(&self, toml_content: &str) {
        tokio::fs::write(&self.path, toml_content)
            .await
            .expect("failed to write updated config");
    }
}
