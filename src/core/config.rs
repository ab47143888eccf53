//! Application configuration management

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::formatter::OutputFormat;

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Main application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub fetch: FetchConfig,
    pub output: OutputConfig,
    pub queue: QueueConfig,
    pub metadata: MetadataConfig,
    pub advanced: AdvancedConfig,
}

/// Transcript fetching behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Language codes in order of preference
    pub languages: Vec<String>,
    /// Keep inline formatting tags such as `<i>` in snippet text
    pub preserve_formatting: bool,
    pub concurrent_fetches: usize,
    /// Retries after the first attempt
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub timeout_seconds: u64,
}

/// Where and how transcripts are written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub format: OutputFormat,
    pub overwrite: bool,
}

/// Batch queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum items processed per run; `None` drains the queue
    pub burst_max: Option<usize>,
}

/// YouTube Data API settings for metadata lookups
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub enabled: bool,
    /// Usually supplied through `YOUTUBE_API_KEY` rather than stored
    pub api_key: Option<String>,
}

/// Advanced configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedConfig {
    pub log_level: String, // "error", "warn", "info", "debug", "trace"
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            output: OutputConfig::default(),
            queue: QueueConfig::default(),
            metadata: MetadataConfig::default(),
            advanced: AdvancedConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            languages: vec!["en".to_string()],
            preserve_formatting: false,
            concurrent_fetches: 2,
            retry_attempts: 2,
            retry_base_delay_ms: 500,
            timeout_seconds: 30,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("out"),
            format: OutputFormat::Text,
            overwrite: false,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { burst_max: None }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::load_or_create(path).map(|(config, _)| config)
    }

    /// Like [`load_from`](Self::load_from), also reporting whether the file
    /// was created with defaults
    pub fn load_or_create(path: &Path) -> Result<(Self, bool)> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;

            let config: AppConfig = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;

            tracing::debug!("Loaded configuration from: {:?}", path);
            Ok((config, false))
        } else {
            let config = Self::default();
            config.save_to(path)?;
            tracing::info!("Created default configuration at: {:?}", path);
            Ok((config, true))
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        std::fs::write(path, self.export()?)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        tracing::debug!("Saved configuration to: {:?}", path);
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn get_config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("com", "transcriptharvester", "transcript-harvester")
            .with_context(|| "Failed to get project directories")?;

        Ok(project_dirs.config_dir().join("config.json"))
    }

    /// Reset the file at `path` to defaults
    pub fn reset_at(path: &Path) -> Result<Self> {
        let config = Self::default();
        config.save_to(path)?;
        tracing::info!("Reset configuration to defaults");
        Ok(config)
    }

    /// Export configuration as JSON string
    pub fn export(&self) -> Result<String> {
        serde_json::to_string_pretty(self).with_context(|| "Failed to export configuration")
    }

    /// Parse and validate configuration from a JSON string
    pub fn import(json: &str) -> Result<Self> {
        let config: AppConfig =
            serde_json::from_str(json).with_context(|| "Failed to parse imported configuration")?;

        config
            .validate()
            .with_context(|| "Imported configuration is invalid")?;

        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (the environment in production)
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("YOUTUBE_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.metadata.api_key = Some(key);
        }
        if let Some(dir) = lookup("TRANSCRIPT_OUTPUT_DIR").filter(|d| !d.trim().is_empty()) {
            self.output.directory = PathBuf::from(dir);
        }
        if let Some(languages) = lookup("TRANSCRIPT_LANGUAGES") {
            let parsed = parse_language_list(&languages);
            if !parsed.is_empty() {
                self.fetch.languages = parsed;
            }
        }
        if let Some(level) = lookup("TRANSCRIPT_LOG_LEVEL") {
            self.advanced.log_level = level.trim().to_ascii_lowercase();
        }
        if let Some(burst) = lookup("CRAWL_BURST_MAX") {
            match burst.trim().parse::<usize>() {
                Ok(0) => self.queue.burst_max = None,
                Ok(n) => self.queue.burst_max = Some(n),
                Err(_) => tracing::warn!("Ignoring invalid CRAWL_BURST_MAX value: {}", burst),
            }
        }
    }

    /// Get configuration as environment variables (for debugging)
    pub fn to_env_vars(&self) -> HashMap<String, String> {
        let mut env_vars = HashMap::new();

        env_vars.insert(
            "TRANSCRIPT_LANGUAGES".to_string(),
            self.fetch.languages.join(","),
        );
        env_vars.insert(
            "TRANSCRIPT_OUTPUT_DIR".to_string(),
            self.output.directory.display().to_string(),
        );
        env_vars.insert(
            "TRANSCRIPT_FORMAT".to_string(),
            self.output.format.to_string(),
        );
        env_vars.insert(
            "TRANSCRIPT_LOG_LEVEL".to_string(),
            self.advanced.log_level.clone(),
        );
        env_vars.insert(
            "CRAWL_BURST_MAX".to_string(),
            self.queue.burst_max.unwrap_or(0).to_string(),
        );
        // Never leak the key itself
        env_vars.insert(
            "YOUTUBE_API_KEY_SET".to_string(),
            self.metadata.api_key.is_some().to_string(),
        );

        env_vars
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.fetch.languages.is_empty() {
            anyhow::bail!("At least one transcript language must be configured");
        }

        if let Some(bad) = self
            .fetch
            .languages
            .iter()
            .find(|code| !is_valid_language_code(code))
        {
            anyhow::bail!("Invalid language code: '{}'", bad);
        }

        if self.fetch.concurrent_fetches == 0 || self.fetch.concurrent_fetches > 16 {
            anyhow::bail!("Concurrent fetches should be between 1 and 16");
        }

        if self.fetch.retry_attempts > 9 {
            anyhow::bail!("Retry attempts should not exceed 9");
        }

        if self.fetch.retry_base_delay_ms > 60_000 {
            anyhow::bail!("Retry base delay should not exceed 60000 ms");
        }

        if self.fetch.timeout_seconds == 0 || self.fetch.timeout_seconds > 300 {
            anyhow::bail!("Timeout should be between 1 and 300 seconds");
        }

        if self.output.directory.as_os_str().is_empty() {
            anyhow::bail!("Output directory must not be empty");
        }

        if let Some(burst) = self.queue.burst_max {
            if burst == 0 || burst > 10_000 {
                anyhow::bail!("Burst max should be between 1 and 10000");
            }
        }

        if self.metadata.enabled && self.metadata.api_key.is_none() {
            anyhow::bail!("Metadata lookups are enabled but no YouTube API key is set");
        }

        if !LOG_LEVELS.contains(&self.advanced.log_level.as_str()) {
            anyhow::bail!(
                "Invalid log level: must be 'error', 'warn', 'info', 'debug', or 'trace'"
            );
        }

        Ok(())
    }
}

/// Split a comma separated language list, dropping blanks
pub fn parse_language_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .collect()
}

/// Language codes look like `en`, `pt-BR` or `zh-Hans`
fn is_valid_language_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= 16
        && code
            .split('-')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric()))
}
