use anyhow::{Context, Result};
use log::{LevelFilter, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::errors::ConfigurationError;
use crate::translation::{RetryPolicy, SamplingParams};

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Path to a file holding the API key
    #[serde(default)]
    pub api_key_file: Option<PathBuf>,

    /// Target language, as ISO 639 code or English name
    #[serde(default)]
    pub target_language: String,

    /// Target country (ISO 3166-1 alpha-2)
    #[serde(default)]
    pub country_code: String,

    /// Country name used in the persona prompt; the upper-cased code if unset
    #[serde(default)]
    pub country_name: Option<String>,

    /// Model name (e.g., "gpt-4", "gpt-3.5-turbo")
    #[serde(default = "default_model")]
    pub model: String,

    /// Service endpoint URL (for Azure OpenAI or any OpenAI-compatible server)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Token budget per minute; zero or negative disables the limit
    #[serde(default = "default_tokens_per_minute")]
    pub tokens_per_minute: i64,

    /// Pause after every request, in seconds
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,

    /// Send the whole file's dialogue with every cue
    #[serde(default)]
    pub keep_history: bool,

    /// Sampling parameters for the model
    #[serde(default)]
    pub sampling: SamplingParams,

    /// Retry settings for transient failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Pause once the token budget is exhausted, in seconds
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Base directory for `log/log.txt` and `log/model/`
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Retry settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RetryConfig {
    /// Attempts per cue, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt in milliseconds, doubled on each retry
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_tokens_per_minute() -> i64 {
    -1
}

fn default_delay_secs() -> f64 {
    2.0
}

fn default_cooldown_secs() -> u64 {
    61
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000 // 1 second base backoff time, doubled on each retry
}

impl Config {
    /// Load the configuration from `path`, writing a default one if it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let reader = BufReader::new(file);
            return serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {}", path.display()));
        }

        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match &self.api_key_file {
            Some(path) if !path.as_os_str().is_empty() => {}
            _ => return Err(ConfigurationError::invalid("api_key_file", "an API key file is required")),
        }

        crate::language_utils::resolve_language(&self.target_language)?;
        crate::language_utils::validate_country_code(&self.country_code)?;

        if self.model.trim().is_empty() {
            return Err(ConfigurationError::invalid("model", "must not be empty"));
        }

        let endpoint = Url::parse(&self.endpoint)
            .map_err(|e| ConfigurationError::invalid("endpoint", format!("'{}' is not a valid URL: {}", self.endpoint, e)))?;
        if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
            return Err(ConfigurationError::invalid("endpoint", "only http and https are supported"));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigurationError::invalid("timeout_secs", "must be greater than zero"));
        }

        if Duration::try_from_secs_f64(self.delay_secs).is_err() {
            return Err(ConfigurationError::invalid("delay_secs", "must be a non-negative number of seconds"));
        }

        let sampling = &self.sampling;
        if !(0.0..=2.0).contains(&sampling.temperature) {
            return Err(ConfigurationError::invalid("sampling.temperature", "must be between 0.0 and 2.0"));
        }
        if !(0.0..=1.0).contains(&sampling.top_p) {
            return Err(ConfigurationError::invalid("sampling.top_p", "must be between 0.0 and 1.0"));
        }
        if !(-2.0..=2.0).contains(&sampling.frequency_penalty) {
            return Err(ConfigurationError::invalid("sampling.frequency_penalty", "must be between -2.0 and 2.0"));
        }
        if !(-2.0..=2.0).contains(&sampling.presence_penalty) {
            return Err(ConfigurationError::invalid("sampling.presence_penalty", "must be between -2.0 and 2.0"));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigurationError::invalid("retry.max_attempts", "must be at least 1"));
        }

        Ok(())
    }

    pub fn delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.delay_secs.max(0.0)).unwrap_or_default()
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry.max_attempts, Duration::from_millis(self.retry.backoff_base_ms))
    }

    /// Country name for the persona prompt
    pub fn resolved_country_name(&self) -> String {
        match &self.country_name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => self.country_code.trim().to_uppercase(),
        }
    }

    /// Log directory, falling back to the user data directory
    pub fn resolved_log_dir(&self) -> PathBuf {
        match &self.log_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_local_dir()
                .map(|dir| dir.join("linewise"))
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            api_key_file: None,
            target_language: String::new(),
            country_code: String::new(),
            country_name: None,
            model: default_model(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            tokens_per_minute: default_tokens_per_minute(),
            delay_secs: default_delay_secs(),
            keep_history: false,
            sampling: SamplingParams::default(),
            retry: RetryConfig::default(),
            cooldown_secs: default_cooldown_secs(),
            log_dir: None,
            log_level: LogLevel::default(),
        }
    }
}
