use anyhow::{Result, Context};
use log::{warn, info, debug};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::app_config::Config;
use crate::errors::ConfigurationError;
use crate::file_utils::FileManager;
use crate::language_utils;
use crate::providers::Provider;
use crate::providers::openai::OpenAI;
use crate::subtitle_processor::SUBTITLE_EXTENSION;
use crate::translation::{BatchSummary, Orchestrator, RateBudget, RunContext, TranslationOptions};

// @module: Application controller for subtitle translation

/// Main application controller for subtitle translation
pub struct Controller {
    // @field: App configuration
    config: Config,

    // @field: Generation service client
    provider: Arc<dyn Provider>,

    // @field: Draw progress bars
    show_progress: bool,
}

impl Controller {
    // @method: Create a controller talking to the configured OpenAI endpoint
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;

        let key_file = config.api_key_file.clone().unwrap_or_default();
        let api_key = Self::load_api_key(&key_file)?;
        info!("OpenAI API key: {}", Self::mask_api_key(&api_key));

        let provider = OpenAI::new(api_key, config.endpoint.clone(), config.timeout_secs);
        Ok(Self::with_provider(config, Arc::new(provider)))
    }

    // @method: Create a controller with an explicit provider
    pub fn with_provider(config: Config, provider: Arc<dyn Provider>) -> Self {
        Self {
            config,
            provider,
            show_progress: true,
        }
    }

    /// Turn progress bars on or off
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read the API key from a file, trimming surrounding whitespace
    pub fn load_api_key<P: AsRef<Path>>(path: P) -> Result<String, ConfigurationError> {
        let path = path.as_ref();
        if !FileManager::file_exists(path) {
            return Err(ConfigurationError::MissingCredential(path.to_path_buf()));
        }

        let key = FileManager::read_to_string(path)
            .map_err(|_| ConfigurationError::MissingCredential(path.to_path_buf()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigurationError::EmptyCredential(path.to_path_buf()));
        }

        Ok(key.to_string())
    }

    /// Printable form of an API key: a few characters from each end
    pub fn mask_api_key(api_key: &str) -> String {
        let chars: Vec<char> = api_key.chars().collect();
        let offset = ((chars.len() as f64) * 0.075).ceil() as usize;

        let head: String = chars[..offset].iter().collect();
        let tail: String = chars[chars.len() - offset..].iter().collect();

        format!("{} ... {}", head.trim(), tail.trim())
    }

    /// Subtitle files to translate: the file itself, or every `.srt` directly inside a directory
    pub fn discover_input_files<P: AsRef<Path>>(input: P) -> Result<Vec<PathBuf>, ConfigurationError> {
        let input = input.as_ref();

        if FileManager::file_exists(input) {
            return Ok(vec![input.to_path_buf()]);
        }

        if !FileManager::dir_exists(input) {
            return Err(ConfigurationError::InvalidInputPath(input.to_path_buf()));
        }

        let files = FileManager::find_files(input, SUBTITLE_EXTENSION, 1)
            .map_err(|_| ConfigurationError::InvalidInputPath(input.to_path_buf()))?;
        if files.is_empty() {
            return Err(ConfigurationError::NoInputFiles(input.to_path_buf()));
        }

        Ok(files)
    }

    /// Build the orchestrator options from the configuration
    pub fn translation_options(&self, output_dir: Option<PathBuf>) -> Result<TranslationOptions, ConfigurationError> {
        let (language_code, language_name) = language_utils::resolve_language(&self.config.target_language)?;
        let country_code = language_utils::validate_country_code(&self.config.country_code)?;

        let mut options = TranslationOptions::new(
            self.config.model.clone(),
            &language_code,
            &language_name,
            &country_code,
        );
        options.country_name = self.config.resolved_country_name();
        options.keep_history = self.config.keep_history;
        options.delay = self.config.delay();
        options.sampling = self.config.sampling;
        options.retry = self.config.retry_policy();
        options.output_dir = output_dir;
        options.show_progress = self.show_progress;

        Ok(options)
    }

    /// Run context with the token budget and audit directory from the configuration
    pub fn run_context(&self) -> RunContext {
        let budget = RateBudget::with_cooldown(self.config.tokens_per_minute, self.config.cooldown());
        RunContext::for_log_dir(self.config.resolved_log_dir(), budget)
    }

    /// Translate a file or every subtitle file in a directory
    pub async fn run(&self, input: &Path, output_dir: Option<PathBuf>) -> Result<BatchSummary> {
        let start_time = Instant::now();

        let files = Self::discover_input_files(input)?;
        let options = self.translation_options(output_dir)?;
        if let Some(dir) = &options.output_dir {
            FileManager::ensure_dir(dir)
                .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        }

        info!(
            "Translating {} file(s) into {} ({}) with {} via {}",
            files.len(),
            options.language_name,
            options.country_name,
            options.model,
            self.provider.name()
        );
        if self.config.tokens_per_minute > 0 {
            info!("Token limit: {} per minute", self.config.tokens_per_minute);
        }

        let mut context = self.run_context();
        debug!("Audit dumps go to {}", context.audit_dir().display());

        let orchestrator = Orchestrator::new(Arc::clone(&self.provider), options);
        let summary = orchestrator.translate_batch(&files, &mut context).await;

        let duration = start_time.elapsed();
        info!(
            "Processing completed in {}: {} translated, {} failed, {} tokens",
            Self::format_duration(duration),
            summary.translated,
            summary.failed,
            summary.total_tokens
        );
        if summary.failed > 0 {
            warn!("{} of {} file(s) could not be translated", summary.failed, summary.total());
        }

        Ok(summary)
    }

    // Format duration in a human-readable format
    fn format_duration(duration: std::time::Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
