/*!
 * Translation orchestrator.
 *
 * Drives the per-file loop: parse the caption file, send every cue through
 * the conversation session, honour the inter-request delay and the token
 * budget, report progress and finally write the translated document.
 *
 * Files are processed strictly one after another and cues strictly in
 * order. A file either ends up fully translated on disk or not written at
 * all.
 */

use log::{debug, error, info, warn};
use rand::Rng;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{AppError, TranslationError};
use crate::providers::Provider;
use crate::subtitle_processor::CaptionDocument;
use super::context::RunContext;
use super::progress::FileProgress;
use super::rate_budget::BudgetAction;
use super::response::ResponseRecord;
use super::session::{ConversationSession, Exchange, SamplingParams};

/// Bounded retry with exponential backoff for retryable exchanges
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per cue, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each further attempt
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// A policy that gives up after the first failure
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Deterministic part of the wait after the given failed attempt (1-based)
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Wait after the given failed attempt, with up to 25% random jitter added
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_backoff(attempt);
        let max_jitter_ms = (base.as_millis() / 4) as u64;
        if max_jitter_ms == 0 {
            return base;
        }

        let jitter = rand::rng().random_range(0..=max_jitter_ms);
        base + Duration::from_millis(jitter)
    }
}

/// Everything the orchestrator needs to know about a run
#[derive(Debug, Clone)]
pub struct TranslationOptions {
    pub model: String,
    /// ISO 639-1 code used in the output file name
    pub language_code: String,
    /// English language name used in the persona prompt
    pub language_name: String,
    /// ISO 3166-1 alpha-2 code used in the output file name
    pub country_code: String,
    /// Country name used in the persona prompt
    pub country_name: String,
    /// Send the whole file's dialogue with every cue
    pub keep_history: bool,
    /// Pause after every exchange
    pub delay: Duration,
    pub sampling: SamplingParams,
    pub retry: RetryPolicy,
    /// Where translated files go; next to the input when `None`
    pub output_dir: Option<PathBuf>,
    /// Draw a progress bar on stderr
    pub show_progress: bool,
}

impl TranslationOptions {
    pub fn new(model: impl Into<String>, language_code: &str, language_name: &str, country_code: &str) -> Self {
        Self {
            model: model.into(),
            language_code: language_code.to_lowercase(),
            language_name: language_name.to_string(),
            country_code: country_code.to_lowercase(),
            country_name: country_code.to_uppercase(),
            keep_history: false,
            delay: Duration::from_secs(2),
            sampling: SamplingParams::default(),
            retry: RetryPolicy::default(),
            output_dir: None,
            show_progress: true,
        }
    }

    /// Options with no delays, no retries and no progress bar
    pub fn quiet(self) -> Self {
        Self {
            delay: Duration::ZERO,
            retry: RetryPolicy::no_retry(),
            show_progress: false,
            ..self
        }
    }
}

/// Lifecycle of a single file
#[derive(Debug, Clone, PartialEq)]
pub enum FileState {
    Idle,
    /// `cue` is the 1-based position of the cue being translated
    Translating { cue: usize, total: usize },
    Saved(PathBuf),
    Failed(String),
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Translating { cue, total } => write!(f, "translating {}/{}", cue, total),
            Self::Saved(path) => write!(f, "saved to {}", path.display()),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Result of a successfully translated file
#[derive(Debug, Clone)]
pub struct FileReport {
    pub source: PathBuf,
    pub output: PathBuf,
    pub cues: usize,
    pub tokens: u64,
}

/// Outcome of a whole batch
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub translated: usize,
    pub failed: usize,
    pub total_tokens: u64,
    /// Final state of every file, in processing order
    pub files: Vec<(PathBuf, FileState)>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.translated + self.failed
    }
}

/// Runs files through the conversation session one cue at a time
#[derive(Debug)]
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    options: TranslationOptions,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn Provider>, options: TranslationOptions) -> Self {
        Self { provider, options }
    }

    pub fn options(&self) -> &TranslationOptions {
        &self.options
    }

    fn new_session(&self, context: &RunContext) -> ConversationSession {
        ConversationSession::new(
            Arc::clone(&self.provider),
            self.options.model.clone(),
            self.options.language_name.clone(),
            self.options.country_name.clone(),
        )
        .with_sampling(self.options.sampling)
        .with_audit_dir(context.audit_dir())
    }

    /// Where the translation of `source` is written
    pub fn output_path(&self, document: &CaptionDocument, source: &Path) -> PathBuf {
        let dir = match &self.options.output_dir {
            Some(dir) => dir.clone(),
            None => source.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        dir.join(document.output_file_name(&self.options.country_code, &self.options.language_code))
    }

    /// Translate every file in order; a failing file is logged and skipped.
    pub async fn translate_batch(&self, files: &[PathBuf], context: &mut RunContext) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for (i, file) in files.iter().enumerate() {
            let name = file.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| file.display().to_string());
            info!("Translating file: {}/{}: {}", i + 1, files.len(), name);

            match self.translate_file(file, context).await {
                Ok(report) => {
                    summary.translated += 1;
                    summary.total_tokens += report.tokens;
                    summary.files.push((file.clone(), FileState::Saved(report.output)));
                }
                Err(e) => {
                    error!("Failed to translate {}: {}", file.display(), e);
                    summary.failed += 1;
                    summary.files.push((file.clone(), FileState::Failed(e.to_string())));
                }
            }
        }

        info!(
            "Batch finished: {} translated, {} failed, {} tokens",
            summary.translated, summary.failed, summary.total_tokens
        );
        summary
    }

    /// Translate one file and write the result.
    ///
    /// # Returns
    /// * `Result<FileReport, AppError>` - Nothing is written unless every cue was translated
    pub async fn translate_file(&self, path: &Path, context: &mut RunContext) -> Result<FileReport, AppError> {
        let mut state = FileState::Idle;
        debug!("{}: {}", path.display(), state);

        let mut document = CaptionDocument::parse(path)?;
        let total = document.len();
        info!("Parsed {} cues from {}", total, path.display());

        let mut session = self.new_session(context);
        let mut progress = if self.options.show_progress {
            FileProgress::new(total, &document.file_stem())
        } else {
            FileProgress::hidden(total)
        };
        let delay_ms = self.options.delay.as_millis() as u64;
        let mut file_tokens = 0u64;

        for position in 1..=total {
            state = FileState::Translating { cue: position, total };
            debug!("{}: {}", path.display(), state);

            if !self.options.keep_history {
                session.reset();
            }

            let source_text = document.cues[position - 1].text.clone();
            let (text, record) = match self.submit_with_retry(&mut session, &source_text, position).await {
                Ok(result) => result,
                Err(e) => {
                    progress.abandon(&e.to_string());
                    return Err(e.into());
                }
            };
            document.cues[position - 1].set_text(&text);

            if !self.options.delay.is_zero() {
                tokio::time::sleep(self.options.delay).await;
            }

            file_tokens += record.total_tokens;
            let round_trip_ms = record.response_ms + delay_ms;

            match context.budget.record(record.total_tokens, round_trip_ms) {
                BudgetAction::Continue => {}
                BudgetAction::WindowRolledOver => debug!("Token window rolled over"),
                BudgetAction::Cooldown(pause) => {
                    info!(
                        "Token limit of {} per minute reached, cooling down for {}s",
                        context.budget.limit(),
                        pause.as_secs()
                    );
                    if !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                }
            }

            progress.cue_done(position, round_trip_ms, session.session_tokens(), file_tokens);
        }

        let output = self.output_path(&document, path);
        if let Err(e) = document.write_to_file(&output) {
            progress.abandon("write failed");
            return Err(e.into());
        }
        progress.finish(file_tokens);

        state = FileState::Saved(output.clone());
        info!("{}: {} ({} tokens)", path.display(), state, file_tokens);

        Ok(FileReport {
            source: path.to_path_buf(),
            output,
            cues: total,
            tokens: file_tokens,
        })
    }

    async fn submit_with_retry(
        &self,
        session: &mut ConversationSession,
        text: &str,
        cue: usize,
    ) -> Result<(String, ResponseRecord), TranslationError> {
        let policy = &self.options.retry;
        let mut attempt = 1;

        loop {
            match session.submit(text).await {
                Exchange::Completed { text, record } => return Ok((text, record)),
                Exchange::Fatal(e) => return Err(e),
                Exchange::Retryable(e) => {
                    if attempt >= policy.max_attempts {
                        return Err(TranslationError::RetriesExhausted {
                            cue,
                            attempts: attempt,
                            last_error: e.to_string(),
                        });
                    }

                    let wait = policy.backoff(attempt);
                    warn!(
                        "Cue {} attempt {}/{} failed: {}. Retrying in {:?}",
                        cue, attempt, policy.max_attempts, e, wait
                    );
                    if !wait.is_zero() {
                        tokio::time::sleep(wait).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}
