/*!
 * Conversation session with the generation service.
 *
 * The session owns the dialogue history sent with every request. It always
 * starts with exactly one persona message that tells the model how to
 * behave, followed by alternating user and assistant messages.
 *
 * A session never retries on its own. Each call to `submit` performs a single
 * exchange and classifies the outcome as completed, retryable or fatal so the
 * caller can decide what to do next.
 */

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::TranslationError;
use crate::providers::Provider;
use crate::providers::openai::{OpenAIChoice, OpenAIMessage, OpenAIRequest};
use super::response::ResponseRecord;

/// Wire role of the persona message
pub const ROLE_PERSONA: &str = "system";
pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

/// Sampling parameters sent with every request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    #[serde(default = "default_one")]
    pub temperature: f32,

    #[serde(default = "default_one")]
    pub top_p: f32,

    #[serde(default)]
    pub frequency_penalty: f32,

    #[serde(default)]
    pub presence_penalty: f32,
}

fn default_one() -> f32 {
    1.0
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

/// Picks which completion candidate becomes the translation
pub trait CandidateSelector: Send + Sync {
    /// Index of the chosen candidate, or `None` if no candidate is usable
    fn select(&self, choices: &[OpenAIChoice]) -> Option<usize>;
}

/// Always takes the first candidate
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstCandidate;

impl CandidateSelector for FirstCandidate {
    fn select(&self, choices: &[OpenAIChoice]) -> Option<usize> {
        if choices.is_empty() { None } else { Some(0) }
    }
}

/// Outcome of a single exchange
#[derive(Debug)]
pub enum Exchange {
    /// The provider answered; `text` is the cleaned translation
    Completed {
        text: String,
        record: ResponseRecord,
    },
    /// The exchange failed but the same request may succeed later
    Retryable(TranslationError),
    /// The exchange failed for good
    Fatal(TranslationError),
}

impl Exchange {
    fn from_error(error: TranslationError) -> Self {
        let retryable = match &error {
            TranslationError::Provider(e) => e.is_retryable(),
            _ => false,
        };

        if retryable {
            Self::Retryable(error)
        } else {
            Self::Fatal(error)
        }
    }
}

/// Build the persona message for a target language and country.
///
/// The language name is normalised to a capitalised word, so `german` and
/// `GERMAN` both become `German`.
pub fn persona_prompt(language: &str, country: &str) -> String {
    let language = language.trim().to_lowercase();
    let mut chars = language.chars();
    let language = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };

    format!(
        "I need help translating subtitles. \
         I will give you one line at a time. \
         Keep sensible line breaks. \
         Your replies are only translations of my input. \
         Translate into {} ({}).",
        language, country
    )
}

/// Strip surrounding quotation marks the model likes to add.
///
/// Trailing double quotes go first, then trailing single quotes, then the
/// same on the leading side, so `"'Hi'"` becomes `Hi`.
pub fn remove_quotations(text: &str) -> String {
    text.trim()
        .trim_end_matches('"')
        .trim_end_matches('\'')
        .trim_start_matches('"')
        .trim_start_matches('\'')
        .trim()
        .to_string()
}

/// Dialogue state for one file (history retained) or one cue (history off)
pub struct ConversationSession {
    provider: Arc<dyn Provider>,
    model: String,
    language: String,
    country: String,
    sampling: SamplingParams,
    selector: Box<dyn CandidateSelector>,
    audit_dir: Option<PathBuf>,
    history: Vec<OpenAIMessage>,
    tokens_asked: u64,
    tokens_generated: u64,
}

impl ConversationSession {
    /// Create a session that is already reset and ready for the first cue
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        language: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        let mut session = Self {
            provider,
            model: model.into(),
            language: language.into(),
            country: country.into(),
            sampling: SamplingParams::default(),
            selector: Box::new(FirstCandidate),
            audit_dir: None,
            history: Vec::new(),
            tokens_asked: 0,
            tokens_generated: 0,
        };
        session.reset();
        session
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_selector(mut self, selector: Box<dyn CandidateSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Directory where every successful exchange is dumped
    pub fn with_audit_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.audit_dir = Some(dir.into());
        self
    }

    /// Drop the history down to the persona message and zero the counters
    pub fn reset(&mut self) {
        self.history.clear();
        self.history.push(OpenAIMessage {
            role: ROLE_PERSONA.to_string(),
            content: persona_prompt(&self.language, &self.country),
        });
        self.tokens_asked = 0;
        self.tokens_generated = 0;
    }

    pub fn history(&self) -> &[OpenAIMessage] {
        &self.history
    }

    pub fn tokens_asked(&self) -> u64 {
        self.tokens_asked
    }

    pub fn tokens_generated(&self) -> u64 {
        self.tokens_generated
    }

    /// Prompt plus completion tokens since the last reset
    pub fn session_tokens(&self) -> u64 {
        self.tokens_asked + self.tokens_generated
    }

    fn build_request(&self) -> OpenAIRequest {
        OpenAIRequest::new(self.model.clone())
            .messages(self.history.clone())
            .temperature(self.sampling.temperature)
            .top_p(self.sampling.top_p)
            .frequency_penalty(self.sampling.frequency_penalty)
            .presence_penalty(self.sampling.presence_penalty)
    }

    /// Send one line of text and return the classified outcome.
    ///
    /// On success the assistant answer is appended to the history and the
    /// token counters grow. On failure the user message is taken back out so
    /// the history is exactly as it was before the call.
    pub async fn submit(&mut self, text: &str) -> Exchange {
        let prompt = text.trim().to_string();
        debug!("Prompting model: \"{}\"", prompt);

        self.history.push(OpenAIMessage {
            role: ROLE_USER.to_string(),
            content: prompt.clone(),
        });

        let record = match self.exchange(&prompt).await {
            Ok(record) => record,
            Err(error) => {
                self.history.pop();
                return Exchange::from_error(error);
            }
        };

        debug!("Model responded in {} ms", record.response_ms);
        debug!("Model response: \"{}\"", record.answer_content);

        if !record.is_complete() {
            warn!(
                "Response {} finished with '{}', the translation may be truncated",
                record.id, record.finish_reason
            );
        }

        self.history.push(OpenAIMessage {
            role: ROLE_ASSISTANT.to_string(),
            content: record.answer_content.clone(),
        });
        self.tokens_asked += record.prompt_tokens;
        self.tokens_generated += record.completion_tokens;

        if let Some(dir) = &self.audit_dir {
            match record.dump(dir) {
                Ok(path) => debug!("Response dumped to {}", path.display()),
                Err(e) => warn!("Failed to dump response {}: {:#}", record.id, e),
            }
        }

        Exchange::Completed {
            text: remove_quotations(&record.answer_content),
            record,
        }
    }

    async fn exchange(&self, prompt: &str) -> Result<ResponseRecord, TranslationError> {
        let reply = self.provider.complete(self.build_request()).await?;

        let index = self.selector.select(&reply.response.choices)
            .ok_or(TranslationError::NoCandidates)?;

        ResponseRecord::from_reply(prompt, &reply, index)
    }
}

impl std::fmt::Debug for ConversationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationSession")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("language", &self.language)
            .field("country", &self.country)
            .field("messages", &self.history.len())
            .field("tokens_asked", &self.tokens_asked)
            .field("tokens_generated", &self.tokens_generated)
            .finish()
    }
}
