/*!
 * Response records for generation exchanges.
 *
 * A `ResponseRecord` is an immutable snapshot of one request/response round
 * trip. It is created by the conversation session right after a reply is
 * received and persisted to the audit directory as a pretty-printed JSON file.
 */

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::errors::TranslationError;
use crate::file_utils::FileManager;
use crate::providers::openai::ChatReply;

/// Prefix of every audit dump file name
pub const DUMP_FILE_PREFIX: &str = "response-dump";

// Anything outside this set is replaced before the id becomes part of a file name
static UNSAFE_ID_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^A-Za-z0-9_.-]").unwrap()
});

/// Immutable snapshot of a single exchange with the generation service
#[derive(Debug, Clone)]
pub struct ResponseRecord {
    /// Request identifier assigned by the provider
    pub request_id: Option<String>,
    /// Response identifier
    pub id: String,
    pub organization: Option<String>,
    pub object: String,
    pub created: i64,
    pub model: String,
    /// Latency in milliseconds, provider-reported when available
    pub response_ms: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    /// Index of the candidate the text was taken from
    pub selected_choice_index: usize,
    pub finish_reason: String,
    pub answer_role: String,
    pub answer_content: String,
    /// The prompt exactly as it was sent
    pub original_prompt: String,
    /// Local time the record was created
    pub timestamp: DateTime<Local>,
    /// Full response payload as received
    pub raw: Value,
}

impl ResponseRecord {
    /// Build a record from a reply, taking the answer from the given candidate.
    ///
    /// # Arguments
    /// * `original_prompt` - The user text that produced the reply
    /// * `reply` - The parsed reply with its raw payload
    /// * `choice_index` - Index of the selected candidate
    ///
    /// # Returns
    /// * `Result<Self, TranslationError>` - `NoCandidates` if the index does not exist
    pub fn from_reply(original_prompt: &str, reply: &ChatReply, choice_index: usize) -> Result<Self, TranslationError> {
        let response = &reply.response;
        let choice = response.choices.get(choice_index)
            .ok_or(TranslationError::NoCandidates)?;
        let usage = response.usage.clone().unwrap_or_default();

        Ok(Self {
            request_id: reply.request_id.clone(),
            id: response.id.clone(),
            organization: reply.organization.clone(),
            object: response.object.clone(),
            created: response.created,
            model: response.model.clone(),
            response_ms: reply.latency_ms(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            selected_choice_index: choice_index,
            finish_reason: choice.finish_reason.clone().unwrap_or_default(),
            answer_role: choice.message.role.clone(),
            answer_content: choice.message.content.clone(),
            original_prompt: original_prompt.to_string(),
            timestamp: Local::now(),
            raw: reply.raw.clone(),
        })
    }

    /// Whether generation ended normally rather than being cut off
    pub fn is_complete(&self) -> bool {
        self.finish_reason.trim().eq_ignore_ascii_case("stop")
    }

    /// Structured projection of the record
    pub fn to_json(&self) -> Value {
        json!({
            "timestamp": self.timestamp.to_rfc3339(),
            "original_prompt": self.original_prompt,
            "organization": self.organization,
            "request_id": self.request_id,
            "response_ms": self.response_ms,
            "id": self.id,
            "object": self.object,
            "created": self.created,
            "model": self.model,
            "prompt_tokens": self.prompt_tokens,
            "completion_tokens": self.completion_tokens,
            "total_tokens": self.total_tokens,
            "selected_choice_index": self.selected_choice_index,
            "finish_reason": self.finish_reason,
            "message_role": self.answer_role,
            "message_content": self.answer_content,
            "summary": self.raw,
            "message": {
                "role": self.answer_role,
                "content": self.answer_content,
            },
        })
    }

    /// File name for this record, without any collision suffix
    pub fn dump_file_stem(&self, serialized: &str) -> String {
        let id = if self.id.is_empty() { "unknown" } else { self.id.as_str() };
        let sanitized = UNSAFE_ID_CHARS.replace_all(id, "_");

        let digest = Sha256::digest(serialized.as_bytes());
        let hash: String = digest.iter()
            .take(8)
            .map(|byte| format!("{:02x}", byte))
            .collect();

        format!("{}-{}-{}", DUMP_FILE_PREFIX, sanitized, hash)
    }

    /// Persist the record as pretty-printed JSON inside `dir`.
    ///
    /// Existing dumps are never overwritten; a numeric suffix is added instead.
    pub fn dump<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let dir = dir.as_ref();
        FileManager::ensure_dir(dir)?;

        let serialized = serde_json::to_string_pretty(&self.to_json())
            .context("Failed to serialize response record")?;
        let stem = self.dump_file_stem(&serialized);

        let mut path = dir.join(format!("{}.json", stem));
        let mut suffix = 1;
        while path.exists() {
            path = dir.join(format!("{}-{}.json", stem, suffix));
            suffix += 1;
        }

        FileManager::write_to_file(&path, &serialized)
            .with_context(|| format!("Failed to write response dump: {}", path.display()))?;

        Ok(path)
    }
}
