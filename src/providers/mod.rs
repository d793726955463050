/*!
 * Provider implementations for the generation service.
 *
 * This module contains client implementations for chat-completion providers:
 * - OpenAI: OpenAI-compatible chat completions API
 * - Mock: deterministic in-process provider used by tests
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;
use self::openai::{ChatReply, OpenAIRequest};

/// Common trait for all chat-completion providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably by the conversation session.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Complete a chat request using this provider
    ///
    /// # Arguments
    /// * `request` - The request carrying the full conversation history
    ///
    /// # Returns
    /// * `Result<ChatReply, ProviderError>` - The parsed reply with its raw payload, or an error
    async fn complete(&self, request: OpenAIRequest) -> Result<ChatReply, ProviderError>;

    /// Human-readable provider name for log output
    fn name(&self) -> &str;
}

pub mod mock;
pub mod openai;
