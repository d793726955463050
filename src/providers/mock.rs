/*!
 * Mock provider implementation for testing.
 *
 * This module provides a mock provider that simulates different behaviors:
 * - `MockProvider::working()` - Always succeeds with translated text
 * - `MockProvider::failing()` - Always fails with a non-retryable error
 * - `MockProvider::fail_on_call(n)` - Fails only the n-th call
 * - `MockProvider::drop_on_call(n)` - Drops the connection on the n-th call
 * - `MockProvider::flaky(n)` - Fails the first n calls with a retryable error
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::Provider;
use crate::providers::openai::{ChatReply, OpenAIChoice, OpenAIMessage, OpenAIRequest, OpenAIResponse, TokenUsage};

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a proper translation
    Working,
    /// Always fails with an authentication error
    Failing,
    /// Fails the given 1-based call with an error, succeeds otherwise
    FailOnCall { call: usize, retryable: bool },
    /// Fails the first `failures` calls with a server error, then succeeds
    Flaky { failures: usize },
    /// Succeeds but reports a truncated completion
    Truncated,
    /// Returns no candidates at all
    Empty,
}

/// Mock provider for testing translation behavior
#[derive(Debug)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter shared between clones
    request_count: Arc<AtomicUsize>,
    /// Every request received, in order
    requests: Arc<Mutex<Vec<OpenAIRequest>>>,
    /// Custom response generator applied to the last user message
    custom_response: Option<fn(&str) -> String>,
    /// Reported prompt and completion tokens per call
    usage: (u64, u64),
    /// Number of completion candidates per reply
    candidates: usize,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            custom_response: None,
            usage: (10, 5),
            candidates: 1,
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a working mock provider that upper-cases its input
    pub fn uppercase() -> Self {
        Self::working().with_custom_response(|text| text.to_uppercase())
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that fails only the given 1-based call with a fatal error
    pub fn fail_on_call(call: usize) -> Self {
        Self::new(MockBehavior::FailOnCall { call, retryable: false })
    }

    /// Create a mock that drops the connection on the given 1-based call
    pub fn drop_on_call(call: usize) -> Self {
        Self::new(MockBehavior::FailOnCall { call, retryable: true })
    }

    /// Create a mock that fails the first `failures` calls with a retryable error
    pub fn flaky(failures: usize) -> Self {
        Self::new(MockBehavior::Flaky { failures })
    }

    /// Create a mock that returns truncated completions
    pub fn truncated() -> Self {
        Self::new(MockBehavior::Truncated)
    }

    /// Create a mock that returns no candidates
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Set a custom response generator
    pub fn with_custom_response(mut self, generator: fn(&str) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Set the token counts reported for every call
    pub fn with_usage(mut self, prompt_tokens: u64, completion_tokens: u64) -> Self {
        self.usage = (prompt_tokens, completion_tokens);
        self
    }

    /// Return `count` candidates per reply; candidate `i > 0` is marked as an alternative
    pub fn with_candidates(mut self, count: usize) -> Self {
        self.candidates = count.max(1);
        self
    }

    /// Number of calls received so far
    pub fn call_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Copy of every request received so far
    pub fn requests(&self) -> Vec<OpenAIRequest> {
        self.requests.lock().clone()
    }

    fn reply(&self, request: &OpenAIRequest, finish_reason: &str) -> ChatReply {
        let prompt = request.messages.iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let content = match self.custom_response {
            Some(generator) => generator(prompt),
            None => format!("[TRANSLATED] {}", prompt),
        };

        let (prompt_tokens, completion_tokens) = self.usage;
        let response = OpenAIResponse {
            id: format!("chatcmpl-mock-{}", uuid::Uuid::new_v4().simple()),
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: request.model.clone(),
            choices: (0..self.candidates)
                .map(|index| OpenAIChoice {
                    index: index as u32,
                    message: OpenAIMessage {
                        role: "assistant".to_string(),
                        content: if index == 0 {
                            content.clone()
                        } else {
                            format!("{} (alternative {})", content, index)
                        },
                    },
                    finish_reason: Some(finish_reason.to_string()),
                })
                .collect(),
            usage: Some(TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
        };

        let mut reply = ChatReply::from_response(response, Duration::ZERO);
        reply.request_id = Some(format!("req-mock-{}", self.call_count()));
        reply.organization = Some("mock-org".to_string());
        reply
    }
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior,
            request_count: Arc::clone(&self.request_count),
            requests: Arc::clone(&self.requests),
            custom_response: self.custom_response,
            usage: self.usage,
            candidates: self.candidates,
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, request: OpenAIRequest) -> Result<ChatReply, ProviderError> {
        let call = self.request_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().push(request.clone());

        match self.behavior {
            MockBehavior::Working => Ok(self.reply(&request, "stop")),

            MockBehavior::Failing => Err(ProviderError::AuthenticationError("Invalid API key".into())),

            MockBehavior::FailOnCall { call: failing_call, retryable } => {
                if call != failing_call {
                    Ok(self.reply(&request, "stop"))
                } else if retryable {
                    Err(ProviderError::ConnectionError(format!("Simulated connection drop on call {}", call)))
                } else {
                    Err(ProviderError::ApiError {
                        status_code: 400,
                        message: format!("Simulated failure on call {}", call),
                    })
                }
            }

            MockBehavior::Flaky { failures } => {
                if call <= failures {
                    Err(ProviderError::ApiError {
                        status_code: 503,
                        message: "Service unavailable".into(),
                    })
                } else {
                    Ok(self.reply(&request, "stop"))
                }
            }

            MockBehavior::Truncated => Ok(self.reply(&request, "length")),

            MockBehavior::Empty => {
                let mut reply = self.reply(&request, "stop");
                reply.response.choices.clear();
                Ok(reply)
            }
        }
    }

    fn name(&self) -> &str {
        "Mock"
    }
}
