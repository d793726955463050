use std::time::{Duration, Instant};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use reqwest::{Client, Response, StatusCode};
use reqwest::header::HeaderMap;
use log::{debug, error};

use crate::errors::ProviderError;
use super::Provider;

/// OpenAI client for interacting with an OpenAI-compatible chat completions API
#[derive(Debug)]
pub struct OpenAI {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API base URL, e.g. `https://api.openai.com/v1`
    endpoint: String,
}

/// Chat message in the OpenAI wire format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,

    /// Content of the message, empty when the service sends `null`
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct OpenAIRequest {
    /// The model to use
    pub model: String,

    /// The messages for the conversation
    pub messages: Vec<OpenAIMessage>,

    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Penalty for frequent tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    /// Penalty for tokens already present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
}

/// Token usage information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of prompt tokens
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Number of completion tokens
    #[serde(default)]
    pub completion_tokens: u64,
    /// Total number of tokens
    #[serde(default)]
    pub total_tokens: u64,
}

/// One completion candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIChoice {
    /// Position of the candidate in the reply
    #[serde(default)]
    pub index: u32,

    /// The generated message
    pub message: OpenAIMessage,

    /// Why generation stopped (`stop`, `length`, `content_filter`, ...)
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Chat completion response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIResponse {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub object: String,

    #[serde(default)]
    pub created: i64,

    #[serde(default)]
    pub model: String,

    /// Completion candidates
    #[serde(default)]
    pub choices: Vec<OpenAIChoice>,

    /// Token usage information
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

/// A parsed reply together with everything needed to audit it
#[derive(Debug, Clone)]
pub struct ChatReply {
    /// Typed response body
    pub response: OpenAIResponse,
    /// Response body exactly as received
    pub raw: Value,
    /// Request identifier assigned by the provider (`x-request-id`)
    pub request_id: Option<String>,
    /// Organization the request was billed to (`openai-organization`)
    pub organization: Option<String>,
    /// Server-side processing time (`openai-processing-ms`)
    pub processing_ms: Option<u64>,
    /// Wall-clock time of the HTTP round trip
    pub elapsed: Duration,
}

impl ChatReply {
    /// Build a reply from a typed response, deriving the raw payload from it
    pub fn from_response(response: OpenAIResponse, elapsed: Duration) -> Self {
        let raw = serde_json::to_value(&response).unwrap_or(Value::Null);
        Self {
            response,
            raw,
            request_id: None,
            organization: None,
            processing_ms: None,
            elapsed,
        }
    }

    /// Latency to account for: provider-reported if present, measured otherwise
    pub fn latency_ms(&self) -> u64 {
        self.processing_ms
            .unwrap_or_else(|| self.elapsed.as_millis() as u64)
    }
}

impl OpenAIRequest {
    /// Create a new chat completion request
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: None,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
        }
    }

    /// Add a message to the request
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(OpenAIMessage {
            role: role.into(),
            content: content.into(),
        });
        self
    }

    /// Replace the whole message list
    pub fn messages(mut self, messages: Vec<OpenAIMessage>) -> Self {
        self.messages = messages;
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the top_p (nucleus sampling)
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn frequency_penalty(mut self, penalty: f32) -> Self {
        self.frequency_penalty = Some(penalty);
        self
    }

    pub fn presence_penalty(mut self, penalty: f32) -> Self {
        self.presence_penalty = Some(penalty);
        self
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

impl OpenAI {
    /// Create a new OpenAI client
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }

    fn completions_url(&self) -> String {
        if self.endpoint.is_empty() {
            "https://api.openai.com/v1/chat/completions".to_string()
        } else {
            format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
        }
    }

    /// Map a non-success HTTP status onto the provider error taxonomy
    async fn status_error(response: Response) -> ProviderError {
        let status = response.status();
        let error_text = response.text().await
            .unwrap_or_else(|_| "Failed to get error response text".to_string());
        error!("OpenAI API error ({}): {}", status, error_text);

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::AuthenticationError(error_text),
            StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimitExceeded(error_text),
            _ => ProviderError::ApiError {
                status_code: status.as_u16(),
                message: error_text,
            },
        }
    }
}

#[async_trait]
impl Provider for OpenAI {
    async fn complete(&self, request: OpenAIRequest) -> Result<ChatReply, ProviderError> {
        let started = Instant::now();

        let response = self.client.post(self.completions_url())
            .header("Content-Type", "application/json")
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ProviderError::ConnectionError(e.to_string())
                } else {
                    ProviderError::RequestFailed(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let headers = response.headers().clone();
        let body = response.text().await
            .map_err(|e| ProviderError::RequestFailed(format!("Failed to read response body: {}", e)))?;
        let elapsed = started.elapsed();

        let raw: Value = serde_json::from_str(&body)
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        let parsed: OpenAIResponse = serde_json::from_value(raw.clone())
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        debug!("OpenAI responded in {:?} with {} candidate(s)", elapsed, parsed.choices.len());

        Ok(ChatReply {
            response: parsed,
            raw,
            request_id: header_str(&headers, "x-request-id"),
            organization: header_str(&headers, "openai-organization"),
            processing_ms: header_str(&headers, "openai-processing-ms").and_then(|ms| ms.parse().ok()),
            elapsed,
        })
    }

    fn name(&self) -> &str {
        "OpenAI"
    }
}
