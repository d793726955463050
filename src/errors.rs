/*!
 * Error types for the linewise application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while validating configuration, before any file is processed
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// The credential file is missing or is not a regular file
    #[error("API key file not found or invalid at: {0}")]
    MissingCredential(PathBuf),

    /// The credential file exists but holds no key
    #[error("API key file is empty: {0}")]
    EmptyCredential(PathBuf),

    /// The input path does not exist
    #[error("Input path does not exist: {0}")]
    InvalidInputPath(PathBuf),

    /// The input path holds no subtitle files
    #[error("No subtitle files found in: {0}")]
    NoInputFiles(PathBuf),

    /// Any other invalid configuration value
    #[error("Invalid configuration value for '{field}': {message}")]
    InvalidValue {
        /// Name of the offending field
        field: String,
        /// What is wrong with it
        message: String,
    },
}

impl ConfigurationError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors that can occur while reading a caption file
#[derive(Error, Debug)]
pub enum FormatError {
    /// The path does not exist or is not a regular file
    #[error("Subtitle file not found or invalid at: {0}")]
    NotAFile(PathBuf),

    /// The file does not carry the `.srt` extension
    #[error("Invalid subtitle file format (srt expected): {0}")]
    UnsupportedExtension(PathBuf),

    /// The file could not be read
    #[error("Failed to read subtitle file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A timestamp line could not be split into start and end
    #[error("Malformed timestamp at line {line}: '{content}'")]
    MalformedTimestamp { line: usize, content: String },

    /// An index line was not followed by a timestamp line
    #[error("Cue {index} has no timestamp line")]
    MissingTimestamp { index: usize },

    /// The file has content but not a single cue could be read from it
    #[error("No subtitle cues found in {0}")]
    NoCues(PathBuf),
}

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl ProviderError {
    /// Whether another attempt at the same request may succeed.
    ///
    /// Transport failures, throttling and server-side errors are transient;
    /// authentication, client errors and unparseable payloads are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RequestFailed(_) | Self::ConnectionError(_) | Self::RateLimitExceeded(_) => true,
            Self::ApiError { status_code, .. } => *status_code == 429 || *status_code >= 500,
            Self::ParseError(_) | Self::AuthenticationError(_) => false,
        }
    }
}

/// Errors that can occur during translation of a single exchange or file
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The provider answered without any candidate
    #[error("Provider returned no completion candidates")]
    NoCandidates,

    /// The retry policy gave up on a cue
    #[error("Giving up on cue {cue} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        cue: usize,
        attempts: u32,
        last_error: String,
    },
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Caption file did not satisfy the format contract
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(format!("{:#}", error))
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
