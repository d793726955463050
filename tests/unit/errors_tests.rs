/*!
 * Tests for error types and their classification
 */

use std::path::PathBuf;

use linewise::errors::{AppError, ConfigurationError, FormatError, ProviderError, TranslationError};

#[test]
fn test_providerError_isRetryable_shouldSeparateTransientFromFatal() {
    let api = |status_code| ProviderError::ApiError { status_code, message: "x".into() };

    assert!(api(429).is_retryable());
    assert!(api(500).is_retryable());
    assert!(api(503).is_retryable());
    assert!(ProviderError::ConnectionError("reset".into()).is_retryable());
    assert!(ProviderError::RequestFailed("timeout".into()).is_retryable());
    assert!(ProviderError::RateLimitExceeded("slow down".into()).is_retryable());

    assert!(!api(400).is_retryable());
    assert!(!api(404).is_retryable());
    assert!(!ProviderError::AuthenticationError("bad key".into()).is_retryable());
    assert!(!ProviderError::ParseError("not json".into()).is_retryable());
}

#[test]
fn test_configurationError_display_shouldNameTheProblem() {
    let error = ConfigurationError::invalid("country_code", "must be two letters");
    assert_eq!(error.to_string(), "Invalid configuration value for 'country_code': must be two letters");

    let error = ConfigurationError::EmptyCredential(PathBuf::from("key.txt"));
    assert_eq!(error.to_string(), "API key file is empty: key.txt");
}

#[test]
fn test_formatError_display_shouldIncludeLocation() {
    let error = FormatError::MalformedTimestamp { line: 12, content: "00:01 -->".into() };
    assert_eq!(error.to_string(), "Malformed timestamp at line 12: '00:01 -->'");

    let error = FormatError::MissingTimestamp { index: 4 };
    assert_eq!(error.to_string(), "Cue 4 has no timestamp line");
}

#[test]
fn test_translationError_retriesExhausted_shouldCarryLastError() {
    let error = TranslationError::RetriesExhausted {
        cue: 7,
        attempts: 3,
        last_error: "Connection error: reset".into(),
    };

    assert_eq!(error.to_string(), "Giving up on cue 7 after 3 attempts: Connection error: reset");
}

#[test]
fn test_appError_from_shouldWrapEveryLayer() {
    let error: AppError = ConfigurationError::NoInputFiles(PathBuf::from("subs")).into();
    assert!(matches!(error, AppError::Configuration(_)));

    let error: AppError = FormatError::NotAFile(PathBuf::from("a.srt")).into();
    assert!(matches!(error, AppError::Format(_)));
    assert!(error.to_string().starts_with("Format error: Subtitle file not found"));

    let error: AppError = TranslationError::from(ProviderError::AuthenticationError("bad".into())).into();
    assert!(matches!(error, AppError::Translation(TranslationError::Provider(_))));

    let error: AppError = anyhow::anyhow!("disk full").into();
    assert!(matches!(error, AppError::Unknown(ref msg) if msg == "disk full"));

    let error: AppError = std::io::Error::other("denied").into();
    assert!(matches!(error, AppError::File(_)));
}
