/*!
 * Tests for app configuration functionality
 */

use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use anyhow::Result;

use linewise::app_config::{Config, LogLevel};
use linewise::errors::ConfigurationError;
use crate::common;

fn valid_config() -> Config {
    Config {
        api_key_file: Some(PathBuf::from("key.txt")),
        target_language: "german".to_string(),
        country_code: "de".to_string(),
        ..Config::default()
    }
}

fn invalid_field(result: Result<(), ConfigurationError>) -> String {
    match result {
        Err(ConfigurationError::InvalidValue { field, .. }) => field,
        other => panic!("expected an invalid value error, got {:?}", other),
    }
}

/// Test default configuration values
#[test]
fn test_default_config_shouldHaveSensibleValues() {
    let config = Config::default();

    assert!(config.api_key_file.is_none());
    assert_eq!(config.model, "gpt-3.5-turbo");
    assert_eq!(config.endpoint, "https://api.openai.com/v1");
    assert_eq!(config.tokens_per_minute, -1);
    assert_eq!(config.delay(), Duration::from_secs(2));
    assert_eq!(config.cooldown(), Duration::from_secs(61));
    assert!(!config.keep_history);
    assert_eq!(config.sampling.temperature, 1.0);
    assert_eq!(config.sampling.top_p, 1.0);
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.log_level, LogLevel::Info);
}

#[test]
fn test_validate_withCompleteConfig_shouldPass() {
    assert!(valid_config().validate().is_ok());
}

#[test]
fn test_validate_withoutKeyFile_shouldFail() {
    let config = Config { api_key_file: None, ..valid_config() };
    assert_eq!(invalid_field(config.validate()), "api_key_file");
}

#[test]
fn test_validate_withUnknownLanguage_shouldFail() {
    let config = Config { target_language: "notalanguage".to_string(), ..valid_config() };
    assert_eq!(invalid_field(config.validate()), "target_language");
}

#[test]
fn test_validate_withBadCountry_shouldFail() {
    let config = Config { country_code: "deu".to_string(), ..valid_config() };
    assert_eq!(invalid_field(config.validate()), "country_code");
}

#[test]
fn test_validate_withNonHttpEndpoint_shouldFail() {
    let config = Config { endpoint: "ftp://example.com".to_string(), ..valid_config() };
    assert_eq!(invalid_field(config.validate()), "endpoint");

    let config = Config { endpoint: "not a url".to_string(), ..valid_config() };
    assert_eq!(invalid_field(config.validate()), "endpoint");
}

#[test]
fn test_validate_withOutOfRangeSampling_shouldFail() {
    let mut config = valid_config();
    config.sampling.temperature = 2.5;
    assert_eq!(invalid_field(config.validate()), "sampling.temperature");

    let mut config = valid_config();
    config.sampling.presence_penalty = -3.0;
    assert_eq!(invalid_field(config.validate()), "sampling.presence_penalty");
}

#[test]
fn test_validate_withZeroAttemptsOrNegativeDelay_shouldFail() {
    let mut config = valid_config();
    config.retry.max_attempts = 0;
    assert_eq!(invalid_field(config.validate()), "retry.max_attempts");

    let config = Config { delay_secs: -1.0, ..valid_config() };
    assert_eq!(invalid_field(config.validate()), "delay_secs");
}

#[test]
fn test_validate_withUnrepresentableDelay_shouldFailWithoutPanicking() {
    for delay_secs in [1e20, f64::INFINITY, f64::NAN] {
        let config = Config { delay_secs, ..valid_config() };
        assert_eq!(invalid_field(config.validate()), "delay_secs");
        assert_eq!(config.delay(), Duration::ZERO);
    }
}

#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefaults() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("conf.json");

    let config = Config::load_or_create(&path)?;

    assert!(path.exists());
    assert_eq!(config.model, Config::default().model);

    let reloaded = Config::load_or_create(&path)?;
    assert_eq!(reloaded.endpoint, config.endpoint);
    Ok(())
}

#[test]
fn test_loadOrCreate_withPartialFile_shouldFillDefaults() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        temp_dir.path(),
        "conf.json",
        r#"{ "target_language": "fr", "country_code": "ca", "tokens_per_minute": 40000, "sampling": { "temperature": 0.2 } }"#,
    )?;

    let config = Config::load_or_create(&path)?;

    assert_eq!(config.target_language, "fr");
    assert_eq!(config.country_code, "ca");
    assert_eq!(config.tokens_per_minute, 40000);
    assert_eq!(config.sampling.temperature, 0.2);
    assert_eq!(config.sampling.top_p, 1.0);
    assert_eq!(config.model, "gpt-3.5-turbo");
    assert_eq!(config.retry_policy().max_attempts, 3);
    Ok(())
}

#[test]
fn test_loadOrCreate_withInvalidJson_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "conf.json", "{ not json")?;

    assert!(Config::load_or_create(&path).is_err());
    assert_eq!(fs::read_to_string(&path)?, "{ not json");
    Ok(())
}

#[test]
fn test_resolvedCountryName_shouldPreferConfiguredName() {
    let config = valid_config();
    assert_eq!(config.resolved_country_name(), "DE");

    let config = Config { country_name: Some("Germany".to_string()), ..valid_config() };
    assert_eq!(config.resolved_country_name(), "Germany");
}

#[test]
fn test_resolvedLogDir_withExplicitDir_shouldUseIt() {
    let config = Config { log_dir: Some(PathBuf::from("/tmp/linewise-logs")), ..valid_config() };
    assert_eq!(config.resolved_log_dir(), PathBuf::from("/tmp/linewise-logs"));
}
