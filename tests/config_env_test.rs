//! Config environment variable tests
//!
//! These tests verify that Config::from_env() correctly reads and applies
//! environment variable overrides. Config::from_env() also loads a .env file
//! via dotenvy, so these tests focus on override behavior.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use graph_of_operations::config::{Config, LogFormat};
use serial_test::serial;
use std::env;

#[test]
#[serial]
fn test_config_from_env_loads_without_api_key() {
    env::remove_var("LANGBASE_API_KEY");

    let config = Config::from_env().unwrap();
    assert!(config.langbase.api_key.is_none());
    assert!(config.langbase.require_api_key().is_err());
}

#[test]
#[serial]
fn test_config_from_env_blank_api_key_is_missing() {
    env::set_var("LANGBASE_API_KEY", "   ");

    let config = Config::from_env().unwrap();
    assert!(config.langbase.api_key.is_none());

    env::remove_var("LANGBASE_API_KEY");
}

#[test]
#[serial]
fn test_config_from_env_custom_base_url() {
    env::set_var("LANGBASE_BASE_URL", "https://custom.api.com");

    let config = Config::from_env().unwrap();
    assert_eq!(config.langbase.base_url, "https://custom.api.com");

    // Restore default
    env::set_var("LANGBASE_BASE_URL", "https://api.langbase.com");
}

#[test]
#[serial]
fn test_config_from_env_json_log_format() {
    env::set_var("LOG_FORMAT", "JSON");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);

    // Restore default
    env::set_var("LOG_FORMAT", "pretty");
}

#[test]
#[serial]
fn test_config_from_env_custom_request() {
    env::set_var("REQUEST_TIMEOUT_MS", "60000");
    env::set_var("MAX_RETRIES", "5");
    env::set_var("RETRY_DELAY_MS", "2000");

    let config = Config::from_env().unwrap();
    assert_eq!(config.request.timeout_ms, 60000);
    assert_eq!(config.request.max_retries, 5);
    assert_eq!(config.request.retry_delay_ms, 2000);

    // Restore defaults
    env::set_var("REQUEST_TIMEOUT_MS", "30000");
    env::set_var("MAX_RETRIES", "3");
    env::set_var("RETRY_DELAY_MS", "1000");
}

#[test]
#[serial]
fn test_config_from_env_invalid_number_is_rejected() {
    env::set_var("MAX_RETRIES", "many");

    let err = Config::from_env().unwrap_err();
    assert!(err.to_string().contains("MAX_RETRIES"));

    // Restore default
    env::set_var("MAX_RETRIES", "3");
}

#[test]
#[serial]
fn test_config_from_env_model_settings() {
    env::set_var("GOT_PIPE", "custom-pipe");
    env::set_var("GOT_MODEL", "openai:gpt-4o");
    env::set_var("PROMPT_TOKEN_COST", "0.5");
    env::set_var("RESPONSE_TOKEN_COST", "1.5");
    env::set_var("RESPONSE_CACHE", "true");

    let config = Config::from_env().unwrap();
    assert_eq!(config.model.pipe, "custom-pipe");
    assert_eq!(config.model.model, "openai:gpt-4o");
    assert_eq!(config.model.prompt_token_cost, 0.5);
    assert_eq!(config.model.response_token_cost, 1.5);
    assert!(config.model.cache);

    env::remove_var("GOT_PIPE");
    env::remove_var("GOT_MODEL");
    env::remove_var("PROMPT_TOKEN_COST");
    env::remove_var("RESPONSE_TOKEN_COST");
    env::remove_var("RESPONSE_CACHE");
}
