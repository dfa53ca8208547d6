use std::env;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub langbase: LangbaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub model: ModelConfig,
}

/// Langbase API configuration
#[derive(Debug, Clone)]
pub struct LangbaseConfig {
    /// Only required once a live model is built; replay runs go without.
    pub api_key: Option<String>,
    pub base_url: String,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Language model configuration: which pipe to call and how usage is priced
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub pipe: String,
    pub model: String,
    /// Dollars per 1000 prompt tokens.
    pub prompt_token_cost: f64,
    /// Dollars per 1000 completion tokens.
    pub response_token_cost: f64,
    /// Reuse completions for identical prompts.
    pub cache: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let langbase = LangbaseConfig {
            api_key: env::var("LANGBASE_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            base_url: env::var("LANGBASE_BASE_URL")
                .unwrap_or_else(|_| "https://api.langbase.com".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: parse_var("REQUEST_TIMEOUT_MS", 30000)?,
            max_retries: parse_var("MAX_RETRIES", 3)?,
            retry_delay_ms: parse_var("RETRY_DELAY_MS", 1000)?,
        };

        let model = ModelConfig {
            pipe: env::var("GOT_PIPE").unwrap_or_else(|_| "graph-of-operations-v1".to_string()),
            model: env::var("GOT_MODEL").unwrap_or_else(|_| "openai:gpt-4o-mini".to_string()),
            prompt_token_cost: parse_var("PROMPT_TOKEN_COST", 0.0)?,
            response_token_cost: parse_var("RESPONSE_TOKEN_COST", 0.0)?,
            cache: matches!(
                env::var("RESPONSE_CACHE")
                    .unwrap_or_default()
                    .to_lowercase()
                    .as_str(),
                "1" | "true" | "yes"
            ),
        };

        Ok(Config {
            langbase,
            logging,
            request,
            model,
        })
    }
}

impl LangbaseConfig {
    /// The API key, or a configuration error naming the missing variable.
    pub fn require_api_key(&self) -> Result<&str, AppError> {
        self.api_key.as_deref().ok_or_else(|| AppError::Config {
            message: "LANGBASE_API_KEY is required".to_string(),
        })
    }
}

/// Parse an optional numeric variable, rejecting values that do not parse.
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| AppError::Config {
            message: format!("{} has an invalid value: {}", name, raw),
        }),
        Err(_) => Ok(default),
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            pipe: "graph-of-operations-v1".to_string(),
            model: "openai:gpt-4o-mini".to_string(),
            prompt_token_cost: 0.0,
            response_token_cost: 0.0,
            cache: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_config_default() {
        let config = RequestConfig::default();
        assert_eq!(config.timeout_ms, 30000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_ms, 1000);
    }

    #[test]
    fn test_model_config_default() {
        let config = ModelConfig::default();
        assert_eq!(config.pipe, "graph-of-operations-v1");
        assert!(!config.cache);
        assert_eq!(config.prompt_token_cost, 0.0);
    }

    #[test]
    fn test_require_api_key_missing() {
        let config = LangbaseConfig {
            api_key: None,
            base_url: "https://api.langbase.com".to_string(),
        };
        let err = config.require_api_key().unwrap_err();
        assert!(err.to_string().contains("LANGBASE_API_KEY"));
    }

    #[test]
    fn test_require_api_key_present() {
        let config = LangbaseConfig {
            api_key: Some("key".to_string()),
            base_url: "https://api.langbase.com".to_string(),
        };
        assert_eq!(config.require_api_key().unwrap(), "key");
    }
}
