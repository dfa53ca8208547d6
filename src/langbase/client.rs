use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::types::{CreatePipeRequest, CreatePipeResponse, Message, PipeRequest, PipeResponse};
use crate::config::{LangbaseConfig, ModelConfig, RequestConfig};
use crate::error::{AppResult, LanguageModelError, LanguageModelResult};
use crate::language_model::{estimate_tokens, LanguageModel, RawResponse, UsageSummary};

/// Language model backed by a Langbase pipe.
///
/// Each requested response is one pipe call. Calls are retried with
/// exponential backoff; a call that still fails contributes an empty response
/// so callers always get as many responses as they asked for.
#[derive(Clone)]
pub struct LangbaseModel {
    client: Client,
    base_url: String,
    api_key: String,
    request_config: RequestConfig,
    model_config: ModelConfig,
    state: Arc<Mutex<ModelState>>,
}

#[derive(Default)]
struct ModelState {
    usage: UsageSummary,
    cache: HashMap<(String, usize), Vec<RawResponse>>,
}

impl LangbaseModel {
    /// Create a new Langbase-backed model
    pub fn new(
        config: &LangbaseConfig,
        request_config: RequestConfig,
        model_config: ModelConfig,
    ) -> AppResult<Self> {
        let api_key = config.require_api_key()?.to_string();
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(LanguageModelError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            request_config,
            model_config,
            state: Arc::new(Mutex::new(ModelState::default())),
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Drop all cached completions.
    pub fn clear_cache(&self) {
        self.state().cache.clear();
    }

    fn state(&self) -> MutexGuard<'_, ModelState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Call a Langbase pipe with the given request
    pub async fn call_pipe(&self, request: PipeRequest) -> LanguageModelResult<PipeResponse> {
        let url = format!("{}/v1/pipes/run", self.base_url);
        let pipe_name = request.name.clone();

        let mut last_error = None;
        let mut retries = 0;

        while retries <= self.request_config.max_retries {
            if retries > 0 {
                let delay = Duration::from_millis(
                    self.request_config.retry_delay_ms * (2_u64.pow(retries - 1)),
                );
                warn!(
                    pipe = %pipe_name,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying Langbase request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();

            match self.execute_request(&url, &request).await {
                Ok(response) => {
                    debug!(
                        pipe = %pipe_name,
                        latency_ms = start.elapsed().as_millis(),
                        "Langbase pipe call succeeded"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    error!(
                        pipe = %pipe_name,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        retry = retries,
                        "Langbase pipe call failed"
                    );
                    last_error = Some(e);
                    retries += 1;
                }
            }
        }

        Err(LanguageModelError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            retries,
        })
    }

    /// Execute a single request (internal)
    async fn execute_request(
        &self,
        url: &str,
        request: &PipeRequest,
    ) -> LanguageModelResult<PipeResponse> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LanguageModelError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    LanguageModelError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(LanguageModelError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| LanguageModelError::InvalidResponse {
                message: format!("Failed to parse response: {}", e),
            })
    }

    /// Create a new pipe
    pub async fn create_pipe(
        &self,
        request: CreatePipeRequest,
    ) -> LanguageModelResult<CreatePipeResponse> {
        let url = format!("{}/v1/pipes", self.base_url);

        info!(pipe = %request.name, "Creating Langbase pipe");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(LanguageModelError::Http)?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(LanguageModelError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let pipe_response: CreatePipeResponse =
            response
                .json()
                .await
                .map_err(|e| LanguageModelError::InvalidResponse {
                    message: format!("Failed to parse create pipe response: {}", e),
                })?;

        info!(
            pipe = %pipe_response.name,
            status = ?pipe_response.status,
            "Pipe created successfully"
        );

        Ok(pipe_response)
    }

    /// Ensure the configured pipe exists, creating it if needed
    pub async fn ensure_pipe(&self, system_prompt: &str) -> LanguageModelResult<()> {
        let pipe_name = &self.model_config.pipe;
        let request = CreatePipeRequest::new(pipe_name, &self.model_config.model, system_prompt);

        match self.create_pipe(request).await {
            Ok(_) => {
                info!(pipe = %pipe_name, "Pipe ready");
                Ok(())
            }
            Err(LanguageModelError::Api { status: 409, .. }) => {
                info!(pipe = %pipe_name, "Pipe already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn record_usage(&self, prompt: &str, response: &PipeResponse) {
        let usage = response.raw.as_ref().and_then(|raw| raw.usage.as_ref());
        let prompt_tokens = usage
            .and_then(|u| u.prompt_tokens)
            .map(u64::from)
            .unwrap_or_else(|| estimate_tokens(prompt));
        let completion_tokens = usage
            .and_then(|u| u.completion_tokens)
            .map(u64::from)
            .unwrap_or_else(|| estimate_tokens(&response.completion));

        let mut state = self.state();
        state.usage.prompt_tokens += prompt_tokens;
        state.usage.completion_tokens += completion_tokens;
        state.usage.cost = self.model_config.prompt_token_cost
            * (state.usage.prompt_tokens as f64 / 1000.0)
            + self.model_config.response_token_cost
                * (state.usage.completion_tokens as f64 / 1000.0);
    }
}

#[async_trait]
impl LanguageModel for LangbaseModel {
    async fn query(
        &self,
        prompt: &str,
        num_responses: usize,
    ) -> LanguageModelResult<Vec<RawResponse>> {
        let cache_key = (prompt.to_string(), num_responses);
        if self.model_config.cache {
            let cached = self.state().cache.get(&cache_key).cloned();
            if let Some(cached) = cached {
                debug!(pipe = %self.model_config.pipe, "Returning cached response");
                return Ok(cached);
            }
        }

        let mut responses = Vec::with_capacity(num_responses);
        for _ in 0..num_responses {
            let request = PipeRequest::new(&self.model_config.pipe, vec![Message::user(prompt)]);
            match self.call_pipe(request).await {
                Ok(response) => {
                    self.record_usage(prompt, &response);
                    let model = response
                        .raw
                        .as_ref()
                        .and_then(|raw| raw.model.clone())
                        .unwrap_or_else(|| self.model_config.model.clone());
                    responses.push(RawResponse::text(response.completion).with_model(model));
                }
                Err(e) => {
                    error!(
                        pipe = %self.model_config.pipe,
                        error = %e,
                        "Language model query failed, substituting empty response"
                    );
                    responses.push(RawResponse::failed(e.to_string()));
                }
            }
        }

        let usage = self.usage();
        info!(
            pipe = %self.model_config.pipe,
            num_responses = num_responses,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            cost = usage.cost,
            "Language model query completed"
        );

        // Only fully successful queries are cached.
        if self.model_config.cache && responses.iter().all(|r| r.error.is_none()) {
            self.state().cache.insert(cache_key, responses.clone());
        }

        Ok(responses)
    }

    fn usage(&self) -> UsageSummary {
        self.state().usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn langbase_config(api_key: Option<&str>) -> LangbaseConfig {
        LangbaseConfig {
            api_key: api_key.map(str::to_string),
            base_url: "https://api.langbase.com/".to_string(),
        }
    }

    #[test]
    fn test_model_creation() {
        let model = LangbaseModel::new(
            &langbase_config(Some("test_key")),
            RequestConfig::default(),
            ModelConfig::default(),
        );
        assert!(model.is_ok());
        assert_eq!(model.unwrap().base_url(), "https://api.langbase.com");
    }

    #[test]
    fn test_model_creation_requires_api_key() {
        let model = LangbaseModel::new(
            &langbase_config(None),
            RequestConfig::default(),
            ModelConfig::default(),
        );
        assert!(model.is_err());
    }

    #[test]
    fn test_fresh_model_has_no_usage() {
        let model = LangbaseModel::new(
            &langbase_config(Some("k")),
            RequestConfig::default(),
            ModelConfig::default(),
        )
        .unwrap();
        assert_eq!(model.usage(), UsageSummary::default());
    }
}
