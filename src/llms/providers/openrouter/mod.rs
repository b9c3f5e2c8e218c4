//! OpenRouter chat-completion provider.
//!
//! Talks to the OpenRouter REST API over `reqwest`:
//!
//! - `GET  {base_url}/models` — model listing
//! - `POST {base_url}/chat/completions` — chat completion
//!
//! By default every call is a single attempt with no timeout. A
//! [`RetryPolicy`] can enable bounded retries with exponential backoff for
//! transport failures, HTTP 429 and 5xx responses.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::{AppConfig, RetryPolicy};
use crate::llms::base_llm::{ChatRequest, ModelGateway, ModelInfo, ModelPricing, RawCompletion};
use crate::llms::error::GatewayError;

/// Sent as `X-Title` so requests are attributed on the OpenRouter dashboard.
pub const APP_TITLE: &str = "Gift Recommendation System";

/// Raw model entry from `GET /models`. Unknown fields are dropped.
#[derive(Debug, Deserialize)]
struct RawModel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    context_length: Option<u64>,
    #[serde(default)]
    pricing: Option<ModelPricing>,
}

#[derive(Debug, Deserialize)]
struct RawModelList {
    #[serde(default)]
    data: Vec<RawModel>,
}

impl From<RawModel> for ModelInfo {
    fn from(raw: RawModel) -> Self {
        Self {
            name: raw.name.unwrap_or_else(|| raw.id.clone()),
            id: raw.id,
            context_length: raw.context_length.unwrap_or(0),
            pricing: raw.pricing,
        }
    }
}

/// OpenRouter implementation of [`ModelGateway`].
#[derive(Debug, Clone)]
pub struct OpenRouterGateway {
    api_key: Option<String>,
    base_url: String,
    app_url: String,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl OpenRouterGateway {
    /// Create a gateway with default settings against `base_url`.
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Result<Self, GatewayError> {
        let config = AppConfig {
            api_key,
            base_url: base_url.into(),
            ..AppConfig::default()
        };
        Self::from_config(&config)
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, GatewayError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            app_url: config.app_url.clone(),
            retry: config.retry.clone(),
            client: builder.build()?,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_key(&self) -> Result<&str, GatewayError> {
        self.api_key.as_deref().ok_or(GatewayError::NotConfigured)
    }

    /// Send the request built by `build`, retrying per the policy.
    ///
    /// Returns the last response even when its status is an error; callers
    /// turn non-success statuses into [`GatewayError::Provider`].
    async fn send<F>(&self, build: F) -> Result<reqwest::Response, GatewayError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let attempts = self.retry.attempts();
        let mut retry_delay = self.retry.initial_backoff();
        let mut attempt = 1;

        loop {
            let outcome = build().send().await;
            let retryable = match &outcome {
                Ok(response) => {
                    let status = response.status();
                    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
                }
                Err(_) => true,
            };

            if !retryable || attempt >= attempts {
                return outcome.map_err(GatewayError::from);
            }

            match &outcome {
                Ok(response) => log::warn!(
                    "OpenRouter returned {} (attempt {}/{}), retrying in {:?}",
                    response.status(),
                    attempt,
                    attempts,
                    retry_delay
                ),
                Err(e) => log::warn!(
                    "OpenRouter request failed (attempt {}/{}): {}, retrying in {:?}",
                    attempt,
                    attempts,
                    e,
                    retry_delay
                ),
            }

            tokio::time::sleep(retry_delay).await;
            retry_delay = retry_delay.saturating_mul(2).min(Duration::from_secs(30));
            attempt += 1;
        }
    }
}

/// Convert a non-success response into [`GatewayError::Provider`].
///
/// The body is kept as compact JSON when it parses, `{}` otherwise.
async fn provider_error(response: reqwest::Response) -> GatewayError {
    let status = response.status();
    let body = match response.json::<Value>().await {
        Ok(value) => value.to_string(),
        Err(_) => "{}".to_string(),
    };
    GatewayError::Provider {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("").to_string(),
        body,
    }
}

#[async_trait]
impl ModelGateway for OpenRouterGateway {
    fn provider(&self) -> &str {
        "openrouter"
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError> {
        let api_key = self.api_key()?;
        let endpoint = format!("{}/models", self.base_url);

        let response = self
            .send(|| self.client.get(&endpoint).bearer_auth(api_key))
            .await?;

        if !response.status().is_success() {
            let error = provider_error(response).await;
            log::error!("Error fetching OpenRouter models: {}", error);
            return Err(error);
        }

        let list: RawModelList = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        log::debug!("OpenRouter listed {} models", list.data.len());
        Ok(list.data.into_iter().map(ModelInfo::from).collect())
    }

    async fn chat_completion(&self, request: ChatRequest) -> Result<RawCompletion, GatewayError> {
        let api_key = self.api_key()?;
        let endpoint = format!("{}/chat/completions", self.base_url);
        let body = request.to_body();

        log::debug!(
            "OpenRouterGateway.chat_completion: model={}, messages={}",
            request.model,
            request.messages.len(),
        );

        let response = self
            .send(|| {
                self.client
                    .post(&endpoint)
                    .bearer_auth(api_key)
                    .header("HTTP-Referer", &self.app_url)
                    .header("X-Title", APP_TITLE)
                    .json(&body)
            })
            .await?;

        if !response.status().is_success() {
            let error = provider_error(response).await;
            log::error!("Error calling OpenRouter API: {}", error);
            return Err(error);
        }

        let text = response.text().await?;
        let completion: RawCompletion = serde_json::from_str(&text).map_err(|e| {
            GatewayError::Decode(format!(
                "{} - Body: {}",
                e,
                text.chars().take(500).collect::<String>()
            ))
        })?;

        if let Some(usage) = completion.usage {
            log::debug!(
                "OpenRouter token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens,
            );
        }

        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llms::base_llm::ChatMessage;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};

    #[derive(Clone, Default)]
    struct Provider {
        hits: Arc<AtomicUsize>,
        /// Number of leading requests answered with 503.
        failures: usize,
    }

    async fn completions(
        State(provider): State<Provider>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let hit = provider.hits.fetch_add(1, Ordering::SeqCst);
        if hit < provider.failures {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({"error": {"message": "overloaded"}})),
            );
        }
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer sk-test") {
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": {"message": "No auth credentials found"}})),
            );
        }
        let title = headers
            .get("x-title")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": "gen-1",
                "model": body["model"],
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": format!("{}|{}|{}", title, body["temperature"], body["max_tokens"]),
                    },
                    "finish_reason": "stop",
                }],
                "usage": {"prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7},
            })),
        )
    }

    async fn models() -> Json<Value> {
        Json(serde_json::json!({
            "data": [
                {
                    "id": "openai/gpt-4-turbo",
                    "name": "OpenAI: GPT-4 Turbo",
                    "context_length": 128000,
                    "pricing": {"prompt": "0.00001", "completion": "0.00003", "image": "0.01445"},
                    "architecture": {"modality": "text+image->text"},
                },
                {"id": "mistralai/mistral-large"},
            ]
        }))
    }

    async fn spawn_provider(provider: Provider) -> String {
        let app = Router::new()
            .route("/api/v1/chat/completions", post(completions))
            .route("/api/v1/models", get(models))
            .with_state(provider);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api/v1", addr)
    }

    fn request() -> ChatRequest {
        ChatRequest::new("openai/gpt-4-turbo", vec![ChatMessage::user("hello")])
    }

    #[tokio::test]
    async fn test_chat_completion_sends_defaults_and_headers() {
        let base_url = spawn_provider(Provider::default()).await;
        let gateway = OpenRouterGateway::new(Some("sk-test".into()), base_url).unwrap();

        let completion = gateway.chat_completion(request()).await.unwrap();
        assert_eq!(completion.model, "openai/gpt-4-turbo");
        assert_eq!(completion.content(), Some("Gift Recommendation System|0.7|2000"));
        assert_eq!(completion.usage.unwrap().total_tokens, 7);
    }

    #[tokio::test]
    async fn test_error_status_carries_status_text_and_body() {
        let base_url = spawn_provider(Provider::default()).await;
        let gateway = OpenRouterGateway::new(Some("sk-wrong".into()), base_url).unwrap();

        let err = gateway.chat_completion(request()).await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        let message = err.to_string();
        assert!(message.starts_with("OpenRouter API error: Unauthorized - "));
        assert!(message.contains("No auth credentials found"));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_request() {
        let provider = Provider::default();
        let hits = provider.hits.clone();
        let base_url = spawn_provider(provider).await;
        let gateway = OpenRouterGateway::new(None, base_url).unwrap();

        let err = gateway.chat_completion(request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotConfigured));
        assert!(matches!(
            gateway.list_models().await.unwrap_err(),
            GatewayError::NotConfigured
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let provider = Provider {
            failures: 1,
            ..Default::default()
        };
        let hits = provider.hits.clone();
        let base_url = spawn_provider(provider).await;
        let gateway = OpenRouterGateway::new(Some("sk-test".into()), base_url).unwrap();

        let err = gateway.chat_completion(request()).await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_policy_recovers_from_server_errors() {
        let provider = Provider {
            failures: 2,
            ..Default::default()
        };
        let hits = provider.hits.clone();
        let base_url = spawn_provider(provider).await;
        let gateway = OpenRouterGateway::new(Some("sk-test".into()), base_url)
            .unwrap()
            .with_retry(RetryPolicy {
                enabled: true,
                max_retries: 2,
                initial_backoff_ms: 1,
            });

        let completion = gateway.chat_completion(request()).await.unwrap();
        assert!(completion.content().is_some());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_policy_gives_up_after_budget() {
        let provider = Provider {
            failures: 10,
            ..Default::default()
        };
        let hits = provider.hits.clone();
        let base_url = spawn_provider(provider).await;
        let gateway = OpenRouterGateway::new(Some("sk-test".into()), base_url)
            .unwrap()
            .with_retry(RetryPolicy {
                enabled: true,
                max_retries: 1,
                initial_backoff_ms: 1,
            });

        let err = gateway.chat_completion(request()).await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_list_models_normalizes_entries() {
        let base_url = spawn_provider(Provider::default()).await;
        let gateway = OpenRouterGateway::new(Some("sk-test".into()), base_url).unwrap();

        let models = gateway.list_models().await.unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].id, "openai/gpt-4-turbo");
        assert_eq!(models[0].context_length, 128000);
        let pricing = models[0].pricing.as_ref().unwrap();
        assert_eq!(pricing.prompt, "0.00001");
        assert_eq!(models[1].name, "mistralai/mistral-large");
        assert_eq!(models[1].context_length, 0);
        assert!(models[1].pricing.is_none());
    }
}
