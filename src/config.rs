//! Service configuration.
//!
//! Values are resolved in three layers: built-in defaults, an optional YAML
//! file named by `GIFTWISE_CONFIG`, then environment variables.
//!
//! # Environment Variables
//!
//! - `OPENROUTER_API_KEY` — provider API key (no default)
//! - `OPENROUTER_BASE_URL` — provider base URL
//! - `APP_URL` — sent to the provider as `HTTP-Referer`
//! - `GIFTWISE_MODEL` — model used for questions, analysis and card messages
//! - `GIFTWISE_MAX_QUESTIONS` — cap on generated questions (10-15)
//! - `GIFTWISE_JSON_MODE` — request structured JSON output for analysis
//! - `GIFTWISE_RETRY`, `GIFTWISE_MAX_RETRIES`, `GIFTWISE_RETRY_BACKOFF_MS` — retry policy
//! - `GIFTWISE_TIMEOUT_SECS` — per-request timeout
//! - `GIFTWISE_DEV` — include error details in failure envelopes
//! - `PORT` — HTTP port

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utilities::errors::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_APP_URL: &str = "http://localhost:3000";
pub const DEFAULT_MODEL: &str = "openai/gpt-4-turbo";
pub const DEFAULT_MAX_QUESTIONS: usize = 10;
pub const MAX_QUESTIONS_CEILING: usize = 15;
pub const DEFAULT_PORT: u16 = 8080;

/// Bounded retry with exponential backoff for provider calls.
///
/// Disabled by default: every call is attempted exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub enabled: bool,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            max_retries: 2,
            initial_backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Total attempts per call, including the first.
    pub fn attempts(&self) -> u32 {
        if self.enabled {
            self.max_retries + 1
        } else {
            1
        }
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

/// Top-level configuration for the service.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// OpenRouter API key. When absent every provider call fails with a
    /// configuration error.
    pub api_key: Option<String>,
    pub base_url: String,
    pub app_url: String,
    pub default_model: String,
    pub max_questions: usize,
    /// Ask the provider for `response_format: json_object` on analysis calls.
    pub json_mode: bool,
    pub retry: RetryPolicy,
    pub request_timeout_secs: Option<u64>,
    pub expose_error_details: bool,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            app_url: DEFAULT_APP_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            max_questions: DEFAULT_MAX_QUESTIONS,
            json_mode: false,
            retry: RetryPolicy::default(),
            request_timeout_secs: None,
            expose_error_details: false,
            port: DEFAULT_PORT,
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("app_url", &self.app_url)
            .field("default_model", &self.default_model)
            .field("max_questions", &self.max_questions)
            .field("json_mode", &self.json_mode)
            .field("retry", &self.retry)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("expose_error_details", &self.expose_error_details)
            .field("port", &self.port)
            .finish()
    }
}

impl AppConfig {
    /// Load from `GIFTWISE_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("GIFTWISE_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_yaml_file(path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(content)?;
        config.normalize();
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("OPENROUTER_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(url) = get("OPENROUTER_BASE_URL") {
            self.base_url = url;
        }
        if let Some(url) = get("APP_URL") {
            self.app_url = url;
        }
        if let Some(model) = get("GIFTWISE_MODEL") {
            self.default_model = model;
        }
        if let Some(raw) = get("GIFTWISE_MAX_QUESTIONS") {
            self.max_questions = parse_number("GIFTWISE_MAX_QUESTIONS", &raw)?;
        }
        if let Some(raw) = get("GIFTWISE_JSON_MODE") {
            self.json_mode = parse_flag("GIFTWISE_JSON_MODE", &raw)?;
        }
        if let Some(raw) = get("GIFTWISE_RETRY") {
            self.retry.enabled = parse_flag("GIFTWISE_RETRY", &raw)?;
        }
        if let Some(raw) = get("GIFTWISE_MAX_RETRIES") {
            self.retry.max_retries = parse_number("GIFTWISE_MAX_RETRIES", &raw)?;
        }
        if let Some(raw) = get("GIFTWISE_RETRY_BACKOFF_MS") {
            self.retry.initial_backoff_ms = parse_number("GIFTWISE_RETRY_BACKOFF_MS", &raw)?;
        }
        if let Some(raw) = get("GIFTWISE_TIMEOUT_SECS") {
            self.request_timeout_secs = Some(parse_number("GIFTWISE_TIMEOUT_SECS", &raw)?);
        }
        if let Some(raw) = get("GIFTWISE_DEV") {
            self.expose_error_details = parse_flag("GIFTWISE_DEV", &raw)?;
        }
        if let Some(raw) = get("PORT") {
            self.port = parse_number("PORT", &raw)?;
        }

        self.normalize();
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    fn normalize(&mut self) {
        self.max_questions = self
            .max_questions
            .clamp(DEFAULT_MAX_QUESTIONS, MAX_QUESTIONS_CEILING);
        while self.base_url.ends_with('/') {
            self.base_url.pop();
        }
        if self.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            self.api_key = None;
        }
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}
