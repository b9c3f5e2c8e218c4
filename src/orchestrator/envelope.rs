//! Uniform result of an orchestrator call and its JSON envelope.

use serde::Serialize;
use serde_json::{Map, Value};

/// Category of a failed request. The HTTP layer maps each to a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A required field is missing or malformed. No gateway call was made.
    Validation,
    /// The service is missing configuration (e.g. the API key).
    Configuration,
    /// A request with the same idempotency key is still in flight.
    Conflict,
    /// The provider returned an error or could not be reached.
    Provider,
    Internal,
}

/// Either a success payload or a categorized failure. Never partial.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Map<String, Value>),
    Failure {
        kind: ErrorKind,
        message: String,
        details: Option<String>,
    },
}

impl Outcome {
    /// Success with a single payload field.
    pub fn single(key: &str, value: Value) -> Self {
        let mut payload = Map::new();
        payload.insert(key.to_string(), value);
        Self::Success(payload)
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    /// `{success: true, ...payload}` or `{success: false, error, details?}`.
    pub fn into_envelope(self) -> Value {
        match self {
            Self::Success(payload) => {
                let mut body = Map::with_capacity(payload.len() + 1);
                body.insert("success".to_string(), Value::Bool(true));
                body.extend(payload);
                Value::Object(body)
            }
            Self::Failure {
                message, details, ..
            } => {
                let mut body = Map::new();
                body.insert("success".to_string(), Value::Bool(false));
                body.insert("error".to_string(), Value::String(message));
                if let Some(details) = details {
                    body.insert("details".to_string(), Value::String(details));
                }
                Value::Object(body)
            }
        }
    }
}

/// Render an error and its source chain, outermost first.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str("\ncaused by: ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
