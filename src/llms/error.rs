//! Model gateway errors.

use thiserror::Error;

/// Errors raised by a [`ModelGateway`](super::base_llm::ModelGateway).
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No API key was configured, so no request was attempted.
    #[error("OpenRouter API key is not configured")]
    NotConfigured,

    /// The provider answered with a non-success HTTP status.
    ///
    /// `body` is the provider's JSON error payload, or `{}` when it sent none.
    #[error("OpenRouter API error: {status_text} - {body}")]
    Provider {
        status: u16,
        status_text: String,
        body: String,
    },

    /// The request never produced an HTTP response.
    #[error("OpenRouter request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A success response whose body did not match the expected shape.
    #[error("failed to decode OpenRouter response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// HTTP status reported by the provider, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }
}
