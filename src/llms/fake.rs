//! Scripted model gateway for tests.
//!
//! Replies are served in the order they were queued; once the queue is empty
//! the default reply is used. Every call is counted and every request is
//! recorded so tests can assert on what reached the gateway.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::base_llm::{
    ChatRequest, Choice, ChoiceMessage, ModelGateway, ModelInfo, RawCompletion, Usage,
};
use super::error::GatewayError;

/// A queued outcome for one `chat_completion` call.
#[derive(Debug, Clone)]
pub enum FakeReply {
    /// Succeed with this message content.
    Content(String),
    /// Fail as if the provider returned this status and JSON body.
    Failure { status: u16, body: String },
}

impl FakeReply {
    fn into_result(self, calls: usize, model: &str) -> Result<RawCompletion, GatewayError> {
        match self {
            Self::Content(content) => Ok(RawCompletion {
                id: format!("fake-{}", calls),
                model: model.to_string(),
                choices: vec![Choice {
                    message: ChoiceMessage {
                        role: "assistant".to_string(),
                        content: Some(content),
                    },
                    finish_reason: Some("stop".to_string()),
                }],
                usage: Some(Usage::default()),
            }),
            Self::Failure { status, body } => Err(GatewayError::Provider {
                status,
                status_text: reqwest::StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("")
                    .to_string(),
                body,
            }),
        }
    }
}

/// In-memory [`ModelGateway`] with a call-count spy.
#[derive(Debug, Default)]
pub struct FakeGateway {
    replies: Mutex<VecDeque<FakeReply>>,
    default_reply: Option<FakeReply>,
    models: Vec<ModelInfo>,
    /// Model name reported in replies; empty means "echo the request's model".
    reply_model: String,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl FakeGateway {
    /// A gateway with no scripted replies. Calls fail until one is added.
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway that answers every call with `content`.
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            default_reply: Some(FakeReply::Content(content.into())),
            ..Self::default()
        }
    }

    /// A gateway that fails every call with the given provider status.
    pub fn failing(status: u16, body: impl Into<String>) -> Self {
        Self {
            default_reply: Some(FakeReply::Failure {
                status,
                body: body.into(),
            }),
            ..Self::default()
        }
    }

    pub fn with_models(mut self, models: Vec<ModelInfo>) -> Self {
        self.models = models;
        self
    }

    pub fn with_reply_model(mut self, model: impl Into<String>) -> Self {
        self.reply_model = model.into();
        self
    }

    /// Queue a reply ahead of the default.
    pub fn push_reply(&self, reply: FakeReply) {
        self.replies.lock().push_back(reply);
    }

    /// Number of gateway calls made so far (models listing included).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Chat requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl ModelGateway for FakeGateway {
    fn provider(&self) -> &str {
        "fake"
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.models.clone())
    }

    async fn chat_completion(&self, request: ChatRequest) -> Result<RawCompletion, GatewayError> {
        let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let model = if self.reply_model.is_empty() {
            request.model.clone()
        } else {
            self.reply_model.clone()
        };
        self.requests.lock().push(request);

        let reply = self
            .replies
            .lock()
            .pop_front()
            .or_else(|| self.default_reply.clone());

        match reply {
            Some(reply) => reply.into_result(calls, &model),
            None => Err(GatewayError::Decode(
                "FakeGateway: no reply configured".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llms::base_llm::ChatMessage;

    fn request() -> ChatRequest {
        ChatRequest::new("fake/model", vec![ChatMessage::user("hi")])
    }

    #[test]
    fn test_queued_replies_before_default() {
        let gateway = FakeGateway::with_content("default");
        gateway.push_reply(FakeReply::Content("first".into()));

        let first = tokio_test::block_on(gateway.chat_completion(request())).unwrap();
        let second = tokio_test::block_on(gateway.chat_completion(request())).unwrap();
        assert_eq!(first.content(), Some("first"));
        assert_eq!(second.content(), Some("default"));
        assert_eq!(gateway.calls(), 2);
        assert_eq!(gateway.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_reply() {
        let gateway = FakeGateway::failing(429, r#"{"error":"rate limited"}"#);
        let err = gateway.chat_completion(request()).await.unwrap_err();
        assert_eq!(err.status(), Some(429));
        assert!(err.to_string().contains("Too Many Requests"));
    }

    #[tokio::test]
    async fn test_unscripted_gateway_errors() {
        let gateway = FakeGateway::new().with_reply_model("openai/gpt-4o");
        assert!(gateway.chat_completion(request()).await.is_err());
        assert_eq!(gateway.last_request().unwrap().model, "fake/model");
        assert_eq!(gateway.calls(), 1);
    }
}
