//! Request orchestrator: validates an action request, runs the prompt
//! builder, the model gateway and the response interpreter, and returns a
//! uniform [`Outcome`].
//!
//! # Actions
//!
//! | action | required | payload |
//! |--------|----------|---------|
//! | `generateQuestions` | `framework` | `{questions}` |
//! | `analyzeBehavior` | `answers`, `recipientInfo` | `{analysis, modelName}` |
//! | `chatCompletion` | `model`, `messages` | `{response}` |
//! | `generateCardMessage` | `recipientInfo.relationship`, `recipientInfo.occasion` | `{cardMessage}` |

pub mod envelope;
pub mod in_flight;
pub mod request;

use std::sync::Arc;

use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::llms::{ChatMessage, ChatRequest, GatewayError, ModelGateway, OpenRouterGateway};
use crate::prompts::{
    self, PromptError, ANALYSIS_SYSTEM_PROMPT, CARD_MESSAGE_SYSTEM_PROMPT,
    QUESTION_SYSTEM_PROMPT,
};
use crate::types::AnalysisResult;
use crate::utilities::converter::{parse_analysis, parse_question_list};

pub use envelope::{error_chain, ErrorKind, Outcome};
pub use in_flight::{InFlightGuard, InFlightRegistry};
pub use request::{Action, ActionRequest, AnalysisParams, CardMessageParams, QuestionParams};

/// Card message used when the model returns no text.
pub const DEFAULT_CARD_MESSAGE: &str = "ขอให้มีความสุขในโอกาสพิเศษนี้";

const QUESTION_TEMPERATURE: f64 = 0.8;
const QUESTION_MAX_TOKENS: u32 = 2000;
const ANALYSIS_TEMPERATURE: f64 = 0.7;
const ANALYSIS_MAX_TOKENS: u32 = 3000;
const CARD_TEMPERATURE: f64 = 0.8;
const CARD_MAX_TOKENS: u32 = 500;

/// Errors that end an orchestrator call with a failure envelope.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("{0}")]
    Validation(String),

    #[error("A request with idempotency key '{0}' is already in progress")]
    Conflict(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("failed to build prompt: {0}")]
    Prompt(#[from] PromptError),
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Gateway(GatewayError::NotConfigured) => ErrorKind::Configuration,
            Self::Gateway(_) => ErrorKind::Provider,
            Self::Prompt(_) => ErrorKind::Internal,
        }
    }
}

/// Per-deployment knobs the orchestrator needs from [`AppConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Model used for questions, analysis and card messages.
    pub default_model: String,
    /// Upper bound on parsed questions.
    pub max_questions: usize,
    /// Ask for `response_format: json_object` on analysis calls.
    pub json_mode: bool,
    /// Attach the error source chain as `details` on failures.
    pub expose_error_details: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for OrchestratorSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            default_model: config.default_model.clone(),
            max_questions: config.max_questions,
            json_mode: config.json_mode,
            expose_error_details: config.expose_error_details,
        }
    }
}

/// Routes action requests through prompt builder, gateway and interpreter.
#[derive(Debug)]
pub struct Orchestrator {
    gateway: Arc<dyn ModelGateway>,
    settings: OrchestratorSettings,
    in_flight: InFlightRegistry,
}

impl Orchestrator {
    pub fn new(gateway: Arc<dyn ModelGateway>, settings: OrchestratorSettings) -> Self {
        Self {
            gateway,
            settings,
            in_flight: InFlightRegistry::new(),
        }
    }

    /// Build an orchestrator backed by OpenRouter.
    pub fn from_config(config: &AppConfig) -> Result<Self, GatewayError> {
        let gateway = OpenRouterGateway::from_config(config)?;
        Ok(Self::new(Arc::new(gateway), OrchestratorSettings::from(config)))
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn gateway(&self) -> &Arc<dyn ModelGateway> {
        &self.gateway
    }

    /// Handle one raw `{action, ...params}` body.
    pub async fn handle(&self, body: Value) -> Outcome {
        let request_id = Uuid::new_v4();
        let action = body
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let span = tracing::info_span!("orchestrate", %request_id, action = %action);

        async move {
            match self.run(&body).await {
                Ok(payload) => {
                    tracing::debug!("Request completed");
                    Outcome::Success(payload)
                }
                Err(e) => self.fail(e),
            }
        }
        .instrument(span)
        .await
    }

    /// The provider's model list, as `{models}`.
    pub async fn list_models(&self) -> Outcome {
        let span = tracing::info_span!("list_models", request_id = %Uuid::new_v4());
        async move {
            match self.gateway.list_models().await {
                Ok(models) => Outcome::single("models", json!(models)),
                Err(e) => self.fail(OrchestratorError::from(e)),
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, body: &Value) -> Result<Map<String, Value>, OrchestratorError> {
        let request = ActionRequest::from_value(body)?;

        let _guard = match request::idempotency_key(body) {
            Some(key) => Some(
                self.in_flight
                    .try_acquire(key)
                    .ok_or_else(|| OrchestratorError::Conflict(key.to_string()))?,
            ),
            None => None,
        };

        self.dispatch(request).await
    }

    async fn dispatch(&self, request: ActionRequest) -> Result<Map<String, Value>, OrchestratorError> {
        let mut payload = Map::new();
        match request {
            ActionRequest::GenerateQuestions(params) => {
                let questions = self.generate_questions(&params).await?;
                payload.insert("questions".to_string(), json!(questions));
            }
            ActionRequest::AnalyzeBehavior(params) => {
                let (analysis, model_name) = self.analyze_behavior(&params).await?;
                payload.insert("analysis".to_string(), json!(analysis));
                payload.insert("modelName".to_string(), Value::String(model_name));
            }
            ActionRequest::ChatCompletion(chat) => {
                let response = self.gateway.chat_completion(chat).await?;
                payload.insert("response".to_string(), json!(response));
            }
            ActionRequest::GenerateCardMessage(params) => {
                let message = self.generate_card_message(&params).await?;
                payload.insert("cardMessage".to_string(), Value::String(message));
            }
        }
        Ok(payload)
    }

    /// Generate assessment questions for a framework.
    pub async fn generate_questions(
        &self,
        params: &QuestionParams,
    ) -> Result<Vec<String>, OrchestratorError> {
        let prompt = prompts::build_question_prompt(params.framework(), params.count())?;
        let request = self
            .chat(QUESTION_SYSTEM_PROMPT, prompt)
            .with_temperature(QUESTION_TEMPERATURE)
            .with_max_tokens(QUESTION_MAX_TOKENS);

        let completion = self.gateway.chat_completion(request).await?;
        let questions =
            parse_question_list(completion.content().unwrap_or_default(), self.settings.max_questions);
        tracing::debug!(count = questions.len(), "Parsed generated questions");
        Ok(questions)
    }

    /// Classify a persona and rank recommendations. Returns the analysis and
    /// the name of the model that produced it.
    pub async fn analyze_behavior(
        &self,
        params: &AnalysisParams,
    ) -> Result<(AnalysisResult, String), OrchestratorError> {
        let prompt = prompts::build_analysis_prompt(
            &params.answers,
            &params.recipient_info,
            params.available_gifts.as_deref(),
            params.use_ai_generated_gifts,
        )?;
        let mut request = self
            .chat(ANALYSIS_SYSTEM_PROMPT, prompt)
            .with_temperature(ANALYSIS_TEMPERATURE)
            .with_max_tokens(ANALYSIS_MAX_TOKENS);
        if self.settings.json_mode {
            request = request.with_json_output();
        }

        let completion = self.gateway.chat_completion(request).await?;
        let analysis = parse_analysis(completion.content().unwrap_or_default());
        let model_name = if completion.model.trim().is_empty() {
            self.settings.default_model.clone()
        } else {
            completion.model
        };
        tracing::debug!(
            persona = %analysis.persona.persona_type,
            recommendations = analysis.recommendations.len(),
            model = %model_name,
            "Analysis complete"
        );
        Ok((analysis, model_name))
    }

    /// Write a card message for the recipient, persona and chosen gift.
    pub async fn generate_card_message(
        &self,
        params: &CardMessageParams,
    ) -> Result<String, OrchestratorError> {
        let gift = params.gift();
        let prompt = prompts::build_card_message_prompt(
            &params.recipient_info,
            params.persona.as_ref(),
            Some(&gift),
            params.tone(),
        )?;
        let request = self
            .chat(CARD_MESSAGE_SYSTEM_PROMPT, prompt)
            .with_temperature(CARD_TEMPERATURE)
            .with_max_tokens(CARD_MAX_TOKENS);

        let completion = self.gateway.chat_completion(request).await?;
        let message = completion
            .content()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_CARD_MESSAGE);
        Ok(message.to_string())
    }

    fn chat(&self, system: &str, prompt: String) -> ChatRequest {
        ChatRequest::new(
            self.settings.default_model.clone(),
            vec![ChatMessage::system(system), ChatMessage::user(prompt)],
        )
    }

    fn fail(&self, err: OrchestratorError) -> Outcome {
        let kind = err.kind();
        match kind {
            ErrorKind::Validation | ErrorKind::Conflict => {
                tracing::info!(kind = ?kind, "Rejected request: {}", err)
            }
            _ => tracing::error!(kind = ?kind, "Error calling OpenRouter API: {}", err),
        }
        let details = self.settings.expose_error_details.then(|| error_chain(&err));
        Outcome::Failure {
            kind,
            message: err.to_string(),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llms::{FakeGateway, FakeReply, ModelInfo};
    use crate::types::PersonaType;
    use serde_json::json;

    fn orchestrator(gateway: &Arc<FakeGateway>) -> Orchestrator {
        Orchestrator::new(gateway.clone(), OrchestratorSettings::default())
    }

    fn payload(outcome: Outcome) -> Map<String, Value> {
        match outcome {
            Outcome::Success(payload) => payload,
            Outcome::Failure { message, .. } => panic!("unexpected failure: {}", message),
        }
    }

    #[tokio::test]
    async fn test_card_message_from_stub() {
        let gateway = Arc::new(FakeGateway::with_content("สุขสันต์วันเกิดนะ"));
        let outcome = orchestrator(&gateway)
            .handle(json!({
                "action": "generateCardMessage",
                "recipientInfo": {"relationship": "friend", "occasion": "birthday"},
                "tone": "warm",
            }))
            .await;

        assert_eq!(
            outcome.into_envelope(),
            json!({"success": true, "cardMessage": "สุขสันต์วันเกิดนะ"})
        );
        let request = gateway.last_request().unwrap();
        assert_eq!(request.temperature, Some(0.8));
        assert_eq!(request.max_tokens, Some(500));
        assert_eq!(request.messages[0].content, CARD_MESSAGE_SYSTEM_PROMPT);
        assert!(request.messages[1].content.contains("อบอุ่น ซาบซึ้ง"));
    }

    #[tokio::test]
    async fn test_empty_card_message_uses_default() {
        let gateway = Arc::new(FakeGateway::with_content("   "));
        let outcome = orchestrator(&gateway)
            .handle(json!({
                "action": "generateCardMessage",
                "recipientInfo": {"relationship": "parent", "occasion": "new_year"},
            }))
            .await;
        assert_eq!(payload(outcome)["cardMessage"], DEFAULT_CARD_MESSAGE);
    }

    #[tokio::test]
    async fn test_card_message_threads_gift_and_persona() {
        let gateway = Arc::new(FakeGateway::with_content("ok"));
        orchestrator(&gateway)
            .handle(json!({
                "action": "generateCardMessage",
                "recipientInfo": {"relationship": "partner", "occasion": "anniversary", "name": "Mint"},
                "persona": {"type": "sentimental", "name": "สายซึ้ง", "traits": ["romantic"]},
                "giftName": "Star map print",
                "giftReasons": ["meaningful date"],
                "tone": "formal",
            }))
            .await;
        let prompt = &gateway.last_request().unwrap().messages[1].content;
        assert!(prompt.contains("Mint"));
        assert!(prompt.contains("สายซึ้ง"));
        assert!(prompt.contains("Star map print"));
        assert!(prompt.contains("meaningful date"));
        assert!(prompt.contains("เป็นทางการ ใช้คำสุภาพ"));
    }

    #[tokio::test]
    async fn test_unparseable_analysis_falls_back() {
        let gateway = Arc::new(
            FakeGateway::with_content("I think they would love something nice!")
                .with_reply_model("openai/gpt-4-turbo-2024-04-09"),
        );
        let outcome = orchestrator(&gateway)
            .handle(json!({"action": "analyzeBehavior", "answers": {}, "recipientInfo": {}}))
            .await;

        let envelope = outcome.into_envelope();
        assert_eq!(envelope["success"], true);
        assert_eq!(envelope["analysis"]["persona"]["type"], "practical");
        assert_eq!(envelope["analysis"]["recommendations"], json!([]));
        assert_eq!(envelope["analysis"]["reasoning"], "Unable to parse AI response");
        assert_eq!(envelope["modelName"], "openai/gpt-4-turbo-2024-04-09");
    }

    #[tokio::test]
    async fn test_analysis_success() {
        let reply = json!({
            "persona": {"type": "luxury", "name": "สายหรู", "description": "ชอบของแบรนด์", "traits": ["stylish"]},
            "recommendations": [
                {"giftName": "Leather wallet", "category": "FASHION", "priceRange": "3,000 บาท", "matchScore": 92, "reasons": ["quality"]},
                {"giftName": "Silk scarf"}
            ],
            "reasoning": "Values premium brands"
        });
        let gateway = Arc::new(FakeGateway::with_content(format!("```json\n{}\n```", reply)));
        let outcome = orchestrator(&gateway)
            .handle(json!({
                "action": "analyzeBehavior",
                "answers": {"q1": "brands"},
                "recipientInfo": {"relationship": "boss", "budget": "over_5000"},
                "useAIGeneratedGifts": true,
            }))
            .await;

        let payload = payload(outcome);
        let analysis: AnalysisResult = serde_json::from_value(payload["analysis"].clone()).unwrap();
        assert_eq!(analysis.persona.persona_type, PersonaType::Luxury);
        assert_eq!(analysis.recommendations[0].gift_name, "Leather wallet");
        assert_eq!(analysis.recommendations[1].match_score, 85);
        assert_eq!(analysis.recommendations[1].category, "OTHER");
        // FakeGateway echoes the request model when no reply model is set.
        assert_eq!(payload["modelName"], "openai/gpt-4-turbo");

        let request = gateway.last_request().unwrap();
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.max_tokens, Some(3000));
        assert!(request.response_format.is_none());
    }

    #[tokio::test]
    async fn test_json_mode_requests_structured_output() {
        let gateway = Arc::new(FakeGateway::with_content("{}"));
        let settings = OrchestratorSettings {
            json_mode: true,
            ..Default::default()
        };
        let orchestrator = Orchestrator::new(gateway.clone(), settings);
        orchestrator
            .handle(json!({"action": "analyzeBehavior", "answers": {}, "recipientInfo": {}}))
            .await;
        let request = gateway.last_request().unwrap();
        assert_eq!(request.response_format, Some(json!({"type": "json_object"})));
    }

    #[tokio::test]
    async fn test_generate_questions() {
        let gateway = Arc::new(FakeGateway::with_content(
            "1. คุณชอบทำกิจกรรมกลางแจ้งหรือไม่?\n2. คุณชอบอ่านหนังสือประเภทไหน?\nหมายเหตุ",
        ));
        let outcome = orchestrator(&gateway)
            .handle(json!({"action": "generateQuestions", "framework": "lifestyle", "count": 2}))
            .await;
        let payload = payload(outcome);
        assert_eq!(
            payload["questions"],
            json!(["คุณชอบทำกิจกรรมกลางแจ้งหรือไม่?", "คุณชอบอ่านหนังสือประเภทไหน?"])
        );
        let request = gateway.last_request().unwrap();
        assert!(request.messages[1].content.starts_with("Generate 2 questions for Lifestyle Mapping"));
        assert_eq!(request.temperature, Some(0.8));
    }

    #[tokio::test]
    async fn test_chat_completion_passthrough() {
        let gateway = Arc::new(FakeGateway::with_content("pong"));
        let outcome = orchestrator(&gateway)
            .handle(json!({
                "action": "chatCompletion",
                "model": "anthropic/claude-3-haiku",
                "messages": [{"role": "user", "content": "ping"}],
            }))
            .await;
        let payload = payload(outcome);
        assert_eq!(payload["response"]["choices"][0]["message"]["content"], "pong");
        assert_eq!(payload["response"]["model"], "anthropic/claude-3-haiku");
        assert!(gateway.last_request().unwrap().temperature.is_none());
    }

    #[tokio::test]
    async fn test_validation_failures_never_reach_gateway() {
        let gateway = Arc::new(FakeGateway::with_content("unused"));
        let orchestrator = orchestrator(&gateway);
        let bodies = [
            json!({}),
            json!({"action": "summonDragon"}),
            json!({"action": "generateQuestions"}),
            json!({"action": "analyzeBehavior", "answers": {}}),
            json!({"action": "chatCompletion", "messages": []}),
            json!({"action": "generateCardMessage", "recipientInfo": {"relationship": "friend"}}),
        ];
        for body in bodies {
            let outcome = orchestrator.handle(body).await;
            assert_eq!(outcome.error_kind(), Some(ErrorKind::Validation));
        }
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_error_surfaces() {
        let gateway = Arc::new(FakeGateway::failing(429, r#"{"error":{"message":"Rate limit"}}"#));
        let outcome = orchestrator(&gateway)
            .handle(json!({"action": "generateQuestions", "framework": "big5"}))
            .await;
        let Outcome::Failure { kind, message, details } = outcome else {
            panic!("expected failure");
        };
        assert_eq!(kind, ErrorKind::Provider);
        assert_eq!(
            message,
            r#"OpenRouter API error: Too Many Requests - {"error":{"message":"Rate limit"}}"#
        );
        assert!(details.is_none());
    }

    #[tokio::test]
    async fn test_details_exposed_in_dev_mode() {
        let gateway = Arc::new(FakeGateway::failing(500, "{}"));
        let settings = OrchestratorSettings {
            expose_error_details: true,
            ..Default::default()
        };
        let outcome = Orchestrator::new(gateway, settings)
            .handle(json!({"action": "generateQuestions", "framework": "big5"}))
            .await;
        let envelope = outcome.into_envelope();
        assert_eq!(envelope["success"], false);
        assert!(envelope["details"].as_str().unwrap().contains("Internal Server Error"));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_configuration_error() {
        let gateway = Arc::new(OpenRouterGateway::new(None, "http://127.0.0.1:9").unwrap());
        let outcome = Orchestrator::new(gateway, OrchestratorSettings::default())
            .handle(json!({"action": "generateQuestions", "framework": "big5"}))
            .await;
        let Outcome::Failure { kind, message, .. } = outcome else {
            panic!("expected failure");
        };
        assert_eq!(kind, ErrorKind::Configuration);
        assert_eq!(message, "OpenRouter API key is not configured");
    }

    #[tokio::test]
    async fn test_idempotency_key_conflict() {
        let gateway = Arc::new(FakeGateway::with_content("ok"));
        let orchestrator = orchestrator(&gateway);
        let body = json!({
            "action": "generateCardMessage",
            "recipientInfo": {"relationship": "friend", "occasion": "birthday"},
            "idempotencyKey": "card-1",
        });

        let held = orchestrator.in_flight.try_acquire("card-1").unwrap();
        let outcome = orchestrator.handle(body.clone()).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Conflict));
        assert_eq!(gateway.calls(), 0);

        drop(held);
        assert!(orchestrator.handle(body.clone()).await.is_success());
        // Released once the request finished.
        assert!(orchestrator.handle(body).await.is_success());
        assert_eq!(gateway.calls(), 2);
    }

    #[tokio::test]
    async fn test_list_models() {
        let gateway = Arc::new(FakeGateway::new().with_models(vec![ModelInfo {
            id: "openai/gpt-4-turbo".into(),
            name: "GPT-4 Turbo".into(),
            context_length: 128000,
            pricing: None,
        }]));
        let envelope = orchestrator(&gateway).list_models().await.into_envelope();
        assert_eq!(envelope["success"], true);
        assert_eq!(envelope["models"][0]["contextLength"], 128000);
    }

    #[tokio::test]
    async fn test_scripted_failure_then_success() {
        let gateway = Arc::new(FakeGateway::with_content("ข้อความ"));
        gateway.push_reply(FakeReply::Failure {
            status: 502,
            body: "{}".into(),
        });
        let orchestrator = orchestrator(&gateway);
        let body = json!({
            "action": "generateCardMessage",
            "recipientInfo": {"relationship": "friend", "occasion": "birthday"},
        });
        assert_eq!(orchestrator.handle(body.clone()).await.error_kind(), Some(ErrorKind::Provider));
        assert!(orchestrator.handle(body).await.is_success());
    }
}
