//! Typed parsing of orchestrator request bodies.
//!
//! Validation happens entirely here, before any prompt is built or gateway
//! call is made.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::llms::ChatRequest;
use crate::types::{
    AnswerSet, CatalogGift, GiftSelection, PersonaResult, QuestionFramework, RecipientProfile,
    Tone,
};

use super::OrchestratorError;

/// Number of questions requested when the caller gives no `count`.
pub const DEFAULT_QUESTION_COUNT: usize = 5;

/// The orchestrator's supported actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    GenerateQuestions,
    AnalyzeBehavior,
    ChatCompletion,
    GenerateCardMessage,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::GenerateQuestions,
        Action::AnalyzeBehavior,
        Action::ChatCompletion,
        Action::GenerateCardMessage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerateQuestions => "generateQuestions",
            Self::AnalyzeBehavior => "analyzeBehavior",
            Self::ChatCompletion => "chatCompletion",
            Self::GenerateCardMessage => "generateCardMessage",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == name)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuestionParams {
    pub framework: String,
    #[serde(default)]
    pub count: Option<usize>,
}

impl QuestionParams {
    pub fn framework(&self) -> QuestionFramework {
        QuestionFramework::from_name(&self.framework)
    }

    pub fn count(&self) -> usize {
        self.count.filter(|c| *c > 0).unwrap_or(DEFAULT_QUESTION_COUNT)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisParams {
    pub answers: AnswerSet,
    pub recipient_info: RecipientProfile,
    #[serde(default)]
    pub available_gifts: Option<Vec<CatalogGift>>,
    #[serde(default, rename = "useAIGeneratedGifts")]
    pub use_ai_generated_gifts: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardMessageParams {
    pub recipient_info: RecipientProfile,
    #[serde(default)]
    pub persona: Option<PersonaResult>,
    #[serde(default)]
    pub gift_name: Option<String>,
    #[serde(default)]
    pub gift_description: Option<String>,
    #[serde(default)]
    pub gift_reasons: Option<Vec<String>>,
    #[serde(default)]
    pub tone: Option<Tone>,
}

impl CardMessageParams {
    pub fn tone(&self) -> Tone {
        self.tone.unwrap_or_default()
    }

    pub fn gift(&self) -> GiftSelection {
        GiftSelection {
            name: self.gift_name.clone(),
            description: self.gift_description.clone(),
            reasons: self.gift_reasons.clone().unwrap_or_default(),
        }
    }
}

/// A validated request, one variant per action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionRequest {
    GenerateQuestions(QuestionParams),
    AnalyzeBehavior(AnalysisParams),
    ChatCompletion(ChatRequest),
    GenerateCardMessage(CardMessageParams),
}

impl ActionRequest {
    /// Validate a raw body of the form `{action, ...params}`.
    pub fn from_value(body: &Value) -> Result<Self, OrchestratorError> {
        let Some(fields) = body.as_object() else {
            return Err(OrchestratorError::Validation(
                "Request body must be a JSON object".to_string(),
            ));
        };

        let action = match fields.get("action") {
            None | Some(Value::Null) => return Err(validation("Action is required")),
            Some(Value::String(name)) if name.is_empty() => {
                return Err(validation("Action is required"))
            }
            Some(Value::String(name)) => Action::from_name(name).ok_or_else(|| invalid(name))?,
            Some(other) => return Err(invalid(&other.to_string())),
        };

        match action {
            Action::GenerateQuestions => {
                if !has_text(fields, "framework") {
                    return Err(validation("Framework is required"));
                }
                Ok(Self::GenerateQuestions(params(action, body)?))
            }
            Action::AnalyzeBehavior => {
                if !has_value(fields, "answers") || !has_value(fields, "recipientInfo") {
                    return Err(validation("Answers and recipientInfo are required"));
                }
                Ok(Self::AnalyzeBehavior(params(action, body)?))
            }
            Action::ChatCompletion => {
                if !has_text(fields, "model") || !has_value(fields, "messages") {
                    return Err(validation("Model and messages are required"));
                }
                Ok(Self::ChatCompletion(params(action, body)?))
            }
            Action::GenerateCardMessage => {
                let card: CardMessageParams = match fields.get("recipientInfo") {
                    Some(Value::Object(_)) => params(action, body)?,
                    _ => return Err(card_fields_missing()),
                };
                if card.recipient_info.relationship().is_none()
                    || card.recipient_info.occasion().is_none()
                {
                    return Err(card_fields_missing());
                }
                Ok(Self::GenerateCardMessage(card))
            }
        }
    }

    pub fn action(&self) -> Action {
        match self {
            Self::GenerateQuestions(_) => Action::GenerateQuestions,
            Self::AnalyzeBehavior(_) => Action::AnalyzeBehavior,
            Self::ChatCompletion(_) => Action::ChatCompletion,
            Self::GenerateCardMessage(_) => Action::GenerateCardMessage,
        }
    }
}

/// The optional client-supplied idempotency key, if non-blank.
pub fn idempotency_key(body: &Value) -> Option<&str> {
    body.get("idempotencyKey")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|k| !k.is_empty())
}

fn validation(message: &str) -> OrchestratorError {
    OrchestratorError::Validation(message.to_string())
}

fn invalid(name: &str) -> OrchestratorError {
    let valid: Vec<&str> = Action::ALL.iter().map(Action::as_str).collect();
    OrchestratorError::Validation(format!(
        "Invalid action: {}. Valid actions: {}",
        name,
        valid.join(", ")
    ))
}

fn card_fields_missing() -> OrchestratorError {
    validation("Recipient info with relationship and occasion are required")
}

fn has_value(fields: &Map<String, Value>, key: &str) -> bool {
    !matches!(fields.get(key), None | Some(Value::Null))
}

fn has_text(fields: &Map<String, Value>, key: &str) -> bool {
    match fields.get(key) {
        Some(Value::String(s)) => !s.trim().is_empty(),
        other => !matches!(other, None | Some(Value::Null)),
    }
}

/// Deserialize the action's parameters; the extra `action` and
/// `idempotencyKey` fields are ignored.
fn params<T: DeserializeOwned>(action: Action, body: &Value) -> Result<T, OrchestratorError> {
    T::deserialize(body).map_err(|e| {
        OrchestratorError::Validation(format!("Invalid {} request: {}", action, e))
    })
}
