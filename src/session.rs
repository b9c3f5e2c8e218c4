//! Client-held assessment state.
//!
//! Nothing is cached server-side between an analysis call and a later card
//! message call. An [`AssessmentSession`] keeps the recipient, the answers,
//! the latest analysis and the selected gift on the caller's side and threads
//! them explicitly into each request body.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::types::{
    AnalysisResult, AnswerSet, AnswerValue, GiftSelection, RecipientProfile, RecommendationItem,
    Tone,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no analysis has been applied yet")]
    NoAnalysis,

    #[error("gift index {index} is out of range ({len} recommendations)")]
    GiftOutOfRange { index: usize, len: usize },

    #[error("no gift has been selected")]
    NoGiftSelected,

    #[error("relationship and occasion are required for a card message")]
    MissingCardFields,

    /// The service answered with `success: false`.
    #[error("request failed: {0}")]
    Rejected(String),

    #[error("response is missing '{0}'")]
    MissingField(&'static str),

    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One recipient's assessment, from answers to card message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSession {
    pub recipient: RecipientProfile,
    pub answers: AnswerSet,
    analysis: Option<AnalysisResult>,
    model_name: Option<String>,
    selected_gift: Option<usize>,
    card_message: Option<String>,
}

impl AssessmentSession {
    pub fn new(recipient: RecipientProfile) -> Self {
        Self {
            recipient,
            ..Self::default()
        }
    }

    /// Record (or replace) the answer to one question.
    pub fn record_answer(&mut self, question_id: impl Into<String>, value: AnswerValue) {
        self.answers.insert(question_id.into(), value);
    }

    pub fn analysis(&self) -> Option<&AnalysisResult> {
        self.analysis.as_ref()
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }

    pub fn selected_gift(&self) -> Option<&RecommendationItem> {
        let index = self.selected_gift?;
        self.analysis.as_ref()?.recommendations.get(index)
    }

    pub fn card_message(&self) -> Option<&str> {
        self.card_message.as_deref()
    }

    /// Body for an `analyzeBehavior` request.
    pub fn analyze_request(&self, use_ai_generated: bool) -> Value {
        json!({
            "action": "analyzeBehavior",
            "answers": self.answers,
            "recipientInfo": self.recipient,
            "useAIGeneratedGifts": use_ai_generated,
        })
    }

    /// Store the result of an `analyzeBehavior` envelope.
    ///
    /// The new analysis replaces the previous one outright, and the selected
    /// gift and card message are cleared.
    pub fn apply_analysis(&mut self, envelope: &Value) -> Result<&AnalysisResult, SessionError> {
        check_success(envelope)?;
        let raw = envelope
            .get("analysis")
            .ok_or(SessionError::MissingField("analysis"))?;
        let analysis = AnalysisResult::deserialize(raw)?;

        self.model_name = envelope
            .get("modelName")
            .and_then(Value::as_str)
            .map(str::to_string);
        self.selected_gift = None;
        self.card_message = None;
        Ok(self.analysis.insert(analysis))
    }

    /// Choose the recommendation at `index` (0-based, in ranked order).
    pub fn select_gift(&mut self, index: usize) -> Result<&RecommendationItem, SessionError> {
        let analysis = self.analysis.as_ref().ok_or(SessionError::NoAnalysis)?;
        let len = analysis.recommendations.len();
        if index >= len {
            return Err(SessionError::GiftOutOfRange { index, len });
        }
        self.selected_gift = Some(index);
        self.card_message = None;
        Ok(&analysis.recommendations[index])
    }

    /// Body for a `generateCardMessage` request carrying the current persona
    /// and selected gift.
    pub fn card_message_request(&self, tone: Tone) -> Result<Value, SessionError> {
        if self.recipient.relationship().is_none() || self.recipient.occasion().is_none() {
            return Err(SessionError::MissingCardFields);
        }
        let gift = self
            .selected_gift()
            .map(GiftSelection::from)
            .unwrap_or_default();

        let mut body = json!({
            "action": "generateCardMessage",
            "recipientInfo": self.recipient,
            "tone": tone,
        });
        if let Some(analysis) = &self.analysis {
            body["persona"] = json!(analysis.persona);
        }
        if let Some(name) = gift.name {
            body["giftName"] = Value::String(name);
        }
        if let Some(description) = gift.description {
            body["giftDescription"] = Value::String(description);
        }
        if !gift.reasons.is_empty() {
            body["giftReasons"] = json!(gift.reasons);
        }
        Ok(body)
    }

    /// Store the message from a `generateCardMessage` envelope.
    pub fn apply_card_message(&mut self, envelope: &Value) -> Result<&str, SessionError> {
        check_success(envelope)?;
        let message = envelope
            .get("cardMessage")
            .and_then(Value::as_str)
            .ok_or(SessionError::MissingField("cardMessage"))?;
        Ok(self.card_message.insert(message.to_string()).as_str())
    }

    /// Plain-text summary: persona, ranked recommendations and card message.
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let Some(analysis) = &self.analysis else {
            out.push_str("No analysis yet.\n");
            return out;
        };

        let persona = &analysis.persona;
        let _ = writeln!(out, "Persona: {} ({})", persona.name, persona.persona_type);
        if !persona.description.is_empty() {
            let _ = writeln!(out, "  {}", persona.description);
        }
        if !persona.traits.is_empty() {
            let _ = writeln!(out, "  Traits: {}", persona.traits.join(", "));
        }

        out.push_str("\nRecommendations:\n");
        if analysis.recommendations.is_empty() {
            out.push_str("  (none)\n");
        }
        for (i, item) in analysis.recommendations.iter().enumerate() {
            let marker = if self.selected_gift == Some(i) { "*" } else { " " };
            let _ = write!(out, "{} {}. {} [{}] {}%", marker, i + 1, item.gift_name, item.category, item.match_score);
            if !item.price_range.is_empty() {
                let _ = write!(out, " - {}", item.price_range);
            }
            out.push('\n');
            if !item.description.is_empty() {
                let _ = writeln!(out, "     {}", item.description);
            }
            for reason in &item.reasons {
                let _ = writeln!(out, "     - {}", reason);
            }
        }

        if !analysis.reasoning.is_empty() {
            let _ = writeln!(out, "\nReasoning: {}", analysis.reasoning);
        }
        if let Some(message) = &self.card_message {
            let _ = writeln!(out, "\nCard message:\n{}", message);
        }
        out
    }
}

fn check_success(envelope: &Value) -> Result<(), SessionError> {
    if envelope.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(());
    }
    let message = envelope
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    Err(SessionError::Rejected(message.to_string()))
}
