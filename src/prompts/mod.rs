//! Prompt builder for the recommendation pipeline.
//!
//! Every function here is a pure function of its arguments: no I/O, no clock,
//! no randomness. Templates are embedded at compile time and rendered with
//! Tera. Missing optional inputs are rendered as a placeholder so the prompt
//! keeps the same shape whatever the caller supplied.

use once_cell::sync::Lazy;
use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;

use crate::types::{
    AnswerSet, Budget, CatalogGift, GiftSelection, PersonaResult, QuestionFramework,
    RecipientProfile, Tone,
};
use crate::types::recipient::non_blank;

/// Placeholder for missing fields in English-language prompt sections.
pub const PLACEHOLDER: &str = "N/A";

/// Placeholder for missing fields in Thai-language prompt sections.
pub const THAI_PLACEHOLDER: &str = "ไม่ระบุ";

/// System-role instruction for behavior analysis calls.
pub const ANALYSIS_SYSTEM_PROMPT: &str = "You are an expert gift consultant. Analyze customer behavior and recommend suitable gifts. Respond in JSON format.";

/// System-role instruction for card message calls.
pub const CARD_MESSAGE_SYSTEM_PROMPT: &str = "You are an expert in writing heartfelt, personalized card messages in Thai language. Create messages that are appropriate for the occasion and match the recipient's personality.";

/// System-role instruction for question generation calls.
pub const QUESTION_SYSTEM_PROMPT: &str = "You are an expert psychologist creating assessment questions for a gift recommendation system. Generate clear, concise questions in Thai language.";

const ANALYSIS_CATALOG: &str = "analysis_catalog";
const ANALYSIS_OPEN: &str = "analysis_open";
const CARD_MESSAGE: &str = "card_message";
const QUESTIONS: &str = "questions";

/// Errors raised while rendering a prompt.
///
/// Only reachable through a broken template or an unserializable input.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("failed to serialize prompt input: {0}")]
    Serialize(#[from] serde_json::Error),
}

static TEMPLATES: Lazy<Result<Tera, tera::Error>> = Lazy::new(|| {
    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);
    tera.add_raw_templates(vec![
        (ANALYSIS_CATALOG, include_str!("templates/analysis_catalog.tera")),
        (ANALYSIS_OPEN, include_str!("templates/analysis_open.tera")),
        (CARD_MESSAGE, include_str!("templates/card_message.tera")),
        (QUESTIONS, include_str!("templates/questions.tera")),
    ])?;
    Ok(tera)
});

fn render(template: &str, context: &Context) -> Result<String, PromptError> {
    match TEMPLATES.as_ref() {
        Ok(tera) => Ok(tera.render(template, context)?),
        // tera::Error is not Clone; re-render the failure as a message.
        Err(e) => Err(PromptError::Template(tera::Error::msg(format!(
            "failed to load prompt templates: {}",
            e
        )))),
    }
}

fn or_placeholder<'a>(value: Option<&'a str>, placeholder: &'a str) -> &'a str {
    non_blank(value).unwrap_or(placeholder)
}

fn pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, PromptError> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Build the user prompt for behavior analysis.
///
/// With `use_open_ended_gifts` the model is told to invent 5-8 gift ideas
/// freely; otherwise it is asked for 3-5 recommendations and given the
/// catalog (or a placeholder when none was supplied).
pub fn build_analysis_prompt(
    answers: &AnswerSet,
    recipient: &RecipientProfile,
    catalog: Option<&[CatalogGift]>,
    use_open_ended_gifts: bool,
) -> Result<String, PromptError> {
    let mut context = Context::new();
    context.insert("relationship", or_placeholder(recipient.relationship.as_deref(), PLACEHOLDER));
    context.insert("gender", or_placeholder(recipient.gender.as_deref(), PLACEHOLDER));
    context.insert("age_range", or_placeholder(recipient.age_range.as_deref(), PLACEHOLDER));
    context.insert("occasion", or_placeholder(recipient.occasion.as_deref(), PLACEHOLDER));
    context.insert("answers", &pretty_json(answers)?);

    let budget = non_blank(recipient.budget.as_deref());
    if use_open_ended_gifts {
        let budget_label = budget
            .map(|key| Budget::from_key(key).map(|b| b.thai_label()).unwrap_or(key))
            .unwrap_or(PLACEHOLDER);
        context.insert("name", or_placeholder(recipient.name.as_deref(), THAI_PLACEHOLDER));
        context.insert("budget", budget_label);
        render(ANALYSIS_OPEN, &context)
    } else {
        let catalog = match catalog {
            Some(gifts) if !gifts.is_empty() => pretty_json(gifts)?,
            _ => PLACEHOLDER.to_string(),
        };
        context.insert("name", or_placeholder(recipient.name.as_deref(), PLACEHOLDER));
        context.insert("budget", budget.unwrap_or(PLACEHOLDER));
        context.insert("catalog", &catalog);
        render(ANALYSIS_CATALOG, &context)
    }
}

/// Build the user prompt for a card message.
///
/// Relationship and occasion are expected to be present (the orchestrator
/// validates them); everything else falls back to a placeholder.
pub fn build_card_message_prompt(
    recipient: &RecipientProfile,
    persona: Option<&PersonaResult>,
    gift: Option<&GiftSelection>,
    tone: Tone,
) -> Result<String, PromptError> {
    let gift = gift.filter(|g| !g.is_empty());
    let gift_name = gift.and_then(|g| non_blank(g.name.as_deref()));
    let gift_description = gift.and_then(|g| non_blank(g.description.as_deref()));
    let gift_reasons = gift.map(|g| g.reasons.join(", ")).unwrap_or_default();

    let mut context = Context::new();
    context.insert("relationship", or_placeholder(recipient.relationship.as_deref(), THAI_PLACEHOLDER));
    context.insert("occasion", or_placeholder(recipient.occasion.as_deref(), THAI_PLACEHOLDER));
    context.insert("name", or_placeholder(recipient.name.as_deref(), THAI_PLACEHOLDER));
    context.insert("persona", &describe_persona(persona));
    context.insert("gift_name", gift_name.unwrap_or(THAI_PLACEHOLDER));
    context.insert("gift_description", gift_description.unwrap_or(THAI_PLACEHOLDER));
    context.insert(
        "gift_reasons",
        if gift_reasons.is_empty() { THAI_PLACEHOLDER } else { gift_reasons.as_str() },
    );
    context.insert("tone", tone.descriptor());
    context.insert("has_gift", &gift_name.is_some());
    context.insert("has_reasons", &!gift_reasons.is_empty());
    render(CARD_MESSAGE, &context)
}

/// "name (description) - ลักษณะเด่น: a, b" or the placeholder.
fn describe_persona(persona: Option<&PersonaResult>) -> String {
    let Some(persona) = persona else {
        return THAI_PLACEHOLDER.to_string();
    };
    let mut line = or_placeholder(Some(persona.name.as_str()), persona.persona_type.as_str()).to_string();
    if !persona.description.trim().is_empty() {
        line.push_str(&format!(" ({})", persona.description));
    }
    let traits = if persona.traits.is_empty() {
        THAI_PLACEHOLDER.to_string()
    } else {
        persona.traits.join(", ")
    };
    line.push_str(&format!(" - ลักษณะเด่น: {}", traits));
    line
}

/// Build the user prompt asking for `count` assessment questions.
pub fn build_question_prompt(
    framework: QuestionFramework,
    count: usize,
) -> Result<String, PromptError> {
    let mut context = Context::new();
    context.insert("count", &count);
    context.insert("title", framework.title());
    context.insert("focus_areas", framework.focus_areas());
    render(QUESTIONS, &context)
}
