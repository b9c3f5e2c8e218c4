//! Response interpreter: turns free-text model replies into typed results.
//!
//! Both entry points are pure and total. A reply that cannot be interpreted
//! yields a fixed fallback instead of an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::types::analysis::{
    AnalysisResult, PersonaResult, PersonaType, RecommendationItem, DEFAULT_CATEGORY,
    DEFAULT_GIFT_NAME, DEFAULT_MATCH_SCORE,
};

/// Leading "1." / "2)" style numbering on a generated question line.
static NUMBERING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+[.)]\s*").expect("numbering pattern is valid")
});

/// Minimum length (in characters) a question line must exceed to be kept.
const MIN_QUESTION_CHARS: usize = 10;

/// Extract the outermost brace-delimited span: first `{` to last `}`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Interpret an analysis reply.
///
/// On success every recommendation is normalized so no field is absent. On
/// any failure the fixed [`AnalysisResult::fallback`] is returned.
pub fn parse_analysis(raw: &str) -> AnalysisResult {
    let Some(candidate) = extract_json_object(raw) else {
        tracing::warn!("No JSON found in analysis response; using fallback");
        return AnalysisResult::fallback();
    };

    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(object)) => normalize_analysis(&object),
        Ok(_) => {
            tracing::warn!("Analysis response JSON is not an object; using fallback");
            AnalysisResult::fallback()
        }
        Err(e) => {
            tracing::warn!("Error parsing analysis response: {}; using fallback", e);
            AnalysisResult::fallback()
        }
    }
}

fn normalize_analysis(object: &Map<String, Value>) -> AnalysisResult {
    let recommendations = object
        .get("recommendations")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(normalize_recommendation)
                .collect()
        })
        .unwrap_or_default();

    AnalysisResult {
        persona: normalize_persona(object.get("persona")),
        recommendations,
        reasoning: string_field(object, "reasoning").unwrap_or_default(),
    }
}

/// Fill any missing persona field from the fallback persona.
fn normalize_persona(value: Option<&Value>) -> PersonaResult {
    let fallback = PersonaResult::fallback();
    let Some(object) = value.and_then(Value::as_object) else {
        return fallback;
    };

    let persona_type = match object.get("type").and_then(Value::as_str) {
        Some(raw) => PersonaType::parse(raw).unwrap_or_else(|| {
            tracing::debug!("Unknown persona type '{}', using practical", raw);
            PersonaType::Practical
        }),
        None => fallback.persona_type,
    };

    PersonaResult {
        persona_type,
        name: string_field(object, "name").unwrap_or(fallback.name),
        description: string_field(object, "description").unwrap_or(fallback.description),
        traits: object
            .get("traits")
            .and_then(Value::as_array)
            .map(|v| strings(v))
            .unwrap_or(fallback.traits),
    }
}

fn normalize_recommendation(object: &Map<String, Value>) -> RecommendationItem {
    RecommendationItem {
        gift_name: string_field(object, "giftName")
            .unwrap_or_else(|| DEFAULT_GIFT_NAME.to_string()),
        description: string_field(object, "description").unwrap_or_default(),
        category: string_field(object, "category")
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        price_range: string_field(object, "priceRange").unwrap_or_default(),
        match_score: match_score(object.get("matchScore")),
        reasons: object
            .get("reasons")
            .and_then(Value::as_array)
            .map(|v| strings(v))
            .unwrap_or_default(),
    }
}

/// Numeric scores (or numeric strings) are rounded and clamped to 0..=100;
/// anything else becomes [`DEFAULT_MATCH_SCORE`].
fn match_score(value: Option<&Value>) -> u8 {
    let score = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match score {
        Some(score) if score.is_finite() => score.round().clamp(0.0, 100.0) as u8,
        _ => DEFAULT_MATCH_SCORE,
    }
}

/// Non-blank string field.
fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn strings(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

/// Interpret a question-generation reply.
///
/// Keeps lines (numbering stripped) that are longer than ten characters and
/// contain a question mark, in reply order, up to `limit` entries.
pub fn parse_question_list(raw: &str, limit: usize) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| NUMBERING.replace(line, "").trim().to_string())
        .filter(|line| line.chars().count() > MIN_QUESTION_CHARS && line.contains('?'))
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::analysis::UNPARSEABLE_REASONING;

    #[test]
    fn test_extract_json_object_is_greedy() {
        let text = "Here you go: {\"a\": {\"b\": 1}} hope it helps {x}";
        assert_eq!(extract_json_object(text), Some("{\"a\": {\"b\": 1}} hope it helps {x}"));
        assert_eq!(extract_json_object("no braces"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn test_parse_analysis_wrapped_in_prose() {
        let raw = r#"Sure! Here is the analysis:
```json
{
  "persona": {"type": "experiencer", "name": "สายประสบการณ์", "description": "ชอบประสบการณ์ใหม่", "traits": ["adventurous", "curious"]},
  "recommendations": [
    {"giftName": "Cooking class", "description": "Thai cuisine", "category": "EXPERIENCE", "priceRange": "1,500 บาท", "matchScore": 93, "reasons": ["fun", "social"]},
    {"giftName": "Travel journal"}
  ],
  "reasoning": "Loves trying new things"
}
```
Enjoy!"#;
        let analysis = parse_analysis(raw);
        assert_eq!(analysis.persona.persona_type, PersonaType::Experiencer);
        assert_eq!(analysis.persona.traits, vec!["adventurous", "curious"]);
        assert_eq!(analysis.reasoning, "Loves trying new things");
        assert_eq!(analysis.recommendations.len(), 2);

        let first = &analysis.recommendations[0];
        assert_eq!(first.gift_name, "Cooking class");
        assert_eq!(first.match_score, 93);

        let second = &analysis.recommendations[1];
        assert_eq!(second.gift_name, "Travel journal");
        assert_eq!(second.description, "");
        assert_eq!(second.category, "OTHER");
        assert_eq!(second.price_range, "");
        assert_eq!(second.match_score, 85);
        assert!(second.reasons.is_empty());
    }

    #[test]
    fn test_recommendation_order_is_preserved() {
        let raw = r#"{"recommendations": [
            {"giftName": "C", "matchScore": 60},
            {"giftName": "A", "matchScore": 99},
            {"giftName": "B", "matchScore": 75}
        ]}"#;
        let names: Vec<_> = parse_analysis(raw)
            .recommendations
            .into_iter()
            .map(|r| r.gift_name)
            .collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_match_score_defaults_and_bounds() {
        let raw = r#"{"recommendations": [
            {"giftName": "a", "matchScore": "high"},
            {"giftName": "b", "matchScore": 150},
            {"giftName": "c", "matchScore": -5},
            {"giftName": "d", "matchScore": 87.6},
            {"giftName": "e", "matchScore": "90"},
            {"giftName": "f", "matchScore": null}
        ]}"#;
        let scores: Vec<u8> = parse_analysis(raw)
            .recommendations
            .iter()
            .map(|r| r.match_score)
            .collect();
        assert_eq!(scores, vec![85, 100, 0, 88, 90, 85]);
    }

    #[test]
    fn test_missing_persona_and_reasoning_are_filled() {
        let analysis = parse_analysis(r#"{"recommendations": []}"#);
        assert_eq!(analysis.persona, PersonaResult::fallback());
        assert_eq!(analysis.reasoning, "");
        assert!(!analysis.is_fallback());

        let analysis = parse_analysis(r#"{"persona": {"type": "LUXURY"}}"#);
        assert_eq!(analysis.persona.persona_type, PersonaType::Luxury);
        assert_eq!(analysis.persona.name, PersonaResult::fallback().name);
    }

    #[test]
    fn test_unknown_persona_type_maps_to_practical() {
        let analysis = parse_analysis(r#"{"persona": {"type": "gamer", "name": "สายเกม"}}"#);
        assert_eq!(analysis.persona.persona_type, PersonaType::Practical);
        assert_eq!(analysis.persona.name, "สายเกม");
    }

    #[test]
    fn test_non_json_reply_returns_fallback() {
        let analysis = parse_analysis("ขออภัย ไม่สามารถวิเคราะห์ได้");
        assert!(analysis.is_fallback());
        assert_eq!(analysis.reasoning, UNPARSEABLE_REASONING);
    }

    #[test]
    fn test_malformed_json_returns_fallback() {
        assert!(parse_analysis("{\"persona\": {\"type\": \"luxury\",}").is_fallback());
        assert!(parse_analysis("result: {not json at all}").is_fallback());
        assert!(parse_analysis("").is_fallback());
    }

    #[test]
    fn test_parse_question_list() {
        let raw = "Here are your questions:\n\
                   1. คุณชอบใช้เวลาว่างทำอะไรมากที่สุด?\n\
                   2) คุณชอบไปเที่ยวทะเลหรือภูเขามากกว่ากัน?\n\
                   \n\
                   3. สั้นไป?\n\
                   4. คุณเป็นคนวางแผนล่วงหน้าเสมอ\n\
                   10. What kind of music do you enjoy most?";
        let questions = parse_question_list(raw, 10);
        assert_eq!(
            questions,
            vec![
                "คุณชอบใช้เวลาว่างทำอะไรมากที่สุด?",
                "คุณชอบไปเที่ยวทะเลหรือภูเขามากกว่ากัน?",
                "What kind of music do you enjoy most?",
            ]
        );
    }

    #[test]
    fn test_parse_question_list_truncates() {
        let raw: String = (1..=20)
            .map(|i| format!("{}. Is this question number {}?\n", i, i))
            .collect();
        let questions = parse_question_list(&raw, 12);
        assert_eq!(questions.len(), 12);
        assert_eq!(questions[0], "Is this question number 1?");
        assert_eq!(questions[11], "Is this question number 12?");
    }
}
