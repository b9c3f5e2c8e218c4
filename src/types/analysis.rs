//! Outputs of the behavior analysis: the recipient's gift persona and the
//! model-ranked recommendation list.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Score used when the model omits `matchScore` or sends something that is
/// not a number.
pub const DEFAULT_MATCH_SCORE: u8 = 85;

/// Category used when the model omits one.
pub const DEFAULT_CATEGORY: &str = "OTHER";

/// Name used when the model omits `giftName`.
pub const DEFAULT_GIFT_NAME: &str = "ของขวัญที่แนะนำ";

/// Reasoning string returned when the model reply could not be interpreted.
pub const UNPARSEABLE_REASONING: &str = "Unable to parse AI response";

// ---------------------------------------------------------------------------
// Persona
// ---------------------------------------------------------------------------

/// Gift persona classes the model is asked to choose from.
///
/// Unrecognised values from the model are folded into [`PersonaType::Practical`]
/// so callers only ever see one of these four.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PersonaType {
    Experiencer,
    #[default]
    Practical,
    Luxury,
    Sentimental,
}

impl PersonaType {
    pub const ALL: [PersonaType; 4] = [
        PersonaType::Experiencer,
        PersonaType::Practical,
        PersonaType::Luxury,
        PersonaType::Sentimental,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Experiencer => "experiencer",
            Self::Practical => "practical",
            Self::Luxury => "luxury",
            Self::Sentimental => "sentimental",
        }
    }

    /// Case-insensitive lookup.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for PersonaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PersonaType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PersonaType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw).unwrap_or_default())
    }
}

/// The recipient's gift personality as classified by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaResult {
    #[serde(rename = "type", default)]
    pub persona_type: PersonaType,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub traits: Vec<String>,
}

impl PersonaResult {
    /// The persona reported when the model reply is unusable.
    pub fn fallback() -> Self {
        Self {
            persona_type: PersonaType::Practical,
            name: "สาย Practical".to_string(),
            description: "ชอบของขวัญที่ใช้งานได้จริง".to_string(),
            traits: vec!["practical".to_string(), "quality-focused".to_string()],
        }
    }
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

/// One suggested gift. The list order is the model's own ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationItem {
    pub gift_name: String,
    pub description: String,
    pub category: String,
    pub price_range: String,
    /// Always within `0..=100`.
    pub match_score: u8,
    pub reasons: Vec<String>,
}

/// Persona, ranked recommendations and the model's overall reasoning, always
/// produced together from a single model reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub persona: PersonaResult,
    pub recommendations: Vec<RecommendationItem>,
    pub reasoning: String,
}

impl AnalysisResult {
    /// Fixed result substituted when the reply cannot be parsed.
    pub fn fallback() -> Self {
        Self {
            persona: PersonaResult::fallback(),
            recommendations: Vec::new(),
            reasoning: UNPARSEABLE_REASONING.to_string(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        *self == Self::fallback()
    }
}

// ---------------------------------------------------------------------------
// Gift selection for card messages
// ---------------------------------------------------------------------------

/// The gift a card message should reference. Every part is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GiftSelection {
    pub name: Option<String>,
    pub description: Option<String>,
    pub reasons: Vec<String>,
}

impl GiftSelection {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.reasons.is_empty()
    }
}

impl From<&RecommendationItem> for GiftSelection {
    fn from(item: &RecommendationItem) -> Self {
        Self {
            name: Some(item.gift_name.clone()),
            description: (!item.description.is_empty()).then(|| item.description.clone()),
            reasons: item.reasons.clone(),
        }
    }
}
