//! Inputs collected by the assessment flow: who the gift is for, how they
//! answered the questionnaire, and the optional closed gift catalog.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// The gift recipient as described on the multi-step start form.
///
/// Every field is optional on the wire. Values are kept as the raw keys the
/// form submits (`"friend"`, `"birthday"`, `"1000_3000"`, ...) so unknown
/// values pass through to the prompt verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occasion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
}

impl RecipientProfile {
    /// Relationship, treating blank strings as absent.
    pub fn relationship(&self) -> Option<&str> {
        non_blank(self.relationship.as_deref())
    }

    /// Occasion, treating blank strings as absent.
    pub fn occasion(&self) -> Option<&str> {
        non_blank(self.occasion.as_deref())
    }

    pub fn name(&self) -> Option<&str> {
        non_blank(self.name.as_deref())
    }
}

/// Returns `None` for missing or whitespace-only strings.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

/// Budget brackets offered by the start form, in Thai baht.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Budget {
    Under500,
    From500To1000,
    From1000To3000,
    From3000To5000,
    From5000To10000,
    Over10000,
}

impl Budget {
    pub const ALL: [Budget; 6] = [
        Budget::Under500,
        Budget::From500To1000,
        Budget::From1000To3000,
        Budget::From3000To5000,
        Budget::From5000To10000,
        Budget::Over10000,
    ];

    /// The form key for this bracket.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Under500 => "under_500",
            Self::From500To1000 => "500_1000",
            Self::From1000To3000 => "1000_3000",
            Self::From3000To5000 => "3000_5000",
            Self::From5000To10000 => "5000_10000",
            Self::Over10000 => "over_10000",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.key() == key)
    }

    /// Human-readable Thai range used in prompts.
    pub fn thai_label(&self) -> &'static str {
        match self {
            Self::Under500 => "ไม่เกิน 500 บาท",
            Self::From500To1000 => "500 - 1,000 บาท",
            Self::From1000To3000 => "1,000 - 3,000 บาท",
            Self::From3000To5000 => "3,000 - 5,000 บาท",
            Self::From5000To10000 => "5,000 - 10,000 บาท",
            Self::Over10000 => "มากกว่า 10,000 บาท",
        }
    }
}

// ---------------------------------------------------------------------------
// Answers
// ---------------------------------------------------------------------------

/// A single questionnaire answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Text(String),
    Choices(Vec<String>),
    Number(serde_json::Number),
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Choices(choices) => f.write_str(&choices.join(", ")),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Question id to answer. Ordered so that serialized prompts are stable.
pub type AnswerSet = BTreeMap<String, AnswerValue>;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// A gift from the store's own catalog, offered to the model as a closed
/// candidate list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogGift {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub price: serde_json::Number,
}

// ---------------------------------------------------------------------------
// Card message tone
// ---------------------------------------------------------------------------

/// Writing style requested for a generated card message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Formal,
    Casual,
    #[default]
    Warm,
    Playful,
}

impl Tone {
    /// Short Thai style descriptor embedded in the card prompt.
    pub fn descriptor(&self) -> &'static str {
        match self {
            Self::Formal => "เป็นทางการ ใช้คำสุภาพ",
            Self::Casual => "สบายๆ เป็นกันเอง",
            Self::Warm => "อบอุ่น ซาบซึ้ง",
            Self::Playful => "สนุกสนาน เบาสบาย",
        }
    }
}

// ---------------------------------------------------------------------------
// Question frameworks
// ---------------------------------------------------------------------------

/// Personality frameworks the question generator knows about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum QuestionFramework {
    #[default]
    BigFive,
    Mbti,
    Values,
    Lifestyle,
}

impl QuestionFramework {
    /// Resolve a framework name. Unknown names fall back to Big Five.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "mbti" => Self::Mbti,
            "values" => Self::Values,
            "lifestyle" => Self::Lifestyle,
            _ => Self::BigFive,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::BigFive => "Big Five Personality assessment",
            Self::Mbti => "MBTI-style personality assessment",
            Self::Values => "Value-Based assessment",
            Self::Lifestyle => "Lifestyle Mapping",
        }
    }

    /// What the generated questions should probe.
    pub fn focus_areas(&self) -> &'static [&'static str] {
        match self {
            Self::BigFive => &[
                "Openness to experience",
                "Conscientiousness",
                "Extraversion",
                "Agreeableness",
                "Neuroticism",
            ],
            Self::Mbti => &[
                "Introversion vs Extraversion",
                "Sensing vs Intuition",
                "Thinking vs Feeling",
                "Judging vs Perceiving",
            ],
            Self::Values => &[
                "What values are important (achievement, relationships, experiences, etc.)",
                "Lifestyle priorities",
                "Gift preferences",
            ],
            Self::Lifestyle => &[
                "Daily activities and hobbies",
                "Social preferences",
                "Spending habits",
                "Interests and passions",
            ],
        }
    }
}
