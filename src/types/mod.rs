//! Domain types shared by the prompt builder, the response interpreter and
//! the orchestrator.

pub mod analysis;
pub mod recipient;

pub use analysis::{AnalysisResult, GiftSelection, PersonaResult, PersonaType, RecommendationItem};
pub use recipient::{
    AnswerSet, AnswerValue, Budget, CatalogGift, QuestionFramework, RecipientProfile, Tone,
};
