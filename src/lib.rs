//! # giftwise
//!
//! Gift recommendation pipeline backed by a hosted LLM (OpenRouter).
//!
//! A finished questionnaire becomes a gift "persona", a ranked list of gift
//! recommendations and a personalized Thai card message. The crate assembles
//! the prompts, calls the provider, interprets the model's reply and exposes
//! the whole flow over HTTP.
//!
//! - [`prompts`] - Prompt builder (pure, Tera templates)
//! - [`llms`] - Model gateway ([`ModelGateway`] trait, OpenRouter provider)
//! - [`utilities::converter`] - Response interpreter
//! - [`orchestrator`] - Request validation and dispatch
//! - [`server`] - axum HTTP surface
//! - [`session`] - Client-held assessment state

pub mod config;
pub mod llms;
pub mod orchestrator;
pub mod prompts;
pub mod server;
pub mod session;
pub mod types;
pub mod utilities;

pub use config::AppConfig;
pub use llms::{GatewayError, ModelGateway, OpenRouterGateway};
pub use orchestrator::{ErrorKind, Orchestrator, OrchestratorError, OrchestratorSettings, Outcome};
pub use session::AssessmentSession;
pub use types::{AnalysisResult, PersonaResult, PersonaType, RecommendationItem};
pub use utilities::converter::{parse_analysis, parse_question_list};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
