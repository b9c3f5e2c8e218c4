//! Model gateway: the crate's only network boundary to the LLM provider.
//!
//! - [`base_llm`] - The [`ModelGateway`] trait and request/response types
//! - [`providers`] - Concrete providers (OpenRouter)
//! - [`fake`] - Scripted gateway with a call counter, for tests
//! - [`error`] - [`GatewayError`]

pub mod base_llm;
pub mod error;
pub mod fake;
pub mod providers;

pub use base_llm::{
    ChatMessage, ChatRequest, ModelGateway, ModelInfo, ModelPricing, RawCompletion, Usage,
};
pub use error::GatewayError;
pub use fake::{FakeGateway, FakeReply};
pub use providers::openrouter::OpenRouterGateway;
