//! LLM provider implementations.
//!
//! Each provider implements [`ModelGateway`](crate::llms::base_llm::ModelGateway)
//! and owns authentication, request formatting and error mapping for its API.
//!
//! | Provider | Module |
//! |----------|--------|
//! | OpenRouter | [`openrouter`] |

pub mod openrouter;
