//! Utility modules.
//!
//! - [`converter`] - Interpreting model replies
//! - [`errors`] - Shared error types

pub mod converter;
pub mod errors;
