//! HTTP server for the recommendation pipeline.
//!
//! # Endpoints
//!
//! - `GET  /health`            — Liveness probe
//! - `POST /api/ai/openrouter` — Questions, analysis, card messages, raw chat
//! - `GET  /api/ai/openrouter` — Available models

pub mod routes;

pub use routes::{app_router, status_for, AppState};
