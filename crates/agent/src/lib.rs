//! Language-model adapters for the quote pipeline.
//!
//! Everything decision-shaped lives in `fieldquote-core`; this crate only
//! supplies the pluggable pieces that talk to a model:
//!
//! - `LlmClient` - minimal completion trait implemented by real backends and
//!   by test fakes
//! - `OpenAiCompatClient` - HTTP client for OpenAI-compatible chat endpoints
//!   (OpenAI itself, Ollama, and most local gateways)
//! - `ModelQuestionPhraser` - adapts an `LlmClient` to the core's
//!   `ClarificationPhraser` seam
//!
//! # Safety Principle
//!
//! The model is strictly a copywriter. It rephrases clarification candidates
//! the deterministic gate already selected; it never decides what to ask,
//! whether to send a quote, or anything about money.

pub mod http;
pub mod llm;
pub mod phrasing;
