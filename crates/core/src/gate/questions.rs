//! Clarification candidates and the phrasing seam.
//!
//! The gate's decision tree stays pure; turning candidates into
//! customer-facing language is the one step that may touch a model, so it
//! lives behind [`ClarificationPhraser`] with a deterministic
//! [`TemplatePhraser`] always available as the fallback.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a signal key was nominated for clarification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    LowConfidence,
    SourceConflict,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationCandidate {
    pub key: String,
    pub kind: CandidateKind,
    /// Short context for the phraser (confidence value, conflict rule).
    pub note: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhrasingRequest {
    pub service_name: String,
    pub candidates: Vec<ClarificationCandidate>,
    pub max_questions: usize,
    pub max_options: usize,
}

/// A phrased question before the gate assigns it an id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhrasedQuestion {
    pub target_signal_key: String,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Error)]
pub enum PhrasingError {
    #[error("phrasing backend unavailable: {0}")]
    Unavailable(String),
    #[error("phrasing call timed out")]
    TimedOut,
    #[error("phrasing response was malformed: {0}")]
    Malformed(String),
}

/// Turns candidates into customer-facing questions.
///
/// Implementations must bound their own latency; the gate treats any error,
/// timeout, or empty result as "no questions available" and falls back to
/// templates rather than failing the evaluation.
#[async_trait]
pub trait ClarificationPhraser: Send + Sync {
    async fn phrase_questions(
        &self,
        request: &PhrasingRequest,
    ) -> Result<Vec<PhrasedQuestion>, PhrasingError>;
}

/// Deterministic phrasing, also usable as the only phraser in offline
/// deployments.
#[derive(Clone, Debug, Default)]
pub struct TemplatePhraser;

#[async_trait]
impl ClarificationPhraser for TemplatePhraser {
    async fn phrase_questions(
        &self,
        request: &PhrasingRequest,
    ) -> Result<Vec<PhrasedQuestion>, PhrasingError> {
        Ok(request
            .candidates
            .iter()
            .take(request.max_questions)
            .map(|candidate| template_question(candidate, &request.service_name))
            .collect())
    }
}

pub fn template_question(
    candidate: &ClarificationCandidate,
    service_name: &str,
) -> PhrasedQuestion {
    PhrasedQuestion {
        target_signal_key: candidate.key.clone(),
        question: format!(
            "Could you provide more details about '{}' for your {} quote?",
            humanize_key(&candidate.key),
            service_name
        ),
        options: Vec::new(),
    }
}

/// snake_case keys read poorly in customer-facing text.
pub fn humanize_key(key: &str) -> String {
    key.replace('_', " ")
}
