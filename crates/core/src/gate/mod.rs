//! The quality gate: the final hold/send decision before a quote reaches a
//! customer.
//!
//! Sending is irreversible, so the gate is biased toward pausing: critical
//! issues park the quote for a human, uncertain signals trigger exactly one
//! clarification round, and only clean evaluations pass straight through.
//! The decision tree itself is pure; the single model call for question
//! phrasing sits behind [`ClarificationPhraser`] and can never fail an
//! evaluation.

pub mod questions;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::config::GateConfig;
use crate::domain::pricing::PricingResult;
use crate::domain::signal::{FusedSignals, SignalSource, StructuredSignals};

pub use self::questions::{
    humanize_key, template_question, CandidateKind, ClarificationCandidate, ClarificationPhraser,
    PhrasedQuestion, PhrasingError, PhrasingRequest, TemplatePhraser,
};

/// Everything one evaluation pass looks at. Inputs are assumed well-formed;
/// the gate is a decision point, not a validation boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityGateInput {
    pub structured: StructuredSignals,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fusion: Option<FusedSignals>,
    pub pricing: PricingResult,
    pub clarification_count: u32,
    pub service_name: String,
    pub has_photos: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationQuestion {
    pub id: String,
    pub target_signal_key: String,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GateAction {
    Send,
    AskClarification { questions: Vec<ClarificationQuestion> },
    RequireReview { reason: String },
}

impl GateAction {
    pub fn label(&self) -> &'static str {
        match self {
            GateAction::Send => "send",
            GateAction::AskClarification { .. } => "ask_clarification",
            GateAction::RequireReview { .. } => "require_review",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityGateResult {
    #[serde(flatten)]
    pub action: GateAction,
    pub evaluated_at: DateTime<Utc>,
}

impl QualityGateResult {
    fn new(action: GateAction) -> Self {
        Self { action, evaluated_at: Utc::now() }
    }

    /// For orchestrators that must resolve a quote when evaluation cannot
    /// complete (cancellation, shutdown): park it for a human instead of
    /// leaving it in limbo or sending it unchecked.
    pub fn fallback_review(reason: impl Into<String>) -> Self {
        Self::new(GateAction::RequireReview { reason: reason.into() })
    }
}

#[derive(Clone, Debug, Default)]
pub struct QualityGateEvaluator {
    config: GateConfig,
}

impl QualityGateEvaluator {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Decision procedure, strict order, first match wins:
    ///
    /// 1. loop breaker: the clarification round budget is spent, send;
    /// 2. critical issues, park for review;
    /// 3. no clarification candidates, send;
    /// 4. phrase questions (model if available, templates otherwise);
    /// 5. zero questions even after fallback, send; otherwise ask.
    pub async fn evaluate(
        &self,
        input: &QualityGateInput,
        phraser: Option<&dyn ClarificationPhraser>,
    ) -> QualityGateResult {
        if input.clarification_count >= self.config.max_clarification_rounds {
            return QualityGateResult::new(GateAction::Send);
        }

        if let Some(reason) = self.critical_issue(input) {
            return QualityGateResult::new(GateAction::RequireReview { reason });
        }

        let candidates = self.clarification_candidates(input);
        if candidates.is_empty() {
            return QualityGateResult::new(GateAction::Send);
        }

        let questions = self.phrase(&candidates, input, phraser).await;
        if questions.is_empty() {
            return QualityGateResult::new(GateAction::Send);
        }

        QualityGateResult::new(GateAction::AskClarification { questions })
    }

    /// [`QualityGateEvaluator::evaluate`] plus a `gate.evaluated` audit
    /// event. A review verdict is recorded as `Rejected`: the quote did not
    /// pass the gate.
    pub async fn evaluate_with_audit<S>(
        &self,
        input: &QualityGateInput,
        phraser: Option<&dyn ClarificationPhraser>,
        sink: &S,
        audit: &AuditContext,
    ) -> QualityGateResult
    where
        S: AuditSink,
    {
        let result = self.evaluate(input, phraser).await;
        let outcome = match &result.action {
            GateAction::RequireReview { .. } => AuditOutcome::Rejected,
            _ => AuditOutcome::Success,
        };
        sink.emit(
            AuditEvent::new(
                audit.request_id.clone(),
                audit.tenant_id.clone(),
                audit.correlation_id.clone(),
                "gate.evaluated",
                AuditCategory::Gate,
                audit.actor.clone(),
                outcome,
            )
            .with_metadata("action", result.action.label())
            .with_metadata("clarification_count", input.clarification_count.to_string()),
        );
        result
    }

    fn critical_issue(&self, input: &QualityGateInput) -> Option<String> {
        let overall = input.structured.overall_confidence;

        if overall < self.config.review_confidence_threshold && input.has_photos {
            return Some(
                "very low overall confidence: AI could not extract reliable signals from photos"
                    .to_string(),
            );
        }

        if input.pricing.looks_misconfigured() {
            return Some(
                "pricing computed non-positive despite configured work steps: \
                 likely a configuration issue"
                    .to_string(),
            );
        }

        if input.structured.site_visit_recommended
            && overall < self.config.site_visit_confidence_threshold
        {
            return Some(
                "site visit recommended with low confidence: manual review needed".to_string(),
            );
        }

        None
    }

    /// Low-confidence keys first (extraction order), then unresolved
    /// conflicts, deduplicated by key. A flagged key that fusion never saw
    /// counts as low confidence. Conflicts already settled by a direct form
    /// answer are excluded; the customer has spoken.
    fn clarification_candidates(&self, input: &QualityGateInput) -> Vec<ClarificationCandidate> {
        let mut candidates: Vec<ClarificationCandidate> = Vec::new();

        for key in &input.structured.low_confidence_signals {
            if candidates.iter().any(|candidate| candidate.key == *key) {
                continue;
            }
            let confidence = input.fusion.as_ref().and_then(|fused| fused.confidence_for(key));
            let is_low =
                confidence.map_or(true, |value| value < self.config.low_confidence_threshold);
            if is_low {
                candidates.push(ClarificationCandidate {
                    key: key.clone(),
                    kind: CandidateKind::LowConfidence,
                    note: match confidence {
                        Some(value) => format!("extraction confidence {value:.2}"),
                        None => "signal missing after fusion".to_string(),
                    },
                });
            }
        }

        if let Some(fused) = &input.fusion {
            for conflict in &fused.conflicts {
                if conflict.resolved_source == SignalSource::Form {
                    continue;
                }
                if candidates.iter().any(|candidate| candidate.key == conflict.key) {
                    continue;
                }
                candidates.push(ClarificationCandidate {
                    key: conflict.key.clone(),
                    kind: CandidateKind::SourceConflict,
                    note: conflict.resolution.clone(),
                });
            }
        }

        candidates
    }

    async fn phrase(
        &self,
        candidates: &[ClarificationCandidate],
        input: &QualityGateInput,
        phraser: Option<&dyn ClarificationPhraser>,
    ) -> Vec<ClarificationQuestion> {
        let selected: Vec<ClarificationCandidate> =
            candidates.iter().take(self.config.max_questions).cloned().collect();
        let request = PhrasingRequest {
            service_name: input.service_name.clone(),
            candidates: selected.clone(),
            max_questions: self.config.max_questions,
            max_options: self.config.max_options_per_question,
        };

        let phrased = match phraser {
            Some(phraser) => match phraser.phrase_questions(&request).await {
                Ok(questions) => {
                    let addressed: Vec<PhrasedQuestion> = questions
                        .into_iter()
                        .filter(|question| {
                            selected
                                .iter()
                                .any(|candidate| candidate.key == question.target_signal_key)
                        })
                        .collect();
                    if addressed.is_empty() {
                        template_questions(&selected, &input.service_name)
                    } else {
                        addressed
                    }
                }
                Err(_) => template_questions(&selected, &input.service_name),
            },
            None => template_questions(&selected, &input.service_name),
        };

        phrased
            .into_iter()
            .take(self.config.max_questions)
            .map(|question| ClarificationQuestion {
                id: Uuid::new_v4().to_string(),
                target_signal_key: question.target_signal_key,
                question: question.question,
                options: cap_options(question.options, self.config.max_options_per_question),
            })
            .collect()
    }
}

fn template_questions(
    candidates: &[ClarificationCandidate],
    service_name: &str,
) -> Vec<PhrasedQuestion> {
    candidates.iter().map(|candidate| template_question(candidate, service_name)).collect()
}

fn cap_options(mut options: Vec<String>, max: usize) -> Vec<String> {
    options.truncate(max);
    options
}
