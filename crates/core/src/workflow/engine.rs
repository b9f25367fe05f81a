use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::workflow::states::{
    TransitionOutcome, WorkflowAction, WorkflowContext, WorkflowEvent, WorkflowKind, WorkflowState,
};

pub trait WorkflowDefinition {
    fn kind(&self) -> WorkflowKind;
    fn initial_state(&self) -> WorkflowState;
    fn transition(
        &self,
        current: &WorkflowState,
        event: &WorkflowEvent,
        context: &WorkflowContext,
    ) -> Result<TransitionOutcome, TransitionError>;
}

/// The quote intake lifecycle: triage, fusion, pricing, gate, then either
/// send, one clarification round, or human review.
#[derive(Clone, Debug)]
pub struct QuoteIntakeFlow {
    max_clarification_rounds: u32,
}

impl Default for QuoteIntakeFlow {
    fn default() -> Self {
        Self { max_clarification_rounds: 1 }
    }
}

impl QuoteIntakeFlow {
    pub fn with_round_cap(max_clarification_rounds: u32) -> Self {
        Self { max_clarification_rounds }
    }
}

impl WorkflowDefinition for QuoteIntakeFlow {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::QuoteIntake
    }

    fn initial_state(&self) -> WorkflowState {
        WorkflowState::Received
    }

    fn transition(
        &self,
        current: &WorkflowState,
        event: &WorkflowEvent,
        context: &WorkflowContext,
    ) -> Result<TransitionOutcome, TransitionError> {
        transition_quote_intake(current, event, context, self.max_clarification_rounds)
    }
}

pub struct WorkflowEngine<D> {
    definition: D,
}

impl<D> WorkflowEngine<D>
where
    D: WorkflowDefinition,
{
    pub fn new(definition: D) -> Self {
        Self { definition }
    }

    pub fn kind(&self) -> WorkflowKind {
        self.definition.kind()
    }

    pub fn initial_state(&self) -> WorkflowState {
        self.definition.initial_state()
    }

    pub fn apply(
        &self,
        current: &WorkflowState,
        event: &WorkflowEvent,
        context: &WorkflowContext,
    ) -> Result<TransitionOutcome, TransitionError> {
        self.definition.transition(current, event, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &WorkflowState,
        event: &WorkflowEvent,
        context: &WorkflowContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, TransitionError>
    where
        S: AuditSink,
    {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit.request_id.clone(),
                        audit.tenant_id.clone(),
                        audit.correlation_id.clone(),
                        "workflow.transition_applied",
                        AuditCategory::Workflow,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", format!("{:?}", outcome.from))
                    .with_metadata("to", format!("{:?}", outcome.to))
                    .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit.request_id.clone(),
                        audit.tenant_id.clone(),
                        audit.correlation_id.clone(),
                        "workflow.transition_rejected",
                        AuditCategory::Workflow,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Default for WorkflowEngine<QuoteIntakeFlow> {
    fn default() -> Self {
        Self::new(QuoteIntakeFlow::default())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("clarification round budget exhausted after {rounds} round(s)")]
    ClarificationRoundsExhausted { rounds: u32 },
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: WorkflowState, event: WorkflowEvent },
}

fn transition_quote_intake(
    current: &WorkflowState,
    event: &WorkflowEvent,
    context: &WorkflowContext,
    max_clarification_rounds: u32,
) -> Result<TransitionOutcome, TransitionError> {
    use WorkflowAction::{
        ApplyCustomerAnswers, ComputePricing, DeliverQuestions, DeliverQuote, EvaluateQualityGate,
        NotifyExpiry, RouteToReviewQueue, RunCrossServiceCheck, RunPhotoAnalysis,
    };
    use WorkflowEvent::{
        CancelRequested, ClarificationExpired, ClarificationRequested, CustomerReplied,
        PricingComputed, QuoteSent, ReviewRequired, SignalsFused, TriageCompleted,
    };
    use WorkflowState::{
        AwaitingCustomer, Cancelled, Expired, Fused, InReview, Priced, Received, Sent, Triaged,
    };

    let (to, actions) = match (current, event) {
        (Received, TriageCompleted) => (Triaged, vec![RunPhotoAnalysis, RunCrossServiceCheck]),
        (Triaged, SignalsFused) => (Fused, vec![ComputePricing]),
        (Fused, PricingComputed) => (Priced, vec![EvaluateQualityGate]),
        (Priced, QuoteSent) | (InReview, QuoteSent) => (Sent, vec![DeliverQuote]),
        (Priced, ClarificationRequested) => (AwaitingCustomer, vec![DeliverQuestions]),
        (Priced, ReviewRequired) => (InReview, vec![RouteToReviewQueue]),
        (AwaitingCustomer, CustomerReplied) => {
            if context.clarification_rounds >= max_clarification_rounds {
                return Err(TransitionError::ClarificationRoundsExhausted {
                    rounds: context.clarification_rounds,
                });
            }
            (Fused, vec![ApplyCustomerAnswers, ComputePricing])
        }
        (AwaitingCustomer, ClarificationExpired) => (Expired, vec![NotifyExpiry]),
        // A sent quote is money in flight; terminal states stay terminal.
        (Sent, CancelRequested) | (Expired, CancelRequested) | (Cancelled, CancelRequested) => {
            return Err(TransitionError::InvalidTransition {
                state: current.clone(),
                event: event.clone(),
            });
        }
        (_, CancelRequested) => (Cancelled, Vec::new()),
        _ => {
            return Err(TransitionError::InvalidTransition {
                state: current.clone(),
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: current.clone(), to, event: event.clone(), actions })
}
