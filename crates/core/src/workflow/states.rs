use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowKind {
    QuoteIntake,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowState {
    Received,
    Triaged,
    Fused,
    Priced,
    AwaitingCustomer,
    Sent,
    InReview,
    Expired,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowEvent {
    TriageCompleted,
    SignalsFused,
    PricingComputed,
    QuoteSent,
    ClarificationRequested,
    ReviewRequired,
    CustomerReplied,
    ClarificationExpired,
    CancelRequested,
}

/// Per-request bookkeeping the transition guards read. The orchestrator
/// increments `clarification_rounds` after each processed customer reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WorkflowContext {
    pub clarification_rounds: u32,
}

/// Instructions for the orchestrator to carry out after a transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowAction {
    RunPhotoAnalysis,
    RunCrossServiceCheck,
    ComputePricing,
    EvaluateQualityGate,
    DeliverQuote,
    DeliverQuestions,
    ApplyCustomerAnswers,
    RouteToReviewQueue,
    NotifyExpiry,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: WorkflowState,
    pub to: WorkflowState,
    pub event: WorkflowEvent,
    pub actions: Vec<WorkflowAction>,
}
