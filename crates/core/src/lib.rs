pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod fusion;
pub mod gate;
pub mod history;
pub mod triage;
pub mod workflow;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use config::{AppConfig, GateConfig, LlmConfig, LoggingConfig, TriageConfig};
pub use domain::pricing::{PriceLineItem, PricingResult};
pub use domain::request::{RequestId, TriageInput};
pub use domain::signal::{
    ExtractedSignal, FusedSignals, SignalConflict, SignalProvenance, SignalSource, SignalValue,
    StructuredSignals,
};
pub use errors::{ApplicationError, DomainError};
pub use fusion::FusionRecorder;
pub use gate::{
    CandidateKind, ClarificationCandidate, ClarificationPhraser, ClarificationQuestion,
    GateAction, PhrasedQuestion, PhrasingError, PhrasingRequest, QualityGateEvaluator,
    QualityGateInput, QualityGateResult, TemplatePhraser,
};
pub use history::{
    resolve_previous_quote_count, InMemoryPreviousQuoteLookup, LookupError, PreviousQuoteLookup,
};
pub use triage::{photo_strategy, Classification, PhotoStrategy, TriageClassifier, TriageDecision};
pub use workflow::{
    QuoteIntakeFlow, TransitionError, TransitionOutcome, WorkflowAction, WorkflowContext,
    WorkflowEngine, WorkflowEvent, WorkflowKind, WorkflowState,
};
