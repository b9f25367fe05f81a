pub mod engine;
pub mod states;

pub use engine::{QuoteIntakeFlow, TransitionError, WorkflowDefinition, WorkflowEngine};
pub use states::{
    TransitionOutcome, WorkflowAction, WorkflowContext, WorkflowEvent, WorkflowKind, WorkflowState,
};
