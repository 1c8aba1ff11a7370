pub mod coordinator;
pub mod outbox;
pub mod state;

pub use coordinator::FlowCoordinator;
pub use outbox::{SideEffect, SideEffectOutbox};
pub use state::{AnswerSource, CompletionState, FlowPhase, FlowState};
