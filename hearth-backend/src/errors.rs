//! Error taxonomy for the note store, question flow, and resolver capabilities.

use thiserror::Error;

/// Errors surfaced by the note store. These are typed results, never silent.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A save was attempted against an id that is not in the catalog.
    /// Contract violation by the caller; never retried.
    #[error("no question with id '{0}' exists in the catalog")]
    QuestionNotFound(String),

    /// A question add was attempted for an id that already exists.
    #[error("a question with id '{0}' already exists")]
    DuplicateQuestion(String),

    /// Durable I/O failed after one retry. The previous in-memory snapshot
    /// is left intact; callers may retry the whole operation.
    #[error("durable storage unavailable: {0}")]
    StorageUnavailable(String),
}

/// Errors surfaced by the flow coordinator to the conversation surface.
#[derive(Debug, Error)]
pub enum FlowError {
    /// The normalized answer is empty and the question does not allow clearing.
    /// Surfaced to the user for re-entry.
    #[error("answer is empty after trimming")]
    EmptyAnswer,

    /// A save for the current question is already in flight.
    #[error("a save is already in progress for the current question")]
    SaveInProgress,

    /// An answer was submitted while no question is presented.
    #[error("no question is currently presented")]
    NothingPresented,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FlowError {
    /// Whether the surface should prompt the user to try the same input again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FlowError::Store(StoreError::StorageUnavailable(_)))
    }
}

/// Errors from the location/weather capabilities. Absorbed by the coordinator;
/// a failed lookup degrades to "no suggestion" and never blocks the flow.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("capability not available")]
    NotAvailable,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}
