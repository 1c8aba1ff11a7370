use crate::models::Question;

/// Where the conversation currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPhase {
    Idle,
    /// A question has been selected; suggestion resolution may be running
    Presenting,
    AwaitingAnswer,
    Saving,
    /// Terminal until a new optional question is added
    AllAnswered,
}

impl FlowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowPhase::Idle => "idle",
            FlowPhase::Presenting => "presenting",
            FlowPhase::AwaitingAnswer => "awaiting_answer",
            FlowPhase::Saving => "saving",
            FlowPhase::AllAnswered => "all_answered",
        }
    }
}

/// Coordinator-owned session state. Not persisted; reconstructed from the
/// note store on the next session.
#[derive(Debug, Clone)]
pub struct FlowState {
    pub phase: FlowPhase,
    pub current_question: Option<Question>,
    /// Pre-populated candidate answer tied to `current_question`
    pub suggested_answer: Option<String>,
    /// Guard against duplicate concurrent submissions for the same question
    pub is_saving: bool,
}

impl Default for FlowState {
    fn default() -> Self {
        FlowState {
            phase: FlowPhase::Idle,
            current_question: None,
            suggested_answer: None,
            is_saving: false,
        }
    }
}

/// Coarse progress exposed to the conversation surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionState {
    InProgress,
    AllAnswered,
}

/// How an answer reached the coordinator; stamped into note metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerSource {
    Text,
    Voice,
}

impl AnswerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerSource::Text => "text",
            AnswerSource::Voice => "voice",
        }
    }
}
