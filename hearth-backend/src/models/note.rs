use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{HouseProfile, Question};

/// Well-known metadata keys stamped on notes - single source of truth
pub mod metadata_keys {
    /// "voice" or "text"
    pub const SOURCE: &str = "source";
    /// "true" when the committed answer equals the offered suggestion
    pub const SUGGESTION_ACCEPTED: &str = "suggestion_accepted";
}

/// A persisted answer to a question. An empty `answer` is an explicit
/// "unanswered" marker: physically present, semantically unanswered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub question_id: String,
    pub answer: String,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Note {
    pub fn new(question_id: &str, answer: &str, metadata: HashMap<String, String>) -> Self {
        Note {
            question_id: question_id.to_string(),
            answer: answer.to_string(),
            last_modified: Utc::now(),
            metadata,
        }
    }

    pub fn is_answered(&self) -> bool {
        !self.answer.trim().is_empty()
    }
}

/// The full persisted state: question catalog, notes keyed by question id,
/// and the derived house profile. Immutable once handed to a reader; every
/// mutation goes through the store's write path, which produces a new
/// snapshot atomically.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotesSnapshot {
    pub questions: Vec<Question>,
    pub notes: HashMap<String, Note>,
    #[serde(default)]
    pub profile: HouseProfile,
    /// Monotonically increasing commit sequence, bumped on every successful write
    #[serde(default)]
    pub commit_seq: u64,
}

impl NotesSnapshot {
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn note(&self, question_id: &str) -> Option<&Note> {
        self.notes.get(question_id)
    }

    pub fn is_answered(&self, question_id: &str) -> bool {
        self.notes
            .get(question_id)
            .map(|n| n.is_answered())
            .unwrap_or(false)
    }

    /// Answered-required over total-required; optional questions don't count.
    /// An empty required set reads as complete.
    pub fn completion_percentage(&self) -> f64 {
        let required: Vec<&Question> = self.questions.iter().filter(|q| q.is_required).collect();
        if required.is_empty() {
            return 1.0;
        }
        let answered = required.iter().filter(|q| self.is_answered(&q.id)).count();
        answered as f64 / required.len() as f64
    }

    /// Unanswered questions: required first, then optional; within the same
    /// required-ness ascending display_order, ties broken by catalog insertion
    /// order. The sort is stable, so repeated calls on unchanged data yield
    /// identical ordering.
    pub fn questions_needing_review(&self) -> Vec<Question> {
        let mut pending: Vec<Question> = self
            .questions
            .iter()
            .filter(|q| !self.is_answered(&q.id))
            .cloned()
            .collect();
        pending.sort_by_key(|q| (!q.is_required, q.display_order));
        pending
    }
}
