//! Built-in question catalog.
//!
//! The defaults every fresh store starts from. Persisted documents are merged
//! with this catalog at load time so new built-ins appear after an upgrade
//! and dynamically added questions survive.

use once_cell::sync::Lazy;

use crate::models::{NotesSnapshot, Question, QuestionCategory, QuestionKind};

pub const QUESTION_ID_USER_NAME: &str = "user-name";
pub const QUESTION_ID_ADDRESS_CONFIRM: &str = "address-confirm";
pub const QUESTION_ID_HOUSE_NAME: &str = "house-name";
pub const QUESTION_ID_ROOM_NOTES: &str = "room-notes";

static BUILTIN_QUESTIONS: Lazy<Vec<Question>> = Lazy::new(|| {
    vec![
        Question {
            id: QUESTION_ID_USER_NAME.to_string(),
            text: "What's your name?".to_string(),
            category: QuestionCategory::Personal,
            kind: QuestionKind::Generic,
            display_order: 10,
            is_required: true,
            allows_clearing: false,
            hint: None,
        },
        Question {
            id: QUESTION_ID_ADDRESS_CONFIRM.to_string(),
            text: "Is this the right address?".to_string(),
            category: QuestionCategory::HouseInfo,
            kind: QuestionKind::AddressConfirmation,
            display_order: 20,
            is_required: true,
            allows_clearing: false,
            hint: Some("Edit the suggestion if anything looks off.".to_string()),
        },
        Question {
            id: QUESTION_ID_HOUSE_NAME.to_string(),
            text: "What should I call this house?".to_string(),
            category: QuestionCategory::HouseInfo,
            kind: QuestionKind::HouseNaming,
            display_order: 30,
            is_required: true,
            allows_clearing: false,
            hint: None,
        },
        Question {
            id: QUESTION_ID_ROOM_NOTES.to_string(),
            text: "Anything I should remember about the rooms or devices here?".to_string(),
            category: QuestionCategory::HouseInfo,
            kind: QuestionKind::Generic,
            display_order: 40,
            is_required: false,
            allows_clearing: true,
            hint: None,
        },
    ]
});

pub fn default_questions() -> Vec<Question> {
    BUILTIN_QUESTIONS.clone()
}

/// A fresh snapshot containing only the built-in catalog.
pub fn default_snapshot() -> NotesSnapshot {
    NotesSnapshot {
        questions: default_questions(),
        ..NotesSnapshot::default()
    }
}

/// Merge a persisted catalog with the built-ins: built-in definitions are
/// authoritative (text/kind/ordering may have changed between versions),
/// persisted extras keep their insertion order after them. Deduplicated by id.
pub fn merge_with_builtin(persisted: Vec<Question>) -> Vec<Question> {
    let mut merged = default_questions();
    for question in persisted {
        if !merged.iter().any(|q| q.id == question.id) {
            merged.push(question);
        }
    }
    merged
}
