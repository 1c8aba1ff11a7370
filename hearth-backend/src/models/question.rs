use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category tag for grouping questions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    Personal,
    HouseInfo,
    Maintenance,
    Preference,
    Reminder,
    Other,
}

impl QuestionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionCategory::Personal => "personal",
            QuestionCategory::HouseInfo => "house_info",
            QuestionCategory::Maintenance => "maintenance",
            QuestionCategory::Preference => "preference",
            QuestionCategory::Reminder => "reminder",
            QuestionCategory::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "personal" => Some(QuestionCategory::Personal),
            "house_info" | "house-info" => Some(QuestionCategory::HouseInfo),
            "maintenance" => Some(QuestionCategory::Maintenance),
            "preference" => Some(QuestionCategory::Preference),
            "reminder" => Some(QuestionCategory::Reminder),
            "other" => Some(QuestionCategory::Other),
            _ => None,
        }
    }
}

impl Default for QuestionCategory {
    fn default() -> Self {
        QuestionCategory::Other
    }
}

/// Behavioral tag resolved at catalog-construction time. The coordinator
/// dispatches on this instead of matching on question text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Generic,
    AddressConfirmation,
    HouseNaming,
}

impl Default for QuestionKind {
    fn default() -> Self {
        QuestionKind::Generic
    }
}

/// An immutable prompt definition with ordering/requiredness metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Stable unique identifier, immutable once created
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub category: QuestionCategory,
    #[serde(default)]
    pub kind: QuestionKind,
    /// Default ordering among otherwise-unordered questions.
    /// Need not be unique; ties break by catalog insertion order.
    pub display_order: i32,
    /// Required questions are surfaced before optional ones
    pub is_required: bool,
    /// Whether an empty answer is accepted (clears the note back to unanswered)
    #[serde(default)]
    pub allows_clearing: bool,
    #[serde(default)]
    pub hint: Option<String>,
}

impl Question {
    /// Build an ad hoc question created mid-conversation (room/device notes).
    /// Always optional, ordered after the built-in catalog.
    pub fn dynamic(text: &str, category: QuestionCategory) -> Self {
        Question {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            category,
            kind: QuestionKind::Generic,
            display_order: 100,
            is_required: false,
            allows_clearing: true,
            hint: None,
        }
    }
}
