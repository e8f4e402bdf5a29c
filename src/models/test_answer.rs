use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One slot of an attempt's fixed question sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestAnswer {
    pub id: i64,
    pub attempt_id: Uuid,
    pub question_id: i64,
    pub selected_option_id: Option<i64>,
    pub text_answer: Option<String>,
    pub is_correct: bool,
    pub order_index: i32,
}

impl TestAnswer {
    /// A slot counts as answered once either an option or a free-text answer is recorded.
    /// Both the ordering check and the completion count use this predicate.
    pub fn is_answered(&self) -> bool {
        self.selected_option_id.is_some() || self.text_answer.is_some()
    }
}
