use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::question::{Language, Question, TestLevel};
use crate::models::test_answer::TestAnswer;
use crate::models::test_attempt::{KnowledgeLevel, TestAttempt};

#[derive(Debug, Clone, Deserialize)]
pub struct StartTestRequest {
    pub level: String,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartTestResponse {
    pub attempt_id: Uuid,
    pub level: TestLevel,
    pub duration_minutes: Option<i32>,
    pub questions: Vec<QuestionForAttempt>,
}

/// A question rendered in one language, without correctness flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionForAttempt {
    pub id: i64,
    pub order_index: i32,
    pub text: String,
    pub image: Option<String>,
    pub options: Vec<OptionForAttempt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionForAttempt {
    pub id: i64,
    pub text: String,
}

impl QuestionForAttempt {
    pub fn translate(question: &Question, order_index: i32, language: Language) -> Self {
        Self {
            id: question.id,
            order_index,
            text: question.text(language).to_string(),
            image: question.image.clone(),
            options: question
                .options
                .iter()
                .map(|o| OptionForAttempt {
                    id: o.id,
                    text: o.text(language).to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitAnswerRequest {
    pub attempt_id: Uuid,
    pub question_id: i64,
    pub selected_option_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswerResponse {
    pub accepted: bool,
    pub attempt_finished: bool,
    pub result: Option<AttemptResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptResult {
    pub total_questions: i32,
    pub correct_answers: i32,
    pub percent: f64,
    pub knowledge_level: KnowledgeLevel,
}

impl AttemptResult {
    pub fn from_attempt(attempt: &TestAttempt) -> Option<Self> {
        use rust_decimal::prelude::ToPrimitive;

        let knowledge_level = attempt.knowledge_level?;
        Some(Self {
            total_questions: attempt.total_questions,
            correct_answers: attempt.correct_answers,
            percent: attempt.percent.to_f64().unwrap_or_default(),
            knowledge_level,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerView {
    pub question_id: i64,
    pub selected_option_id: Option<i64>,
    pub is_correct: bool,
    pub order_index: i32,
}

impl From<&TestAnswer> for AnswerView {
    fn from(answer: &TestAnswer) -> Self {
        Self {
            question_id: answer.question_id,
            selected_option_id: answer.selected_option_id,
            is_correct: answer.is_correct,
            order_index: answer.order_index,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptDetail {
    #[serde(flatten)]
    pub attempt: TestAttempt,
    pub answers: Vec<AnswerView>,
}
