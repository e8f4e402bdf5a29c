use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::question::{OptionDraft, QuestionDraft, TestLevel};
use crate::models::test_config::DEFAULT_DURATION_MINUTES;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionPayload {
    pub level: TestLevel,
    #[validate(length(min = 1))]
    pub text_ru: String,
    #[validate(length(min = 1))]
    pub text_kg: String,
    #[validate(length(max = 500))]
    pub image: Option<String>,
    pub is_active: Option<bool>,
    #[validate(length(min = 2, max = 10))]
    pub options: Vec<OptionPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionPayload {
    pub text_ru: String,
    pub text_kg: String,
    #[serde(default)]
    pub is_correct: bool,
}

impl From<QuestionPayload> for QuestionDraft {
    fn from(payload: QuestionPayload) -> Self {
        QuestionDraft {
            level: payload.level,
            text_ru: payload.text_ru,
            text_kg: payload.text_kg,
            image: payload.image,
            is_active: payload.is_active.unwrap_or(true),
            options: payload
                .options
                .into_iter()
                .map(|o| OptionDraft {
                    text_ru: o.text_ru,
                    text_kg: o.text_kg,
                    is_correct: o.is_correct,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QuestionListQuery {
    pub level: Option<TestLevel>,
}

fn default_duration() -> i32 {
    DEFAULT_DURATION_MINUTES
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TestConfigPayload {
    pub level: TestLevel,
    #[serde(default = "default_duration")]
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateTestConfigPayload {
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AttemptListQuery {
    pub level: Option<TestLevel>,
    pub user_id: Option<Uuid>,
}
