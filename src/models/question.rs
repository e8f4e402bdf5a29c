use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Difficulty level; selects the question pool and the configured duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestLevel {
    Easy,
    Medium,
    Hard,
}

impl TestLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestLevel::Easy => "easy",
            TestLevel::Medium => "medium",
            TestLevel::Hard => "hard",
        }
    }
}

impl fmt::Display for TestLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(TestLevel::Easy),
            "medium" => Ok(TestLevel::Medium),
            "hard" => Ok(TestLevel::Hard),
            other => Err(Error::BadRequest(format!(
                "Unknown level '{}', expected one of easy, medium, hard",
                other
            ))),
        }
    }
}

/// Display language for question text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    Ru,
    Kg,
}

impl Language {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "ru" => Some(Language::Ru),
            "kg" => Some(Language::Kg),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub level: TestLevel,
    pub text_ru: String,
    pub text_kg: String,
    pub image: Option<String>,
    pub is_active: bool,
    pub options: Vec<AnswerOption>,
}

impl Question {
    pub fn text(&self, language: Language) -> &str {
        match language {
            Language::Ru => &self.text_ru,
            Language::Kg => &self.text_kg,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: i64,
    pub question_id: i64,
    pub text_ru: String,
    pub text_kg: String,
    pub is_correct: bool,
}

impl AnswerOption {
    pub fn text(&self, language: Language) -> &str {
        match language {
            Language::Ru => &self.text_ru,
            Language::Kg => &self.text_kg,
        }
    }
}

/// Question contents as written by an administrator; ids are assigned by the store.
#[derive(Debug, Clone)]
pub struct QuestionDraft {
    pub level: TestLevel,
    pub text_ru: String,
    pub text_kg: String,
    pub image: Option<String>,
    pub is_active: bool,
    pub options: Vec<OptionDraft>,
}

#[derive(Debug, Clone)]
pub struct OptionDraft {
    pub text_ru: String,
    pub text_kg: String,
    pub is_correct: bool,
}
