use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::question::TestLevel;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeLevel {
    Weak,
    Medium,
    High,
}

impl KnowledgeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeLevel::Weak => "weak",
            KnowledgeLevel::Medium => "medium",
            KnowledgeLevel::High => "high",
        }
    }
}

impl fmt::Display for KnowledgeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KnowledgeLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weak" => Ok(KnowledgeLevel::Weak),
            "medium" => Ok(KnowledgeLevel::Medium),
            "high" => Ok(KnowledgeLevel::High),
            other => Err(Error::Internal(format!("Unknown knowledge level '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestAttempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub level: TestLevel,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total_questions: i32,
    pub correct_answers: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub percent: Decimal,
    pub knowledge_level: Option<KnowledgeLevel>,
}

impl TestAttempt {
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn apply_outcome(&mut self, outcome: &AttemptOutcome) {
        self.correct_answers = outcome.correct_answers;
        self.percent = outcome.percent;
        self.knowledge_level = Some(outcome.knowledge_level);
        self.finished_at = Some(outcome.finished_at);
    }
}

/// Final results written onto an attempt when its last question is answered.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptOutcome {
    pub correct_answers: i32,
    pub percent: Decimal,
    pub knowledge_level: KnowledgeLevel,
    pub finished_at: DateTime<Utc>,
}

/// Admin listing filter.
#[derive(Debug, Clone, Default)]
pub struct AttemptFilter {
    pub level: Option<TestLevel>,
    pub user_id: Option<Uuid>,
}
