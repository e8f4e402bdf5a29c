//! Forward-only answer progression for a single attempt.
//!
//! An [`AnswerSheet`] is a snapshot of an attempt and its answer slots read
//! under the attempt lock. [`AnswerSheet::submit`] decides whether a submission
//! is acceptable and what it writes, without touching storage; the caller
//! applies the returned [`Submission`] through the same lock.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::models::question::AnswerOption;
use crate::models::test_answer::TestAnswer;
use crate::models::test_attempt::{AttemptOutcome, TestAttempt};
use crate::services::scoring_service::ScoringService;

#[derive(Debug, Clone)]
pub struct AnswerSheet {
    attempt: TestAttempt,
    answers: Vec<TestAnswer>,
}

/// Writes produced by an accepted submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// The answer slot with its selection and correctness filled in.
    pub answer: TestAnswer,
    /// Present when this submission answered the last pending slot.
    pub outcome: Option<AttemptOutcome>,
}

impl AnswerSheet {
    pub fn new(attempt: TestAttempt, mut answers: Vec<TestAnswer>) -> Self {
        answers.sort_by_key(|a| a.order_index);
        Self { attempt, answers }
    }

    pub fn attempt(&self) -> &TestAttempt {
        &self.attempt
    }

    /// Slots in `order_index` order.
    pub fn answers(&self) -> &[TestAnswer] {
        &self.answers
    }

    /// Highest order index among answered slots, 0 when nothing is answered yet.
    pub fn last_answered(&self) -> i32 {
        self.answers
            .iter()
            .filter(|a| a.is_answered())
            .map(|a| a.order_index)
            .max()
            .unwrap_or(0)
    }

    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_answered()).count()
    }

    /// Order index the next accepted submission must target, if any remain.
    pub fn next_order_index(&self) -> Option<i32> {
        let next = self.last_answered() + 1;
        (next <= self.attempt.total_questions).then_some(next)
    }

    /// Validates one submission against the sheet.
    ///
    /// `option` is the selected option as found in the question bank, or `None`
    /// when no option with the submitted id exists. Checks run in a fixed order:
    /// finished attempt, question membership, sequence position, option ownership.
    pub fn submit(
        &self,
        question_id: i64,
        option: Option<&AnswerOption>,
        now: DateTime<Utc>,
    ) -> Result<Submission> {
        if self.attempt.is_finished() {
            return Err(Error::AttemptAlreadyFinished);
        }

        let slot = self
            .answers
            .iter()
            .find(|a| a.question_id == question_id)
            .ok_or(Error::InvalidQuestion)?;

        let expected = self.last_answered() + 1;
        if slot.order_index != expected {
            return Err(Error::OutOfOrder { expected });
        }

        let option = option
            .filter(|o| o.question_id == question_id)
            .ok_or(Error::InvalidOption)?;

        let answer = TestAnswer {
            selected_option_id: Some(option.id),
            is_correct: option.is_correct,
            ..slot.clone()
        };

        let outcome = if self.answered_count() + 1 == self.attempt.total_questions as usize {
            let rows: Vec<TestAnswer> = self
                .answers
                .iter()
                .map(|a| if a.id == answer.id { answer.clone() } else { a.clone() })
                .collect();
            Some(ScoringService::finalize(&self.attempt, &rows, now)?)
        } else {
            None
        };

        Ok(Submission { answer, outcome })
    }

    /// Folds an accepted submission into the snapshot.
    pub fn apply(&mut self, submission: &Submission) {
        if let Some(slot) = self.answers.iter_mut().find(|a| a.id == submission.answer.id) {
            *slot = submission.answer.clone();
        }
        if let Some(outcome) = &submission.outcome {
            self.attempt.apply_outcome(outcome);
        }
    }
}
