use crate::error::{Error, Result};
use crate::models::test_answer::TestAnswer;
use crate::models::test_attempt::{AttemptOutcome, KnowledgeLevel, TestAttempt};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

/// Upper bound (inclusive) of the `weak` bracket.
const WEAK_MAX_PERCENT: i64 = 40;
/// Upper bound (inclusive) of the `medium` bracket.
const MEDIUM_MAX_PERCENT: i64 = 70;

pub struct ScoringService;

impl ScoringService {
    /// Percent of correct answers rounded to two decimals; 0 when there are no questions.
    pub fn percent(correct: i32, total: i32) -> Decimal {
        if total <= 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(correct) * Decimal::ONE_HUNDRED / Decimal::from(total))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    pub fn classify(percent: Decimal) -> KnowledgeLevel {
        if percent <= Decimal::from(WEAK_MAX_PERCENT) {
            KnowledgeLevel::Weak
        } else if percent <= Decimal::from(MEDIUM_MAX_PERCENT) {
            KnowledgeLevel::Medium
        } else {
            KnowledgeLevel::High
        }
    }

    /// Computes the final results for a fully answered attempt.
    ///
    /// Refuses an attempt that already carries a `finished_at`, so a result is
    /// never computed twice.
    pub fn finalize(
        attempt: &TestAttempt,
        answers: &[TestAnswer],
        finished_at: DateTime<Utc>,
    ) -> Result<AttemptOutcome> {
        if attempt.is_finished() {
            return Err(Error::AttemptAlreadyFinished);
        }

        let correct_answers = answers.iter().filter(|a| a.is_correct).count() as i32;
        let percent = Self::percent(correct_answers, attempt.total_questions);

        Ok(AttemptOutcome {
            correct_answers,
            percent,
            knowledge_level: Self::classify(percent),
            finished_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::TestLevel;
    use uuid::Uuid;

    fn pct(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn attempt(total: i32) -> TestAttempt {
        TestAttempt {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            level: TestLevel::Easy,
            started_at: Utc::now(),
            finished_at: None,
            total_questions: total,
            correct_answers: 0,
            percent: Decimal::ZERO,
            knowledge_level: None,
        }
    }

    fn answers(attempt_id: Uuid, correctness: &[bool]) -> Vec<TestAnswer> {
        correctness
            .iter()
            .enumerate()
            .map(|(i, &ok)| TestAnswer {
                id: i as i64 + 1,
                attempt_id,
                question_id: i as i64 + 100,
                selected_option_id: Some(i as i64 + 1000),
                text_answer: None,
                is_correct: ok,
                order_index: i as i32 + 1,
            })
            .collect()
    }

    #[test]
    fn percent_is_rounded_to_two_decimals() {
        assert_eq!(ScoringService::percent(2, 3), pct("66.67"));
        assert_eq!(ScoringService::percent(1, 3), pct("33.33"));
        assert_eq!(ScoringService::percent(3, 3), pct("100"));
        // 1 of 32 = 3.125%
        assert_eq!(ScoringService::percent(1, 32), pct("3.13"));
    }

    #[test]
    fn zero_questions_scores_zero() {
        assert_eq!(ScoringService::percent(0, 0), Decimal::ZERO);
        assert_eq!(ScoringService::classify(Decimal::ZERO), KnowledgeLevel::Weak);
    }

    #[test]
    fn boundaries_belong_to_the_lower_bracket() {
        assert_eq!(ScoringService::classify(pct("40")), KnowledgeLevel::Weak);
        assert_eq!(ScoringService::classify(pct("40.01")), KnowledgeLevel::Medium);
        assert_eq!(ScoringService::classify(pct("70")), KnowledgeLevel::Medium);
        assert_eq!(ScoringService::classify(pct("70.01")), KnowledgeLevel::High);
        assert_eq!(ScoringService::classify(pct("100")), KnowledgeLevel::High);
    }

    #[test]
    fn fractional_percent_between_forty_and_forty_one_is_medium() {
        // 9 of 22 = 40.909...%
        let percent = ScoringService::percent(9, 22);
        assert_eq!(percent, pct("40.91"));
        assert_eq!(ScoringService::classify(percent), KnowledgeLevel::Medium);
    }

    #[test]
    fn finalize_counts_correct_rows() {
        let a = attempt(3);
        let rows = answers(a.id, &[true, true, false]);
        let outcome = ScoringService::finalize(&a, &rows, Utc::now()).unwrap();
        assert_eq!(outcome.correct_answers, 2);
        assert_eq!(outcome.percent, pct("66.67"));
        assert_eq!(outcome.knowledge_level, KnowledgeLevel::Medium);
    }

    #[test]
    fn finalize_rejects_finished_attempt() {
        let mut a = attempt(1);
        a.finished_at = Some(Utc::now());
        let rows = answers(a.id, &[true]);
        let err = ScoringService::finalize(&a, &rows, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::AttemptAlreadyFinished));
    }
}
