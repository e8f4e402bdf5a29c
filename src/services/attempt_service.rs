use crate::database::repository::{AttemptRepository, QuestionBank, TestConfigStore};
use crate::dto::test_dto::{
    AnswerView, AttemptDetail, AttemptResult, QuestionForAttempt, StartTestResponse,
    SubmitAnswerRequest, SubmitAnswerResponse,
};
use crate::error::{Error, Result};
use crate::models::question::{AnswerOption, Language, TestLevel};
use crate::models::test_attempt::{AttemptFilter, TestAttempt};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// How many times a submission is tried when storage reports contention.
const SUBMIT_ATTEMPTS: usize = 2;

#[derive(Clone)]
pub struct AttemptService {
    questions: Arc<dyn QuestionBank>,
    configs: Arc<dyn TestConfigStore>,
    attempts: Arc<dyn AttemptRepository>,
}

impl AttemptService {
    pub fn new(
        questions: Arc<dyn QuestionBank>,
        configs: Arc<dyn TestConfigStore>,
        attempts: Arc<dyn AttemptRepository>,
    ) -> Self {
        Self {
            questions,
            configs,
            attempts,
        }
    }

    /// Fixes the question sequence for a new attempt and returns it translated.
    pub async fn start_attempt(
        &self,
        user_id: Uuid,
        level: TestLevel,
        language: Language,
    ) -> Result<StartTestResponse> {
        let questions = self.questions.list_active_questions(level).await?;
        if questions.is_empty() {
            tracing::info!(%user_id, %level, "no active questions, attempt not created");
            return Err(Error::NoQuestionsAvailable);
        }

        let duration_minutes = self.configs.get_duration(level).await?;

        let question_ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
        let attempt = self
            .attempts
            .create_attempt(user_id, level, &question_ids)
            .await
            .map_err(Error::into_storage_failure)?;

        tracing::info!(
            attempt_id = %attempt.id,
            %user_id,
            %level,
            total_questions = attempt.total_questions,
            "test attempt started"
        );

        Ok(StartTestResponse {
            attempt_id: attempt.id,
            level: attempt.level,
            duration_minutes,
            questions: questions
                .iter()
                .zip(1..)
                .map(|(q, order_index)| QuestionForAttempt::translate(q, order_index, language))
                .collect(),
        })
    }

    /// Records one answer, finishing the attempt when it was the last one.
    ///
    /// Retries once when the attempt lock could not be taken because of
    /// contention; a second failure is reported as `StorageFailure`.
    pub async fn submit_answer(
        &self,
        user_id: Uuid,
        req: SubmitAnswerRequest,
    ) -> Result<SubmitAnswerResponse> {
        let option = self
            .questions
            .find_option(req.selected_option_id)
            .await
            .map_err(Error::into_storage_failure)?;

        let mut tries = 0;
        loop {
            tries += 1;
            match self.try_submit(user_id, &req, option.as_ref()).await {
                Err(err) if err.is_transient() && tries < SUBMIT_ATTEMPTS => {
                    tracing::warn!(
                        attempt_id = %req.attempt_id,
                        error = %err,
                        "contention on answer submission, retrying"
                    );
                }
                Err(err) => return Err(err.into_storage_failure()),
                Ok(resp) => return Ok(resp),
            }
        }
    }

    async fn try_submit(
        &self,
        user_id: Uuid,
        req: &SubmitAnswerRequest,
        option: Option<&AnswerOption>,
    ) -> Result<SubmitAnswerResponse> {
        let mut lock = self
            .attempts
            .lock_attempt(req.attempt_id, user_id)
            .await?
            .ok_or_else(|| Error::NotFound("Attempt not found".to_string()))?;

        let submission = lock.sheet().submit(req.question_id, option, Utc::now())?;
        let mut attempt = lock.sheet().attempt().clone();

        lock.record_answer(&submission.answer).await?;
        if let Some(outcome) = &submission.outcome {
            lock.finish(outcome).await?;
        }
        lock.commit().await?;

        tracing::info!(
            attempt_id = %attempt.id,
            question_id = req.question_id,
            order_index = submission.answer.order_index,
            is_correct = submission.answer.is_correct,
            "answer recorded"
        );

        let result = match &submission.outcome {
            Some(outcome) => {
                attempt.apply_outcome(outcome);
                tracing::info!(
                    attempt_id = %attempt.id,
                    correct_answers = outcome.correct_answers,
                    percent = %outcome.percent,
                    knowledge_level = %outcome.knowledge_level,
                    "test attempt finished"
                );
                AttemptResult::from_attempt(&attempt)
            }
            None => None,
        };

        Ok(SubmitAnswerResponse {
            accepted: true,
            attempt_finished: attempt.is_finished(),
            result,
        })
    }

    /// The caller's attempts, newest first.
    pub async fn history(&self, user_id: Uuid) -> Result<Vec<TestAttempt>> {
        self.attempts
            .list_attempts(AttemptFilter {
                user_id: Some(user_id),
                ..Default::default()
            })
            .await
    }

    /// Attempt detail for its owner; anyone else gets `NotFound`.
    pub async fn attempt_detail(&self, user_id: Uuid, attempt_id: Uuid) -> Result<AttemptDetail> {
        let detail = self.get_attempt_detail(attempt_id).await?;
        if detail.attempt.user_id != user_id {
            return Err(Error::NotFound("Attempt not found".to_string()));
        }
        Ok(detail)
    }

    pub async fn get_attempt_detail(&self, attempt_id: Uuid) -> Result<AttemptDetail> {
        let attempt = self
            .attempts
            .get_attempt(attempt_id)
            .await?
            .ok_or_else(|| Error::NotFound("Attempt not found".to_string()))?;
        let answers = self.attempts.list_answers(attempt_id).await?;
        Ok(AttemptDetail {
            attempt,
            answers: answers.iter().map(AnswerView::from).collect(),
        })
    }

    pub async fn list_attempts(&self, filter: AttemptFilter) -> Result<Vec<TestAttempt>> {
        self.attempts.list_attempts(filter).await
    }

    pub async fn delete_attempt(&self, attempt_id: Uuid) -> Result<()> {
        if !self.attempts.delete_attempt(attempt_id).await? {
            return Err(Error::NotFound("Attempt not found".to_string()));
        }
        tracing::info!(%attempt_id, "test attempt deleted by administrator");
        Ok(())
    }
}
