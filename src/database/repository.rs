//! Storage seams used by the services.
//!
//! Every trait here is implemented by [`PgStore`](super::postgres::PgStore) for
//! production and by [`MemoryStore`](super::memory::MemoryStore) for tests and
//! local runs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::question::{AnswerOption, Question, QuestionDraft, TestLevel};
use crate::models::test_answer::TestAnswer;
use crate::models::test_attempt::{AttemptFilter, AttemptOutcome, TestAttempt};
use crate::models::test_config::TestConfig;
use crate::models::user::{NewUser, User};
use crate::services::answer_sheet::AnswerSheet;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// Active questions for `level`, options included, in a stable retrieval order.
    async fn list_active_questions(&self, level: TestLevel) -> Result<Vec<Question>>;

    async fn find_option(&self, option_id: i64) -> Result<Option<AnswerOption>>;

    async fn list_questions(&self, level: Option<TestLevel>) -> Result<Vec<Question>>;

    async fn get_question(&self, question_id: i64) -> Result<Option<Question>>;

    async fn create_question(&self, draft: QuestionDraft) -> Result<Question>;

    /// Replaces the question's fields and its option set.
    async fn update_question(&self, question_id: i64, draft: QuestionDraft)
        -> Result<Option<Question>>;

    async fn delete_question(&self, question_id: i64) -> Result<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TestConfigStore: Send + Sync {
    async fn get_duration(&self, level: TestLevel) -> Result<Option<i32>>;

    async fn list_configs(&self) -> Result<Vec<TestConfig>>;

    async fn get_config(&self, level: TestLevel) -> Result<Option<TestConfig>>;

    async fn upsert_config(&self, level: TestLevel, duration_minutes: i32) -> Result<TestConfig>;

    async fn delete_config(&self, level: TestLevel) -> Result<bool>;
}

#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Creates the attempt and one empty answer slot per question, numbered from 1
    /// in the given order. Nothing is persisted unless every row is written.
    async fn create_attempt(
        &self,
        user_id: Uuid,
        level: TestLevel,
        question_ids: &[i64],
    ) -> Result<TestAttempt>;

    /// Opens a scoped write on one attempt owned by `user_id`, holding it
    /// exclusively until the returned guard is committed or dropped.
    /// `None` when the attempt does not exist or belongs to someone else.
    async fn lock_attempt(
        &self,
        attempt_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Box<dyn AttemptLock>>>;

    async fn get_attempt(&self, attempt_id: Uuid) -> Result<Option<TestAttempt>>;

    /// Answer slots ordered by `order_index`.
    async fn list_answers(&self, attempt_id: Uuid) -> Result<Vec<TestAnswer>>;

    /// Newest first.
    async fn list_attempts(&self, filter: AttemptFilter) -> Result<Vec<TestAttempt>>;

    async fn delete_attempt(&self, attempt_id: Uuid) -> Result<bool>;
}

/// Exclusive, transactional access to one attempt.
///
/// Writes are staged until [`AttemptLock::commit`]; dropping the guard
/// discards them and releases the attempt.
#[async_trait]
pub trait AttemptLock: Send {
    /// The attempt and its answer slots as read under the lock.
    fn sheet(&self) -> &AnswerSheet;

    async fn record_answer(&mut self, answer: &TestAnswer) -> Result<()>;

    /// Fails with `AttemptAlreadyFinished` if the attempt was finalized already.
    async fn finish(&mut self, outcome: &AttemptOutcome) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fails with `Conflict` when the phone or email is already registered.
    async fn create_user(&self, user: NewUser) -> Result<User>;

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>>;

    /// Case-insensitive.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>>;

    async fn list_users(&self) -> Result<Vec<User>>;
}
