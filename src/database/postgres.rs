use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::repository::{AttemptLock, AttemptRepository, QuestionBank, TestConfigStore, UserDirectory};
use crate::error::{Error, Result};
use crate::models::question::{AnswerOption, Question, QuestionDraft, TestLevel};
use crate::models::test_answer::TestAnswer;
use crate::models::test_attempt::{AttemptFilter, AttemptOutcome, KnowledgeLevel, TestAttempt};
use crate::models::test_config::TestConfig;
use crate::models::user::{NewUser, User};
use crate::services::answer_sheet::AnswerSheet;

const ATTEMPT_COLUMNS: &str = "id, user_id, level, started_at, finished_at, total_questions, \
     correct_answers, percent, knowledge_level";
const ANSWER_COLUMNS: &str =
    "id, attempt_id, question_id, selected_option_id, text_answer, is_correct, order_index";
const USER_COLUMNS: &str =
    "id, first_name, phone, age, email, user_type, is_staff, password_hash, created_at";

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// How long `lock_attempt` waits for the row lock before failing with 55P03.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    async fn attach_options(&self, rows: Vec<QuestionRow>) -> Result<Vec<Question>> {
        let ids: Vec<i64> = rows.iter().map(|q| q.id).collect();
        let options = sqlx::query_as::<_, OptionRow>(
            r#"SELECT id, question_id, text_ru, text_kg, is_correct
               FROM answer_options WHERE question_id = ANY($1) ORDER BY id"#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_question: HashMap<i64, Vec<AnswerOption>> = HashMap::new();
        for option in options {
            by_question
                .entry(option.question_id)
                .or_default()
                .push(option.into());
        }

        rows.into_iter()
            .map(|row| {
                let options = by_question.remove(&row.id).unwrap_or_default();
                row.into_question(options)
            })
            .collect()
    }

    async fn insert_options(
        tx: &mut Transaction<'static, Postgres>,
        question_id: i64,
        draft: &QuestionDraft,
    ) -> Result<()> {
        for option in &draft.options {
            sqlx::query(
                r#"INSERT INTO answer_options (question_id, text_ru, text_kg, is_correct)
                   VALUES ($1, $2, $3, $4)"#,
            )
            .bind(question_id)
            .bind(&option.text_ru)
            .bind(&option.text_kg)
            .bind(option.is_correct)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    level: String,
    text_ru: String,
    text_kg: String,
    image: Option<String>,
    is_active: bool,
}

impl QuestionRow {
    fn into_question(self, options: Vec<AnswerOption>) -> Result<Question> {
        Ok(Question {
            id: self.id,
            level: parse_level(&self.level)?,
            text_ru: self.text_ru,
            text_kg: self.text_kg,
            image: self.image,
            is_active: self.is_active,
            options,
        })
    }
}

#[derive(FromRow)]
struct OptionRow {
    id: i64,
    question_id: i64,
    text_ru: String,
    text_kg: String,
    is_correct: bool,
}

impl From<OptionRow> for AnswerOption {
    fn from(row: OptionRow) -> Self {
        AnswerOption {
            id: row.id,
            question_id: row.question_id,
            text_ru: row.text_ru,
            text_kg: row.text_kg,
            is_correct: row.is_correct,
        }
    }
}

#[derive(FromRow)]
struct ConfigRow {
    id: i64,
    level: String,
    duration_minutes: i32,
}

impl TryFrom<ConfigRow> for TestConfig {
    type Error = Error;

    fn try_from(row: ConfigRow) -> Result<Self> {
        Ok(TestConfig {
            id: row.id,
            level: parse_level(&row.level)?,
            duration_minutes: row.duration_minutes,
        })
    }
}

#[derive(FromRow)]
struct AttemptRow {
    id: Uuid,
    user_id: Uuid,
    level: String,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    total_questions: i32,
    correct_answers: i32,
    percent: Decimal,
    knowledge_level: Option<String>,
}

impl TryFrom<AttemptRow> for TestAttempt {
    type Error = Error;

    fn try_from(row: AttemptRow) -> Result<Self> {
        Ok(TestAttempt {
            id: row.id,
            user_id: row.user_id,
            level: parse_level(&row.level)?,
            started_at: row.started_at,
            finished_at: row.finished_at,
            total_questions: row.total_questions,
            correct_answers: row.correct_answers,
            percent: row.percent,
            knowledge_level: row
                .knowledge_level
                .as_deref()
                .map(str::parse::<KnowledgeLevel>)
                .transpose()?,
        })
    }
}

#[derive(FromRow)]
struct AnswerRow {
    id: i64,
    attempt_id: Uuid,
    question_id: i64,
    selected_option_id: Option<i64>,
    text_answer: Option<String>,
    is_correct: bool,
    order_index: i32,
}

impl From<AnswerRow> for TestAnswer {
    fn from(row: AnswerRow) -> Self {
        TestAnswer {
            id: row.id,
            attempt_id: row.attempt_id,
            question_id: row.question_id,
            selected_option_id: row.selected_option_id,
            text_answer: row.text_answer,
            is_correct: row.is_correct,
            order_index: row.order_index,
        }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    first_name: String,
    phone: String,
    age: Option<i32>,
    email: Option<String>,
    user_type: String,
    is_staff: bool,
    password_hash: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            first_name: row.first_name,
            phone: row.phone,
            age: row.age,
            email: row.email,
            user_type: row.user_type.parse()?,
            is_staff: row.is_staff,
            password_hash: row.password_hash,
            created_at: row.created_at,
        })
    }
}

fn parse_level(raw: &str) -> Result<TestLevel> {
    raw.parse()
        .map_err(|_| Error::Internal(format!("Unknown level '{}' in storage", raw)))
}

#[async_trait]
impl QuestionBank for PgStore {
    async fn list_active_questions(&self, level: TestLevel) -> Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"SELECT id, level, text_ru, text_kg, image, is_active
               FROM questions WHERE level = $1 AND is_active = TRUE
               ORDER BY created_at, id"#,
        )
        .bind(level.as_str())
        .fetch_all(&self.pool)
        .await?;
        self.attach_options(rows).await
    }

    async fn find_option(&self, option_id: i64) -> Result<Option<AnswerOption>> {
        let row = sqlx::query_as::<_, OptionRow>(
            r#"SELECT id, question_id, text_ru, text_kg, is_correct
               FROM answer_options WHERE id = $1"#,
        )
        .bind(option_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(AnswerOption::from))
    }

    async fn list_questions(&self, level: Option<TestLevel>) -> Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"SELECT id, level, text_ru, text_kg, image, is_active
               FROM questions WHERE ($1::text IS NULL OR level = $1)
               ORDER BY created_at, id"#,
        )
        .bind(level.map(|l| l.as_str()))
        .fetch_all(&self.pool)
        .await?;
        self.attach_options(rows).await
    }

    async fn get_question(&self, question_id: i64) -> Result<Option<Question>> {
        let row = sqlx::query_as::<_, QuestionRow>(
            r#"SELECT id, level, text_ru, text_kg, image, is_active
               FROM questions WHERE id = $1"#,
        )
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(self.attach_options(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn create_question(&self, draft: QuestionDraft) -> Result<Question> {
        let mut tx = self.pool.begin().await?;
        let question_id: i64 = sqlx::query_scalar(
            r#"INSERT INTO questions (level, text_ru, text_kg, image, is_active)
               VALUES ($1, $2, $3, $4, $5) RETURNING id"#,
        )
        .bind(draft.level.as_str())
        .bind(&draft.text_ru)
        .bind(&draft.text_kg)
        .bind(&draft.image)
        .bind(draft.is_active)
        .fetch_one(&mut *tx)
        .await?;
        Self::insert_options(&mut tx, question_id, &draft).await?;
        tx.commit().await?;

        self.get_question(question_id)
            .await?
            .ok_or_else(|| Error::Internal("Created question vanished".to_string()))
    }

    async fn update_question(
        &self,
        question_id: i64,
        draft: QuestionDraft,
    ) -> Result<Option<Question>> {
        let mut tx = self.pool.begin().await?;

        // FOR UPDATE also blocks the foreign-key check of new answer slots until commit.
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT id FROM questions WHERE id = $1 FOR UPDATE")
                .bind(question_id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Ok(None);
        }

        // Slots of in-progress attempts hold the current option ids.
        let referenced: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM test_answers WHERE question_id = $1)",
        )
        .bind(question_id)
        .fetch_one(&mut *tx)
        .await?;
        if referenced {
            return Err(Error::Conflict(
                "The record is referenced by recorded answers".to_string(),
            ));
        }

        let updated = sqlx::query(
            r#"UPDATE questions
               SET level = $2, text_ru = $3, text_kg = $4, image = $5, is_active = $6
               WHERE id = $1"#,
        )
        .bind(question_id)
        .bind(draft.level.as_str())
        .bind(&draft.text_ru)
        .bind(&draft.text_kg)
        .bind(&draft.image)
        .bind(draft.is_active)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        sqlx::query("DELETE FROM answer_options WHERE question_id = $1")
            .bind(question_id)
            .execute(&mut *tx)
            .await?;
        Self::insert_options(&mut tx, question_id, &draft).await?;
        tx.commit().await?;

        self.get_question(question_id).await
    }

    async fn delete_question(&self, question_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(question_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TestConfigStore for PgStore {
    async fn get_duration(&self, level: TestLevel) -> Result<Option<i32>> {
        let duration = sqlx::query_scalar::<_, i32>(
            "SELECT duration_minutes FROM test_configs WHERE level = $1",
        )
        .bind(level.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(duration)
    }

    async fn list_configs(&self) -> Result<Vec<TestConfig>> {
        sqlx::query_as::<_, ConfigRow>(
            "SELECT id, level, duration_minutes FROM test_configs ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(TestConfig::try_from)
        .collect()
    }

    async fn get_config(&self, level: TestLevel) -> Result<Option<TestConfig>> {
        sqlx::query_as::<_, ConfigRow>(
            "SELECT id, level, duration_minutes FROM test_configs WHERE level = $1",
        )
        .bind(level.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(TestConfig::try_from)
        .transpose()
    }

    async fn upsert_config(&self, level: TestLevel, duration_minutes: i32) -> Result<TestConfig> {
        let row = sqlx::query_as::<_, ConfigRow>(
            r#"INSERT INTO test_configs (level, duration_minutes) VALUES ($1, $2)
               ON CONFLICT (level) DO UPDATE SET duration_minutes = EXCLUDED.duration_minutes
               RETURNING id, level, duration_minutes"#,
        )
        .bind(level.as_str())
        .bind(duration_minutes)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn delete_config(&self, level: TestLevel) -> Result<bool> {
        let result = sqlx::query("DELETE FROM test_configs WHERE level = $1")
            .bind(level.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AttemptRepository for PgStore {
    async fn create_attempt(
        &self,
        user_id: Uuid,
        level: TestLevel,
        question_ids: &[i64],
    ) -> Result<TestAttempt> {
        let order: Vec<i32> = (1..=question_ids.len() as i32).collect();

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            r#"INSERT INTO test_attempts (id, user_id, level, total_questions)
               VALUES ($1, $2, $3, $4)
               RETURNING {}"#,
            ATTEMPT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(level.as_str())
        .bind(question_ids.len() as i32)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"INSERT INTO test_answers (attempt_id, question_id, order_index)
               SELECT $1, q.question_id, q.order_index
               FROM UNNEST($2::bigint[], $3::int[]) AS q(question_id, order_index)"#,
        )
        .bind(row.id)
        .bind(question_ids)
        .bind(&order)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn lock_attempt(
        &self,
        attempt_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Box<dyn AttemptLock>>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&lock_timeout_statement(self.lock_timeout))
            .execute(&mut *tx)
            .await?;
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {} FROM test_attempts WHERE id = $1 AND user_id = $2 FOR UPDATE",
            ATTEMPT_COLUMNS
        ))
        .bind(attempt_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let answers = sqlx::query_as::<_, AnswerRow>(&format!(
            "SELECT {} FROM test_answers WHERE attempt_id = $1 ORDER BY order_index",
            ANSWER_COLUMNS
        ))
        .bind(attempt_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(TestAnswer::from)
        .collect();

        let sheet = AnswerSheet::new(row.try_into()?, answers);
        Ok(Some(Box::new(PgAttemptLock { tx, sheet })))
    }

    async fn get_attempt(&self, attempt_id: Uuid) -> Result<Option<TestAttempt>> {
        sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {} FROM test_attempts WHERE id = $1",
            ATTEMPT_COLUMNS
        ))
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?
        .map(TestAttempt::try_from)
        .transpose()
    }

    async fn list_answers(&self, attempt_id: Uuid) -> Result<Vec<TestAnswer>> {
        let rows = sqlx::query_as::<_, AnswerRow>(&format!(
            "SELECT {} FROM test_answers WHERE attempt_id = $1 ORDER BY order_index",
            ANSWER_COLUMNS
        ))
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(TestAnswer::from).collect())
    }

    async fn list_attempts(&self, filter: AttemptFilter) -> Result<Vec<TestAttempt>> {
        sqlx::query_as::<_, AttemptRow>(&format!(
            r#"SELECT {} FROM test_attempts
               WHERE ($1::text IS NULL OR level = $1)
                 AND ($2::uuid IS NULL OR user_id = $2)
               ORDER BY started_at DESC"#,
            ATTEMPT_COLUMNS
        ))
        .bind(filter.level.map(|l| l.as_str()))
        .bind(filter.user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(TestAttempt::try_from)
        .collect()
    }

    async fn delete_attempt(&self, attempt_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM test_attempts WHERE id = $1")
            .bind(attempt_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Holds the attempt row lock (`SELECT ... FOR UPDATE`) for the life of the transaction.
struct PgAttemptLock {
    tx: Transaction<'static, Postgres>,
    sheet: AnswerSheet,
}

#[async_trait]
impl AttemptLock for PgAttemptLock {
    fn sheet(&self) -> &AnswerSheet {
        &self.sheet
    }

    async fn record_answer(&mut self, answer: &TestAnswer) -> Result<()> {
        sqlx::query(
            r#"UPDATE test_answers
               SET selected_option_id = $2, text_answer = $3, is_correct = $4
               WHERE id = $1"#,
        )
        .bind(answer.id)
        .bind(answer.selected_option_id)
        .bind(&answer.text_answer)
        .bind(answer.is_correct)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn finish(&mut self, outcome: &AttemptOutcome) -> Result<()> {
        let result = sqlx::query(
            r#"UPDATE test_attempts
               SET correct_answers = $2, percent = $3, knowledge_level = $4, finished_at = $5
               WHERE id = $1 AND finished_at IS NULL"#,
        )
        .bind(self.sheet.attempt().id)
        .bind(outcome.correct_answers)
        .bind(outcome.percent)
        .bind(outcome.knowledge_level.as_str())
        .bind(outcome.finished_at)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::AttemptAlreadyFinished);
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"INSERT INTO users (id, first_name, phone, age, email, user_type, is_staff, password_hash)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING {}"#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&user.first_name)
        .bind(&user.phone)
        .bind(user.age)
        .bind(&user.email)
        .bind(user.user_type.as_str())
        .bind(user.is_staff)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE phone = $1",
            USER_COLUMNS
        ))
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY created_at",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect()
    }
}

/// `SET` takes no bind parameters, so the value is formatted in.
fn lock_timeout_statement(timeout: Duration) -> String {
    format!("SET LOCAL lock_timeout = '{}ms'", timeout.as_millis().max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_timeout_is_scoped_to_the_transaction() {
        assert_eq!(
            lock_timeout_statement(Duration::from_millis(2500)),
            "SET LOCAL lock_timeout = '2500ms'"
        );
    }

    #[test]
    fn zero_lock_timeout_still_bounds_the_wait() {
        // 0 would mean "wait forever" to Postgres.
        assert_eq!(
            lock_timeout_statement(Duration::ZERO),
            "SET LOCAL lock_timeout = '1ms'"
        );
    }
}
