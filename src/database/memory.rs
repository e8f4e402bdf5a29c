//! In-process store used by tests and local runs without Postgres.
//!
//! Tables live behind one `std::sync::Mutex` that is never held across an
//! `.await`. Answer submission is serialised per attempt with a
//! `tokio::sync::Mutex`, mirroring the row lock taken by the Postgres store.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use super::repository::{AttemptLock, AttemptRepository, QuestionBank, TestConfigStore, UserDirectory};
use crate::error::{Error, Result};
use crate::models::question::{AnswerOption, Question, QuestionDraft, TestLevel};
use crate::models::test_answer::TestAnswer;
use crate::models::test_attempt::{AttemptFilter, AttemptOutcome, TestAttempt};
use crate::models::test_config::TestConfig;
use crate::models::user::{NewUser, User};
use crate::services::answer_sheet::AnswerSheet;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    questions: Vec<Question>,
    configs: BTreeMap<TestLevel, TestConfig>,
    attempts: Vec<TestAttempt>,
    answers: Vec<TestAnswer>,
    next_question_id: i64,
    next_option_id: i64,
    next_config_id: i64,
    next_answer_id: i64,
}

impl Tables {
    fn next_question_id(&mut self) -> i64 {
        self.next_question_id += 1;
        self.next_question_id
    }

    fn next_option_id(&mut self) -> i64 {
        self.next_option_id += 1;
        self.next_option_id
    }

    fn build_question(&mut self, id: i64, draft: QuestionDraft) -> Question {
        let options = draft
            .options
            .into_iter()
            .map(|o| AnswerOption {
                id: self.next_option_id(),
                question_id: id,
                text_ru: o.text_ru,
                text_kg: o.text_kg,
                is_correct: o.is_correct,
            })
            .collect();
        Question {
            id,
            level: draft.level,
            text_ru: draft.text_ru,
            text_kg: draft.text_kg,
            image: draft.image,
            is_active: draft.is_active,
            options,
        }
    }

    fn question_is_referenced(&self, question_id: i64) -> bool {
        self.answers.iter().any(|a| a.question_id == question_id)
    }
}

#[derive(Default)]
struct Faults {
    contention: AtomicU32,
    fail_writes: AtomicBool,
}

impl Faults {
    fn check_contention(&self) -> Result<()> {
        let remaining = self.contention.load(Ordering::SeqCst);
        if remaining > 0 {
            self.contention.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Contention("attempt row is locked".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::StorageFailure("write rejected".to_string()));
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    attempt_locks: Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>,
    faults: Arc<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `times` attempt locks fail with a transient contention error.
    pub fn inject_contention(&self, times: u32) {
        self.faults.contention.store(times, Ordering::SeqCst);
    }

    /// While set, attempt creation and commits fail with `StorageFailure`.
    pub fn fail_writes(&self, fail: bool) {
        self.faults.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn attempt_locks(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<AsyncMutex<()>>>> {
        self.attempt_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// `None` for unknown attempts, so the lock map only tracks stored attempts.
    /// Always takes `tables` before `attempt_locks`.
    fn attempt_mutex(&self, attempt_id: Uuid) -> Option<Arc<AsyncMutex<()>>> {
        let tables = self.tables();
        if !tables.attempts.iter().any(|a| a.id == attempt_id) {
            return None;
        }
        let mutex = self.attempt_locks().entry(attempt_id).or_default().clone();
        Some(mutex)
    }
}

#[async_trait]
impl QuestionBank for MemoryStore {
    async fn list_active_questions(&self, level: TestLevel) -> Result<Vec<Question>> {
        Ok(self
            .tables()
            .questions
            .iter()
            .filter(|q| q.level == level && q.is_active)
            .cloned()
            .collect())
    }

    async fn find_option(&self, option_id: i64) -> Result<Option<AnswerOption>> {
        Ok(self
            .tables()
            .questions
            .iter()
            .flat_map(|q| q.options.iter())
            .find(|o| o.id == option_id)
            .cloned())
    }

    async fn list_questions(&self, level: Option<TestLevel>) -> Result<Vec<Question>> {
        Ok(self
            .tables()
            .questions
            .iter()
            .filter(|q| level.map_or(true, |l| q.level == l))
            .cloned()
            .collect())
    }

    async fn get_question(&self, question_id: i64) -> Result<Option<Question>> {
        Ok(self
            .tables()
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .cloned())
    }

    async fn create_question(&self, draft: QuestionDraft) -> Result<Question> {
        let mut tables = self.tables();
        let id = tables.next_question_id();
        let question = tables.build_question(id, draft);
        tables.questions.push(question.clone());
        Ok(question)
    }

    async fn update_question(
        &self,
        question_id: i64,
        draft: QuestionDraft,
    ) -> Result<Option<Question>> {
        let mut tables = self.tables();
        let Some(pos) = tables.questions.iter().position(|q| q.id == question_id) else {
            return Ok(None);
        };
        // Slots of in-progress attempts hold the current option ids.
        if tables.question_is_referenced(question_id) {
            return Err(Error::Conflict(
                "The record is referenced by recorded answers".to_string(),
            ));
        }
        let question = tables.build_question(question_id, draft);
        tables.questions[pos] = question.clone();
        Ok(Some(question))
    }

    async fn delete_question(&self, question_id: i64) -> Result<bool> {
        let mut tables = self.tables();
        if tables.question_is_referenced(question_id) {
            return Err(Error::Conflict(
                "The record is referenced by recorded answers".to_string(),
            ));
        }
        let before = tables.questions.len();
        tables.questions.retain(|q| q.id != question_id);
        Ok(tables.questions.len() != before)
    }
}

#[async_trait]
impl TestConfigStore for MemoryStore {
    async fn get_duration(&self, level: TestLevel) -> Result<Option<i32>> {
        Ok(self.tables().configs.get(&level).map(|c| c.duration_minutes))
    }

    async fn list_configs(&self) -> Result<Vec<TestConfig>> {
        Ok(self.tables().configs.values().cloned().collect())
    }

    async fn get_config(&self, level: TestLevel) -> Result<Option<TestConfig>> {
        Ok(self.tables().configs.get(&level).cloned())
    }

    async fn upsert_config(&self, level: TestLevel, duration_minutes: i32) -> Result<TestConfig> {
        let mut tables = self.tables();
        if let Some(existing) = tables.configs.get_mut(&level) {
            existing.duration_minutes = duration_minutes;
            return Ok(existing.clone());
        }
        tables.next_config_id += 1;
        let config = TestConfig {
            id: tables.next_config_id,
            level,
            duration_minutes,
        };
        tables.configs.insert(level, config.clone());
        Ok(config)
    }

    async fn delete_config(&self, level: TestLevel) -> Result<bool> {
        Ok(self.tables().configs.remove(&level).is_some())
    }
}

#[async_trait]
impl AttemptRepository for MemoryStore {
    async fn create_attempt(
        &self,
        user_id: Uuid,
        level: TestLevel,
        question_ids: &[i64],
    ) -> Result<TestAttempt> {
        self.faults.check_write()?;

        let mut tables = self.tables();
        let attempt = TestAttempt {
            id: Uuid::new_v4(),
            user_id,
            level,
            started_at: Utc::now(),
            finished_at: None,
            total_questions: question_ids.len() as i32,
            correct_answers: 0,
            percent: Decimal::ZERO,
            knowledge_level: None,
        };

        let mut slots = Vec::with_capacity(question_ids.len());
        for (idx, question_id) in question_ids.iter().enumerate() {
            tables.next_answer_id += 1;
            slots.push(TestAnswer {
                id: tables.next_answer_id,
                attempt_id: attempt.id,
                question_id: *question_id,
                selected_option_id: None,
                text_answer: None,
                is_correct: false,
                order_index: idx as i32 + 1,
            });
        }

        tables.attempts.push(attempt.clone());
        tables.answers.extend(slots);
        Ok(attempt)
    }

    async fn lock_attempt(
        &self,
        attempt_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Box<dyn AttemptLock>>> {
        self.faults.check_contention()?;

        let Some(mutex) = self.attempt_mutex(attempt_id) else {
            return Ok(None);
        };
        let guard = mutex.lock_owned().await;

        let sheet = {
            let tables = self.tables();
            let Some(attempt) = tables
                .attempts
                .iter()
                .find(|a| a.id == attempt_id && a.user_id == user_id)
                .cloned()
            else {
                return Ok(None);
            };
            let answers = tables
                .answers
                .iter()
                .filter(|a| a.attempt_id == attempt_id)
                .cloned()
                .collect();
            AnswerSheet::new(attempt, answers)
        };

        Ok(Some(Box::new(MemoryAttemptLock {
            _guard: guard,
            store: self.clone(),
            sheet,
            staged_answers: Vec::new(),
            staged_outcome: None,
        })))
    }

    async fn get_attempt(&self, attempt_id: Uuid) -> Result<Option<TestAttempt>> {
        Ok(self
            .tables()
            .attempts
            .iter()
            .find(|a| a.id == attempt_id)
            .cloned())
    }

    async fn list_answers(&self, attempt_id: Uuid) -> Result<Vec<TestAnswer>> {
        let mut answers: Vec<TestAnswer> = self
            .tables()
            .answers
            .iter()
            .filter(|a| a.attempt_id == attempt_id)
            .cloned()
            .collect();
        answers.sort_by_key(|a| a.order_index);
        Ok(answers)
    }

    async fn list_attempts(&self, filter: AttemptFilter) -> Result<Vec<TestAttempt>> {
        let mut attempts: Vec<TestAttempt> = self
            .tables()
            .attempts
            .iter()
            .filter(|a| filter.level.map_or(true, |l| a.level == l))
            .filter(|a| filter.user_id.map_or(true, |u| a.user_id == u))
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(attempts)
    }

    async fn delete_attempt(&self, attempt_id: Uuid) -> Result<bool> {
        let mut tables = self.tables();
        let before = tables.attempts.len();
        tables.attempts.retain(|a| a.id != attempt_id);
        tables.answers.retain(|a| a.attempt_id != attempt_id);
        self.attempt_locks().remove(&attempt_id);
        Ok(tables.attempts.len() != before)
    }
}

struct MemoryAttemptLock {
    _guard: OwnedMutexGuard<()>,
    store: MemoryStore,
    sheet: AnswerSheet,
    staged_answers: Vec<TestAnswer>,
    staged_outcome: Option<AttemptOutcome>,
}

#[async_trait]
impl AttemptLock for MemoryAttemptLock {
    fn sheet(&self) -> &AnswerSheet {
        &self.sheet
    }

    async fn record_answer(&mut self, answer: &TestAnswer) -> Result<()> {
        self.staged_answers.push(answer.clone());
        Ok(())
    }

    async fn finish(&mut self, outcome: &AttemptOutcome) -> Result<()> {
        if self.sheet.attempt().is_finished() || self.staged_outcome.is_some() {
            return Err(Error::AttemptAlreadyFinished);
        }
        self.staged_outcome = Some(outcome.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.store.faults.check_write()?;

        let attempt_id = self.sheet.attempt().id;
        let mut tables = self.store.tables();
        for staged in &self.staged_answers {
            if let Some(row) = tables.answers.iter_mut().find(|a| a.id == staged.id) {
                row.selected_option_id = staged.selected_option_id;
                row.text_answer = staged.text_answer.clone();
                row.is_correct = staged.is_correct;
            }
        }
        if let Some(outcome) = &self.staged_outcome {
            if let Some(attempt) = tables.attempts.iter_mut().find(|a| a.id == attempt_id) {
                attempt.apply_outcome(outcome);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables();
        let duplicate = tables.users.iter().any(|u| {
            u.phone == user.phone
                || matches!((&u.email, &user.email), (Some(a), Some(b)) if a.eq_ignore_ascii_case(b))
        });
        if duplicate {
            return Err(Error::Conflict("The record already exists".to_string()));
        }
        let created = User {
            id: Uuid::new_v4(),
            first_name: user.first_name,
            phone: user.phone,
            age: user.age,
            email: user.email,
            user_type: user.user_type,
            is_staff: user.is_staff,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>> {
        Ok(self.tables().users.iter().find(|u| u.phone == phone).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .tables()
            .users
            .iter()
            .find(|u| {
                u.email
                    .as_deref()
                    .map_or(false, |e| e.eq_ignore_ascii_case(email))
            })
            .cloned())
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.tables().users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.tables().users.clone())
    }
}
