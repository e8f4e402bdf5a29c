use std::sync::Arc;

use quiz_backend::database::memory::MemoryStore;
use quiz_backend::database::repository::{AttemptRepository, QuestionBank, TestConfigStore};
use quiz_backend::dto::test_dto::SubmitAnswerRequest;
use quiz_backend::error::Error;
use quiz_backend::models::question::{Language, OptionDraft, Question, QuestionDraft, TestLevel};
use quiz_backend::models::test_attempt::{AttemptFilter, KnowledgeLevel};
use quiz_backend::services::attempt_service::AttemptService;
use quiz_backend::services::question_service::QuestionService;
use rust_decimal::Decimal;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

async fn seed_question(store: &MemoryStore, level: TestLevel, n: usize) -> Question {
    store
        .create_question(QuestionDraft {
            level,
            text_ru: format!("Вопрос {}", n),
            text_kg: format!("Суроо {}", n),
            image: None,
            is_active: true,
            options: vec![
                OptionDraft {
                    text_ru: "верно".into(),
                    text_kg: "туура".into(),
                    is_correct: true,
                },
                OptionDraft {
                    text_ru: "неверно".into(),
                    text_kg: "туура эмес".into(),
                    is_correct: false,
                },
            ],
        })
        .await
        .expect("seed question")
}

fn correct_option(q: &Question) -> i64 {
    q.options.iter().find(|o| o.is_correct).unwrap().id
}

fn wrong_option(q: &Question) -> i64 {
    q.options.iter().find(|o| !o.is_correct).unwrap().id
}

fn draft_of(q: &Question, is_active: bool) -> QuestionDraft {
    QuestionDraft {
        level: q.level,
        text_ru: q.text_ru.clone(),
        text_kg: q.text_kg.clone(),
        image: q.image.clone(),
        is_active,
        options: q
            .options
            .iter()
            .map(|o| OptionDraft {
                text_ru: o.text_ru.clone(),
                text_kg: o.text_kg.clone(),
                is_correct: o.is_correct,
            })
            .collect(),
    }
}

struct Fixture {
    store: Arc<MemoryStore>,
    service: AttemptService,
    questions: Vec<Question>,
}

async fn fixture(count: usize) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let mut questions = Vec::new();
    for n in 1..=count {
        questions.push(seed_question(&store, TestLevel::Medium, n).await);
    }
    let service = AttemptService::new(store.clone(), store.clone(), store.clone());
    Fixture {
        store,
        service,
        questions,
    }
}

fn answer(attempt_id: Uuid, question_id: i64, selected_option_id: i64) -> SubmitAnswerRequest {
    SubmitAnswerRequest {
        attempt_id,
        question_id,
        selected_option_id,
    }
}

#[tokio::test]
async fn two_of_three_correct_finishes_as_medium() {
    let fx = fixture(3).await;
    let user = Uuid::new_v4();
    let started = assert_ok!(fx.service.start_attempt(user, TestLevel::Medium, Language::Ru).await);

    let order: Vec<i32> = started.questions.iter().map(|q| q.order_index).collect();
    assert_eq!(order, vec![1, 2, 3]);

    let picks = [
        correct_option(&fx.questions[0]),
        correct_option(&fx.questions[1]),
        wrong_option(&fx.questions[2]),
    ];
    let mut last = None;
    for (q, option_id) in started.questions.iter().zip(picks) {
        let resp = assert_ok!(
            fx.service
                .submit_answer(user, answer(started.attempt_id, q.id, option_id))
                .await
        );
        assert!(resp.accepted);
        last = Some(resp);
    }

    let last = last.unwrap();
    assert!(last.attempt_finished);
    let result = last.result.expect("result on final answer");
    assert_eq!(result.correct_answers, 2);
    assert_eq!(result.knowledge_level, KnowledgeLevel::Medium);

    let stored = fx.store.get_attempt(started.attempt_id).await.unwrap().unwrap();
    assert!(stored.finished_at.is_some());
    assert_eq!(stored.percent, "66.67".parse::<Decimal>().unwrap());
    assert_eq!(stored.knowledge_level, Some(KnowledgeLevel::Medium));
}

#[tokio::test]
async fn all_correct_is_high_and_attempt_is_then_closed() {
    let fx = fixture(2).await;
    let user = Uuid::new_v4();
    let started = fx
        .service
        .start_attempt(user, TestLevel::Medium, Language::Kg)
        .await
        .unwrap();

    for (q, seeded) in started.questions.iter().zip(&fx.questions) {
        fx.service
            .submit_answer(user, answer(started.attempt_id, q.id, correct_option(seeded)))
            .await
            .unwrap();
    }

    let stored = fx.store.get_attempt(started.attempt_id).await.unwrap().unwrap();
    assert_eq!(stored.percent, Decimal::ONE_HUNDRED);
    assert_eq!(stored.knowledge_level, Some(KnowledgeLevel::High));

    let err = assert_err!(
        fx.service
            .submit_answer(
                user,
                answer(started.attempt_id, fx.questions[0].id, correct_option(&fx.questions[0]))
            )
            .await
    );
    assert!(matches!(err, Error::AttemptAlreadyFinished));
}

#[tokio::test]
async fn skipping_ahead_reports_the_expected_slot() {
    let fx = fixture(3).await;
    let user = Uuid::new_v4();
    let started = fx
        .service
        .start_attempt(user, TestLevel::Medium, Language::Ru)
        .await
        .unwrap();

    let third = &fx.questions[2];
    let err = fx
        .service
        .submit_answer(user, answer(started.attempt_id, third.id, correct_option(third)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::OutOfOrder { expected: 1 }));

    let answers = fx.store.list_answers(started.attempt_id).await.unwrap();
    assert!(answers.iter().all(|a| a.selected_option_id.is_none()));
}

#[tokio::test]
async fn option_from_another_question_is_rejected() {
    let fx = fixture(2).await;
    let user = Uuid::new_v4();
    let started = fx
        .service
        .start_attempt(user, TestLevel::Medium, Language::Ru)
        .await
        .unwrap();

    let err = fx
        .service
        .submit_answer(
            user,
            answer(started.attempt_id, fx.questions[0].id, correct_option(&fx.questions[1])),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidOption));

    let err = fx
        .service
        .submit_answer(user, answer(started.attempt_id, 9_999, correct_option(&fx.questions[0])))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidQuestion));
}

#[tokio::test]
async fn another_users_attempt_is_not_found() {
    let fx = fixture(1).await;
    let owner = Uuid::new_v4();
    let started = fx
        .service
        .start_attempt(owner, TestLevel::Medium, Language::Ru)
        .await
        .unwrap();

    let q = &fx.questions[0];
    let err = fx
        .service
        .submit_answer(Uuid::new_v4(), answer(started.attempt_id, q.id, correct_option(q)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let err = fx
        .service
        .attempt_detail(Uuid::new_v4(), started.attempt_id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_submission_is_accepted_once() {
    let fx = fixture(2).await;
    let user = Uuid::new_v4();
    let started = fx
        .service
        .start_attempt(user, TestLevel::Medium, Language::Ru)
        .await
        .unwrap();

    let q = &fx.questions[0];
    let req = answer(started.attempt_id, q.id, correct_option(q));
    let (a, b) = tokio::join!(
        fx.service.submit_answer(user, req.clone()),
        fx.service.submit_answer(user, req.clone()),
    );

    let accepted = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(accepted, 1);
    let rejected = if a.is_err() { a } else { b };
    assert!(matches!(rejected, Err(Error::OutOfOrder { expected: 2 })));

    let answered = fx
        .store
        .list_answers(started.attempt_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.selected_option_id.is_some())
        .count();
    assert_eq!(answered, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_final_answers_finish_exactly_once() {
    let fx = fixture(1).await;
    let user = Uuid::new_v4();
    let started = fx
        .service
        .start_attempt(user, TestLevel::Medium, Language::Ru)
        .await
        .unwrap();

    let q = &fx.questions[0];
    let (a, b) = tokio::join!(
        fx.service
            .submit_answer(user, answer(started.attempt_id, q.id, correct_option(q))),
        fx.service
            .submit_answer(user, answer(started.attempt_id, q.id, wrong_option(q))),
    );

    let finished: Vec<_> = [a, b].into_iter().filter_map(|r| r.ok()).collect();
    assert_eq!(finished.len(), 1);
    assert!(finished[0].attempt_finished);

    let stored = fx.store.get_attempt(started.attempt_id).await.unwrap().unwrap();
    let result = finished[0].result.as_ref().unwrap();
    assert_eq!(stored.correct_answers, result.correct_answers);
}

#[tokio::test]
async fn single_contention_is_retried() {
    let fx = fixture(2).await;
    let user = Uuid::new_v4();
    let started = fx
        .service
        .start_attempt(user, TestLevel::Medium, Language::Ru)
        .await
        .unwrap();

    fx.store.inject_contention(1);
    let q = &fx.questions[0];
    let resp = fx
        .service
        .submit_answer(user, answer(started.attempt_id, q.id, correct_option(q)))
        .await
        .unwrap();
    assert!(resp.accepted);
}

#[tokio::test]
async fn repeated_contention_is_a_storage_failure() {
    let fx = fixture(2).await;
    let user = Uuid::new_v4();
    let started = fx
        .service
        .start_attempt(user, TestLevel::Medium, Language::Ru)
        .await
        .unwrap();

    fx.store.inject_contention(2);
    let q = &fx.questions[0];
    let err = fx
        .service
        .submit_answer(user, answer(started.attempt_id, q.id, correct_option(q)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StorageFailure(_)));

    let answers = fx.store.list_answers(started.attempt_id).await.unwrap();
    assert!(answers.iter().all(|a| a.selected_option_id.is_none()));

    // The caller may resubmit the same answer once storage recovers.
    let resp = fx
        .service
        .submit_answer(user, answer(started.attempt_id, q.id, correct_option(q)))
        .await
        .unwrap();
    assert!(resp.accepted);
}

#[tokio::test]
async fn failed_creation_leaves_no_attempt() {
    let fx = fixture(2).await;
    fx.store.fail_writes(true);

    let err = fx
        .service
        .start_attempt(Uuid::new_v4(), TestLevel::Medium, Language::Ru)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StorageFailure(_)));
    assert!(fx
        .store
        .list_attempts(AttemptFilter::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn failed_commit_keeps_the_slot_open() {
    let fx = fixture(2).await;
    let user = Uuid::new_v4();
    let started = fx
        .service
        .start_attempt(user, TestLevel::Medium, Language::Ru)
        .await
        .unwrap();

    fx.store.fail_writes(true);
    let q = &fx.questions[0];
    let err = fx
        .service
        .submit_answer(user, answer(started.attempt_id, q.id, correct_option(q)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StorageFailure(_)));

    fx.store.fail_writes(false);
    let resp = fx
        .service
        .submit_answer(user, answer(started.attempt_id, q.id, correct_option(q)))
        .await
        .unwrap();
    assert!(resp.accepted);
    assert!(!resp.attempt_finished);
}

#[tokio::test]
async fn configured_duration_is_reported_and_inactive_questions_skipped() {
    let fx = fixture(2).await;
    fx.store.upsert_config(TestLevel::Medium, 45).await.unwrap();

    let hidden = &fx.questions[1];
    fx.store
        .update_question(hidden.id, draft_of(hidden, false))
        .await
        .unwrap();

    let started = fx
        .service
        .start_attempt(Uuid::new_v4(), TestLevel::Medium, Language::Ru)
        .await
        .unwrap();
    assert_eq!(started.duration_minutes, Some(45));
    assert_eq!(started.questions.len(), 1);
    assert_eq!(started.questions[0].id, fx.questions[0].id);
}

#[tokio::test]
async fn level_without_questions_creates_nothing() {
    let fx = fixture(2).await;
    let err = fx
        .service
        .start_attempt(Uuid::new_v4(), TestLevel::Hard, Language::Ru)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoQuestionsAvailable));
    assert!(fx
        .service
        .list_attempts(AttemptFilter::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn question_in_a_running_attempt_cannot_be_edited() {
    let fx = fixture(2).await;
    let user = Uuid::new_v4();
    let started = assert_ok!(fx.service.start_attempt(user, TestLevel::Medium, Language::Ru).await);
    let questions = QuestionService::new(fx.store.clone());

    // Neither slot has been answered yet.
    let last = &fx.questions[1];
    let err = assert_err!(questions.update(last.id, draft_of(last, true)).await);
    assert!(matches!(err, Error::Conflict(_)));

    for q in &started.questions {
        let picked = q.options[0].id;
        assert_ok!(
            fx.service
                .submit_answer(user, answer(started.attempt_id, q.id, picked))
                .await
        );
    }
    let stored = fx.store.get_attempt(started.attempt_id).await.unwrap().unwrap();
    assert!(stored.is_finished());
}
