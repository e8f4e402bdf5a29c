use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::admin_dto::{
    AttemptListQuery, QuestionListQuery, QuestionPayload, TestConfigPayload,
    UpdateTestConfigPayload,
};
use crate::dto::auth_dto::AdminUserView;
use crate::error::Result;
use crate::models::question::TestLevel;
use crate::models::test_attempt::AttemptFilter;
use crate::AppState;

// Users

#[axum::debug_handler]
pub async fn list_users(State(state): State<AppState>) -> Result<Response> {
    let users = state.user_service.list().await?;
    let views: Vec<AdminUserView> = users.iter().map(AdminUserView::from).collect();
    Ok(Json(views).into_response())
}

#[axum::debug_handler]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Response> {
    let user = state.user_service.get(user_id).await?;
    Ok(Json(AdminUserView::from(&user)).into_response())
}

// Questions

#[axum::debug_handler]
pub async fn list_questions(
    State(state): State<AppState>,
    Query(query): Query<QuestionListQuery>,
) -> Result<Response> {
    let questions = state.question_service.list(query.level).await?;
    Ok(Json(questions).into_response())
}

#[axum::debug_handler]
pub async fn get_question(
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
) -> Result<Response> {
    let question = state.question_service.get(question_id).await?;
    Ok(Json(question).into_response())
}

#[axum::debug_handler]
pub async fn create_question(
    State(state): State<AppState>,
    Json(payload): Json<QuestionPayload>,
) -> Result<Response> {
    payload.validate()?;
    let question = state.question_service.create(payload.into()).await?;
    Ok((StatusCode::CREATED, Json(question)).into_response())
}

#[axum::debug_handler]
pub async fn update_question(
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
    Json(payload): Json<QuestionPayload>,
) -> Result<Response> {
    payload.validate()?;
    let question = state
        .question_service
        .update(question_id, payload.into())
        .await?;
    Ok(Json(question).into_response())
}

#[axum::debug_handler]
pub async fn delete_question(
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
) -> Result<Response> {
    state.question_service.delete(question_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// Test configuration

#[axum::debug_handler]
pub async fn list_test_configs(State(state): State<AppState>) -> Result<Response> {
    let configs = state.test_config_service.list().await?;
    Ok(Json(configs).into_response())
}

#[axum::debug_handler]
pub async fn get_test_config(
    State(state): State<AppState>,
    Path(level): Path<String>,
) -> Result<Response> {
    let level: TestLevel = level.parse()?;
    let config = state.test_config_service.get(level).await?;
    Ok(Json(config).into_response())
}

#[axum::debug_handler]
pub async fn upsert_test_config(
    State(state): State<AppState>,
    Json(payload): Json<TestConfigPayload>,
) -> Result<Response> {
    payload.validate()?;
    let config = state
        .test_config_service
        .upsert(payload.level, payload.duration_minutes)
        .await?;
    Ok(Json(config).into_response())
}

#[axum::debug_handler]
pub async fn update_test_config(
    State(state): State<AppState>,
    Path(level): Path<String>,
    Json(payload): Json<UpdateTestConfigPayload>,
) -> Result<Response> {
    payload.validate()?;
    let level: TestLevel = level.parse()?;
    let config = state
        .test_config_service
        .update(level, payload.duration_minutes)
        .await?;
    Ok(Json(config).into_response())
}

#[axum::debug_handler]
pub async fn delete_test_config(
    State(state): State<AppState>,
    Path(level): Path<String>,
) -> Result<Response> {
    let level: TestLevel = level.parse()?;
    state.test_config_service.delete(level).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// Attempts

#[axum::debug_handler]
pub async fn list_attempts(
    State(state): State<AppState>,
    Query(query): Query<AttemptListQuery>,
) -> Result<Response> {
    let attempts = state
        .attempt_service
        .list_attempts(AttemptFilter {
            level: query.level,
            user_id: query.user_id,
        })
        .await?;
    Ok(Json(attempts).into_response())
}

#[axum::debug_handler]
pub async fn get_attempt(
    State(state): State<AppState>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Response> {
    let detail = state.attempt_service.get_attempt_detail(attempt_id).await?;
    Ok(Json(detail).into_response())
}

#[axum::debug_handler]
pub async fn delete_attempt(
    State(state): State<AppState>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Response> {
    state.attempt_service.delete_attempt(attempt_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
