use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;

use crate::dto::test_dto::{StartTestRequest, SubmitAnswerRequest};
use crate::error::{Error, Result};
use crate::middleware::auth::AuthUser;
use crate::models::question::{Language, TestLevel};
use crate::AppState;

#[axum::debug_handler]
pub async fn start_test(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<StartTestRequest>,
) -> Result<Response> {
    let level: TestLevel = req.level.parse()?;
    let language = match req.language.as_deref() {
        None => Language::default(),
        Some(code) => Language::from_code(code)
            .ok_or_else(|| Error::BadRequest(format!("Unsupported language '{}'", code)))?,
    };

    let started = state
        .attempt_service
        .start_attempt(user.id, level, language)
        .await?;
    Ok((StatusCode::CREATED, Json(started)).into_response())
}

#[axum::debug_handler]
pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<Response> {
    let resp = state.attempt_service.submit_answer(user.id, req).await?;
    Ok(Json(resp).into_response())
}

#[axum::debug_handler]
pub async fn history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response> {
    let attempts = state.attempt_service.history(user.id).await?;
    Ok(Json(attempts).into_response())
}

#[axum::debug_handler]
pub async fn get_attempt(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Response> {
    let detail = state
        .attempt_service
        .attempt_detail(user.id, attempt_id)
        .await?;
    Ok(Json(detail).into_response())
}
