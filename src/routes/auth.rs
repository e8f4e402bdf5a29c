use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use validator::Validate;

use crate::dto::auth_dto::{AdminLoginRequest, RegisterRequest, UserLoginRequest};
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::AppState;

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response> {
    req.validate()?;
    let profile = state.user_service.register(req).await?;
    Ok((StatusCode::CREATED, Json(profile)).into_response())
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<UserLoginRequest>,
) -> Result<Response> {
    req.validate()?;
    let token = state.user_service.login(&req.phone, &req.password).await?;
    Ok(Json(token).into_response())
}

#[axum::debug_handler]
pub async fn admin_login(
    State(state): State<AppState>,
    Json(req): Json<AdminLoginRequest>,
) -> Result<Response> {
    req.validate()?;
    let token = state
        .user_service
        .admin_login(&req.email, &req.password)
        .await?;
    Ok(Json(token).into_response())
}

#[axum::debug_handler]
pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response> {
    let profile = state.user_service.me(user.id).await?;
    Ok(Json(profile).into_response())
}
