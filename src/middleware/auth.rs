use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use uuid::Uuid;

use crate::models::user::UserType;
use crate::AppState;

/// Caller identity inserted into request extensions by the auth middleware.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserType,
}

fn reject(status: StatusCode, code: &str) -> Response {
    (status, Json(json!({ "error": code }))).into_response()
}

fn authenticate(state: &AppState, req: &Request) -> Result<AuthUser, Response> {
    let Some(auth_header) = req.headers().get(AUTHORIZATION) else {
        return Err(reject(StatusCode::UNAUTHORIZED, "missing_authorization"));
    };
    let Ok(auth_str) = auth_header.to_str() else {
        return Err(reject(StatusCode::UNAUTHORIZED, "bad_authorization"));
    };
    let Some(token) = auth_str.strip_prefix("Bearer ") else {
        return Err(reject(StatusCode::UNAUTHORIZED, "unsupported_scheme"));
    };

    let claims = state
        .user_service
        .verify_token(token)
        .map_err(|_| reject(StatusCode::UNAUTHORIZED, "invalid_token"))?;
    let id = Uuid::parse_str(&claims.sub)
        .map_err(|_| reject(StatusCode::UNAUTHORIZED, "invalid_token"))?;
    let role = claims
        .role
        .as_deref()
        .and_then(|r| r.parse::<UserType>().ok())
        .unwrap_or(UserType::User);

    Ok(AuthUser { id, role })
}

/// Any valid bearer token.
pub async fn require_user(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    match authenticate(&state, &req) {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(rejection) => rejection,
    }
}

pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    match authenticate(&state, &req) {
        Ok(user) if user.role == UserType::Admin => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Ok(_) => reject(StatusCode::FORBIDDEN, "forbidden"),
        Err(rejection) => rejection,
    }
}
