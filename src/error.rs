use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

/// Postgres SQLSTATE codes that signal contention worth one more try.
const TRANSIENT_SQLSTATES: [&str; 3] = ["40001", "40P01", "55P03"];
const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No active questions for the selected level")]
    NoQuestionsAvailable,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("The test attempt is already finished")]
    AttemptAlreadyFinished,

    #[error("The question does not belong to this attempt")]
    InvalidQuestion,

    #[error("Questions must be answered in order; expected question #{expected}")]
    OutOfOrder { expected: i32 },

    #[error("The selected option does not belong to the question")]
    InvalidOption,

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Storage contention: {0}")]
    Contention(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code sent to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NoQuestionsAvailable => "no_questions_available",
            Error::NotFound(_) => "not_found",
            Error::AttemptAlreadyFinished => "attempt_already_finished",
            Error::InvalidQuestion => "invalid_question",
            Error::OutOfOrder { .. } => "out_of_order",
            Error::InvalidOption => "invalid_option",
            Error::StorageFailure(_) | Error::Database(_) | Error::Contention(_) => {
                "storage_failure"
            }
            Error::Config(_) => "config_error",
            Error::BadRequest(_) => "bad_request",
            Error::Unauthorized(_) => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            Error::Conflict(_) => "conflict",
            Error::Validation(_) => "validation_error",
            Error::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::NoQuestionsAvailable
            | Error::AttemptAlreadyFinished
            | Error::InvalidQuestion
            | Error::InvalidOption
            | Error::BadRequest(_)
            | Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::OutOfOrder { .. } | Error::Conflict(_) => StatusCode::CONFLICT,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::StorageFailure(_)
            | Error::Database(_)
            | Error::Contention(_)
            | Error::Config(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when the failure came from lock or serialization contention and
    /// the whole operation may be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Contention(_) => true,
            Error::Database(sqlx::Error::Database(db)) => db
                .code()
                .map(|code| TRANSIENT_SQLSTATES.contains(&code.as_ref()))
                .unwrap_or(false),
            Error::Database(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }

    /// Collapses raw storage errors into `StorageFailure`; domain errors pass through.
    pub fn into_storage_failure(self) -> Self {
        match self {
            Error::Database(err) => Error::StorageFailure(err.to_string()),
            Error::Contention(msg) => Error::StorageFailure(msg),
            other => other,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = match &self {
            Error::Database(_) | Error::Contention(_) | Error::StorageFailure(_) => {
                tracing::error!(error = %self, "storage error surfaced to client");
                "A storage error occurred, please retry".to_string()
            }
            Error::Config(_) | Error::Internal(_) => {
                tracing::error!(error = %self, "internal error surfaced to client");
                "An unexpected error occurred".to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({ "error": self.code(), "message": message });
        if let Error::OutOfOrder { expected } = &self {
            body["expected_order_index"] = json!(expected);
        }
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        let sqlstate = match &err {
            sqlx::Error::Database(db) => db.code().map(|code| code.into_owned()),
            _ => None,
        };
        match (err, sqlstate.as_deref()) {
            (sqlx::Error::RowNotFound, _) => Error::NotFound("Resource not found".to_string()),
            (_, Some(FOREIGN_KEY_VIOLATION)) => {
                Error::Conflict("The record is referenced by recorded answers".to_string())
            }
            (_, Some(UNIQUE_VIOLATION)) => Error::Conflict("The record already exists".to_string()),
            (other, _) => Error::Database(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_have_stable_codes() {
        assert_eq!(Error::NoQuestionsAvailable.code(), "no_questions_available");
        assert_eq!(Error::OutOfOrder { expected: 2 }.code(), "out_of_order");
        assert_eq!(Error::AttemptAlreadyFinished.code(), "attempt_already_finished");
        assert_eq!(Error::InvalidOption.code(), "invalid_option");
        assert_eq!(
            Error::Contention("busy".into()).into_storage_failure().code(),
            "storage_failure"
        );
    }

    #[test]
    fn only_contention_is_transient() {
        assert!(Error::Contention("lock".into()).is_transient());
        assert!(!Error::StorageFailure("commit".into()).is_transient());
        assert!(!Error::InvalidQuestion.is_transient());
        assert!(!Error::Database(sqlx::Error::RowNotFound).is_transient());
    }

    #[test]
    fn storage_failure_collapse_keeps_domain_errors() {
        let err = Error::InvalidQuestion.into_storage_failure();
        assert!(matches!(err, Error::InvalidQuestion));
        let err = Error::Contention("row locked".into()).into_storage_failure();
        assert!(matches!(err, Error::StorageFailure(msg) if msg == "row locked"));
    }

    #[test]
    fn out_of_order_maps_to_conflict() {
        let resp = Error::OutOfOrder { expected: 3 }.into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let resp = Error::NotFound("attempt".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
