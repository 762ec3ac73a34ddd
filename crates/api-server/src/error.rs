use analytics::AnalyticsError;
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use database::DbError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),
    #[error("Analytics error: {0}")]
    Analytics(#[from] AnalyticsError),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl AppError {
    fn status_and_message(self) -> (StatusCode, String) {
        match self {
            AppError::Validation(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AppError::Database(DbError::NotFound) => {
                (StatusCode::NOT_FOUND, "Record not found".to_string())
            }
            AppError::Database(DbError::Conflict(key)) => (
                StatusCode::CONFLICT,
                format!("A record already exists for {key}"),
            ),
            AppError::Database(DbError::Invalid(message)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, message)
            }
            AppError::Database(db_err) => {
                tracing::error!(error = ?db_err, "Database error.");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal database error occurred".to_string(),
                )
            }
            AppError::Analytics(AnalyticsError::NotEnoughData(message)) => {
                (StatusCode::NOT_FOUND, message)
            }
            AppError::Analytics(AnalyticsError::InvalidInput(message)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, message)
            }
        }
    }
}

/// Converts our custom `AppError` into an HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failures_hide_their_details() {
        let err = AppError::Database(DbError::Decode("revenue 'x'".to_string()));
        let (status, message) = err.status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!message.contains("revenue"));
    }

    #[test]
    fn domain_errors_map_to_client_statuses() {
        let cases = [
            (AppError::Database(DbError::NotFound), StatusCode::NOT_FOUND),
            (AppError::Database(DbError::Conflict("x".into())), StatusCode::CONFLICT),
            (AppError::Database(DbError::Invalid("x".into())), StatusCode::UNPROCESSABLE_ENTITY),
            (
                AppError::Analytics(AnalyticsError::NotEnoughData("x".into())),
                StatusCode::NOT_FOUND,
            ),
            (AppError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status_and_message().0, expected);
        }
    }
}
