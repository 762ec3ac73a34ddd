use crate::render;
use api_client::error::ApiError;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Financial API error: {0}")]
    Api(#[from] ApiError),
    #[error("Invalid selection: {0}")]
    Validation(String),
}

/// Renders the error as a full HTML page so the browser shows something useful.
impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let (status, title, message) = match &self {
            DashboardError::Api(err) => {
                tracing::error!(error = %err, "Dashboard could not load data from the API.");
                let message = if err.is_unreachable() {
                    "The financial API could not be reached. Check that it is running and that API_BASE_URL points at it.".to_string()
                } else {
                    err.to_string()
                };
                (StatusCode::BAD_GATEWAY, "Financial data unavailable", message)
            }
            DashboardError::Validation(message) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "Invalid selection", message.clone())
            }
        };
        (status, Html(render::error_page(title, &message))).into_response()
    }
}
