use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::store::StoreError;

/// Every way a quiz request can fail. Failures never change session state.
#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("Candidate not found.")]
    NotFound,
    #[error("Your quiz has already finished.")]
    AlreadyTerminated,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Malformed(String),
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
    #[error("completion notification failed: {0}")]
    Notification(String),
}

impl QuizError {
    pub fn validation(message: impl Into<String>) -> Self {
        QuizError::Validation(message.into())
    }

    pub fn inconsistent(message: impl Into<String>) -> Self {
        QuizError::Store(StoreError::Inconsistent(message.into()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            QuizError::Unauthorized(_) => "unauthorized",
            QuizError::NotFound => "not_found",
            QuizError::AlreadyTerminated => "already_terminated",
            QuizError::Validation(_) => "validation_failure",
            QuizError::Malformed(_) => "malformed_request",
            QuizError::Store(_) => "store_failure",
            QuizError::Notification(_) => "notification_failure",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            QuizError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            QuizError::NotFound => StatusCode::NOT_FOUND,
            QuizError::AlreadyTerminated | QuizError::Malformed(_) => StatusCode::BAD_REQUEST,
            QuizError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            QuizError::Store(_) | QuizError::Notification(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for QuizError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Quiz request failed: {}", self);
        } else {
            tracing::warn!("Quiz request rejected ({}): {}", self.kind(), self);
        }
        let body = json!({
            "status": status.as_u16(),
            "error": self.kind(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
