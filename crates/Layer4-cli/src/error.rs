//! API 에러 - HTTP 응답 변환

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pilot_foundation::Error;
use serde::Serialize;

/// API error response body
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

/// Application error types
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match self {
            AppError::NotFound(msg) => ("NOT_FOUND", msg),
            AppError::BadRequest(msg) => ("BAD_REQUEST", msg),
            AppError::Internal(msg) => ("INTERNAL_ERROR", msg),
        };

        (
            status,
            Json(ApiError {
                error: message,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        match err {
            Error::TaskNotFound(id) => AppError::NotFound(format!("Task {} not found", id)),
            e if e.is_client_error() => AppError::BadRequest(e.to_string()),
            e => {
                tracing::error!("Internal error: {:?}", e);
                AppError::Internal(e.to_string())
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", err);
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foundation_error_mapping() {
        let err: AppError = Error::TaskNotFound("t1".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: AppError = Error::InvalidRequest("bad history".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: AppError = Error::Sandbox("docker down".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_into_response_status() {
        let response = AppError::BadRequest("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
