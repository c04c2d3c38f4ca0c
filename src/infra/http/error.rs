use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use framehouse_api_types::ErrorResponse;

use crate::application::error::ErrorReport;
use crate::application::render::RenderError;
use crate::infra::uploads::UploadStorageError;

/// JSON error returned by every endpoint: `{ "success": false, "error": "..." }`.
#[derive(Debug)]
pub struct ApiError {
    source: &'static str,
    status: StatusCode,
    message: String,
    chain: Vec<String>,
}

impl ApiError {
    pub fn new(source: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            source,
            status,
            message: message.into(),
            chain: Vec::new(),
        }
    }

    pub fn bad_request(source: &'static str, message: impl Into<String>) -> Self {
        Self::new(source, StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(source: &'static str, message: impl Into<String>) -> Self {
        Self::new(source, StatusCode::NOT_FOUND, message)
    }

    pub fn internal(source: &'static str, error: &dyn std::error::Error) -> Self {
        Self::from_error(source, StatusCode::INTERNAL_SERVER_ERROR, error)
    }

    fn from_error(source: &'static str, status: StatusCode, error: &dyn std::error::Error) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            source,
            status,
            message: error.to_string(),
            chain: report.messages,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Map a render failure: bad requests are 400, everything else 500 with the underlying message.
    pub fn from_render(source: &'static str, error: &RenderError) -> Self {
        let status = if error.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::from_error(source, status, error)
    }

    pub fn from_upload(source: &'static str, error: &UploadStorageError) -> Self {
        let status = match error {
            UploadStorageError::InvalidImagePayload(_) => StatusCode::BAD_REQUEST,
            UploadStorageError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::from_error(source, status, error)
    }

    /// Body-parsing failures keep axum's status (400, 415, 413, 422) and message.
    pub fn from_rejection(source: &'static str, rejection: JsonRejection) -> Self {
        let status = match rejection.status() {
            StatusCode::UNPROCESSABLE_ENTITY => StatusCode::BAD_REQUEST,
            other => other,
        };
        Self::new(source, status, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error: self.message.clone(),
        };
        let mut response = (self.status, Json(body)).into_response();
        let report = if self.chain.is_empty() {
            ErrorReport::from_message(self.source, self.status, self.message)
        } else {
            ErrorReport {
                source: self.source,
                status: self.status,
                messages: self.chain,
            }
        };
        report.attach(&mut response);
        response
    }
}
