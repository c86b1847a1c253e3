use crate::services::{auth_service::AuthError, note_service::NoteError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use tracing::error;

/// An HTTP error: status, machine-readable code and a client-safe message.
///
/// Serialized as `{"error": code, "message": message}`. Underlying store or
/// provider errors are logged where they are converted and never echoed.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: msg.into(),
        }
    }

    pub fn bad_request(code: &'static str, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, msg)
    }

    pub fn unauthorized(code: &'static str, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.code,
            "message": self.message,
        }));

        (self.status, body).into_response()
    }
}

impl From<NoteError> for AppError {
    fn from(err: NoteError) -> Self {
        match err {
            NoteError::Validation(msg) => AppError::bad_request("validation_error", msg),
            NoteError::NotFound => AppError::not_found("Note not found"),
            NoteError::StorageUpload(source) => {
                error!(error = %source, "storage upload error");
                AppError::new(
                    StatusCode::BAD_GATEWAY,
                    "storage_upload_failed",
                    "Failed to store the uploaded file",
                )
            }
            NoteError::StorageLink(source) => {
                error!(error = %source, "storage link error");
                AppError::new(
                    StatusCode::BAD_GATEWAY,
                    "storage_link_failed",
                    "Failed to create a download link",
                )
            }
            NoteError::MetadataWrite(source) => {
                error!(error = %source, "metadata write error");
                AppError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "metadata_error",
                    "Failed to save note",
                )
            }
            NoteError::MetadataRead(source) => {
                error!(error = %source, "metadata read error");
                AppError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "metadata_error",
                    "Failed to load notes",
                )
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => {
                AppError::unauthorized("unauthorized", "Authentication required")
            }
            AuthError::MalformedToken | AuthError::SignatureInvalid => {
                AppError::unauthorized("invalid_token", "Invalid or expired token")
            }
            AuthError::TokenExpired => {
                AppError::unauthorized("token_expired", "Invalid or expired token")
            }
            AuthError::DomainRejected(_) => AppError::new(
                StatusCode::FORBIDDEN,
                "domain_rejected",
                "Only university email addresses are allowed",
            ),
            AuthError::CodeExchange(detail) => {
                error!(detail = %detail, "code exchange error");
                AppError::unauthorized("invalid_code", "Invalid authorization code")
            }
            AuthError::ProfileFetch(detail) | AuthError::Signing(detail) => {
                error!(detail = %detail, "authentication error");
                AppError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "auth_error",
                    "Authentication failed",
                )
            }
        }
    }
}
