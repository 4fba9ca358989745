//! Request failures and their HTTP responses.
//!
//! Every failure on the request path ends up as a [`ServeError`]; handlers
//! return `Result<Response, ServeError>` and let `IntoResponse` pick the status.

use crate::manifest::ManifestError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Media(#[from] hippo_media::Error),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build response: {0}")]
    Http(#[from] axum::http::Error),
}

impl ServeError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServeError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ServeError::NotFound(_) => StatusCode::NOT_FOUND,
            ServeError::Media(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            ServeError::Media(_) => StatusCode::INTERNAL_SERVER_ERROR,
            // An unreadable manifest is treated like a missing one.
            ServeError::Manifest(ManifestError::Io(_)) => StatusCode::NOT_FOUND,
            ServeError::Manifest(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServeError::Io(_) | ServeError::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match status {
            StatusCode::NOT_FOUND => "Not Found",
            StatusCode::METHOD_NOT_ALLOWED => "Method Not Allowed",
            _ => "Internal Error",
        };

        match &self {
            ServeError::Media(hippo_media::Error::Format(_)) => {
                tracing::warn!(error = %self, "malformed fragmented file")
            }
            _ if status.is_server_error() => {
                tracing::error!(status = %status, error = %self, "request failed")
            }
            _ => tracing::debug!(status = %status, error = %self, "request rejected"),
        }

        (status, message).into_response()
    }
}
