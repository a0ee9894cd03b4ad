//! Uniform response envelope returned by the dispatcher and every backend.

use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
    pub cause: Option<String>,
}

/// A complete HTTP response: status, content type, and body bytes.
///
/// Bodies are kept as raw bytes so a backend response crosses the dispatcher
/// without being re-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    status: StatusCode,
    content_type: String,
    body: Bytes,
}

impl ApiResponse {
    /// Builds a response from already-encoded bytes.
    #[must_use]
    pub fn raw(status: StatusCode, content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    /// Serializes `value` as the JSON body.
    ///
    /// A value that fails to serialize produces a 500 error envelope.
    #[must_use]
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::raw(status, JSON_CONTENT_TYPE, body),
            Err(e) => Self::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to encode response",
                Some(e.to_string()),
            ),
        }
    }

    /// Builds an error envelope.
    #[must_use]
    pub fn error(status: StatusCode, message: impl Into<String>, cause: Option<String>) -> Self {
        let body = ErrorBody {
            status: status.as_u16(),
            message: message.into(),
            cause,
        };
        // ErrorBody holds only strings and integers; encoding cannot fail.
        let bytes = serde_json::to_vec(&body).unwrap_or_default();
        Self::raw(status, JSON_CONTENT_TYPE, bytes)
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decodes the body as an error envelope, if it is one.
    #[must_use]
    pub fn error_body(&self) -> Option<ErrorBody> {
        serde_json::from_slice(&self.body).ok()
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status, [(CONTENT_TYPE, self.content_type)], self.body).into_response()
    }
}
