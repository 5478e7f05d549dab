//! Error response handling for the LTI middleware.
//!
//! Implements `IntoResponse` for `LtiError`. The body only ever carries the
//! caller-facing message; [`LtiError::detail`] stays in the logs.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::LtiError;

impl IntoResponse for LtiError {
    fn into_response(self) -> Response {
        let (status, code) = error_details(&self);
        let message = self.to_string();

        let mut headers = HeaderMap::new();
        if status == StatusCode::UNAUTHORIZED {
            let www_auth = build_www_authenticate_header(code, &message);
            if let Ok(value) = HeaderValue::from_str(&www_auth) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        (status, headers, Json(error_json(code, &message))).into_response()
    }
}

/// Default error handler installed by [`LtiState`](super::LtiState).
pub fn default_error_handler(error: LtiError) -> Response {
    error.into_response()
}

/// Returns (HTTP status, error code).
fn error_details(error: &LtiError) -> (StatusCode, &'static str) {
    match error {
        LtiError::NoValidCredentials => (StatusCode::UNAUTHORIZED, "unauthorized"),
        LtiError::KeyUnknown { .. } | LtiError::SignatureInvalid { .. } => {
            (StatusCode::UNAUTHORIZED, "invalid_signature")
        }
        LtiError::SessionUnavailable => (StatusCode::FORBIDDEN, "session_unavailable"),
        LtiError::UnknownRequestType => (StatusCode::INTERNAL_SERVER_ERROR, "unknown_request_type"),
        LtiError::Storage { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "server_error"),
    }
}

/// Builds the WWW-Authenticate header value for 401 responses.
///
/// Format: `OAuth realm="ltigate", error="...", error_description="..."`
fn build_www_authenticate_header(error: &str, description: &str) -> String {
    let escaped_desc = description.replace('\"', "\\\"");
    format!(
        "OAuth realm=\"ltigate\", error=\"{}\", error_description=\"{}\"",
        error, escaped_desc
    )
}

/// Creates the JSON error body.
#[must_use]
pub fn error_json(code: &str, description: &str) -> serde_json::Value {
    json!({
        "error": code,
        "error_description": description,
    })
}
