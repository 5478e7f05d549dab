//! Route handlers.
//!
//! Every handler below sits behind `lti_guard`; receiving an [`Lti`] means
//! the request has already been authorized for the route's access mode.

use axum::{extract::Path, http::StatusCode, response::IntoResponse};
use ltigate_auth::Lti;

pub async fn healthz() -> &'static str {
    "ok"
}

/// Protected landing page, shared by the `any`, `session` and `initial`
/// routes.
pub async fn hello(lti: Lti) -> String {
    let context = lti.context();
    tracing::debug!(
        consumer_key = %context.consumer_key,
        session_id = %lti.session_id(),
        "Serving protected page"
    );
    match context.user_id.as_deref() {
        Some(user) => format!("hi {user}"),
        None => "hi".to_string(),
    }
}

pub async fn close_session(lti: Lti) -> impl IntoResponse {
    match lti.close().await {
        Ok(()) => (StatusCode::OK, "session closed").into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn post_grade(Path(grade): Path<f64>, lti: Lti) -> String {
    let posted = lti.post_grade(grade).await;
    format!("grade={posted}")
}
