//! Axum integration for the access guard.
//!
//! This module provides:
//!
//! - The [`lti_guard`] middleware, declared per route with an access mode
//! - The [`Lti`](crate::guard::Lti) extractor for protected handlers
//! - JSON error responses for [`LtiError`](crate::error::LtiError)
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, middleware::from_fn_with_state, routing::get};
//! use ltigate_auth::guard::Lti;
//! use ltigate_auth::middleware::{LtiState, lti_guard};
//!
//! async fn index(lti: Lti) -> String {
//!     format!("Hello, {}", lti.context().user_id.as_deref().unwrap_or("anonymous"))
//! }
//!
//! let lti = LtiState::from_config(&config.lti, store)?;
//!
//! let app = Router::new()
//!     .route("/any", get(index).post(index))
//!     .route_layer(from_fn_with_state(lti.route("any"), lti_guard));
//! ```

pub mod error;
pub mod guard;

pub use error::{default_error_handler, error_json};
pub use guard::{DEFAULT_FORM_BODY_LIMIT, ErrorHandler, LtiRoute, LtiState, lti_guard};
