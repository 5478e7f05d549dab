//! # ltigate-auth
//!
//! LTI 1.1 launch authentication for axum applications.
//!
//! This crate provides:
//! - OAuth1 HMAC-SHA1 verification of signed launch requests
//! - A per-route access guard (`any`, `session`, `initial`)
//! - Trusted launch sessions behind a pluggable session store
//! - Grade posting to the consumer's Basic Outcomes service
//!
//! ## Overview
//!
//! A tool consumer (an LMS) launches the tool with a signed request. The
//! guard verifies the signature against the registered consumers, stores the
//! launch context under a fresh session id and hands the protected handler an
//! [`Lti`] handle. Later requests may rely on that session instead of a new
//! signature, depending on the route's declared mode.
//!
//! ## Modules
//!
//! - [`config`] - Consumer, signature, outcome and session configuration
//! - [`consumer`] - Registry of consumer keys and secrets
//! - [`oauth1`] - OAuth1 signature base string, signing and verification
//! - [`verifier`] - Verification of inbound launch requests
//! - [`session`] - Session storage trait and in-memory store
//! - [`launch`] - The launch context persisted per session
//! - [`guard`] - Access modes and the access guard
//! - [`outcome`] - Grade posting client
//! - [`url_fix`] - Outcome-service URL rewriting
//! - [`middleware`] - Axum middleware and extractor

pub mod config;
pub mod consumer;
pub mod error;
pub mod guard;
pub mod launch;
pub mod middleware;
pub mod oauth1;
pub mod outcome;
pub mod session;
pub mod url_fix;
pub mod verifier;

pub use config::{ConfigError, LtiConfig};
pub use consumer::{Consumer, ConsumerRegistry};
pub use error::{ErrorCategory, LtiError};
pub use guard::{AccessGuard, AccessMode, Lti};
pub use launch::LaunchContext;
pub use middleware::{LtiRoute, LtiState, lti_guard};
pub use outcome::OutcomeClient;
pub use session::{InMemorySessionStore, SessionStore};
pub use url_fix::UrlFixupTable;
pub use verifier::{LaunchRequest, SignatureVerifier};

/// Type alias for LTI authorization results.
pub type LtiResult<T> = Result<T, LtiError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use ltigate_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::LtiResult;
    pub use crate::config::{ConfigError, LtiConfig};
    pub use crate::error::{ErrorCategory, LtiError};
    pub use crate::guard::{AccessGuard, AccessMode, Lti};
    pub use crate::launch::LaunchContext;
    pub use crate::middleware::{LtiRoute, LtiState, lti_guard};
    pub use crate::session::{InMemorySessionStore, SessionAttributes, SessionStore};
}
