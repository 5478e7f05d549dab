//! Session storage boundary.
//!
//! The guard persists a trusted [`LaunchContext`](crate::launch::LaunchContext)
//! through the narrow [`SessionStore`] trait. Any backend satisfies it: an
//! in-process map, a signed cookie, a distributed cache. Synchronization is
//! the backend's responsibility.
//!
//! # Security Considerations
//!
//! - Session ids must be unguessable; the guard issues UUIDv4 ids
//! - The `lti_authenticated` attribute is the only trust signal; backends
//!   must store it verbatim
//! - Backends should expire idle sessions

pub mod memory;

use async_trait::async_trait;

use crate::LtiResult;

pub use memory::InMemorySessionStore;

/// Attributes stored for one session.
pub type SessionAttributes = serde_json::Map<String, serde_json::Value>;

/// Key/value persistence keyed by session id.
///
/// # Example Implementation
///
/// ```ignore
/// use ltigate_auth::session::{SessionAttributes, SessionStore};
/// use ltigate_auth::LtiResult;
///
/// struct RedisSessionStore { /* ... */ }
///
/// #[async_trait::async_trait]
/// impl SessionStore for RedisSessionStore {
///     async fn get(&self, id: &str) -> LtiResult<Option<SessionAttributes>> {
///         // GET lti:session:{id}, deserialize JSON
///     }
///     // ... other methods
/// }
/// ```
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the attributes of a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails. A missing session is
    /// `Ok(None)`.
    async fn get(&self, id: &str) -> LtiResult<Option<SessionAttributes>>;

    /// Replaces all attributes of a session, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    async fn set(&self, id: &str, attributes: SessionAttributes) -> LtiResult<()>;

    /// Removes a session. Removing an absent session is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    async fn delete(&self, id: &str) -> LtiResult<()>;
}
