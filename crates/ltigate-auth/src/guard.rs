//! The access guard: per-request authorization of LTI endpoints.
//!
//! Each protected endpoint declares one [`AccessMode`]. For every request the
//! guard moves from *unverified* to exactly one of *trusted launch*,
//! *trusted session* or *rejected*:
//!
//! | Mode      | Accepts                      | Failure                 |
//! |-----------|------------------------------|-------------------------|
//! | `initial` | a fresh signed launch        | verifier error, or `NoValidCredentials` without OAuth parameters |
//! | `session` | a trusted session            | `SessionUnavailable`    |
//! | `any`     | trusted session, else launch | `NoValidCredentials`    |
//!
//! `any` checks the session strictly first. Once a trusted session exists a
//! signature that comes with the request is never evaluated, so a tampered
//! launch cannot displace it.
//!
//! A missing or unknown mode fails with `UnknownRequestType` before any
//! credential or storage work.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::LtiResult;
use crate::error::LtiError;
use crate::launch::{LTI_SESSION_KEY, LaunchContext};
use crate::outcome::OutcomeClient;
use crate::session::SessionStore;
use crate::verifier::{LaunchRequest, SignatureVerifier};

/// How a protected endpoint may be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// A trusted session or a fresh signed launch.
    Any,
    /// Only an existing trusted session.
    Session,
    /// Only a fresh signed launch.
    Initial,
}

impl AccessMode {
    /// Interprets a declared mode; `None` means omitted or unknown.
    #[must_use]
    pub fn from_declared(declared: Option<&str>) -> Option<Self> {
        declared.and_then(|d| d.parse().ok())
    }

    /// Declared name of the mode.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Session => "session",
            Self::Initial => "initial",
        }
    }
}

impl FromStr for AccessMode {
    type Err = LtiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any" => Ok(Self::Any),
            "session" => Ok(Self::Session),
            "initial" => Ok(Self::Initial),
            _ => Err(LtiError::UnknownRequestType),
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides whether a request may reach a protected handler.
///
/// Stateless apart from its collaborators; share it with `Arc`.
#[derive(Clone)]
pub struct AccessGuard {
    verifier: SignatureVerifier,
    store: Arc<dyn SessionStore>,
    outcome: Arc<OutcomeClient>,
}

impl AccessGuard {
    /// Creates a guard.
    pub fn new(
        verifier: SignatureVerifier,
        store: Arc<dyn SessionStore>,
        outcome: Arc<OutcomeClient>,
    ) -> Self {
        Self {
            verifier,
            store,
            outcome,
        }
    }

    /// Session store used by the guard.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Authorizes a request.
    ///
    /// `session_id` is the id presented by the client, if any. On success
    /// the returned [`Lti`] carries the session id the client must use from
    /// now on; a signed launch always issues a new one.
    ///
    /// # Errors
    ///
    /// See the module documentation for the failure of each mode.
    /// [`LtiError::Storage`] is returned as-is whatever the mode.
    pub async fn authorize(
        &self,
        mode: Option<AccessMode>,
        session_id: Option<&str>,
        request: &LaunchRequest,
    ) -> LtiResult<Lti> {
        let Some(mode) = mode else {
            return Err(LtiError::UnknownRequestType);
        };

        match mode {
            AccessMode::Session => self
                .from_session(session_id)
                .await?
                .ok_or(LtiError::SessionUnavailable),
            AccessMode::Initial => self.from_launch(session_id, request).await,
            AccessMode::Any => {
                if let Some(lti) = self.from_session(session_id).await? {
                    return Ok(lti);
                }
                match self.from_launch(session_id, request).await {
                    Ok(lti) => Ok(lti),
                    Err(e) if e.is_server_error() => Err(e),
                    Err(e) => {
                        tracing::debug!(detail = %e.detail(), "Neither session nor launch accepted");
                        Err(LtiError::NoValidCredentials)
                    }
                }
            }
        }
    }

    async fn from_session(&self, session_id: Option<&str>) -> LtiResult<Option<Lti>> {
        let Some(id) = session_id else {
            return Ok(None);
        };
        let Some(attributes) = self.store.get(id).await? else {
            return Ok(None);
        };

        match LaunchContext::from_attributes(&attributes) {
            Some(context) if context.is_trusted => {
                tracing::debug!(consumer_key = %context.consumer_key, "Trusted session accepted");
                Ok(Some(self.handle(context, id.to_string())))
            }
            _ => Ok(None),
        }
    }

    async fn from_launch(&self, session_id: Option<&str>, request: &LaunchRequest) -> LtiResult<Lti> {
        if !request.has_oauth_params() {
            return Err(LtiError::NoValidCredentials);
        }

        let consumer = match self.verifier.verify(request) {
            Ok(consumer) => consumer,
            Err(e) => {
                if let Some(id) = session_id {
                    revoke(self.store.as_ref(), id).await?;
                }
                return Err(e);
            }
        };

        let context = LaunchContext::from_request(request, &consumer.key);
        let new_id = uuid::Uuid::new_v4().to_string();
        self.store.set(&new_id, context.to_attributes()).await?;
        if let Some(old_id) = session_id {
            self.store.delete(old_id).await?;
        }

        tracing::info!(
            consumer_key = %context.consumer_key,
            user_id = context.user_id.as_deref().unwrap_or(""),
            resource_link_id = context.resource_link_id.as_deref().unwrap_or(""),
            "LTI launch accepted"
        );

        Ok(self.handle(context, new_id))
    }

    fn handle(&self, context: LaunchContext, session_id: String) -> Lti {
        Lti {
            context: Arc::new(context),
            session_id,
            store: Arc::clone(&self.store),
            outcome: Arc::clone(&self.outcome),
        }
    }
}

/// Marks a stored session untrusted, keeping its other attributes.
async fn revoke(store: &dyn SessionStore, id: &str) -> LtiResult<()> {
    if let Some(mut attributes) = store.get(id).await? {
        attributes.insert(LTI_SESSION_KEY.to_string(), serde_json::Value::Bool(false));
        store.set(id, attributes).await?;
    }
    Ok(())
}

/// An authorized LTI request, handed to the protected handler.
///
/// The launch context is read-only; the handle can close the session or
/// post a grade for it.
#[derive(Clone)]
pub struct Lti {
    context: Arc<LaunchContext>,
    session_id: String,
    store: Arc<dyn SessionStore>,
    outcome: Arc<OutcomeClient>,
}

impl Lti {
    /// The trusted launch context.
    #[must_use]
    pub fn context(&self) -> &LaunchContext {
        &self.context
    }

    /// Id of the session this request is bound to.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Ends trust in this session.
    ///
    /// Later `session` requests with the same id fail with
    /// `SessionUnavailable` until a new signed launch.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn close(&self) -> LtiResult<()> {
        revoke(self.store.as_ref(), &self.session_id).await?;
        tracing::debug!(consumer_key = %self.context.consumer_key, "LTI session closed");
        Ok(())
    }

    /// Posts `grade` (0.0 to 1.0) to the consumer's outcome service.
    ///
    /// Returns `false` on any failure; see [`OutcomeClient::post_grade`].
    pub async fn post_grade(&self, grade: f64) -> bool {
        self.outcome.post_grade(&self.context, grade).await
    }
}

impl fmt::Debug for Lti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lti")
            .field("context", &self.context)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}
