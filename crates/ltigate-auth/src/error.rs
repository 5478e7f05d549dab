//! LTI launch and session error types.
//!
//! Every failure raised by the access guard or the signature verifier is an
//! [`LtiError`]. Callers distinguish failures by variant (or by
//! [`LtiError::category`]); the `Display` text is what the untrusted caller
//! gets to see, so credential failures share one generic message while
//! [`LtiError::detail`] carries the server-side explanation.

use std::fmt;

/// Caller-facing text shared by every OAuth credential failure.
pub const OAUTH_ERROR_MESSAGE: &str = "OAuth error: Please check your key and secret";

/// Errors raised while authorizing an LTI request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LtiError {
    /// The protected endpoint declared no access mode, or an unknown one.
    #[error("Unknown request type")]
    UnknownRequestType,

    /// `session` mode was requested but no trusted session exists.
    #[error("Session expired or unavailable")]
    SessionUnavailable,

    /// Neither a trusted session nor a signed launch was presented.
    #[error("This page requires a valid oauth session or request")]
    NoValidCredentials,

    /// The signed request names a consumer key that is not registered.
    #[error("OAuth error: Please check your key and secret")]
    KeyUnknown {
        /// The consumer key presented by the caller.
        key: String,
    },

    /// The signed request failed verification.
    #[error("OAuth error: Please check your key and secret")]
    SignatureInvalid {
        /// Why verification failed. Never shown to the caller.
        reason: String,
    },

    /// The session backend failed.
    #[error("Session storage error")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },
}

impl LtiError {
    /// Creates a new `KeyUnknown` error.
    #[must_use]
    pub fn key_unknown(key: impl Into<String>) -> Self {
        Self::KeyUnknown { key: key.into() }
    }

    /// Creates a new `SignatureInvalid` error.
    #[must_use]
    pub fn signature_invalid(reason: impl Into<String>) -> Self {
        Self::SignatureInvalid {
            reason: reason.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Server-side description of the failure, suitable for logs.
    ///
    /// Unlike `Display`, this tells an unknown key apart from a bad
    /// signature.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::KeyUnknown { key } => format!("unknown consumer key '{key}'"),
            Self::SignatureInvalid { reason } => format!("signature invalid: {reason}"),
            Self::Storage { message } => format!("session storage error: {message}"),
            other => other.to_string(),
        }
    }

    /// Returns the error category for logging and metrics.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownRequestType => ErrorCategory::Configuration,
            Self::SessionUnavailable => ErrorCategory::Session,
            Self::NoValidCredentials => ErrorCategory::Authentication,
            Self::KeyUnknown { .. } => ErrorCategory::Identity,
            Self::SignatureInvalid { .. } => ErrorCategory::Credentials,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
        }
    }

    /// Returns true if the failure is caused by the caller rather than by
    /// this server.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns true if the failure is a server misconfiguration or outage.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::UnknownRequestType | Self::Storage { .. })
    }

    /// Returns true for failures of a presented OAuth signature.
    #[must_use]
    pub fn is_oauth_error(&self) -> bool {
        matches!(self, Self::KeyUnknown { .. } | Self::SignatureInvalid { .. })
    }
}

/// Error categories for grouping failures in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// No usable credentials at all.
    Authentication,
    /// "Who are you" failures: the consumer key is not registered.
    Identity,
    /// "Your credentials are wrong" failures.
    Credentials,
    /// Session missing or no longer trusted.
    Session,
    /// Endpoint misconfiguration.
    Configuration,
    /// Storage backend failures.
    Infrastructure,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Identity => write!(f, "identity"),
            Self::Credentials => write!(f, "credentials"),
            Self::Session => write!(f, "session"),
            Self::Configuration => write!(f, "configuration"),
            Self::Infrastructure => write!(f, "infrastructure"),
        }
    }
}
