//! LTI consumer, signature, session and outcome configuration.
//!
//! The configuration is loaded once at process start and never mutated
//! afterwards. Components receive the pieces they need by reference or `Arc`.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::url_fix::UrlFixupTable;

/// Root LTI configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [lti]
/// public_base_url = "https://tool.example.com"
///
/// [lti.consumers.__consumer_key__]
/// secret = "__lti_secret__"
///
/// [lti.url_fix."https://localhost:8000/"]
/// "https://localhost:8000/" = "http://localhost:8000/"
///
/// [lti.outcome]
/// request_timeout = "10s"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LtiConfig {
    /// Registered consumers, keyed by consumer key.
    pub consumers: HashMap<String, ConsumerConfig>,

    /// Outcome-service URL rewrites.
    pub url_fix: UrlFixupTable,

    /// Externally visible scheme and authority of this tool, e.g.
    /// `https://tool.example.com`. Consumers sign the URL they see, so this
    /// must be set when the server runs behind a proxy. When absent the
    /// `Host` header is used.
    pub public_base_url: Option<String>,

    /// Inbound signature checks.
    pub oauth: OAuthConfig,

    /// Outbound grade posting.
    pub outcome: OutcomeConfig,

    /// Session cookie settings.
    pub session: SessionConfig,
}

/// A single consumer entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsumerConfig {
    /// Shared secret used to sign launches and outcome posts.
    pub secret: String,
}

/// Inbound OAuth1 verification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Maximum distance between `oauth_timestamp` and the server clock.
    #[serde(with = "humantime_serde")]
    pub timestamp_skew: Duration,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            timestamp_skew: Duration::from_secs(300),
        }
    }
}

/// Outcome service client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutcomeConfig {
    /// Upper bound for a single grade POST, connect included.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for OutcomeConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Session cookie settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the cookie carrying the session id.
    pub cookie_name: String,

    /// Mark the cookie `Secure; SameSite=None`.
    /// LTI tools are usually framed by the consumer, which requires both.
    pub cross_site: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "lti_session".to_string(),
            cross_site: false,
        }
    }
}

impl LtiConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for empty consumer keys or secrets, an unparsable
    /// `public_base_url`, a zero outcome timeout, or an empty cookie name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, consumer) in &self.consumers {
            if key.trim().is_empty() {
                return Err(ConfigError::invalid_consumer("consumer key must not be empty"));
            }
            if consumer.secret.is_empty() {
                return Err(ConfigError::invalid_consumer(format!(
                    "consumer '{key}' has an empty secret"
                )));
            }
        }

        if let Some(base) = &self.public_base_url {
            url::Url::parse(base).map_err(|e| {
                ConfigError::invalid_value("public_base_url", format!("{base}: {e}"))
            })?;
        }

        if self.outcome.request_timeout.is_zero() {
            return Err(ConfigError::invalid_value(
                "outcome.request_timeout",
                "must be > 0",
            ));
        }

        if self.session.cookie_name.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "session.cookie_name",
                "must not be empty",
            ));
        }

        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A consumer entry is malformed.
    #[error("Invalid consumer: {0}")]
    InvalidConsumer(String),

    /// A setting has an invalid value.
    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        /// Dotted path of the offending setting.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}

impl ConfigError {
    /// Creates a new `InvalidConsumer` error.
    #[must_use]
    pub fn invalid_consumer(message: impl Into<String>) -> Self {
        Self::InvalidConsumer(message.into())
    }

    /// Creates a new `InvalidValue` error.
    #[must_use]
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}
