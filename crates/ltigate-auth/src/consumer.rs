//! Registered LTI consumers.
//!
//! A consumer is a key/secret pair shared with an LMS. The registry is built
//! once from configuration and is read-only afterwards; share it with
//! `Arc<ConsumerRegistry>`.

use std::collections::HashMap;
use std::fmt;

use crate::config::{ConfigError, LtiConfig};
use crate::error::LtiError;

/// A registered credential holder allowed to launch the tool.
#[derive(Clone, PartialEq, Eq)]
pub struct Consumer {
    /// Public consumer key (`oauth_consumer_key`).
    pub key: String,
    /// Shared secret.
    pub secret: String,
}

impl Consumer {
    /// Creates a new consumer.
    #[must_use]
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Immutable map from consumer key to [`Consumer`].
#[derive(Debug, Clone, Default)]
pub struct ConsumerRegistry {
    consumers: HashMap<String, Consumer>,
}

impl ConsumerRegistry {
    /// Builds a registry from consumers.
    ///
    /// # Errors
    ///
    /// Fails on empty keys or secrets and on duplicate keys.
    pub fn new(consumers: impl IntoIterator<Item = Consumer>) -> Result<Self, ConfigError> {
        let mut map = HashMap::new();
        for consumer in consumers {
            if consumer.key.trim().is_empty() {
                return Err(ConfigError::invalid_consumer("consumer key must not be empty"));
            }
            if consumer.secret.is_empty() {
                return Err(ConfigError::invalid_consumer(format!(
                    "consumer '{}' has an empty secret",
                    consumer.key
                )));
            }
            if map.contains_key(&consumer.key) {
                return Err(ConfigError::invalid_consumer(format!(
                    "duplicate consumer key '{}'",
                    consumer.key
                )));
            }
            map.insert(consumer.key.clone(), consumer);
        }
        Ok(Self { consumers: map })
    }

    /// Builds a registry from the `consumers` section of the configuration.
    ///
    /// # Errors
    ///
    /// See [`ConsumerRegistry::new`].
    pub fn from_config(config: &LtiConfig) -> Result<Self, ConfigError> {
        Self::new(
            config
                .consumers
                .iter()
                .map(|(key, entry)| Consumer::new(key.clone(), entry.secret.clone())),
        )
    }

    /// Looks up a consumer by key.
    ///
    /// # Errors
    ///
    /// Returns [`LtiError::KeyUnknown`] if the key is not registered.
    pub fn lookup(&self, key: &str) -> Result<&Consumer, LtiError> {
        self.consumers
            .get(key)
            .ok_or_else(|| LtiError::key_unknown(key))
    }

    /// Number of registered consumers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    /// Returns true if no consumer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}
