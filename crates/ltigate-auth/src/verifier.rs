//! Verification of signed LTI launch requests.
//!
//! # Flow
//!
//! 1. Collect every query, form-body and `Authorization` header parameter
//! 2. Check the required protocol parameters are present exactly once
//! 3. Check signature method and version
//! 4. Look up the consumer key (`KeyUnknown` if absent)
//! 5. Check the timestamp is inside the skew window
//! 6. Recompute the HMAC-SHA1 signature and compare in constant time
//!
//! Verification is all-or-nothing: a single added or altered parameter
//! changes the base string and fails the whole request.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::consumer::{Consumer, ConsumerRegistry};
use crate::error::LtiError;
use crate::oauth1::{
    HMAC_SHA1, OAUTH_CONSUMER_KEY, OAUTH_PREFIX, OAUTH_SIGNATURE, OAUTH_VERSION, REQUIRED_PARAMS,
    hmac_sha1_verify, parse_authorization_header, signature_base_string,
};

/// An inbound request as seen by the verifier.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    method: String,
    url: Url,
    form: Vec<(String, String)>,
    header: Vec<(String, String)>,
}

impl LaunchRequest {
    /// Creates a request from its method and full URL (query included).
    #[must_use]
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self {
            method: method.into(),
            url,
            form: Vec::new(),
            header: Vec::new(),
        }
    }

    /// Adds `application/x-www-form-urlencoded` body parameters.
    #[must_use]
    pub fn with_form_params(mut self, form: Vec<(String, String)>) -> Self {
        self.form = form;
        self
    }

    /// Adds the parameters of an `Authorization: OAuth ...` header.
    /// Other schemes are ignored.
    #[must_use]
    pub fn with_authorization_header(mut self, value: &str) -> Self {
        if let Some(params) = parse_authorization_header(value) {
            self.header = params;
        }
        self
    }

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Full request URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// All parameters: query, then form body, then header.
    #[must_use]
    pub fn params(&self) -> Vec<(String, String)> {
        self.url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .chain(self.form.iter().cloned())
            .chain(self.header.iter().cloned())
            .collect()
    }

    /// First value of a parameter from any source.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<String> {
        self.params()
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Returns true if any `oauth_*` parameter is present.
    #[must_use]
    pub fn has_oauth_params(&self) -> bool {
        self.params().iter().any(|(k, _)| k.starts_with(OAUTH_PREFIX))
    }
}

/// Validates signed launches against a [`ConsumerRegistry`].
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    registry: Arc<ConsumerRegistry>,
    timestamp_skew: Duration,
}

impl SignatureVerifier {
    /// Creates a verifier accepting timestamps within `timestamp_skew` of
    /// the local clock.
    #[must_use]
    pub fn new(registry: Arc<ConsumerRegistry>, timestamp_skew: Duration) -> Self {
        Self {
            registry,
            timestamp_skew,
        }
    }

    /// Registry the verifier consults.
    #[must_use]
    pub fn registry(&self) -> &Arc<ConsumerRegistry> {
        &self.registry
    }

    /// Verifies a request against the current clock.
    ///
    /// # Errors
    ///
    /// [`LtiError::KeyUnknown`] when the consumer key is not registered,
    /// [`LtiError::SignatureInvalid`] for every other failure.
    pub fn verify(&self, request: &LaunchRequest) -> Result<Consumer, LtiError> {
        self.verify_at(request, time::OffsetDateTime::now_utc().unix_timestamp())
    }

    /// Verifies a request as of `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// See [`SignatureVerifier::verify`].
    pub fn verify_at(&self, request: &LaunchRequest, now: i64) -> Result<Consumer, LtiError> {
        let params = request.params();

        for name in REQUIRED_PARAMS {
            match params.iter().filter(|(k, _)| k == name).count() {
                0 => {
                    return Err(LtiError::signature_invalid(format!(
                        "missing parameter {name}"
                    )));
                }
                1 => {}
                _ => {
                    return Err(LtiError::signature_invalid(format!(
                        "duplicate parameter {name}"
                    )));
                }
            }
        }

        let get = |name: &str| {
            params
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };

        let method = get("oauth_signature_method").unwrap_or_default();
        if method != HMAC_SHA1 {
            return Err(LtiError::signature_invalid(format!(
                "unsupported signature method '{method}'"
            )));
        }
        if let Some(version) = get("oauth_version")
            && version != OAUTH_VERSION
        {
            return Err(LtiError::signature_invalid(format!(
                "unsupported oauth version '{version}'"
            )));
        }

        let key = get(OAUTH_CONSUMER_KEY).unwrap_or_default();
        let consumer = self.registry.lookup(key)?;

        let timestamp: i64 = get("oauth_timestamp")
            .unwrap_or_default()
            .parse()
            .map_err(|_| LtiError::signature_invalid("malformed oauth_timestamp"))?;
        let skew = self.timestamp_skew.as_secs();
        if now.abs_diff(timestamp) > skew {
            return Err(LtiError::signature_invalid(format!(
                "timestamp {timestamp} outside allowed window of {skew}s"
            )));
        }

        let signature = get(OAUTH_SIGNATURE).unwrap_or_default();
        let unsigned: Vec<(String, String)> = params
            .iter()
            .filter(|(k, _)| k != OAUTH_SIGNATURE)
            .cloned()
            .collect();
        let base = signature_base_string(request.method(), request.url(), &unsigned);

        if !hmac_sha1_verify(&base, &consumer.secret, "", signature) {
            return Err(LtiError::signature_invalid("signature mismatch"));
        }

        tracing::debug!(consumer_key = %consumer.key, "OAuth signature verified");
        Ok(consumer.clone())
    }
}
