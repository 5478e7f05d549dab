//! Signing of outbound OAuth1 requests.
//!
//! The outcome client uses [`OAuthSigner`] to sign grade posts with an
//! `Authorization` header. The same signer produces query-style launch
//! parameters, which is how a consumer (or a test) builds a launch URL.

use rand::Rng;
use rand::distributions::Alphanumeric;
use url::Url;

use super::signature::{hmac_sha1_sign, signature_base_string};
use super::{HMAC_SHA1, OAUTH_SIGNATURE, OAUTH_VERSION, authorization_header};
use crate::consumer::Consumer;

/// Signs requests on behalf of one consumer.
#[derive(Debug, Clone)]
pub struct OAuthSigner {
    consumer: Consumer,
}

/// Protocol parameters of a signed request, `oauth_signature` included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedParams {
    /// All `oauth_*` parameters in signing order.
    pub oauth: Vec<(String, String)>,
}

impl SignedParams {
    /// Renders the parameters as an `Authorization` header value.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        authorization_header(&self.oauth)
    }

    /// Returns the signature value.
    #[must_use]
    pub fn signature(&self) -> Option<&str> {
        self.oauth
            .iter()
            .find(|(k, _)| k == OAUTH_SIGNATURE)
            .map(|(_, v)| v.as_str())
    }
}

impl OAuthSigner {
    /// Creates a signer for `consumer`.
    #[must_use]
    pub fn new(consumer: Consumer) -> Self {
        Self { consumer }
    }

    /// Signs a request with a fresh nonce and the current time.
    ///
    /// `params` are the non-protocol parameters carried in the query or form
    /// body. Query parameters already present in `url` are signed as well.
    #[must_use]
    pub fn sign(
        &self,
        method: &str,
        url: &Url,
        params: &[(String, String)],
        body_hash: Option<&str>,
    ) -> SignedParams {
        let timestamp = time::OffsetDateTime::now_utc().unix_timestamp();
        self.sign_with(method, url, params, body_hash, timestamp, &generate_nonce())
    }

    /// Signs a request with an explicit timestamp and nonce.
    #[must_use]
    pub fn sign_with(
        &self,
        method: &str,
        url: &Url,
        params: &[(String, String)],
        body_hash: Option<&str>,
        timestamp: i64,
        nonce: &str,
    ) -> SignedParams {
        let mut oauth = vec![
            ("oauth_consumer_key".to_string(), self.consumer.key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), HMAC_SHA1.to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
        ];
        if let Some(hash) = body_hash {
            oauth.push(("oauth_body_hash".to_string(), hash.to_string()));
        }

        let mut all: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        all.extend(params.iter().cloned());
        all.extend(oauth.iter().cloned());

        let base = signature_base_string(method, url, &all);
        let signature = hmac_sha1_sign(&base, &self.consumer.secret, "");
        oauth.push((OAUTH_SIGNATURE.to_string(), signature));

        SignedParams { oauth }
    }

    /// Builds a query-signed launch URL: `params` and the protocol
    /// parameters are appended to `url`'s query string.
    #[must_use]
    pub fn sign_url(&self, method: &str, url: &Url, params: &[(String, String)]) -> Url {
        let signed = self.sign(method, url, params, None);
        let mut out = url.clone();
        {
            let mut query = out.query_pairs_mut();
            for (k, v) in params.iter().chain(signed.oauth.iter()) {
                query.append_pair(k, v);
            }
        }
        out
    }
}

fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}
