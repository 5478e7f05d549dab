//! OAuth 1.0a request signing for LTI.
//!
//! - [`signature`] - base string construction and HMAC-SHA1
//! - [`signer`] - signing outbound requests (and test launches)
//!
//! Inbound verification lives in [`crate::verifier`].

pub mod signature;
pub mod signer;

pub use signature::{body_hash, hmac_sha1_sign, hmac_sha1_verify, signature_base_string};
pub use signer::{OAuthSigner, SignedParams};

/// Signature method supported by LTI 1.1.
pub const HMAC_SHA1: &str = "HMAC-SHA1";

/// The only OAuth version accepted.
pub const OAUTH_VERSION: &str = "1.0";

/// Prefix shared by every protocol parameter.
pub const OAUTH_PREFIX: &str = "oauth_";

/// Parameter carrying the signature itself.
pub const OAUTH_SIGNATURE: &str = "oauth_signature";

/// Parameter carrying the consumer key.
pub const OAUTH_CONSUMER_KEY: &str = "oauth_consumer_key";

/// Protocol parameters every signed request must carry.
pub const REQUIRED_PARAMS: [&str; 5] = [
    OAUTH_CONSUMER_KEY,
    OAUTH_SIGNATURE,
    "oauth_signature_method",
    "oauth_timestamp",
    "oauth_nonce",
];

/// Parses the parameters of an `Authorization: OAuth ...` header.
///
/// Returns `None` when the header does not use the OAuth scheme. The
/// `realm` parameter is dropped since it is not part of the signature.
#[must_use]
pub fn parse_authorization_header(value: &str) -> Option<Vec<(String, String)>> {
    let rest = value.trim();
    let (scheme, params) = rest.split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("OAuth") {
        return None;
    }

    let parsed = params
        .split(',')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let value = value.trim().trim_matches('"');
            let name = urlencoding::decode(name.trim()).ok()?.into_owned();
            let value = urlencoding::decode(value).ok()?.into_owned();
            Some((name, value))
        })
        .filter(|(name, _)| name != "realm")
        .collect();

    Some(parsed)
}

/// Renders protocol parameters as an `Authorization` header value.
#[must_use]
pub fn authorization_header(params: &[(String, String)]) -> String {
    let rendered = params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", signature::encode(k), signature::encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth realm=\"\", {rendered}")
}
