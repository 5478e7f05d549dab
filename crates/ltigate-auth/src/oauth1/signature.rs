//! OAuth 1.0a HMAC-SHA1 signature primitives (RFC 5849 section 3.4).
//!
//! Only the signature base string is built here; HMAC and SHA-1 come from
//! the `hmac` and `sha1` crates.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::{Digest, Sha1};
use url::Url;

type HmacSha1 = Hmac<Sha1>;

/// Percent-encodes a value per RFC 5849 section 3.6.
///
/// Everything except `ALPHA / DIGIT / "-" / "." / "_" / "~"` is encoded,
/// with uppercase hex digits.
#[must_use]
pub fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Builds the base string URI: scheme and host lowercased, default port
/// dropped, query and fragment removed.
#[must_use]
pub fn base_string_uri(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    format!(
        "{}://{}{}{}",
        url.scheme().to_ascii_lowercase(),
        host,
        port,
        url.path()
    )
}

/// Normalizes request parameters (RFC 5849 section 3.4.1.3.2).
///
/// Names and values are encoded, sorted by name then value, and joined with
/// `=` and `&`. `oauth_signature` must already be excluded.
#[must_use]
pub fn normalize_parameters(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    encoded.sort();
    encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Builds the signature base string.
///
/// `params` must hold every query, form-body and `Authorization` header
/// parameter except `oauth_signature` and `realm`.
#[must_use]
pub fn signature_base_string(method: &str, url: &Url, params: &[(String, String)]) -> String {
    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(&base_string_uri(url)),
        encode(&normalize_parameters(params))
    )
}

fn signing_key(consumer_secret: &str, token_secret: &str) -> String {
    format!("{}&{}", encode(consumer_secret), encode(token_secret))
}

fn mac_for(consumer_secret: &str, token_secret: &str) -> HmacSha1 {
    // HMAC accepts keys of any length, so this never fails.
    <HmacSha1 as Mac>::new_from_slice(signing_key(consumer_secret, token_secret).as_bytes())
        .expect("HMAC can take key of any size")
}

/// Computes the base64 HMAC-SHA1 signature of a base string.
#[must_use]
pub fn hmac_sha1_sign(base_string: &str, consumer_secret: &str, token_secret: &str) -> String {
    let mut mac = mac_for(consumer_secret, token_secret);
    mac.update(base_string.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Checks a base64 HMAC-SHA1 signature in constant time.
///
/// Malformed base64 counts as a mismatch.
#[must_use]
pub fn hmac_sha1_verify(
    base_string: &str,
    consumer_secret: &str,
    token_secret: &str,
    signature: &str,
) -> bool {
    let Ok(supplied) = STANDARD.decode(signature.trim()) else {
        return false;
    };
    let mut mac = mac_for(consumer_secret, token_secret);
    mac.update(base_string.as_bytes());
    mac.verify_slice(&supplied).is_ok()
}

/// Computes `oauth_body_hash`: base64 of the SHA-1 digest of the body.
#[must_use]
pub fn body_hash(body: &[u8]) -> String {
    STANDARD.encode(Sha1::digest(body))
}
