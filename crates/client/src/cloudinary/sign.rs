//! Upload request signing.
//!
//! Reproduces the asset host's signature scheme bit-exact: reserved keys and
//! empty values are dropped, remaining values are coerced to sequences and
//! joined with `,`, entries are rendered as `key=value`, sorted, joined with
//! `&`, and the digest of `to_sign + api_secret` is returned as lowercase hex.
//! Any deviation in that ordering produces a signature the host rejects.

use pagemirror_core::Error;
use sha1::{Digest, Sha1};
use sha2::Sha256;

/// Keys excluded from the signed parameter set.
///
/// Everything posted with the upload is signed except these.
pub const RESERVED_KEYS: [&str; 4] = ["file", "cloud_name", "resource_type", "api_key"];

/// Digest algorithms accepted by the asset host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

impl SignatureAlgorithm {
    /// Parse the configured algorithm name.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedAlgorithm` for anything other than
    /// `SHA-1` or `SHA-256`, so a misconfigured signer fails before any
    /// network call is made.
    pub fn parse(name: &str) -> Result<Self, Error> {
        match name {
            "SHA-1" => Ok(SignatureAlgorithm::Sha1),
            "SHA-256" => Ok(SignatureAlgorithm::Sha256),
            other => Err(Error::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// A signable parameter value: text, number, or sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    Number(i64),
    List(Vec<String>),
}

impl ParamValue {
    /// Canonical string form: sequences join their elements with `,`,
    /// scalars render as a single-element sequence would.
    pub fn string_form(&self) -> String {
        match self {
            ParamValue::Text(s) => s.clone(),
            ParamValue::Number(n) => n.to_string(),
            ParamValue::List(items) => items.join(","),
        }
    }

    /// The "present" predicate: a value participates in the signature only
    /// if its string form is non-empty.
    pub fn is_present(&self) -> bool {
        !self.string_form().is_empty()
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Number(n)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(items: Vec<String>) -> Self {
        ParamValue::List(items)
    }
}

/// Ordered request parameters, as they will be posted.
pub type SigningParams = Vec<(String, ParamValue)>;

/// Compute the request signature for an upload parameter set.
///
/// Pure: identical inputs always yield the identical digest, and insertion
/// order of `params` does not matter (the sort step neutralizes it).
pub fn sign_request(params: &[(String, ParamValue)], api_secret: &str, algorithm: SignatureAlgorithm) -> String {
    let mut rendered: Vec<String> = params
        .iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .filter(|(_, value)| value.is_present())
        .map(|(key, value)| format!("{key}={}", value.string_form()))
        .collect();
    rendered.sort();
    let to_sign = rendered.join("&");

    compute_hash(&format!("{to_sign}{api_secret}"), algorithm)
}

fn compute_hash(input: &str, algorithm: SignatureAlgorithm) -> String {
    match algorithm {
        SignatureAlgorithm::Sha1 => hex::encode(Sha1::digest(input.as_bytes())),
        SignatureAlgorithm::Sha256 => hex::encode(Sha256::digest(input.as_bytes())),
    }
}
