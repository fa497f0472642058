//! HMAC-signed data URLs.
//!
//! Ticket URLs point at `/data/{FORMAT}/{id}`. When signing is enabled the
//! path gets `_expires` and `_sig` query parameters so a client can fetch the
//! bytes without presenting credentials again. Only the path is signed; the
//! host a client reaches the server by does not matter.

use crate::Error;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

const EXPIRES_PARAM: &str = "_expires";
const SIGNATURE_PARAM: &str = "_sig";
const SECRET_LEN: usize = 32;

#[derive(Clone)]
pub struct UrlSigner {
    key: Vec<u8>,
    lifetime: Duration,
}

impl UrlSigner {
    /// Signs with `key`; URLs stop validating `lifetime` after they are issued.
    pub fn new(key: impl Into<Vec<u8>>, lifetime: Duration) -> Self {
        Self {
            key: key.into(),
            lifetime,
        }
    }

    /// A per-process key seeded from the std hasher's random state.
    pub fn generate_secret() -> Vec<u8> {
        let state = RandomState::new();
        (0..SECRET_LEN / 8)
            .flat_map(|word| state.hash_one(word).to_le_bytes())
            .collect()
    }

    /// Append `_expires` and `_sig` to a request path.
    pub fn sign_path(&self, path: &str) -> String {
        self.sign_path_at(path, unix_now())
    }

    fn sign_path_at(&self, path: &str, now: u64) -> String {
        let expires = now.saturating_add(self.lifetime.as_secs());
        let tag = self.tag(path, expires).finalize().into_bytes();
        format!(
            "{path}?{EXPIRES_PARAM}={expires}&{SIGNATURE_PARAM}={}",
            URL_SAFE_NO_PAD.encode(tag)
        )
    }

    /// Check the `_expires`/`_sig` pair carried in `query` against `path`.
    pub fn validate_query(&self, path: &str, query: Option<&str>) -> Result<(), Error> {
        self.validate_query_at(path, query, unix_now())
    }

    fn validate_query_at(&self, path: &str, query: Option<&str>, now: u64) -> Result<(), Error> {
        let Some((expires, signature)) = query.and_then(parse_signature) else {
            tracing::debug!(path, "data URL carries no signature");
            return Err(Error::InvalidAuthentication);
        };
        if now > expires {
            tracing::debug!(path, now, expires, "signed URL expired");
            return Err(Error::InvalidAuthentication);
        }

        let presented = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| Error::InvalidAuthentication)?;
        self.tag(path, expires)
            .verify_slice(&presented)
            .map_err(|_| {
                tracing::debug!(path, "URL signature mismatch");
                Error::InvalidAuthentication
            })
    }

    fn tag(&self, path: &str, expires: u64) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
        mac.update(path.as_bytes());
        mac.update(b":");
        mac.update(expires.to_string().as_bytes());
        mac
    }
}

/// Extract `_expires` and `_sig` from a query string.
pub fn parse_signature(query: &str) -> Option<(u64, String)> {
    let mut expires = None;
    let mut signature = None;

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            EXPIRES_PARAM => expires = value.parse().ok(),
            SIGNATURE_PARAM => signature = Some(value.into_owned()),
            _ => {}
        }
    }

    Some((expires?, signature?))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000;
    const PATH: &str = "/data/BAM/NA12878";

    fn signer(key: &[u8]) -> UrlSigner {
        UrlSigner::new(key.to_vec(), Duration::from_secs(600))
    }

    #[test]
    fn signed_path_validates_until_expiry() {
        let k1 = signer(b"k1");
        let signed = k1.sign_path_at(PATH, NOW);
        let (path, query) = signed.split_once('?').unwrap();

        assert_eq!(path, PATH);
        assert!(query.starts_with("_expires=1700000600&_sig="));
        assert!(k1.validate_query_at(path, Some(query), NOW + 600).is_ok());
        assert!(matches!(
            k1.validate_query_at(path, Some(query), NOW + 601),
            Err(Error::InvalidAuthentication)
        ));
    }

    #[test]
    fn signature_is_bound_to_path_key_and_expiry() {
        let k1 = signer(b"k1");
        let signed = k1.sign_path_at(PATH, NOW);
        let query = signed.split_once('?').unwrap().1;

        assert!(k1.validate_query_at("/data/BAM/other", Some(query), NOW).is_err());
        assert!(signer(b"k2").validate_query_at(PATH, Some(query), NOW).is_err());

        let (_, sig) = parse_signature(query).unwrap();
        let extended = format!("_expires={}&_sig={sig}", NOW + 10_000);
        assert!(k1.validate_query_at(PATH, Some(&extended), NOW).is_err());
    }

    #[test]
    fn malformed_signatures_rejected() {
        let k1 = signer(b"k1");
        for query in [None, Some("_expires=99999999999"), Some("_sig=abc"), Some("_expires=99999999999&_sig=!!")] {
            assert!(k1.validate_query_at(PATH, query, NOW).is_err(), "{query:?}");
        }
    }

    #[test]
    fn parse_signature_ignores_other_params() {
        let (expires, sig) = parse_signature("start=0&_expires=42&_sig=abc%2Bdef").unwrap();
        assert_eq!(expires, 42);
        assert_eq!(sig, "abc+def");
        assert!(parse_signature("_expires=soon&_sig=abc").is_none());
    }

    #[test]
    fn generated_secrets_differ() {
        let a = UrlSigner::generate_secret();
        assert_eq!(a.len(), SECRET_LEN);
        assert_ne!(a, UrlSigner::generate_secret());
    }
}
