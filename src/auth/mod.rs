//! Request authorization.
//!
//! Ticket endpoints ask an [`Authorizer`] whether a request may proceed.
//! Data URLs handed out in tickets can instead carry an HMAC signature, so
//! clients fetch bytes without presenting credentials again. Some paths
//! (service info) are always public.

mod middleware;
mod url_signing;

pub use middleware::auth_middleware;
pub use url_signing::{UrlSigner, parse_signature};

use axum::extract::Request;
use axum::http::header::AUTHORIZATION;
use std::collections::HashSet;
use std::sync::Arc;

/// Decides whether a request may reach a protected endpoint.
pub trait Authorizer: Send + Sync {
    fn is_authorized(&self, request: &Request) -> bool;
}

/// Lets every request through.
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn is_authorized(&self, _request: &Request) -> bool {
        true
    }
}

/// Accepts `Authorization: Bearer <token>` for any configured token.
pub struct BearerTokens {
    tokens: HashSet<String>,
}

impl BearerTokens {
    pub fn new(tokens: impl IntoIterator<Item = String>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }
}

impl Authorizer for BearerTokens {
    fn is_authorized(&self, request: &Request) -> bool {
        request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| self.tokens.contains(token.trim()))
    }
}

/// Authentication configuration.
#[derive(Clone)]
pub struct AuthConfig {
    pub authorizer: Arc<dyn Authorizer>,
    /// Paths that don't require authorization.
    pub public_paths: HashSet<String>,
    /// When set, `/data/` requests must carry a valid signature.
    pub url_signer: Option<UrlSigner>,
}

impl AuthConfig {
    pub fn new(authorizer: Arc<dyn Authorizer>, url_signer: Option<UrlSigner>) -> Self {
        Self {
            authorizer,
            public_paths: default_public_paths(),
            url_signer,
        }
    }

    /// No checks at all.
    pub fn open() -> Self {
        Self::new(Arc::new(AllowAll), None)
    }

    /// Check if a path is public (doesn't require auth).
    pub fn is_public_path(&self, path: &str) -> bool {
        if self.public_paths.contains(path) {
            return true;
        }

        // Prefix match (for paths like "/api/" that should match "/api/foo")
        self.public_paths.iter().any(|p| {
            // root only matches exactly
            if p == "/" {
                return false;
            }

            if p.ends_with('/') {
                path.starts_with(p)
            } else {
                path.starts_with(&format!("{}/", p))
            }
        })
    }
}

fn default_public_paths() -> HashSet<String> {
    ["/", "/service-info", "/reads/service-info", "/variants/service-info"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(auth: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/reads/x");
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_is_public_path_exact() {
        let config = AuthConfig::open();

        assert!(config.is_public_path("/"));
        assert!(config.is_public_path("/service-info"));
        assert!(config.is_public_path("/reads/service-info"));
        assert!(!config.is_public_path("/reads/sample1"));
        assert!(!config.is_public_path("/variants/sample1"));
    }

    #[test]
    fn test_bearer_tokens() {
        let authorizer = BearerTokens::new(["s3cret".to_string()]);

        assert!(authorizer.is_authorized(&request(Some("Bearer s3cret"))));
        assert!(!authorizer.is_authorized(&request(Some("Bearer nope"))));
        assert!(!authorizer.is_authorized(&request(Some("Basic s3cret"))));
        assert!(!authorizer.is_authorized(&request(None)));
    }
}
