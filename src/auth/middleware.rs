//! Authentication middleware.

use super::AuthConfig;
use crate::Error;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Authentication middleware.
///
/// - Public paths are allowed without authentication
/// - `/data/` paths need a valid signature when a signer is configured
/// - All other paths are put to the configured [`super::Authorizer`]
pub async fn auth_middleware(
    State(auth): State<Arc<AuthConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();

    if auth.is_public_path(path) {
        return next.run(request).await;
    }

    if path.starts_with("/data/") {
        if let Some(signer) = &auth.url_signer {
            return match signer.validate_query(path, request.uri().query()) {
                Ok(()) => next.run(request).await,
                Err(e) => e.into_response(),
            };
        }
    }

    if !auth.authorizer.is_authorized(&request) {
        tracing::debug!(path, "request not authorized");
        return Error::PermissionDenied.into_response();
    }

    next.run(request).await
}
