//! HTTP surface: ticket endpoints, the data route and service info.

mod data;
mod reads;
mod service_info;
mod tickets;
mod variants;

pub use data::get_data;
pub use reads::{get_reads, post_reads};
pub use service_info::{reads_service_info, service_info, variants_service_info};
pub use tickets::{TICKET_CONTENT_TYPE, Ticket, accept_middleware, accepts_ticket};
pub use variants::{get_variants, post_variants};

use crate::auth::{AuthConfig, auth_middleware};
use crate::index::IndexProvider;
use crate::planner::PlanOptions;
use crate::storage::Storage;
use crate::ticket::UrlResolver;
use axum::{Router, middleware, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub indexes: Arc<IndexProvider>,
    pub resolver: Arc<dyn UrlResolver>,
    /// Merge gap and block size for planned ranges.
    pub planning: PlanOptions,
}

/// All routes, behind the auth middleware.
pub fn create_router(state: AppState, auth: Arc<AuthConfig>) -> Router {
    // htsget ticket endpoints
    let tickets = Router::new()
        .route("/reads/:id", get(get_reads).post(post_reads))
        .route("/variants/:id", get(get_variants).post(post_variants))
        .route_layer(middleware::from_fn(accept_middleware));

    Router::new()
        .merge(tickets)
        .route("/reads/service-info", get(reads_service_info))
        .route("/variants/service-info", get(variants_service_info))
        // Data serving endpoint (ticket URLs point here)
        .route("/data/:format/:id", get(get_data))
        // Service info
        .route("/", get(service_info))
        .route("/service-info", get(service_info))
        .layer(middleware::from_fn_with_state(auth, auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
