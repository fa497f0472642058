use super::AppState;
use crate::query::Query;
use crate::types::HtsgetResponse;
use crate::{Error, Result, planner, ticket};
use axum::{
    Json,
    extract::Request,
    http::{HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Media type of a successful ticket response.
pub const TICKET_CONTENT_TYPE: &str = "application/vnd.ga4gh.htsget.v1.3.0+json; charset=utf-8";

/// Highest htsget protocol major version this server speaks.
const PROTOCOL_MAJOR: &str = "1";

/// A ticket served with the htsget media type.
pub struct Ticket(pub HtsgetResponse);

impl IntoResponse for Ticket {
    fn into_response(self) -> Response {
        (
            [(header::CONTENT_TYPE, HeaderValue::from_static(TICKET_CONTENT_TYPE))],
            Json(self.0),
        )
            .into_response()
    }
}

/// Locate, index, plan and assemble. Validation has already happened.
pub(super) async fn issue(state: &AppState, id: &str, query: Query) -> Result<Ticket> {
    let file = state.storage.locate(id, query.format).await?;
    let index = state.indexes.get_index(&file).await?;
    let segments = planner::plan(&query, &index, state.planning)?;

    tracing::debug!(id, format = %query.format, segments = segments.len(), "issuing ticket");
    Ok(Ticket(ticket::build(&file, &segments, state.resolver.as_ref())))
}

/// Reject ticket requests whose `Accept` header rules out a JSON ticket.
pub async fn accept_middleware(request: Request, next: Next) -> Response {
    if let Some(value) = request.headers().get(header::ACCEPT) {
        let accepted = value.to_str().map(accepts_ticket).unwrap_or(false);
        if !accepted {
            tracing::debug!(accept = ?value, "unacceptable media type");
            let accept = String::from_utf8_lossy(value.as_bytes()).into_owned();
            return Error::UnsupportedMediaType(accept).into_response();
        }
    }
    next.run(request).await
}

/// Whether any media range in an `Accept` header admits the ticket JSON.
pub fn accepts_ticket(accept: &str) -> bool {
    if accept.trim().is_empty() {
        return true;
    }
    accept.split(',').any(|range| {
        let media = range.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        match media.as_str() {
            "*/*" | "application/*" | "application/json" => true,
            other => other
                .strip_prefix("application/vnd.ga4gh.htsget.v")
                .and_then(|rest| rest.strip_suffix("+json"))
                .is_some_and(is_supported_version),
        }
    })
}

fn is_supported_version(version: &str) -> bool {
    let mut parts = version.split('.');
    parts.next() == Some(PROTOCOL_MAJOR) && parts.all(|p| !p.is_empty() && p.parse::<u32>().is_ok())
}
