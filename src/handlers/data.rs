use super::AppState;
use crate::gateway::{self, HttpRange};
use crate::{Error, Result, types::Format};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};

/// Serve raw data bytes - this is what the ticket URLs point to
pub async fn get_data(
    State(state): State<AppState>,
    Path((format_str, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response> {
    let format: Format = format_str
        .parse()
        .map_err(|_| Error::InvalidInput(format!("unknown format path: {}", format_str)))?;

    let file = state.storage.locate(&id, format).await?;

    // unparseable or multi-range headers fall back to the whole file
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(HttpRange::parse);

    let transfer = gateway::serve(state.storage.as_ref(), &file, range).await?;

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, format.content_type())
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, transfer.range.len());

    builder = if transfer.partial {
        builder.status(StatusCode::PARTIAL_CONTENT).header(
            header::CONTENT_RANGE,
            format!(
                "bytes {}-{}/{}",
                transfer.range.start,
                transfer.range.end - 1,
                transfer.total
            ),
        )
    } else {
        builder.status(StatusCode::OK)
    };

    builder
        .body(Body::from_stream(transfer.body))
        .map_err(|e| Error::Internal(format!("failed to build response: {}", e)))
}
