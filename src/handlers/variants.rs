use super::{AppState, tickets};
use crate::{
    Error, Result, query,
    types::{Endpoint, TicketParams, TicketPostBody},
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};

pub async fn get_variants(
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: std::result::Result<Query<TicketParams>, QueryRejection>,
) -> Result<tickets::Ticket> {
    let Query(params) = params.map_err(|e| Error::InvalidInput(e.body_text()))?;
    let query = query::validate(Endpoint::Variants, &params)?;
    tickets::issue(&state, &id, query).await
}

pub async fn post_variants(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: std::result::Result<Json<TicketPostBody>, JsonRejection>,
) -> Result<tickets::Ticket> {
    let Json(body) = body.map_err(|e| Error::InvalidInput(e.body_text()))?;
    let query = query::validate_post(Endpoint::Variants, &body)?;
    tickets::issue(&state, &id, query).await
}
