//! Control API: ticket management.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use imageio_core::{Error as CoreError, Ticket, TicketInfo, TicketRequest};
use serde::Deserialize;
use time::OffsetDateTime;

/// Request body for extending a ticket.
#[derive(Debug, Deserialize)]
pub struct ExtendRequest {
    /// New timeout in seconds, counted from now.
    pub timeout: u64,
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))
}

/// PUT /tickets/{ticket_id}
#[tracing::instrument(skip(state, body))]
pub async fn put_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let request: TicketRequest = parse_body(&body)?;

    if request.uuid != ticket_id {
        return Err(ApiError::BadRequest(format!(
            "ticket uuid {:?} does not match path {ticket_id:?}",
            request.uuid
        )));
    }

    let ticket = Ticket::from_request(
        request,
        OffsetDateTime::now_utc(),
        state.config.tickets.max_timeout_secs,
    )?;
    state.tickets.add(ticket);

    Ok(StatusCode::OK)
}

/// GET /tickets/{ticket_id}
pub async fn get_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> ApiResult<Json<TicketInfo>> {
    let ticket = state
        .tickets
        .get_any(&ticket_id)
        .ok_or_else(|| ApiError::NotFound(format!("ticket {ticket_id}")))?;
    Ok(Json(ticket.info()))
}

/// PATCH /tickets/{ticket_id}
///
/// Expired tickets can be extended until they are deleted.
#[tracing::instrument(skip(state, body))]
pub async fn extend_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let request: ExtendRequest = parse_body(&body)?;

    let max = state.config.tickets.max_timeout_secs;
    if request.timeout > max {
        return Err(CoreError::TimeoutTooLarge {
            timeout: request.timeout,
            max,
        }
        .into());
    }

    let ticket = state
        .tickets
        .get_any(&ticket_id)
        .ok_or_else(|| ApiError::NotFound(format!("ticket {ticket_id}")))?;
    ticket.extend(OffsetDateTime::now_utc(), request.timeout);
    tracing::info!(ticket_id = %ticket_id, timeout = request.timeout, "Ticket extended");

    Ok(StatusCode::OK)
}

/// DELETE /tickets/{ticket_id}
pub async fn delete_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> StatusCode {
    state.tickets.remove(&ticket_id);
    StatusCode::NO_CONTENT
}

/// DELETE /tickets/
pub async fn clear_tickets(State(state): State<AppState>) -> StatusCode {
    state.tickets.clear();
    StatusCode::NO_CONTENT
}
