//! Ticket authorization.

use crate::error::ApiError;
use crate::tickets::TicketStore;
use imageio_core::{Ticket, TicketOp};
use std::fmt;
use std::sync::Arc;

/// Why a request was refused.
///
/// The distinction is kept for logs and metrics only. Every reason maps to
/// the same `ApiError::Forbidden`, so callers cannot tell which ticket ids
/// exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Denial {
    /// The id does not resolve to a live ticket (absent or expired).
    NoSuchTicket,
    /// The ticket exists but does not grant the requested operation.
    OperationNotPermitted,
    /// The requested byte range reaches past the ticket's size.
    RangeNotPermitted,
}

impl Denial {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoSuchTicket => "no_such_ticket",
            Self::OperationNotPermitted => "operation_not_permitted",
            Self::RangeNotPermitted => "range_not_permitted",
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<Denial> for ApiError {
    fn from(_: Denial) -> Self {
        ApiError::Forbidden
    }
}

/// Resolve `ticket_id` and check that it grants `op`.
pub fn authorize(store: &TicketStore, ticket_id: &str, op: TicketOp) -> Result<Arc<Ticket>, Denial> {
    let ticket = store.get(ticket_id).ok_or(Denial::NoSuchTicket)?;
    if ticket.allows(op) {
        Ok(ticket)
    } else {
        Err(Denial::OperationNotPermitted)
    }
}

/// Check that `[offset, offset + length)` lies within the ticket's size.
pub fn authorize_extent(ticket: &Ticket, offset: u64, length: u64) -> Result<(), Denial> {
    match offset.checked_add(length) {
        Some(end) if end <= ticket.size() => Ok(()),
        _ => Err(Denial::RangeNotPermitted),
    }
}

/// Authorize a request, logging and counting denials.
pub fn require(store: &TicketStore, ticket_id: &str, op: TicketOp) -> Result<Arc<Ticket>, ApiError> {
    authorize(store, ticket_id, op).map_err(|denial| deny(ticket_id, op, denial))
}

/// Authorize a ranged write against an already authorized ticket.
pub fn require_extent(ticket: &Ticket, offset: u64, length: u64) -> Result<(), ApiError> {
    authorize_extent(ticket, offset, length).map_err(|denial| {
        tracing::debug!(offset, length, size = ticket.size(), "Range outside ticket");
        deny(ticket.id().as_str(), TicketOp::Write, denial)
    })
}

fn deny(ticket_id: &str, op: TicketOp, denial: Denial) -> ApiError {
    tracing::debug!(
        ticket_id = %ticket_id,
        op = %op,
        reason = %denial,
        "Request denied"
    );
    crate::metrics::AUTH_DENIALS
        .with_label_values(&[denial.as_str()])
        .inc();
    ApiError::from(denial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use imageio_core::TicketId;
    use time::OffsetDateTime;
    use url::Url;

    fn store_with(id: &str, ops: &[TicketOp], timeout_secs: i64) -> TicketStore {
        let store = TicketStore::new();
        store.add(Ticket::new(
            TicketId::parse(id).unwrap(),
            Url::parse("file:///no/such/image").unwrap(),
            1024,
            ops.iter().copied(),
            OffsetDateTime::now_utc() + time::Duration::seconds(timeout_secs),
        ));
        store
    }

    #[test]
    fn grants_permitted_operation() {
        let store = store_with("t", &[TicketOp::Read], 300);
        let ticket = authorize(&store, "t", TicketOp::Read).unwrap();
        assert_eq!(ticket.id().as_str(), "t");
    }

    #[test]
    fn write_ticket_does_not_grant_read() {
        let store = store_with("t", &[TicketOp::Write], 300);
        assert_eq!(
            authorize(&store, "t", TicketOp::Read).unwrap_err(),
            Denial::OperationNotPermitted
        );
        assert!(authorize(&store, "t", TicketOp::Write).is_ok());
    }

    #[test]
    fn missing_ticket_is_denied() {
        let store = TicketStore::new();
        assert_eq!(
            authorize(&store, "no-ticket", TicketOp::Read).unwrap_err(),
            Denial::NoSuchTicket
        );
    }

    #[test]
    fn expired_ticket_is_missing() {
        let store = store_with("t", &[TicketOp::Read, TicketOp::Write], -1);
        assert_eq!(
            authorize(&store, "t", TicketOp::Read).unwrap_err(),
            Denial::NoSuchTicket
        );
    }

    #[test]
    fn insufficient_ops_are_denied() {
        let store = store_with("read-only", &[TicketOp::Read], 300);
        assert_eq!(
            authorize(&store, "read-only", TicketOp::Write).unwrap_err(),
            Denial::OperationNotPermitted
        );

        let store = store_with("no-ops", &[], 300);
        assert_eq!(
            authorize(&store, "no-ops", TicketOp::Read).unwrap_err(),
            Denial::OperationNotPermitted
        );
    }

    #[test]
    fn extent_is_bounded_by_ticket_size() {
        let store = store_with("t", &[TicketOp::Write], 300);
        let ticket = store.get("t").unwrap();

        assert!(authorize_extent(&ticket, 0, 1024).is_ok());
        assert!(authorize_extent(&ticket, 1000, 24).is_ok());
        assert!(authorize_extent(&ticket, 1024, 0).is_ok());
        for (offset, length) in [(0, 1025), (1024, 1), (1, u64::MAX), (u64::MAX, 1)] {
            assert_eq!(
                authorize_extent(&ticket, offset, length).unwrap_err(),
                Denial::RangeNotPermitted,
                "offset={offset} length={length}"
            );
        }
        assert!(matches!(
            require_extent(&ticket, 0, 2048),
            Err(ApiError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn denials_are_indistinguishable() {
        let store = store_with("read-only", &[TicketOp::Read], 300);

        let missing = require(&store, "missing", TicketOp::Write)
            .unwrap_err()
            .into_response();
        let forbidden = require(&store, "read-only", TicketOp::Write)
            .unwrap_err()
            .into_response();

        assert_eq!(missing.status(), forbidden.status());
        let missing = axum::body::to_bytes(missing.into_body(), usize::MAX)
            .await
            .unwrap();
        let forbidden = axum::body::to_bytes(forbidden.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(missing, forbidden);
    }
}
