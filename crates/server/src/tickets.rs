//! Registry of active tickets.

use imageio_core::{Ticket, TicketId};
use prometheus::IntGauge;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use time::OffsetDateTime;

/// Concurrent registry of tickets keyed by id.
///
/// A single lock guards the whole map so `clear` is atomic with respect to
/// lookups. Expiry is evaluated on lookup; there is no background sweep.
///
/// The active gauge is adjusted while the write lock is held, so it never
/// drifts from the map under concurrent updates.
#[derive(Debug)]
pub struct TicketStore {
    tickets: RwLock<HashMap<TicketId, Arc<Ticket>>>,
    active: IntGauge,
}

impl Default for TicketStore {
    fn default() -> Self {
        Self::with_gauge(crate::metrics::TICKETS_ACTIVE.clone())
    }
}

impl TicketStore {
    /// Create an empty store reporting to the global tickets gauge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store reporting its size to `active`.
    pub fn with_gauge(active: IntGauge) -> Self {
        Self {
            tickets: RwLock::default(),
            active,
        }
    }

    /// Insert a ticket, replacing any ticket with the same id.
    pub fn add(&self, ticket: Ticket) {
        let id = ticket.id().clone();
        let previous = {
            let mut tickets = self.tickets.write().unwrap_or_else(PoisonError::into_inner);
            let previous = tickets.insert(id.clone(), Arc::new(ticket));
            if previous.is_none() {
                self.active.inc();
            }
            previous
        };

        if previous.is_some() {
            tracing::info!(ticket_id = %id, "Ticket replaced");
        } else {
            tracing::info!(ticket_id = %id, "Ticket added");
        }
    }

    /// Remove a ticket. Removing an unknown id is a no-op.
    pub fn remove(&self, id: &str) {
        let removed = {
            let mut tickets = self.tickets.write().unwrap_or_else(PoisonError::into_inner);
            let removed = tickets.remove(id);
            if removed.is_some() {
                self.active.dec();
            }
            removed
        };

        if removed.is_some() {
            tracing::info!(ticket_id = %id, "Ticket removed");
        }
    }

    /// Remove every ticket.
    pub fn clear(&self) {
        let count = {
            let mut tickets = self.tickets.write().unwrap_or_else(PoisonError::into_inner);
            let count = tickets.len();
            tickets.clear();
            self.active.sub(count as i64);
            count
        };
        tracing::info!(count, "Tickets cleared");
    }

    /// Look up a live ticket.
    ///
    /// Expired tickets are reported exactly like absent ones.
    pub fn get(&self, id: &str) -> Option<Arc<Ticket>> {
        self.get_at(id, OffsetDateTime::now_utc())
    }

    /// Look up a ticket that is live at `now`.
    pub fn get_at(&self, id: &str, now: OffsetDateTime) -> Option<Arc<Ticket>> {
        let tickets = self.tickets.read().unwrap_or_else(PoisonError::into_inner);
        tickets
            .get(id)
            .filter(|ticket| !ticket.is_expired_at(now))
            .cloned()
    }

    /// Look up a ticket whether or not it has expired.
    pub fn get_any(&self, id: &str) -> Option<Arc<Ticket>> {
        self.tickets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Number of registered tickets, including expired ones not yet removed.
    pub fn len(&self) -> usize {
        self.tickets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
