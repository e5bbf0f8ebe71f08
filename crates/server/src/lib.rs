//! Image I/O daemon.
//!
//! This crate provides the HTTP surface of the daemon:
//! - Ticket-authorized GET, PUT, PATCH and OPTIONS under `/images`
//! - Ticket management and metrics on a separate control socket
//! - Unix socket services with graceful shutdown

pub mod auth;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod range;
pub mod routes;
pub mod service;
pub mod state;
pub mod tickets;

pub use error::ApiError;
pub use routes::{create_control_router, create_router};
pub use service::Service;
pub use state::AppState;
pub use tickets::TicketStore;
