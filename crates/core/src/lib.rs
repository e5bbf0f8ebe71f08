//! Core domain types shared by the image I/O daemon.
//!
//! This crate defines the data model used across the other crates:
//! - Tickets, ticket ids and permitted operations
//! - Ticket requests and status documents exchanged with the control plane
//! - Daemon configuration

pub mod config;
pub mod error;
pub mod ticket;

pub use error::{Error, Result};
pub use ticket::{Ticket, TicketId, TicketInfo, TicketOp, TicketRequest};

/// Default I/O buffer size: 1 MiB
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Minimum I/O buffer size: 4 KiB
pub const MIN_BUFFER_SIZE: usize = 4 * 1024;

/// Maximum I/O buffer size: 64 MiB
pub const MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;
