//! Application state shared across handlers.

use crate::tickets::TicketStore;
use imageio_core::config::AppConfig;
use std::sync::Arc;

/// Shared application state.
///
/// Both the images service and the control service hold clones of the same
/// state, so tickets registered through the control socket are immediately
/// visible to image requests.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Active tickets.
    pub tickets: Arc<TicketStore>,
}

impl AppState {
    /// Create a new application state with an empty ticket store.
    ///
    /// Configuration is validated by the caller; see [`AppConfig::validate`].
    pub fn new(config: AppConfig) -> Self {
        Self::with_tickets(config, Arc::new(TicketStore::new()))
    }

    /// Create a new application state around an existing ticket store.
    pub fn with_tickets(config: AppConfig, tickets: Arc<TicketStore>) -> Self {
        Self {
            config: Arc::new(config),
            tickets,
        }
    }

    /// Address reported to clients by capability discovery.
    pub fn local_address(&self) -> String {
        self.config.local.socket.display().to_string()
    }
}
