//! Route configuration.

use crate::error::ApiError;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::http::Method;
use axum::routing::{any, delete, get};
use tower_http::trace::TraceLayer;

/// Methods served under `/images`, as reported in `Allow` headers.
pub const ALLOWED_METHODS: &str = "OPTIONS,GET,PUT,PATCH";

/// A routed images request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRoute {
    /// OPTIONS: capability discovery, independent of any ticket.
    Discover,
    /// GET: read image data.
    Read { ticket_id: String },
    /// PUT: write image data.
    Write { ticket_id: String },
    /// PATCH: zero or flush, selected by the JSON body.
    Patch { ticket_id: String },
}

/// Routing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("no such resource: {0}")]
    NotFound(String),

    #[error("ticket id is required")]
    MissingTicketId,

    #[error("method {0} not allowed")]
    MethodNotAllowed(String),
}

impl From<RouteError> for ApiError {
    fn from(err: RouteError) -> Self {
        let message = err.to_string();
        match err {
            RouteError::NotFound(path) => ApiError::NotFound(path),
            RouteError::MissingTicketId => ApiError::BadRequest(message),
            RouteError::MethodNotAllowed(method) => ApiError::MethodNotAllowed(method),
        }
    }
}

impl ImageRoute {
    /// Route a request under `/images`.
    ///
    /// `ticket_id` is the first segment after `/images/` and `sub_path` is
    /// whatever follows it. The method is checked first, so unsupported
    /// methods never reach the ticket store.
    pub fn resolve(
        method: &Method,
        ticket_id: Option<&str>,
        sub_path: Option<&str>,
    ) -> Result<Self, RouteError> {
        let method = match *method {
            Method::OPTIONS => return Ok(Self::Discover),
            Method::GET | Method::PUT | Method::PATCH => method.clone(),
            _ => return Err(RouteError::MethodNotAllowed(method.to_string())),
        };

        let ticket_id = match ticket_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(RouteError::MissingTicketId),
        };

        if let Some(sub_path) = sub_path
            && !sub_path.is_empty()
        {
            return Err(RouteError::NotFound(format!("/images/{ticket_id}/{sub_path}")));
        }

        Ok(match method {
            Method::GET => Self::Read { ticket_id },
            Method::PUT => Self::Write { ticket_id },
            _ => Self::Patch { ticket_id },
        })
    }
}

/// Create the images router served on the local socket.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/images", any(handlers::images_root))
        .route("/images/", any(handlers::images_root))
        .route("/images/{ticket_id}", any(handlers::images_ticket))
        .route("/images/{ticket_id}/{*sub_path}", any(handlers::images_sub_path))
        .fallback(handlers::images_fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Create the control router served on the control socket.
pub fn create_control_router(state: AppState) -> Router {
    Router::new()
        .route("/tickets", delete(handlers::clear_tickets))
        .route("/tickets/", delete(handlers::clear_tickets))
        .route(
            "/tickets/{ticket_id}",
            get(handlers::get_ticket)
                .put(handlers::put_ticket)
                .patch(handlers::extend_ticket)
                .delete(handlers::delete_ticket),
        )
        .route("/metrics", get(metrics_handler))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
