//! Capability discovery (OPTIONS on `/images`).

use crate::routes::ALLOWED_METHODS;
use crate::state::AppState;
use axum::Json;
use axum::http::StatusCode;
use axum::http::header::ALLOW;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Optional operations supported by this daemon.
pub const FEATURES: &[&str] = &["zero", "flush"];

/// Capabilities response.
#[derive(Debug, Serialize)]
pub struct CapabilitiesResponse {
    /// Optional PATCH operations.
    pub features: &'static [&'static str],
    /// Local socket address for clients that can use it.
    pub unix_socket: String,
}

/// OPTIONS /images/*
///
/// Answered for any ticket id, or none, without consulting the ticket store.
pub fn options(state: &AppState) -> Response {
    (
        StatusCode::OK,
        [(ALLOW, ALLOWED_METHODS)],
        Json(CapabilitiesResponse {
            features: FEATURES,
            unix_socket: state.local_address(),
        }),
    )
        .into_response()
}
