//! HTTP request handlers.

pub mod capabilities;
pub mod images;
pub mod tickets;

pub use capabilities::*;
pub use images::*;
pub use tickets::*;

use crate::error::ApiError;
use axum::http::Uri;

/// Fallback for paths outside the served API.
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
