//! Image data endpoints (GET, PUT, PATCH under `/images`).

use crate::auth;
use crate::error::{ApiError, ApiResult};
use crate::handlers::capabilities::options;
use crate::metrics;
use crate::range::{self, Span};
use crate::routes::ImageRoute;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, Query, Request, State};
use axum::http::header::{
    ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use bytes::BytesMut;
use futures::{StreamExt, TryStreamExt};
use imageio_core::TicketOp;
use imageio_storage::{OpenMode, StorageError, read_stream};
use serde::Deserialize;

/// Maximum size of a PATCH request body (4 KiB).
const MAX_PATCH_BODY_SIZE: usize = 4 * 1024;

/// PATCH request body.
///
/// Unknown fields are ignored so clients can send options newer daemons
/// understand.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchRequest {
    /// Write `size` zero bytes at `offset`.
    Zero {
        size: u64,
        #[serde(default)]
        offset: u64,
        /// Flush the backend after zeroing.
        #[serde(default)]
        flush: bool,
    },
    /// Persist previously written data.
    Flush,
}

/// PUT query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PutParams {
    /// "y" (default) flushes before responding, "n" skips the flush.
    pub flush: Option<String>,
}

impl PutParams {
    fn flush(&self) -> ApiResult<bool> {
        match self.flush.as_deref() {
            None | Some("y") => Ok(true),
            Some("n") => Ok(false),
            Some(other) => Err(ApiError::BadRequest(format!(
                "invalid flush value {other:?}, expected \"y\" or \"n\""
            ))),
        }
    }
}

/// Any method on `/images` or `/images/`.
pub async fn images_root(State(state): State<AppState>, req: Request) -> Response {
    dispatch(state, None, None, req).await
}

/// Any method on `/images/{ticket_id}`.
pub async fn images_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
    req: Request,
) -> Response {
    dispatch(state, Some(ticket_id), None, req).await
}

/// Any method on `/images/{ticket_id}/{*sub_path}`.
pub async fn images_sub_path(
    State(state): State<AppState>,
    Path((ticket_id, sub_path)): Path<(String, String)>,
    req: Request,
) -> Response {
    dispatch(state, Some(ticket_id), Some(sub_path), req).await
}

/// Fallback of the images service.
///
/// Unsupported methods are refused with 405 on every path, before the path
/// is considered.
pub async fn images_fallback(method: Method, uri: Uri) -> ApiError {
    match method {
        Method::OPTIONS | Method::GET | Method::PUT | Method::PATCH => {
            ApiError::NotFound(uri.path().to_string())
        }
        _ => ApiError::MethodNotAllowed(method.to_string()),
    }
}

/// Route, authorize and serve one images request.
async fn dispatch(
    state: AppState,
    ticket_id: Option<String>,
    sub_path: Option<String>,
    req: Request,
) -> Response {
    let method = req.method().clone();

    let response = match ImageRoute::resolve(&method, ticket_id.as_deref(), sub_path.as_deref()) {
        Err(e) => ApiError::from(e).into_response(),
        Ok(ImageRoute::Discover) => options(&state),
        Ok(ImageRoute::Read { ticket_id }) => get_image(&state, &ticket_id, req.headers())
            .await
            .into_response(),
        Ok(ImageRoute::Write { ticket_id }) => {
            put_image(&state, &ticket_id, req).await.into_response()
        }
        Ok(ImageRoute::Patch { ticket_id }) => patch_image(&state, &ticket_id, req.into_body())
            .await
            .into_response(),
    };

    if response.status().is_server_error() {
        tracing::error!(method = %method, status = %response.status(), "Images request failed");
    }
    metrics::record_request(method.as_str(), response.status());
    response
}

/// Success response for write-class requests.
fn empty_ok() -> Response {
    (
        StatusCode::OK,
        [(CONTENT_LENGTH, HeaderValue::from_static("0"))],
    )
        .into_response()
}

/// Quote a file name for `Content-Disposition`, dropping characters that
/// cannot appear in a quoted header parameter.
fn attachment(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .filter(|c| (c.is_ascii_graphic() || *c == ' ') && *c != '"' && *c != '\\')
        .collect();
    format!("attachment; filename=\"{safe}\"")
}

/// GET /images/{ticket_id}
#[tracing::instrument(skip(state, headers))]
pub async fn get_image(
    state: &AppState,
    ticket_id: &str,
    headers: &HeaderMap,
) -> ApiResult<Response> {
    let ticket = auth::require(&state.tickets, ticket_id, TicketOp::Read)?;
    let size = ticket.size();

    let requested = headers
        .get(RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(range::parse_range);
    let span = match requested {
        Some(r) => range::resolve(r, size).ok_or(ApiError::RangeNotSatisfiable { size })?,
        None => Span::new(0, size),
    };

    let mut backend = imageio_storage::open(ticket.url(), OpenMode::Read).await?;

    // Check the extent before streaming; a failure after the headers are
    // sent can only abort the connection.
    let available = backend.size().await?;
    if span.end().is_none_or(|end| end > available) {
        return Err(StorageError::OutOfBounds {
            offset: span.offset,
            length: span.length,
            size: available,
        }
        .into());
    }

    tracing::debug!(
        offset = span.offset,
        length = span.length,
        backend = backend.backend_name(),
        "Reading image"
    );

    let counted = ticket.clone();
    let stream = read_stream(
        backend,
        span.offset,
        span.length,
        state.config.backend.buffer_size,
    )
    .inspect_ok(move |chunk| {
        let n = chunk.len() as u64;
        counted.add_transferred(n);
        metrics::BYTES_READ.inc_by(n);
    });

    let partial = !span.is_whole(size);
    let mut builder = Response::builder()
        .status(if partial {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        })
        .header(CONTENT_TYPE, "application/octet-stream")
        .header(CONTENT_LENGTH, span.length)
        .header(ACCEPT_RANGES, "bytes");

    if partial {
        builder = builder.header(CONTENT_RANGE, range::content_range(span, size));
    }
    if let Some(filename) = ticket.filename() {
        builder = builder.header(CONTENT_DISPOSITION, attachment(filename));
    }

    builder
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")))
}

/// PUT /images/{ticket_id}
///
/// The body is written verbatim at offset 0, or at the start of the
/// `Content-Range` span when one is given. Writes past the ticket's declared
/// size are allowed.
#[tracing::instrument(skip(state, req))]
pub async fn put_image(state: &AppState, ticket_id: &str, req: Request) -> ApiResult<Response> {
    let ticket = auth::require(&state.tickets, ticket_id, TicketOp::Write)?;

    let (parts, body) = req.into_parts();
    let params = Query::<PutParams>::try_from_uri(&parts.uri)
        .map_err(|e| ApiError::BadRequest(format!("invalid query: {e}")))?;
    let flush = params.flush()?;

    let span = match parts.headers.get(CONTENT_RANGE) {
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| ApiError::BadRequest("invalid Content-Range header".to_string()))?;
            Some(range::parse_content_range(value)?)
        }
        None => None,
    };

    let content_length: Option<u64> = parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());

    if let (Some(span), Some(length)) = (span, content_length)
        && span.length != length
    {
        return Err(ApiError::BadRequest(format!(
            "Content-Length {length} does not match Content-Range length {}",
            span.length
        )));
    }

    if let Some(span) = span
        && span.end().is_none()
    {
        return Err(ApiError::BadRequest(format!(
            "Content-Range span at {} exceeds the maximum offset",
            span.offset
        )));
    }

    let offset = span.map_or(0, |s| s.offset);
    let buffer_size = state.config.backend.buffer_size;
    let mut backend = imageio_storage::open(ticket.url(), OpenMode::ReadWrite).await?;

    // Coalesce body frames into buffer_size writes
    let mut stream = body.into_data_stream();
    let mut buf = BytesMut::with_capacity(buffer_size);
    let mut written: u64 = 0;

    while let Some(frame) = stream.next().await {
        let frame =
            frame.map_err(|e| ApiError::BadRequest(format!("failed to read request body: {e}")))?;
        buf.extend_from_slice(&frame);
        if buf.len() >= buffer_size {
            backend.write(write_offset(offset, written, buf.len())?, &buf).await?;
            written += buf.len() as u64;
            buf.clear();
        }
    }
    if !buf.is_empty() {
        backend.write(write_offset(offset, written, buf.len())?, &buf).await?;
        written += buf.len() as u64;
    }

    if let Some(span) = span
        && written != span.length
    {
        return Err(ApiError::BadRequest(format!(
            "received {written} bytes, Content-Range expects {}",
            span.length
        )));
    }

    if flush {
        backend.flush().await?;
        metrics::FLUSHES.inc();
    }

    ticket.add_transferred(written);
    metrics::BYTES_WRITTEN.inc_by(written);
    tracing::debug!(offset, written, flush, "Wrote image data");

    Ok(empty_ok())
}

/// Offset of the next buffered write, refusing writes whose end would
/// overflow a u64.
fn write_offset(offset: u64, written: u64, len: usize) -> ApiResult<u64> {
    offset
        .checked_add(written)
        .filter(|start| start.checked_add(len as u64).is_some())
        .ok_or_else(|| ApiError::BadRequest(format!("write at offset {offset} overflows")))
}

/// PATCH /images/{ticket_id}
#[tracing::instrument(skip(state, body))]
pub async fn patch_image(state: &AppState, ticket_id: &str, body: Body) -> ApiResult<Response> {
    let ticket = auth::require(&state.tickets, ticket_id, TicketOp::Write)?;

    let bytes = axum::body::to_bytes(body, MAX_PATCH_BODY_SIZE)
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read body: {e}")))?;
    let request: PatchRequest = serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::BadRequest(format!("invalid PATCH request: {e}")))?;

    // Zeroing is confined to the granted image size
    if let PatchRequest::Zero { size, offset, .. } = request {
        auth::require_extent(&ticket, offset, size)?;
    }

    let mut backend = imageio_storage::open(ticket.url(), OpenMode::ReadWrite).await?;

    match request {
        PatchRequest::Zero {
            size,
            offset,
            flush,
        } => {
            backend.zero(offset, size).await?;
            if flush {
                backend.flush().await?;
                metrics::FLUSHES.inc();
            }
            ticket.add_transferred(size);
            metrics::BYTES_ZEROED.inc_by(size);
            tracing::debug!(offset, size, flush, "Zeroed image range");
        }
        PatchRequest::Flush => {
            backend.flush().await?;
            metrics::FLUSHES.inc();
            tracing::debug!("Flushed image");
        }
    }

    Ok(empty_ok())
}
