//! Test fixtures for images and tickets.

use imageio_core::{Ticket, TicketId, TicketOp};
use imageio_server::AppState;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use url::Url;

/// Write `data` to a new image file under `dir`.
#[allow(dead_code)]
pub fn create_image(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).expect("Failed to create image");
    path
}

/// `file://` URL of an image path.
#[allow(dead_code)]
pub fn file_url(path: &Path) -> Url {
    Url::from_file_path(path).expect("absolute path")
}

/// A fresh ticket id.
#[allow(dead_code)]
pub fn ticket_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Register a ticket directly in the store.
#[allow(dead_code)]
pub fn add_ticket(
    state: &AppState,
    id: &str,
    path: &Path,
    size: u64,
    ops: &[TicketOp],
    timeout_secs: i64,
) {
    state.tickets.add(Ticket::new(
        TicketId::parse(id).unwrap(),
        file_url(path),
        size,
        ops.iter().copied(),
        OffsetDateTime::now_utc() + time::Duration::seconds(timeout_secs),
    ));
}

/// Ticket JSON as sent by the control plane.
#[allow(dead_code)]
pub fn ticket_json(id: &str, path: &Path, size: u64, ops: &[&str], timeout: u64) -> Value {
    json!({
        "uuid": id,
        "url": file_url(path).to_string(),
        "size": size,
        "ops": ops,
        "timeout": timeout,
    })
}
