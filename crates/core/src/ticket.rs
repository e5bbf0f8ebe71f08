//! Tickets and the operations they authorize.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use url::Url;

/// Maximum length of a ticket id.
pub const MAX_TICKET_ID_LEN: usize = 256;

/// Opaque identifier of a ticket, normally a UUID string.
///
/// The images routes never reject an id for its shape; parsing is only
/// enforced when the control plane registers a ticket.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        if s.is_empty() {
            return Err(crate::Error::InvalidTicketId("empty ticket id".to_string()));
        }
        if s.len() > MAX_TICKET_ID_LEN {
            return Err(crate::Error::InvalidTicketId(format!(
                "ticket id longer than {MAX_TICKET_ID_LEN} bytes"
            )));
        }
        if !s.chars().all(|c| c.is_ascii_graphic() && c != '/') {
            return Err(crate::Error::InvalidTicketId(format!(
                "ticket id contains unsupported characters: {s:?}"
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// Get the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TicketId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TicketId({})", self.0)
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Data operations a ticket may grant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketOp {
    /// Read image data (GET).
    Read,
    /// Modify image data (PUT, PATCH zero, PATCH flush).
    Write,
}

impl TicketOp {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for TicketOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A ticket as submitted by the control plane.
///
/// Unknown fields are ignored so newer control planes can talk to older daemons.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TicketRequest {
    /// Ticket id.
    pub uuid: String,
    /// Backend locator, e.g. `file:///var/tmp/disk.raw`.
    pub url: String,
    /// Declared image size in bytes.
    pub size: u64,
    /// Permitted operations.
    #[serde(default)]
    pub ops: Vec<TicketOp>,
    /// Seconds until the ticket expires.
    pub timeout: u64,
    /// Suggested download file name.
    #[serde(default)]
    pub filename: Option<String>,
}

/// An authorization grant for one backend resource.
///
/// Everything except the expiry deadline and the transferred counter is
/// fixed at creation. Both mutable fields are atomics so a ticket can be
/// shared between concurrent requests without locking.
#[derive(Debug)]
pub struct Ticket {
    id: TicketId,
    url: Url,
    size: u64,
    ops: BTreeSet<TicketOp>,
    filename: Option<String>,
    /// Expiry deadline as unix milliseconds.
    expires_at_ms: AtomicI64,
    transferred: AtomicU64,
}

impl Ticket {
    /// Create a ticket expiring at `expires_at`.
    pub fn new(
        id: TicketId,
        url: Url,
        size: u64,
        ops: impl IntoIterator<Item = TicketOp>,
        expires_at: OffsetDateTime,
    ) -> Self {
        Self {
            id,
            url,
            size,
            ops: ops.into_iter().collect(),
            filename: None,
            expires_at_ms: AtomicI64::new(unix_millis(expires_at)),
            transferred: AtomicU64::new(0),
        }
    }

    /// Set the suggested download file name.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Build a ticket from a control plane request received at `now`.
    pub fn from_request(
        request: TicketRequest,
        now: OffsetDateTime,
        max_timeout_secs: u64,
    ) -> crate::Result<Self> {
        let id = TicketId::parse(&request.uuid)?;
        let url = Url::parse(&request.url)
            .map_err(|e| crate::Error::InvalidUrl(format!("{}: {e}", request.url)))?;

        if request.timeout > max_timeout_secs {
            return Err(crate::Error::TimeoutTooLarge {
                timeout: request.timeout,
                max: max_timeout_secs,
            });
        }

        let ticket = Self::new(
            id,
            url,
            request.size,
            request.ops,
            deadline(now, request.timeout),
        );
        Ok(match request.filename {
            Some(filename) => ticket.with_filename(filename),
            None => ticket,
        })
    }

    pub fn id(&self) -> &TicketId {
        &self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn ops(&self) -> impl Iterator<Item = TicketOp> + '_ {
        self.ops.iter().copied()
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Check if the ticket grants `op`. Each operation must be granted
    /// explicitly.
    pub fn allows(&self, op: TicketOp) -> bool {
        self.ops.contains(&op)
    }

    /// Get the expiry deadline.
    pub fn expires_at(&self) -> OffsetDateTime {
        from_unix_millis(self.expires_at_ms.load(Ordering::Acquire))
    }

    /// Check if the ticket has expired at `now`.
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        unix_millis(now) >= self.expires_at_ms.load(Ordering::Acquire)
    }

    /// Check if the ticket has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }

    /// Move the expiry deadline to `now + timeout_secs`.
    pub fn extend(&self, now: OffsetDateTime, timeout_secs: u64) {
        self.expires_at_ms
            .store(unix_millis(deadline(now, timeout_secs)), Ordering::Release);
    }

    /// Record `bytes` moved on behalf of this ticket.
    pub fn add_transferred(&self, bytes: u64) {
        self.transferred.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Total bytes moved on behalf of this ticket.
    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::Relaxed)
    }

    /// Snapshot the ticket for status reporting.
    pub fn info(&self) -> TicketInfo {
        TicketInfo {
            uuid: self.id.to_string(),
            url: self.url.to_string(),
            size: self.size,
            ops: self.ops.iter().copied().collect(),
            expires: self
                .expires_at()
                .format(&Rfc3339)
                .unwrap_or_else(|_| self.expires_at().to_string()),
            transferred: self.transferred(),
            filename: self.filename.clone(),
        }
    }
}

/// Ticket status reported to the control plane.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketInfo {
    pub uuid: String,
    pub url: String,
    pub size: u64,
    pub ops: Vec<TicketOp>,
    /// Expiry deadline (RFC 3339).
    pub expires: String,
    pub transferred: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

fn deadline(now: OffsetDateTime, timeout_secs: u64) -> OffsetDateTime {
    // Saturate at i64::MAX to prevent overflow wrapping to negative
    let secs = i64::try_from(timeout_secs).unwrap_or(i64::MAX);
    now.checked_add(time::Duration::seconds(secs))
        .unwrap_or(OffsetDateTime::new_utc(time::Date::MAX, time::Time::MIDNIGHT))
}

fn unix_millis(t: OffsetDateTime) -> i64 {
    i64::try_from(t.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

fn from_unix_millis(ms: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .unwrap_or(OffsetDateTime::new_utc(time::Date::MAX, time::Time::MIDNIGHT))
}
