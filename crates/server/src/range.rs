//! `Range` and `Content-Range` header parsing.

use crate::error::{ApiError, ApiResult};

/// A single byte range from a `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=start-end`, both inclusive.
    StartEnd(u64, u64),
    /// `bytes=start-`
    StartOpen(u64),
    /// `bytes=-n`, the last `n` bytes.
    Suffix(u64),
}

/// A resolved span of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub offset: u64,
    pub length: u64,
}

impl Span {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Exclusive end offset, or None if it does not fit in a u64.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.length)
    }

    /// Inclusive index of the last byte. Only meaningful for non-empty spans.
    pub fn last(&self) -> u64 {
        self.offset.saturating_add(self.length.saturating_sub(1))
    }

    /// Check if the span covers all of `[0, size)`.
    pub fn is_whole(&self, size: u64) -> bool {
        self.offset == 0 && self.length == size
    }
}

/// Parse a `Range` header value like "bytes=0-4", "bytes=5-", "bytes=-3".
///
/// Returns None for anything else, including multi-range requests; callers
/// then serve the whole resource.
pub fn parse_range(value: &str) -> Option<ByteRange> {
    let set = value.trim().strip_prefix("bytes=")?;

    // Only a single range is supported
    if set.contains(',') {
        return None;
    }

    if let Some(suffix) = set.strip_prefix('-') {
        let n: u64 = suffix.parse().ok()?;
        if n == 0 {
            return None;
        }
        Some(ByteRange::Suffix(n))
    } else if let Some(start) = set.strip_suffix('-') {
        Some(ByteRange::StartOpen(start.parse().ok()?))
    } else {
        let (start, end) = set.split_once('-')?;
        let start: u64 = start.parse().ok()?;
        let end: u64 = end.parse().ok()?;
        if start > end {
            return None;
        }
        Some(ByteRange::StartEnd(start, end))
    }
}

/// Resolve a range against a resource of `size` bytes.
///
/// Returns None if the range is unsatisfiable.
pub fn resolve(range: ByteRange, size: u64) -> Option<Span> {
    if size == 0 {
        return None;
    }
    match range {
        ByteRange::StartEnd(start, end) => {
            if start >= size {
                return None;
            }
            let end = end.min(size - 1);
            Some(Span::new(start, end - start + 1))
        }
        ByteRange::StartOpen(start) => {
            if start >= size {
                return None;
            }
            Some(Span::new(start, size - start))
        }
        ByteRange::Suffix(n) => {
            let n = n.min(size);
            Some(Span::new(size - n, n))
        }
    }
}

/// Parse a `Content-Range` header of a write: "bytes start-end/total" or
/// "bytes start-end/*".
pub fn parse_content_range(value: &str) -> ApiResult<Span> {
    let invalid = || ApiError::BadRequest(format!("invalid Content-Range header: {value:?}"));

    let set = value.trim().strip_prefix("bytes ").ok_or_else(invalid)?;
    let (range, total) = set.split_once('/').ok_or_else(invalid)?;
    let (start, end) = range.split_once('-').ok_or_else(invalid)?;
    let start: u64 = start.trim().parse().map_err(|_| invalid())?;
    let end: u64 = end.trim().parse().map_err(|_| invalid())?;

    if end < start {
        return Err(invalid());
    }

    let total = total.trim();
    if total != "*" {
        let total: u64 = total.parse().map_err(|_| invalid())?;
        if end >= total {
            return Err(invalid());
        }
    }

    // "bytes 0-18446744073709551615/*" names 2^64 bytes
    let length = (end - start).checked_add(1).ok_or_else(invalid)?;
    Ok(Span::new(start, length))
}

/// Format the `Content-Range` header of a partial read.
pub fn content_range(span: Span, size: u64) -> String {
    format!("bytes {}-{}/{}", span.offset, span.last(), size)
}
