//! Backend trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Access mode requested when opening a backend session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// Reads only; mutating calls fail with `StorageError::ReadOnly`.
    Read,
    /// Reads and writes.
    ReadWrite,
}

impl OpenMode {
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

/// A request-scoped session against one storage object.
///
/// All I/O is positional: there is no shared cursor, so the same object may
/// be served by many sessions at once.
#[async_trait]
pub trait Backend: Send + 'static {
    /// Current size of the storage object in bytes.
    async fn size(&mut self) -> StorageResult<u64>;

    /// Read exactly `length` bytes at `offset`.
    ///
    /// Fails with `StorageError::OutOfBounds` if the range extends past the
    /// end of the object.
    async fn read(&mut self, offset: u64, length: u64) -> StorageResult<Bytes>;

    /// Write `data` at `offset`, extending the object if needed.
    async fn write(&mut self, offset: u64, data: &[u8]) -> StorageResult<()>;

    /// Write `length` zero bytes at `offset`, extending the object if needed.
    ///
    /// Implementations may deallocate the range instead of writing zeroes, as
    /// long as reads of the range return zeroes afterwards.
    async fn zero(&mut self, offset: u64, length: u64) -> StorageResult<()>;

    /// Force previously written data to durable storage.
    async fn flush(&mut self) -> StorageResult<()>;

    /// Get the name of this backend.
    ///
    /// Returns a static string identifier for the backend type (e.g., "file").
    /// Used for metrics and logging.
    fn backend_name(&self) -> &'static str;
}

/// Stream `length` bytes starting at `offset` in chunks of at most `chunk_size`.
///
/// The stream owns the backend session, so the session is released when the
/// stream completes, fails, or is dropped early.
pub fn read_stream(
    mut backend: Box<dyn Backend>,
    offset: u64,
    length: u64,
    chunk_size: usize,
) -> ByteStream {
    let chunk_size = chunk_size.max(1) as u64;
    let stream = async_stream::try_stream! {
        let mut pos = offset;
        let end = offset + length;
        while pos < end {
            let n = chunk_size.min(end - pos);
            let chunk = backend.read(pos, n).await?;
            pos += n;
            yield chunk;
        }
    };
    Box::pin(stream)
}
