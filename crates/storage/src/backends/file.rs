//! Local file backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::{Backend, OpenMode};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::instrument;

/// Maximum size of a single read (128 MiB).
/// This prevents large memory allocations from user-controlled ranges;
/// larger spans must be streamed with `read_stream`.
const MAX_READ_SIZE: u64 = 128 * 1024 * 1024;

/// Size of the zero buffer used by `zero` (1 MiB).
const ZERO_CHUNK_SIZE: usize = 1024 * 1024;

/// A session against a local file or block device node.
pub struct FileBackend {
    file: File,
    path: PathBuf,
    mode: OpenMode,
}

impl std::fmt::Debug for FileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackend")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .finish()
    }
}

impl FileBackend {
    /// Open an existing file. The file is never created.
    pub async fn open(path: impl AsRef<Path>, mode: OpenMode) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(mode.is_writable())
            .open(&path)
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    StorageError::NotFound(path.display().to_string())
                } else {
                    StorageError::Io(e)
                }
            })?;

        tracing::debug!(path = %path.display(), ?mode, "Opened file backend");
        Ok(Self { file, path, mode })
    }

    fn require_writable(&self) -> StorageResult<()> {
        if self.mode.is_writable() {
            Ok(())
        } else {
            Err(StorageError::ReadOnly(self.path.display().to_string()))
        }
    }
}

#[async_trait]
impl Backend for FileBackend {
    #[instrument(skip(self), fields(backend = "file"))]
    async fn size(&mut self) -> StorageResult<u64> {
        // Seeking to the end also works for block devices, where metadata
        // reports a length of zero.
        let size = self.file.seek(SeekFrom::End(0)).await?;
        Ok(size)
    }

    #[instrument(skip(self), fields(backend = "file"))]
    async fn read(&mut self, offset: u64, length: u64) -> StorageResult<Bytes> {
        if length > MAX_READ_SIZE {
            return Err(StorageError::InvalidRange(format!(
                "read size {} exceeds maximum {} bytes",
                length, MAX_READ_SIZE
            )));
        }

        let end = offset.checked_add(length).ok_or_else(|| {
            StorageError::InvalidRange(format!("offset {offset} + length {length} overflows"))
        })?;

        let size = self.size().await?;
        if end > size {
            return Err(StorageError::OutOfBounds {
                offset,
                length,
                size,
            });
        }

        // Convert to usize, failing on 32-bit overflow
        let len = usize::try_from(length).map_err(|_| {
            StorageError::InvalidRange(format!(
                "read size {length} exceeds platform address space"
            ))
        })?;

        self.file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf).await?;

        Ok(Bytes::from(buf))
    }

    #[instrument(skip(self, data), fields(backend = "file", size = data.len()))]
    async fn write(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        self.require_writable()?;

        self.file.seek(SeekFrom::Start(offset)).await?;
        self.file.write_all(data).await?;
        // Wait for the write to reach the file before reporting success;
        // durability is left to `flush`.
        self.file.flush().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "file"))]
    async fn zero(&mut self, offset: u64, length: u64) -> StorageResult<()> {
        self.require_writable()?;

        offset.checked_add(length).ok_or_else(|| {
            StorageError::InvalidRange(format!("offset {offset} + length {length} overflows"))
        })?;

        let chunk = usize::try_from(length).map_or(ZERO_CHUNK_SIZE, |n| n.min(ZERO_CHUNK_SIZE));
        let zeroes = vec![0u8; chunk];
        self.file.seek(SeekFrom::Start(offset)).await?;

        let mut remaining = length;
        while remaining > 0 {
            let n = remaining.min(zeroes.len() as u64) as usize;
            self.file.write_all(&zeroes[..n]).await?;
            remaining -= n as u64;
        }
        self.file.flush().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "file"))]
    async fn flush(&mut self) -> StorageResult<()> {
        self.file.flush().await?;
        if self.mode.is_writable() {
            self.file.sync_all().await?;
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
