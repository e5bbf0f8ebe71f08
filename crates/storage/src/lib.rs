//! Backend abstraction for the image I/O daemon.
//!
//! This crate provides:
//! - The [`Backend`] capability set: size, read, write, zero and flush
//! - A file backend serving `file://` URLs
//! - Chunked streaming reads for response bodies

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::file::FileBackend;
pub use error::{StorageError, StorageResult};
pub use traits::{Backend, ByteStream, OpenMode, read_stream};

use url::Url;

/// Open a backend session for `url`.
///
/// Every call opens a fresh session; sessions are never cached or shared
/// between requests. Dropping the returned backend releases it.
pub async fn open(url: &Url, mode: OpenMode) -> StorageResult<Box<dyn Backend>> {
    match url.scheme() {
        "file" => {
            let path = url
                .to_file_path()
                .map_err(|_| StorageError::InvalidUrl(url.to_string()))?;
            let backend = FileBackend::open(path, mode).await?;
            Ok(Box::new(backend))
        }
        other => Err(StorageError::UnsupportedScheme(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_file_url_ok() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("image");
        std::fs::write(&path, b"hello").unwrap();

        let url = Url::from_file_path(&path).unwrap();
        let mut backend = open(&url, OpenMode::Read).await.unwrap();
        assert_eq!(backend.size().await.unwrap(), 5);
        assert_eq!(backend.read(1, 3).await.unwrap(), Bytes::from_static(b"ell"));
    }

    #[tokio::test]
    async fn open_missing_file_is_not_found() {
        let url = Url::parse("file:///no/such/image").unwrap();
        match open(&url, OpenMode::ReadWrite).await {
            Ok(_) => panic!("expected error"),
            Err(StorageError::NotFound(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn open_rejects_unsupported_scheme() {
        let url = Url::parse("nbd://localhost:10809/export").unwrap();
        match open(&url, OpenMode::Read).await {
            Ok(_) => panic!("expected error"),
            Err(StorageError::UnsupportedScheme(scheme)) => assert_eq!(scheme, "nbd"),
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn open_rejects_file_url_with_host() {
        let url = Url::parse("file://remote-host/var/tmp/image").unwrap();
        match open(&url, OpenMode::Read).await {
            Ok(_) => panic!("expected error"),
            Err(StorageError::InvalidUrl(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
}
