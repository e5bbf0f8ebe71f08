//! HTTP services bound to Unix sockets.

use axum::Router;
use std::io;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tokio::net::UnixListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A router served on a Unix socket until stopped.
///
/// The socket file is removed when the service stops or is dropped.
#[derive(Debug)]
pub struct Service {
    name: &'static str,
    path: PathBuf,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<io::Result<()>>>,
}

impl Service {
    /// Bind `path`, apply `mode` and start serving `router`.
    ///
    /// A stale socket left by a previous run is replaced. Any other file at
    /// `path` is an error. Must be called within a tokio runtime.
    pub fn start(name: &'static str, path: &Path, mode: u32, router: Router) -> io::Result<Self> {
        let listener = bind(path, mode)?;
        tracing::info!(
            service = name,
            socket = %path.display(),
            mode = %format_args!("{mode:o}"),
            "Listening"
        );

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await
        });

        Ok(Self {
            name,
            path: path.to_path_buf(),
            shutdown: Some(tx),
            handle: Some(handle),
        })
    }

    /// Socket path this service listens on.
    pub fn address(&self) -> &Path {
        &self.path
    }

    /// Stop accepting connections, wait for in-flight requests and remove
    /// the socket file.
    pub async fn stop(mut self) -> io::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        let result = match self.handle.take() {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(io::Error::other(format!(
                    "{} service task failed: {e}",
                    self.name
                ))),
            },
            None => Ok(()),
        };

        self.cleanup();
        tracing::info!(service = self.name, "Stopped");
        result
    }

    fn cleanup(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(
                    service = self.name,
                    socket = %self.path.display(),
                    "Removed socket file"
                );
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    service = self.name,
                    socket = %self.path.display(),
                    error = %e,
                    "Failed to remove socket file"
                );
            }
        }
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
            self.cleanup();
        }
    }
}

/// Bind a Unix socket at `path` with permissions `mode`.
fn bind(path: &Path, mode: u32) -> io::Result<UnixListener> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("failed to create directory {}: {e}", parent.display()),
            )
        })?;
    }

    remove_stale_socket(path)?;

    let listener = UnixListener::bind(path).map_err(|e| {
        io::Error::new(e.kind(), format!("failed to bind {}: {e}", path.display()))
    })?;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("failed to set permissions on {}: {e}", path.display()),
        )
    })?;

    Ok(listener)
}

fn remove_stale_socket(path: &Path) -> io::Result<()> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(io::Error::new(
                e.kind(),
                format!("failed to stat {}: {e}", path.display()),
            ));
        }
    };

    if !metadata.file_type().is_socket() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} exists but is not a socket", path.display()),
        ));
    }

    std::fs::remove_file(path)?;
    tracing::debug!(socket = %path.display(), "Removed stale socket file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    fn router() -> Router {
        Router::new().route("/", get(|| async { "ok" }))
    }

    #[tokio::test]
    async fn start_applies_mode_and_stop_removes_socket() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("run").join("test.sock");

        let service = Service::start("test", &path, 0o600, router()).unwrap();
        assert_eq!(service.address(), path);

        let metadata = std::fs::metadata(&path).unwrap();
        assert!(metadata.file_type().is_socket());
        assert_eq!(metadata.permissions().mode() & 0o777, 0o600);

        service.stop().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn start_replaces_stale_socket() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("test.sock");

        // A bound and dropped std listener leaves its socket file behind
        drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
        assert!(path.exists());

        let service = Service::start("test", &path, 0o660, router()).unwrap();
        service.stop().await.unwrap();
    }

    #[tokio::test]
    async fn start_refuses_regular_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("test.sock");
        std::fs::write(&path, b"data").unwrap();

        let err = Service::start("test", &path, 0o660, router()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read(&path).unwrap(), b"data");
    }

    #[tokio::test]
    async fn drop_removes_socket() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("test.sock");

        let service = Service::start("test", &path, 0o660, router()).unwrap();
        drop(service);
        assert!(!path.exists());
    }
}
