//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Images service configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Unix socket serving the images API. Reported to clients by OPTIONS.
    #[serde(default = "default_local_socket")]
    pub socket: PathBuf,
    /// Permission bits applied to the socket after binding.
    #[serde(default = "default_local_socket_mode")]
    pub socket_mode: u32,
}

/// Control service configuration.
///
/// The control socket is the only gate on ticket registration, so its
/// permissions should stay owner-only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Serve the control API (default: true).
    #[serde(default = "default_control_enabled")]
    pub enabled: bool,
    /// Unix socket serving the tickets API.
    #[serde(default = "default_control_socket")]
    pub socket: PathBuf,
    /// Permission bits applied to the socket after binding.
    #[serde(default = "default_control_socket_mode")]
    pub socket_mode: u32,
}

/// Backend I/O configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Bytes per streamed read chunk and per zero-fill write.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

/// Ticket policy configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TicketsConfig {
    /// Largest accepted ticket timeout in seconds.
    #[serde(default = "default_max_timeout_secs")]
    pub max_timeout_secs: u64,
}

fn default_local_socket() -> PathBuf {
    PathBuf::from("/run/ovirt-imageio/sock")
}

fn default_local_socket_mode() -> u32 {
    0o660
}

fn default_control_enabled() -> bool {
    true
}

fn default_control_socket() -> PathBuf {
    PathBuf::from("/run/ovirt-imageio/control.sock")
}

fn default_control_socket_mode() -> u32 {
    0o600
}

fn default_buffer_size() -> usize {
    crate::DEFAULT_BUFFER_SIZE
}

fn default_max_timeout_secs() -> u64 {
    7 * 86400
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            socket: default_local_socket(),
            socket_mode: default_local_socket_mode(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: default_control_enabled(),
            socket: default_control_socket(),
            socket_mode: default_control_socket_mode(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
        }
    }
}

impl Default for TicketsConfig {
    fn default() -> Self {
        Self {
            max_timeout_secs: default_max_timeout_secs(),
        }
    }
}

/// Root configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub tickets: TicketsConfig,
}

impl AppConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        let buffer_size = self.backend.buffer_size;
        if !(crate::MIN_BUFFER_SIZE..=crate::MAX_BUFFER_SIZE).contains(&buffer_size) {
            return Err(crate::Error::Config(format!(
                "backend.buffer_size {} must be between {} and {}",
                buffer_size,
                crate::MIN_BUFFER_SIZE,
                crate::MAX_BUFFER_SIZE
            )));
        }

        for (name, mode) in [
            ("local.socket_mode", self.local.socket_mode),
            ("control.socket_mode", self.control.socket_mode),
        ] {
            if mode > 0o777 {
                return Err(crate::Error::Config(format!(
                    "{name} {mode:#o} is not a permission mode"
                )));
            }
        }

        if self.local.socket.as_os_str().is_empty() {
            return Err(crate::Error::Config("local.socket is empty".to_string()));
        }

        if self.control.enabled && self.control.socket == self.local.socket {
            return Err(crate::Error::Config(
                "control.socket must differ from local.socket".to_string(),
            ));
        }

        Ok(())
    }

    /// Create a test configuration with sockets under `dir`.
    ///
    /// **For testing only.**
    pub fn for_testing(dir: &Path) -> Self {
        Self {
            local: LocalConfig {
                socket: dir.join("sock"),
                ..Default::default()
            },
            control: ControlConfig {
                socket: dir.join("control.sock"),
                ..Default::default()
            },
            backend: BackendConfig {
                buffer_size: 64 * 1024,
            },
            tickets: TicketsConfig::default(),
        }
    }
}
