//! Runtime configuration: well-known paths and timing defaults.
//!
//! Both processes derive their paths from `$XDG_RUNTIME_DIR`, so the
//! channel name is the only thing they have to agree on.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::channel::CHANNEL_NAME;

/// Subdirectory of `$XDG_RUNTIME_DIR` holding the socket and lock file.
pub const RUNTIME_SUBDIR: &str = "autopaste";

/// Upper bound on waiting for the clipboard lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// Client wait between signalling and restoring the clipboard.
pub const DEFAULT_TRIGGER_DELAY: Duration = Duration::from_millis(500);

/// Pending signals the service buffers before writers block.
pub const DEFAULT_QUEUE_DEPTH: usize = 20;

/// Listener pause after each injected keystroke, in milliseconds.
pub const DEFAULT_SETTLE_MS: u64 = 100;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("$XDG_RUNTIME_DIR is not set")]
    NoRuntimeDir,
}

/// Settings for one `autopaste` client invocation.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub channel_path: PathBuf,
    pub lock_path: PathBuf,
    pub lock_timeout: Duration,
    pub trigger_delay: Duration,
}

impl ClientConfig {
    /// Build the client configuration from `$XDG_RUNTIME_DIR`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::in_dir(&resolve_runtime_dir()?))
    }

    /// Client configuration rooted at an explicit runtime directory.
    pub fn in_dir(runtime_dir: &Path) -> Self {
        Self {
            channel_path: channel_path(runtime_dir),
            lock_path: lock_path(runtime_dir),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            trigger_delay: DEFAULT_TRIGGER_DELAY,
        }
    }
}

/// Settings for the `autopasted` service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub channel_path: PathBuf,
    pub queue_depth: usize,
    pub settle: Duration,
}

impl ServiceConfig {
    /// Build the service configuration from `$XDG_RUNTIME_DIR` and CLI values.
    pub fn from_env(queue_depth: usize, settle: Duration) -> Result<Self, ConfigError> {
        Ok(Self::in_dir(&resolve_runtime_dir()?, queue_depth, settle))
    }

    pub fn in_dir(runtime_dir: &Path, queue_depth: usize, settle: Duration) -> Self {
        Self {
            channel_path: channel_path(runtime_dir),
            queue_depth,
            settle,
        }
    }
}

/// Resolve `$XDG_RUNTIME_DIR/autopaste`.
pub fn resolve_runtime_dir() -> Result<PathBuf, ConfigError> {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").map_err(|_| ConfigError::NoRuntimeDir)?;
    Ok(PathBuf::from(runtime_dir).join(RUNTIME_SUBDIR))
}

/// Socket path of the paste channel inside `runtime_dir`.
pub fn channel_path(runtime_dir: &Path) -> PathBuf {
    runtime_dir.join(format!("{CHANNEL_NAME}.sock"))
}

/// Advisory clipboard lock file inside `runtime_dir`.
pub fn lock_path(runtime_dir: &Path) -> PathBuf {
    runtime_dir.join("clipboard.lock")
}

/// Create `dir` if needed and force its mode to 0700.
///
/// Permissions are reset even when the directory already existed.
pub fn ensure_private_dir(dir: &Path) -> std::io::Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}
