//! External FUSE mounter for the `dbxfs` daemon.
//!
//! Staging a volume hands the actual remote-store attachment to the `dbxfs`
//! binary: the backend writes the config and token artifacts, then asks a
//! [`FuseMounter`] to turn the volume's data directory into a live mount.
//! [`DbxfsMounter`] launches `dbxfs <dataDir> -c <configPath>` as an owned
//! child process, captures its output for diagnostics, and bounds the wait
//! with a startup timeout (the daemon backgrounds itself once the mount is
//! established, so a clean exit means the mount is live).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::CsiError;

/// Default bound on how long a `dbxfs` launch may take before it is killed.
pub const DEFAULT_MOUNT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration artifact consumed by the `dbxfs` daemon.
///
/// Written as JSON next to the token file and regenerated on every stage
/// call (whole-file overwrite, never merged).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbxfsConfig {
    /// Command `dbxfs` runs to obtain the access token, e.g.
    /// `["cat", "/mnt/csi-dropbox/volumes/v1/dbxfs_token"]`.
    pub access_token_command: Vec<String>,
    /// Whether the daemon may send error reports upstream.
    pub send_error_reports: bool,
    /// Suppresses the daemon's interactive error-report prompt.
    pub asked_send_error_reports: bool,
}

impl DbxfsConfig {
    /// Build the standard config referencing a token file at `token_path`.
    pub fn for_token_file(token_path: &Path) -> Self {
        Self {
            access_token_command: vec![
                "cat".to_owned(),
                token_path.to_string_lossy().into_owned(),
            ],
            send_error_reports: true,
            asked_send_error_reports: true,
        }
    }
}

/// Contract for attaching the remote store to a staging directory.
///
/// A trait so the lifecycle controller can be exercised with a fake mounter;
/// failures are opaque and non-retryable at this layer.
#[async_trait]
pub trait FuseMounter: Send + Sync {
    /// Synchronously mount the remote store onto `data_dir` using the config
    /// artifact at `config_path`.  On success the directory is a live mount.
    async fn mount(&self, data_dir: &Path, config_path: &Path) -> Result<(), CsiError>;
}

/// Production [`FuseMounter`] that launches the `dbxfs` binary.
#[derive(Debug, Clone)]
pub struct DbxfsMounter {
    binary: PathBuf,
    startup_timeout: Duration,
}

impl DbxfsMounter {
    /// Create a mounter launching `binary` with the given startup bound.
    pub fn new(binary: impl Into<PathBuf>, startup_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            startup_timeout,
        }
    }
}

impl Default for DbxfsMounter {
    fn default() -> Self {
        Self::new("dbxfs", DEFAULT_MOUNT_TIMEOUT)
    }
}

#[async_trait]
impl FuseMounter for DbxfsMounter {
    #[instrument(skip(self), fields(binary = %self.binary.display()))]
    async fn mount(&self, data_dir: &Path, config_path: &Path) -> Result<(), CsiError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(data_dir)
            .arg("-c")
            .arg(config_path)
            // If the wait below is abandoned, the launcher must not linger.
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.startup_timeout, cmd.output())
            .await
            .map_err(|_| {
                CsiError::DaemonFailed(format!(
                    "{} did not finish within {:?}",
                    self.binary.display(),
                    self.startup_timeout
                ))
            })?
            .map_err(|e| {
                CsiError::DaemonFailed(format!("spawn {}: {e}", self.binary.display()))
            })?;

        if !output.status.success() {
            return Err(CsiError::DaemonFailed(format!(
                "{} exited with {}: stdout: {} stderr: {}",
                self.binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stdout).trim(),
                String::from_utf8_lossy(&output.stderr).trim(),
            )));
        }

        debug!(data_dir = %data_dir.display(), "dbxfs mount established");
        Ok(())
    }
}
