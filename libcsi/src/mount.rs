//! Mount executor: bind mounts, mount-point probing, and unmounts.
//!
//! [`Mounter`] is the seam between the volume lifecycle and the kernel mount
//! table.  The backend only ever talks to this trait, so lifecycle logic can
//! be exercised in tests with a fake executor while production uses
//! [`SysMounter`], a thin wrapper over `mount(2)`/`umount(2)` via the `nix`
//! crate plus a `/proc/self/mounts` scan for probing.

use std::path::Path;

use async_trait::async_trait;
use nix::mount::MsFlags;
use thiserror::Error;
use tracing::debug;

use crate::error::CsiError;

/// Failure modes of a mount-point probe.
///
/// Callers need to distinguish "the path does not exist" (they may create the
/// directory and proceed) from any other probe failure (they must abort).
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probed path does not exist.
    #[error("path does not exist")]
    NotFound,
    /// The probe itself failed for another reason.
    #[error("mount probe failed: {0}")]
    Probe(String),
}

/// Mount executor contract.
#[async_trait]
pub trait Mounter: Send + Sync {
    /// Return `true` if `path` is currently a mount point.
    ///
    /// Fails with [`ProbeError::NotFound`] when the path does not exist so
    /// the caller can decide whether to create it.
    async fn is_mount_point(&self, path: &Path) -> Result<bool, ProbeError>;

    /// Bind-mount `source` onto `target`, read-only when requested.
    async fn bind_mount(
        &self,
        source: &Path,
        target: &Path,
        read_only: bool,
    ) -> Result<(), CsiError>;

    /// Unmount `path`.
    async fn unmount(&self, path: &Path) -> Result<(), CsiError>;
}

/// Production [`Mounter`] backed by the host mount syscalls.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysMounter;

#[async_trait]
impl Mounter for SysMounter {
    async fn is_mount_point(&self, path: &Path) -> Result<bool, ProbeError> {
        match tokio::fs::metadata(path).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProbeError::NotFound);
            }
            Err(e) => return Err(ProbeError::Probe(format!("stat {}: {e}", path.display()))),
        }

        // Format: <device> <mountpoint> <fstype> <options> <dump> <pass>
        //
        // Note: `/proc/self/mounts` uses octal escapes (`\040` for space,
        // etc.).  CSI target paths must not contain whitespace, so direct
        // string comparison is safe here.
        let contents = tokio::fs::read_to_string("/proc/self/mounts")
            .await
            .map_err(|e| ProbeError::Probe(format!("read /proc/self/mounts: {e}")))?;
        let path = path.to_string_lossy();
        Ok(contents
            .lines()
            .any(|line| line.split_whitespace().nth(1) == Some(path.as_ref())))
    }

    async fn bind_mount(
        &self,
        source: &Path,
        target: &Path,
        read_only: bool,
    ) -> Result<(), CsiError> {
        let mut flags = MsFlags::MS_BIND;
        if read_only {
            flags |= MsFlags::MS_RDONLY;
        }

        nix::mount::mount(Some(source), target, None::<&str>, flags, None::<&str>).map_err(
            |e| CsiError::MountFailed {
                path: target.display().to_string(),
                reason: e.to_string(),
            },
        )?;

        // Some kernels ignore MS_RDONLY on the initial bind-mount call; a
        // separate remount is required to actually enforce read-only access.
        if read_only {
            nix::mount::mount(
                None::<&str>,
                target,
                None::<&str>,
                MsFlags::MS_BIND | MsFlags::MS_REMOUNT | MsFlags::MS_RDONLY,
                None::<&str>,
            )
            .map_err(|e| CsiError::MountFailed {
                path: target.display().to_string(),
                reason: format!("remount read-only: {e}"),
            })?;
        }

        debug!(source = %source.display(), target = %target.display(), read_only, "bind mount done");
        Ok(())
    }

    async fn unmount(&self, path: &Path) -> Result<(), CsiError> {
        nix::mount::umount(path).map_err(|e| CsiError::UnmountFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "unmounted");
        Ok(())
    }
}
