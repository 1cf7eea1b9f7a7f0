//! Dropbox storage backend for CSI.
//!
//! [`DropboxBackend`] implements [`CsiIdentity`] and [`CsiNode`] using the
//! `dbxfs` FUSE daemon as the underlying storage engine.  Each staged volume
//! gets its own artifact directory under a configurable plugin root; Pod
//! containers see the staged data through bind-mount publishing.
//!
//! # On-disk layout
//!
//! ```text
//! <root>/
//!   volumes/<volume-id>/
//!     data/               # staging mount point for the remote store
//!     dbxfs_config.json   # FUSE daemon config, regenerated per stage
//!     dbxfs_token         # raw credential material, removed on unstage
//! ```
//!
//! The artifact tree plus the kernel mount table are the only durable state,
//! so every operation is restart-safe: idempotency is decided by probing the
//! mount table, never by in-memory bookkeeping.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::dbxfs::{DbxfsConfig, FuseMounter};
use crate::error::CsiError;
use crate::identity::CsiIdentity;
use crate::mount::{Mounter, ProbeError};
use crate::node::CsiNode;
use crate::types::*;

/// Well-known key under which stage requests carry the Dropbox access token.
pub const SECRET_TOKEN_KEY: &str = "token";

/// Volume-context key selecting a subdirectory of the staged mount to
/// publish instead of its root.
pub const CONTEXT_PATH_KEY: &str = "path";

/// Concrete CSI node backend backed by the `dbxfs` FUSE daemon.
///
/// # Thread safety
///
/// Lifecycle calls for different volumes run concurrently.  Artifact writes
/// for the same volume are serialized by a per-volume async mutex; the lock
/// is never held across mount syscalls or the daemon launch.
pub struct DropboxBackend {
    /// Plugin root hosting all per-volume artifact directories.
    root: PathBuf,
    /// Node identifier (hostname or user-supplied string).
    node_id: String,
    /// Executor for bind mounts, probes, and unmounts.
    mounter: Arc<dyn Mounter>,
    /// Launcher for the `dbxfs` daemon.
    fuse: Arc<dyn FuseMounter>,
    /// Per-volume locks guarding artifact writes.
    stage_locks: DashMap<VolumeId, Arc<Mutex<()>>>,
}

impl DropboxBackend {
    /// Create a new backend.
    ///
    /// * `root` — plugin root directory, e.g. `/mnt/csi-dropbox`
    /// * `node_id` — unique identifier for this node
    /// * `mounter` — mount executor (production: [`crate::mount::SysMounter`])
    /// * `fuse` — daemon launcher (production: [`crate::dbxfs::DbxfsMounter`])
    pub fn new(
        root: impl Into<PathBuf>,
        node_id: String,
        mounter: Arc<dyn Mounter>,
        fuse: Arc<dyn FuseMounter>,
    ) -> Self {
        Self {
            root: root.into(),
            node_id,
            mounter,
            fuse,
            stage_locks: DashMap::new(),
        }
    }

    /// Resolve the artifact directory for a volume.
    fn volume_dir(&self, volume_id: &VolumeId) -> PathBuf {
        self.root.join("volumes").join(&volume_id.0)
    }

    /// Resolve the staging mount point (the `data/` directory) for a volume.
    pub fn data_dir(&self, volume_id: &VolumeId) -> PathBuf {
        self.volume_dir(volume_id).join("data")
    }

    /// Resolve the path of the `dbxfs` config artifact for a volume.
    pub fn config_path(&self, volume_id: &VolumeId) -> PathBuf {
        self.volume_dir(volume_id).join("dbxfs_config.json")
    }

    /// Resolve the path of the token artifact for a volume.
    pub fn token_path(&self, volume_id: &VolumeId) -> PathBuf {
        self.volume_dir(volume_id).join("dbxfs_token")
    }

    fn stage_lock(&self, volume_id: &VolumeId) -> Arc<Mutex<()>> {
        self.stage_locks
            .entry(volume_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Probe whether `path` is a live mount, treating a missing path as
    /// "not mounted".
    async fn probe_mounted(&self, path: &Path) -> Result<bool, CsiError> {
        match self.mounter.is_mount_point(path).await {
            Ok(mounted) => Ok(mounted),
            Err(ProbeError::NotFound) => Ok(false),
            Err(e) => Err(CsiError::internal(e)),
        }
    }
}

/// Validate the optional `path` volume-context value as a clean relative
/// subpath: no absolute paths, no parent traversal, no dot components.
fn subpath_from_context(ctx: &HashMap<String, String>) -> Result<Option<&str>, CsiError> {
    let Some(sub) = ctx.get(CONTEXT_PATH_KEY).map(String::as_str) else {
        return Ok(None);
    };
    if sub.is_empty() {
        return Ok(None);
    }
    let clean = Path::new(sub)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !clean {
        return Err(CsiError::InvalidArgument(format!(
            "volume context path {sub:?} must be a relative subpath"
        )));
    }
    Ok(Some(sub))
}

// ---------------------------------------------------------------------------
// CsiIdentity
// ---------------------------------------------------------------------------

#[async_trait]
impl CsiIdentity for DropboxBackend {
    async fn get_plugin_info(&self) -> Result<PluginInfo, CsiError> {
        Ok(PluginInfo {
            name: "rk8s.dropbox.csi".to_owned(),
            vendor_version: env!("CARGO_PKG_VERSION").to_owned(),
        })
    }

    async fn probe(&self) -> Result<bool, CsiError> {
        // The backend is healthy when its plugin root exists and is a directory.
        let exists = tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        Ok(exists)
    }

    async fn get_plugin_capabilities(&self) -> Result<Vec<PluginCapability>, CsiError> {
        // Node-only plugin: volume provisioning happens out of band.
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// CsiNode
// ---------------------------------------------------------------------------

#[async_trait]
impl CsiNode for DropboxBackend {
    #[instrument(skip(self, req), fields(volume_id = %req.volume_id))]
    async fn stage_volume(&self, req: NodeStageVolumeRequest) -> Result<(), CsiError> {
        req.volume_id.validate()?;
        if req.staging_target_path.is_empty() {
            return Err(CsiError::InvalidArgument(
                "staging target path missing in request".into(),
            ));
        }
        if req.volume_capability.is_none() {
            return Err(CsiError::InvalidArgument(
                "volume capability missing in request".into(),
            ));
        }
        let token = match req.secrets.get(SECRET_TOKEN_KEY) {
            Some(t) if !t.is_empty() => t,
            _ => {
                return Err(CsiError::InvalidArgument(format!(
                    "secret {SECRET_TOKEN_KEY:?} missing in request"
                )));
            }
        };

        let data_dir = self.data_dir(&req.volume_id);
        debug!(staging_target_path = %req.staging_target_path, data_dir = %data_dir.display(), "staging");

        // A live mount at the data directory means a prior stage succeeded;
        // re-mounting over it would corrupt the existing mount.
        if self.probe_mounted(&data_dir).await? {
            info!(volume_id = %req.volume_id, "data directory already mounted, idempotent retry");
            return Ok(());
        }

        let config_path = self.config_path(&req.volume_id);
        let token_path = self.token_path(&req.volume_id);

        // Artifact writes are serialized per volume; the lock is released
        // before the daemon launch below.
        {
            let lock = self.stage_lock(&req.volume_id);
            let _guard = lock.lock().await;

            tokio::fs::create_dir_all(&data_dir)
                .await
                .map_err(|e| CsiError::io(data_dir.display().to_string(), e))?;

            let config = DbxfsConfig::for_token_file(&token_path);
            let config_json = serde_json::to_string(&config).map_err(CsiError::internal)?;
            tokio::fs::write(&config_path, config_json)
                .await
                .map_err(|e| CsiError::io(config_path.display().to_string(), e))?;

            tokio::fs::write(&token_path, token)
                .await
                .map_err(|e| CsiError::io(token_path.display().to_string(), e))?;
        }

        // On failure the artifacts stay on disk; a retry overwrites them.
        self.fuse.mount(&data_dir, &config_path).await?;

        info!(volume_id = %req.volume_id, data_dir = %data_dir.display(), "volume staged");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn unstage_volume(
        &self,
        volume_id: &VolumeId,
        staging_target_path: &str,
    ) -> Result<(), CsiError> {
        volume_id.validate()?;
        if staging_target_path.is_empty() {
            return Err(CsiError::InvalidArgument(
                "staging target path missing in request".into(),
            ));
        }

        let data_dir = self.data_dir(volume_id);
        if self.probe_mounted(&data_dir).await? {
            self.mounter.unmount(&data_dir).await?;
        } else {
            debug!(%volume_id, "data directory not mounted, nothing to unmount");
        }

        // Drop the whole artifact directory: credential material is scoped
        // to the staged lifetime.
        let volume_dir = self.volume_dir(volume_id);
        match tokio::fs::remove_dir_all(&volume_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(CsiError::io(volume_dir.display().to_string(), e)),
        }

        info!(%volume_id, "volume unstaged");
        Ok(())
    }

    #[instrument(skip(self, req), fields(volume_id = %req.volume_id))]
    async fn publish_volume(&self, req: NodePublishVolumeRequest) -> Result<(), CsiError> {
        if req.volume_capability.is_none() {
            return Err(CsiError::InvalidArgument(
                "volume capability missing in request".into(),
            ));
        }
        req.volume_id.validate()?;
        if req.target_path.is_empty() {
            return Err(CsiError::InvalidArgument(
                "target path missing in request".into(),
            ));
        }
        let subpath = subpath_from_context(&req.volume_context)?;

        let target = Path::new(&req.target_path);
        match self.mounter.is_mount_point(target).await {
            // Already published here; a second bind mount would shadow the
            // first and leak it.
            Ok(true) => {
                debug!(target_path = %req.target_path, "target already mounted, idempotent retry");
                return Ok(());
            }
            Ok(false) => {}
            Err(ProbeError::NotFound) => {
                tokio::fs::create_dir_all(target)
                    .await
                    .map_err(|e| CsiError::io(req.target_path.clone(), e))?;
            }
            Err(e) => return Err(CsiError::internal(e)),
        }

        let mut source = self.data_dir(&req.volume_id);
        if let Some(sub) = subpath {
            source = source.join(sub);
        }

        self.mounter
            .bind_mount(&source, target, req.read_only)
            .await?;

        info!(
            source = %source.display(),
            target_path = %req.target_path,
            read_only = req.read_only,
            "volume published",
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn unpublish_volume(
        &self,
        volume_id: &VolumeId,
        target_path: &str,
    ) -> Result<(), CsiError> {
        volume_id.validate()?;
        if target_path.is_empty() {
            return Err(CsiError::InvalidArgument(
                "target path missing in request".into(),
            ));
        }

        let target = Path::new(target_path);
        if !self.probe_mounted(target).await? {
            debug!(%volume_id, "target not mounted, nothing to unpublish");
            return Ok(());
        }

        self.mounter.unmount(target).await?;

        info!(%volume_id, %target_path, "volume unpublished");
        Ok(())
    }

    async fn get_info(&self) -> Result<NodeInfo, CsiError> {
        Ok(NodeInfo {
            node_id: self.node_id.clone(),
            max_volumes: 256,
            accessible_topology: Some(Topology {
                segments: HashMap::from([("node".to_owned(), self.node_id.clone())]),
            }),
        })
    }

    async fn get_capabilities(&self) -> Result<Vec<NodeCapability>, CsiError> {
        Ok(vec![NodeCapability::StageUnstageVolume])
    }

    async fn get_volume_stats(
        &self,
        _volume_id: &VolumeId,
        _volume_path: &str,
    ) -> Result<VolumeStats, CsiError> {
        Err(CsiError::Unimplemented("NodeGetVolumeStats".into()))
    }

    async fn expand_volume(
        &self,
        _volume_id: &VolumeId,
        _volume_path: &str,
        _capacity_bytes: u64,
    ) -> Result<u64, CsiError> {
        Err(CsiError::Unimplemented("NodeExpandVolume".into()))
    }
}
