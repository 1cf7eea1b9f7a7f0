//! CSI Node service trait.
//!
//! The Node service runs on each worker node and handles the local filesystem
//! operations required to make a volume available to Pod containers:
//!
//! 1. **Stage** — FUSE-mount the remote store at the volume's data directory.
//! 2. **Publish** — bind-mount the staged data into the Pod's container.
//! 3. **Unpublish** — remove the bind-mount.
//! 4. **Unstage** — unmount the FUSE mount and discard staging artifacts.

use async_trait::async_trait;

use crate::error::CsiError;
use crate::types::{
    NodeCapability, NodeInfo, NodePublishVolumeRequest, NodeStageVolumeRequest, VolumeId,
    VolumeStats,
};

/// Node service — local mount / unmount operations.
#[async_trait]
pub trait CsiNode: Send + Sync {
    /// Stage a volume: FUSE-mount the remote store at the volume's data
    /// directory.
    ///
    /// This is idempotent — calling it again for an already-staged volume
    /// must succeed without mounting a second time.
    async fn stage_volume(&self, req: NodeStageVolumeRequest) -> Result<(), CsiError>;

    /// Unstage a volume: unmount the FUSE filesystem and remove the volume's
    /// staging artifacts (including credential material).
    ///
    /// This is idempotent — calling it on an already-unstaged volume must
    /// succeed without error.
    async fn unstage_volume(
        &self,
        volume_id: &VolumeId,
        staging_target_path: &str,
    ) -> Result<(), CsiError>;

    /// Publish a volume: bind-mount the staged data directory (or a subpath
    /// of it) into the container.
    ///
    /// This is idempotent — calling it again for the same `target_path` must
    /// succeed without a second bind mount.
    async fn publish_volume(&self, req: NodePublishVolumeRequest) -> Result<(), CsiError>;

    /// Unpublish a volume: unmount the bind-mount from the container path.
    ///
    /// This is idempotent.
    async fn unpublish_volume(
        &self,
        volume_id: &VolumeId,
        target_path: &str,
    ) -> Result<(), CsiError>;

    /// Return information about the node on which this service is running.
    async fn get_info(&self) -> Result<NodeInfo, CsiError>;

    /// Advertise the node service capabilities.
    async fn get_capabilities(&self) -> Result<Vec<NodeCapability>, CsiError>;

    /// Report filesystem statistics for a published volume.
    ///
    /// Backends that do not support statistics must return
    /// [`CsiError::Unimplemented`] rather than a default response.
    async fn get_volume_stats(
        &self,
        volume_id: &VolumeId,
        volume_path: &str,
    ) -> Result<VolumeStats, CsiError>;

    /// Grow a published volume in place, returning the new capacity.
    ///
    /// Backends that do not support online expansion must return
    /// [`CsiError::Unimplemented`] rather than a default response.
    async fn expand_volume(
        &self,
        volume_id: &VolumeId,
        volume_path: &str,
        capacity_bytes: u64,
    ) -> Result<u64, CsiError>;
}
