//! Core CSI types: volume identity, capabilities, requests, and node info.
//!
//! These types form the data model shared by the CSI traits, transport layer,
//! and the Dropbox backend.  They are all [`Serialize`]/[`Deserialize`] so
//! they can be transmitted over QUIC as JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::CsiError;

// ---------------------------------------------------------------------------
// Volume identity
// ---------------------------------------------------------------------------

/// Opaque, unique identifier for a volume, assigned by the control plane.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct VolumeId(pub String);

impl VolumeId {
    /// Validate that the identifier can be used as a single path component.
    ///
    /// The backend keys its on-disk artifact directories by volume ID, so the
    /// ID must be non-empty and must not contain separators, NUL bytes, or be
    /// one of the dot entries.
    pub fn validate(&self) -> Result<(), CsiError> {
        if self.0.is_empty() {
            return Err(CsiError::InvalidArgument(
                "volume ID missing in request".into(),
            ));
        }
        if self.0 == "." || self.0 == ".." || self.0.contains('/') || self.0.contains('\0') {
            return Err(CsiError::InvalidArgument(format!(
                "volume ID {:?} is not a valid path component",
                self.0
            )));
        }
        Ok(())
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for VolumeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VolumeId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Access mode & capabilities
// ---------------------------------------------------------------------------

/// Describes how a volume may be accessed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccessMode {
    /// Single-node read-write.
    ReadWriteOnce,
    /// Multi-node read-only.
    ReadOnlyMany,
    /// Multi-node read-write.
    ReadWriteMany,
}

/// Describes the capabilities required from a volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeCapability {
    /// Requested access mode.
    pub access_mode: AccessMode,
    /// Additional mount flags (e.g. `"noatime"`).
    #[serde(default)]
    pub mount_flags: Vec<String>,
    /// Filesystem type — `"dbxfs"` for Dropbox-backed volumes.
    #[serde(default = "default_fs_type")]
    pub fs_type: String,
}

fn default_fs_type() -> String {
    "dbxfs".to_owned()
}

impl Default for VolumeCapability {
    fn default() -> Self {
        Self {
            access_mode: AccessMode::ReadWriteOnce,
            mount_flags: Vec::new(),
            fs_type: default_fs_type(),
        }
    }
}

// ---------------------------------------------------------------------------
// Node requests
// ---------------------------------------------------------------------------

/// Request to stage (FUSE-mount) a volume on a node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeStageVolumeRequest {
    /// Volume to stage.
    pub volume_id: VolumeId,
    /// Orchestrator-supplied staging path for this volume.
    pub staging_target_path: String,
    /// Requested capability.  Required; `None` is rejected as invalid.
    pub volume_capability: Option<VolumeCapability>,
    /// Per-request secrets.  Staging requires the Dropbox access token under
    /// the key `"token"`.
    #[serde(default)]
    pub secrets: HashMap<String, String>,
    /// Opaque context carried from volume provisioning.
    #[serde(default)]
    pub volume_context: HashMap<String, String>,
}

/// Request to publish (bind-mount) a staged volume into a Pod container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodePublishVolumeRequest {
    /// Volume to publish.
    pub volume_id: VolumeId,
    /// Target path inside the container,
    /// e.g. `/var/lib/rkl/pods/<pod-uid>/volumes/<vol-name>`.
    pub target_path: String,
    /// Requested capability.  Required; `None` is rejected as invalid.
    pub volume_capability: Option<VolumeCapability>,
    /// Orchestrator-supplied hints.  The key `"path"` selects a subdirectory
    /// of the staged mount to expose instead of its root.
    #[serde(default)]
    pub volume_context: HashMap<String, String>,
    /// Whether the bind mount should be read-only.
    #[serde(default)]
    pub read_only: bool,
}

// ---------------------------------------------------------------------------
// Plugin & node info
// ---------------------------------------------------------------------------

/// Information about the CSI plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Plugin name, e.g. `"rk8s.dropbox.csi"`.
    pub name: String,
    /// Vendor-provided version string.
    pub vendor_version: String,
}

/// Capabilities advertised by the CSI plugin as a whole.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PluginCapability {
    /// Plugin provides a Controller service.
    ControllerService,
    /// Plugin supports volume topology constraints.
    VolumeAccessibilityConstraints,
}

/// Capabilities advertised by the Node service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeCapability {
    /// The node supports the separate Stage/Unstage lifecycle phase
    /// (as opposed to publish-only plugins).
    StageUnstageVolume,
}

/// Information about the node on which the CSI Node service runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Unique node identifier.
    pub node_id: String,
    /// Maximum number of volumes the node can host.
    pub max_volumes: u64,
    /// Optional topology of this node.
    #[serde(default)]
    pub accessible_topology: Option<Topology>,
}

/// Topology constraint expressed as key-value segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    /// Topology segments, e.g. `{"node": "node-01"}`.
    #[serde(default)]
    pub segments: HashMap<String, String>,
}

/// Filesystem usage statistics for a published volume.
///
/// Carried on the wire for `GetVolumeStats`, which the Dropbox backend does
/// not implement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeStats {
    /// Bytes available to the caller.
    pub available_bytes: u64,
    /// Total capacity in bytes.
    pub total_bytes: u64,
    /// Bytes currently used.
    pub used_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_id_display() {
        let id = VolumeId("vol-abc".into());
        assert_eq!(id.to_string(), "vol-abc");
    }

    #[test]
    fn volume_id_validation() {
        assert!(VolumeId("vol-1".into()).validate().is_ok());
        assert!(VolumeId("".into()).validate().is_err());
        assert!(VolumeId("a/b".into()).validate().is_err());
        assert!(VolumeId("..".into()).validate().is_err());
        assert!(VolumeId(".".into()).validate().is_err());
        assert!(VolumeId("a\0b".into()).validate().is_err());
    }

    #[test]
    fn stage_request_serde_roundtrip() {
        let req = NodeStageVolumeRequest {
            volume_id: VolumeId("v1".into()),
            staging_target_path: "/var/lib/rkl/staging/v1".into(),
            volume_capability: Some(VolumeCapability::default()),
            secrets: HashMap::from([("token".into(), "abc123".into())]),
            volume_context: HashMap::new(),
        };
        let json = serde_json::to_string(&req).expect("serialize");
        let de: NodeStageVolumeRequest = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(de.volume_id, req.volume_id);
        assert_eq!(de.secrets.get("token").map(String::as_str), Some("abc123"));
    }

    #[test]
    fn volume_capability_default() {
        let cap = VolumeCapability::default();
        assert_eq!(cap.access_mode, AccessMode::ReadWriteOnce);
        assert_eq!(cap.fs_type, "dbxfs");
    }
}
