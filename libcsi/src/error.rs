//! CSI error types.
//!
//! All errors in the `libcsi` crate are represented by the [`CsiError`] enum,
//! which derives [`thiserror::Error`] for ergonomic error handling and also
//! implements [`Serialize`]/[`Deserialize`] so errors can travel across the
//! QUIC transport layer.  [`CsiError::code`] projects each variant onto the
//! standard RPC status taxonomy so callers can branch on the class of failure
//! without matching every variant.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for CSI operations.
#[derive(Debug, Error, Serialize, Deserialize, Clone)]
pub enum CsiError {
    /// The caller supplied a malformed or missing request field.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A local filesystem operation (directory creation, artifact write or
    /// removal) failed.
    #[error("io error at {path}: {reason}")]
    Io {
        /// Filesystem path of the failing operation.
        path: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// A mount operation failed.
    #[error("mount failed at {path}: {reason}")]
    MountFailed {
        /// Filesystem path where the mount was attempted.
        path: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// An unmount operation failed.
    #[error("unmount failed at {path}: {reason}")]
    UnmountFailed {
        /// Filesystem path where the unmount was attempted.
        path: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// The external FUSE daemon could not be launched or exited with an
    /// error.  Carries the daemon's captured output where available.
    #[error("fuse daemon failed: {0}")]
    DaemonFailed(String),

    /// A QUIC / transport-level error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// The operation is deliberately not implemented by this plugin.
    #[error("operation {0} is not implemented")]
    Unimplemented(String),

    /// An unclassified internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// RPC status code associated with a [`CsiError`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StatusCode {
    /// The request itself was malformed; retrying without changes will fail.
    InvalidArgument,
    /// The plugin does not implement the requested operation.
    Unimplemented,
    /// Anything that went wrong below the request surface.
    Internal,
}

impl CsiError {
    /// Project this error onto the RPC status taxonomy.
    pub fn code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) => StatusCode::InvalidArgument,
            Self::Unimplemented(_) => StatusCode::Unimplemented,
            Self::Io { .. }
            | Self::MountFailed { .. }
            | Self::UnmountFailed { .. }
            | Self::DaemonFailed(_)
            | Self::TransportError(_)
            | Self::Internal(_) => StatusCode::Internal,
        }
    }

    /// Create a [`CsiError::Io`] for a failed filesystem operation at `path`.
    pub fn io<E: std::fmt::Display>(path: impl Into<String>, e: E) -> Self {
        Self::Io {
            path: path.into(),
            reason: e.to_string(),
        }
    }

    /// Create a [`CsiError::TransportError`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn transport<E: std::fmt::Display>(e: E) -> Self {
        Self::TransportError(e.to_string())
    }

    /// Create a [`CsiError::Internal`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CsiError::Unimplemented("NodeExpandVolume".into());
        assert_eq!(
            err.to_string(),
            "operation NodeExpandVolume is not implemented"
        );
    }

    #[test]
    fn error_serde_roundtrip() {
        let err = CsiError::MountFailed {
            path: "/mnt/test".into(),
            reason: "permission denied".into(),
        };
        let json = serde_json::to_string(&err).expect("serialize");
        let de: CsiError = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(err.to_string(), de.to_string());
    }

    #[test]
    fn status_code_projection() {
        assert_eq!(
            CsiError::InvalidArgument("x".into()).code(),
            StatusCode::InvalidArgument
        );
        assert_eq!(
            CsiError::Unimplemented("x".into()).code(),
            StatusCode::Unimplemented
        );
        assert_eq!(CsiError::io("/p", "boom").code(), StatusCode::Internal);
        assert_eq!(
            CsiError::DaemonFailed("exit 1".into()).code(),
            StatusCode::Internal
        );
    }
}
