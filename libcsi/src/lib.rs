//! # libcsi — Simplified CSI node plugin over QUIC
//!
//! `libcsi` implements a lightweight [Container Storage Interface][csi] node
//! service that uses QUIC (via [`quinn`]) instead of gRPC for transport.  The
//! shipped backend mounts Dropbox into Pod containers through the `dbxfs`
//! FUSE daemon and follows the RK8s architecture conventions (Tokio async
//! runtime, `tracing` for observability, `thiserror` for structured errors).
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Core data model: `VolumeId`, capabilities, requests, node info. |
//! | [`error`] | [`CsiError`] enum covering all failure modes. |
//! | [`message`] | [`CsiMessage`] protocol envelope for QUIC transport. |
//! | [`identity`] | [`CsiIdentity`] trait — plugin discovery & health. |
//! | [`node`] | [`CsiNode`] trait — stage, publish, unpublish, unstage. |
//! | [`mount`] | [`Mounter`](mount::Mounter) — bind mounts, probes, unmounts. |
//! | [`dbxfs`] | [`FuseMounter`](dbxfs::FuseMounter) — `dbxfs` daemon launcher. |
//! | [`transport`] | QUIC client/server built on `quinn`. |
//! | [`backend`] | [`DropboxBackend`](backend::DropboxBackend) lifecycle controller. |
//!
//! [csi]: https://github.com/container-storage-interface/spec

pub mod backend;
pub mod dbxfs;
pub mod error;
pub mod identity;
pub mod message;
pub mod mount;
pub mod node;
pub mod transport;
pub mod types;

// Re-export the most commonly used items at crate root for convenience.
pub use backend::DropboxBackend;
pub use error::CsiError;
pub use identity::CsiIdentity;
pub use message::CsiMessage;
pub use node::CsiNode;
pub use types::*;
