//! End-to-end transport tests: a real QUIC server fronting the Dropbox
//! backend, driven by a real QUIC client.
//!
//! The backend uses the production mount executor but a `dbxfs` binary that
//! cannot exist, so only request paths that fail validation or are idempotent
//! no-ops reach a successful response; daemon failures are asserted to travel
//! the wire intact.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Once};
use std::time::Duration;

use libcsi::backend::DropboxBackend;
use libcsi::dbxfs::DbxfsMounter;
use libcsi::error::{CsiError, StatusCode};
use libcsi::message::CsiMessage;
use libcsi::mount::SysMounter;
use libcsi::transport::client::CsiClient;
use libcsi::transport::server::CsiServer;
use libcsi::types::*;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

static CRYPTO: Once = Once::new();

fn install_crypto_provider() {
    CRYPTO.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("install ring crypto provider");
    });
}

struct TestServer {
    client: CsiClient,
    _root: tempfile::TempDir,
}

/// Start a server on an ephemeral port with a self-signed certificate and
/// connect a client that trusts it.
async fn start() -> TestServer {
    install_crypto_provider();

    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_der = CertificateDer::from(cert.serialize_der().unwrap());
    let key = PrivatePkcs8KeyDer::from(cert.serialize_private_key_der());

    let server_tls = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der.clone()], PrivateKeyDer::Pkcs8(key))
        .unwrap();

    let root = tempfile::tempdir().unwrap();
    let backend = Arc::new(DropboxBackend::new(
        root.path(),
        "test-node".to_owned(),
        Arc::new(SysMounter),
        Arc::new(DbxfsMounter::new(
            "/nonexistent/dbxfs",
            Duration::from_secs(1),
        )),
    ));

    let listen: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let server = CsiServer::new(listen, server_tls, backend).unwrap();
    let addr = server.endpoint().local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.serve().await;
    });

    let mut roots = rustls::RootCertStore::empty();
    roots.add(cert_der).unwrap();
    let client_tls = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let client = CsiClient::connect(addr, "localhost", client_tls)
        .await
        .unwrap();

    TestServer {
        client,
        _root: root,
    }
}

#[tokio::test]
async fn identity_roundtrip() {
    let srv = start().await;

    match srv.client.request(&CsiMessage::Probe).await.unwrap() {
        CsiMessage::ProbeResult(healthy) => assert!(healthy),
        other => panic!("unexpected response: {other}"),
    }

    match srv.client.request(&CsiMessage::GetPluginInfo).await.unwrap() {
        CsiMessage::PluginInfoResponse(info) => assert_eq!(info.name, "rk8s.dropbox.csi"),
        other => panic!("unexpected response: {other}"),
    }

    match srv
        .client
        .request(&CsiMessage::GetPluginCapabilities)
        .await
        .unwrap()
    {
        CsiMessage::PluginCapabilitiesResponse(caps) => assert!(caps.is_empty()),
        other => panic!("unexpected response: {other}"),
    }
}

#[tokio::test]
async fn node_info_and_capabilities_roundtrip() {
    let srv = start().await;

    match srv.client.request(&CsiMessage::GetNodeInfo).await.unwrap() {
        CsiMessage::NodeInfoResponse(info) => assert_eq!(info.node_id, "test-node"),
        other => panic!("unexpected response: {other}"),
    }

    match srv
        .client
        .request(&CsiMessage::GetNodeCapabilities)
        .await
        .unwrap()
    {
        CsiMessage::NodeCapabilitiesResponse(caps) => {
            assert_eq!(caps, vec![NodeCapability::StageUnstageVolume]);
        }
        other => panic!("unexpected response: {other}"),
    }
}

#[tokio::test]
async fn invalid_stage_request_maps_to_invalid_argument() {
    let srv = start().await;

    // Valid shape, but no token secret.
    let req = CsiMessage::StageVolume(NodeStageVolumeRequest {
        volume_id: VolumeId("vol-1".into()),
        staging_target_path: "/var/lib/rkl/staging/vol-1".into(),
        volume_capability: Some(VolumeCapability::default()),
        secrets: HashMap::new(),
        volume_context: HashMap::new(),
    });

    match srv.client.request(&req).await.unwrap() {
        CsiMessage::Error(e) => assert_eq!(e.code(), StatusCode::InvalidArgument),
        other => panic!("unexpected response: {other}"),
    }
}

#[tokio::test]
async fn daemon_failure_travels_the_wire() {
    let srv = start().await;

    // Fully valid stage request; the configured dbxfs binary does not exist,
    // so the daemon launch failure must come back as an internal error.
    let req = CsiMessage::StageVolume(NodeStageVolumeRequest {
        volume_id: VolumeId("vol-1".into()),
        staging_target_path: "/var/lib/rkl/staging/vol-1".into(),
        volume_capability: Some(VolumeCapability::default()),
        secrets: HashMap::from([("token".into(), "abc123".into())]),
        volume_context: HashMap::new(),
    });

    match srv.client.request(&req).await.unwrap() {
        CsiMessage::Error(e) => {
            assert!(matches!(e, CsiError::DaemonFailed(_)));
            assert_eq!(e.code(), StatusCode::Internal);
        }
        other => panic!("unexpected response: {other}"),
    }
}

#[tokio::test]
async fn unpublish_not_mounted_is_ok_over_the_wire() {
    let srv = start().await;

    let req = CsiMessage::UnpublishVolume {
        volume_id: VolumeId("vol-1".into()),
        target_path: srv._root.path().join("never-mounted").display().to_string(),
    };

    match srv.client.request(&req).await.unwrap() {
        CsiMessage::Ok => {}
        other => panic!("unexpected response: {other}"),
    }
}

#[tokio::test]
async fn unimplemented_operations_fail_loudly() {
    let srv = start().await;

    let stats = CsiMessage::GetVolumeStats {
        volume_id: VolumeId("vol-1".into()),
        volume_path: "/some/path".into(),
    };
    match srv.client.request(&stats).await.unwrap() {
        CsiMessage::Error(e) => assert_eq!(e.code(), StatusCode::Unimplemented),
        other => panic!("unexpected response: {other}"),
    }

    let expand = CsiMessage::ExpandVolume {
        volume_id: VolumeId("vol-1".into()),
        volume_path: "/some/path".into(),
        capacity_bytes: 1 << 30,
    };
    match srv.client.request(&expand).await.unwrap() {
        CsiMessage::Error(e) => assert_eq!(e.code(), StatusCode::Unimplemented),
        other => panic!("unexpected response: {other}"),
    }
}

#[tokio::test]
async fn response_variant_as_request_is_rejected() {
    let srv = start().await;

    match srv.client.request(&CsiMessage::Ok).await.unwrap() {
        CsiMessage::Error(e) => assert_eq!(e.code(), StatusCode::InvalidArgument),
        other => panic!("unexpected response: {other}"),
    }
}
