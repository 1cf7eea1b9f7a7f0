//! Dropbox CSI node daemon.
//!
//! Serves the `libcsi` node and identity services over QUIC, backed by the
//! `dbxfs` FUSE daemon.  One instance runs per worker node.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use libcsi::backend::DropboxBackend;
use libcsi::dbxfs::DbxfsMounter;
use libcsi::mount::SysMounter;
use libcsi::transport::server::CsiServer;

#[derive(Parser, Debug)]
#[command(name = "dbxnode", about = "Dropbox CSI node daemon", version)]
struct Cli {
    /// Address to listen on for CSI requests from the control plane.
    #[arg(long, default_value = "0.0.0.0:50051")]
    listen: SocketAddr,

    /// Node identifier reported to the control plane.  Defaults to the
    /// hostname.
    #[arg(long)]
    node_id: Option<String>,

    /// Plugin root directory hosting per-volume staging artifacts.
    #[arg(long, default_value = "/mnt/csi-dropbox")]
    root: PathBuf,

    /// Path of the dbxfs binary used to mount the remote store.
    #[arg(long, default_value = "dbxfs")]
    dbxfs_bin: PathBuf,

    /// Upper bound in seconds on a dbxfs mount launch.
    #[arg(long, default_value_t = 30)]
    mount_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("rustls crypto provider already installed"))?;

    let cli = Cli::parse();

    let node_id = match cli.node_id {
        Some(id) => id,
        None => nix::unistd::gethostname()
            .context("read hostname")?
            .to_string_lossy()
            .into_owned(),
    };

    tokio::fs::create_dir_all(&cli.root)
        .await
        .with_context(|| format!("create plugin root {}", cli.root.display()))?;

    let backend = Arc::new(DropboxBackend::new(
        &cli.root,
        node_id.clone(),
        Arc::new(SysMounter),
        Arc::new(DbxfsMounter::new(
            &cli.dbxfs_bin,
            Duration::from_secs(cli.mount_timeout_secs),
        )),
    ));

    let tls_config = configure_server().context("build TLS config")?;
    let server =
        CsiServer::new(cli.listen, tls_config, backend).context("start CSI QUIC server")?;

    info!(
        listen = %cli.listen,
        %node_id,
        root = %cli.root.display(),
        "dbxnode serving",
    );
    server.serve().await.context("serve CSI requests")?;
    Ok(())
}

/// Generate a self-signed TLS certificate and construct the QUIC server
/// rustls config.
fn configure_server() -> anyhow::Result<rustls::ServerConfig> {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])?;
    let cert_der = CertificateDer::from(cert.serialize_der()?);
    let key = PrivatePkcs8KeyDer::from(cert.serialize_private_key_der());
    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], PrivateKeyDer::Pkcs8(key))?;
    Ok(server_config)
}
