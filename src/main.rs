//! webgrapple
//!
//! A development reverse proxy that puts locally running services in front of
//! a remote site.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌──────────────────────────────────────────────────────────┐
//!                              │                       WEBGRAPPLE                          │
//!                              │                                                          │
//!     Browser Request          │  ┌─────────┐    ┌─────────┐    ┌──────────────┐         │
//!     ─────────────────────────┼─▶│   net   │───▶│  http   │───▶│   compiled   │         │
//!                              │  │listener │    │dispatch │    │    policy    │         │
//!                              │  └─────────┘    └─────────┘    └──────┬───────┘         │
//!                              │                                       │                  │
//!                              │                        matched ┌──────┴──────┐ no match  │
//!                              │                                ▼             ▼           │
//!     Browser Response         │                        ┌─────────────┐ ┌───────────┐    │
//!     ◀────────────────────────┼────────────────────────│local service│ │  default  │────┼──── Remote
//!                              │                        │  upstream   │ │  backend  │    │     Site
//!                              │                        └─────────────┘ └───────────┘    │
//!                              │                                                          │
//!     webgrapple-cli           │  ┌─────────┐    ┌──────────┐    ┌───────────────────┐   │
//!     ─────────────────────────┼─▶│   rpc   │───▶│ registry │───▶│ routing::compile  │   │
//!       Upsert / Remove        │  │endpoint │    │ (swap)   │    │                   │   │
//!                              │  └─────────┘    └──────────┘    └───────────────────┘   │
//!                              └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use webgrapple::config::{read_config, validate_config, ConfigError, GrappleConfig};
use webgrapple::http::forward::build_client;
use webgrapple::lifecycle::{signals, Orchestrator, Shutdown};
use webgrapple::net::tls::ensure_crypto_provider;
use webgrapple::observability::logging;
use webgrapple::routing::PrefixRoutingPolicy;

#[derive(Parser, Debug)]
#[command(name = "webgrapple", version, about = "Development reverse proxy", long_about = None)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Addresses to listen on, e.g. https://www.example.com,http://localhost:8080
    #[arg(short, long, value_delimiter = ',')]
    addresses: Vec<String>,

    /// Default backend for traffic no service claims.
    #[arg(short, long)]
    backend: Option<String>,

    /// PEM certificate (requires --key).
    #[arg(long)]
    cert: Option<String>,

    /// PEM PKCS#8 private key (requires --cert).
    #[arg(long)]
    key: Option<String>,

    /// Control-plane bind address.
    #[arg(long)]
    service_addr: Option<String>,

    /// Origin allowed to call the control plane from a browser (repeatable).
    #[arg(long)]
    allow_origin: Vec<String>,
}

impl Args {
    fn into_config(self) -> Result<GrappleConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => GrappleConfig::default(),
        };

        if !self.addresses.is_empty() {
            config.proxy.targets = self.addresses;
        }
        if let Some(backend) = self.backend {
            config.proxy.backend_url = backend;
        }
        if self.cert.is_some() || self.key.is_some() {
            config.tls.cert_path = self.cert;
            config.tls.key_path = self.key;
        }
        if let Some(addr) = self.service_addr {
            config.control.bind_address = addr;
        }
        config.control.allow_origins.extend(self.allow_origin);

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Args::parse().into_config()?;

    logging::init(&config.logging)?;
    tracing::info!("webgrapple v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        targets = ?config.proxy.targets,
        backend = %config.proxy.backend_url,
        control = %config.control.bind_address,
        "Configuration loaded"
    );

    ensure_crypto_provider();

    let policy = PrefixRoutingPolicy::new(build_client()?);
    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    if let Err(e) = Orchestrator::new(config, Arc::new(policy)).run(shutdown).await {
        tracing::error!(error = %e, "webgrapple stopped with an error");
        return Err(e.into());
    }
    Ok(())
}
