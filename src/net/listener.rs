//! TCP listeners for proxy and control-plane traffic.
//!
//! # Responsibilities
//! - Bind to resolved addresses before anything is served
//! - Serve an Axum router, optionally behind TLS
//! - Drain in-flight requests on shutdown, bounded by a grace period

use std::net::{SocketAddr, TcpListener};
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use thiserror::Error;

use crate::lifecycle::Shutdown;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The server loop stopped with an error.
    #[error("listener {addr} failed: {source}")]
    Serve {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Certificate material could not be loaded.
    #[error("could not load TLS configuration: {0}")]
    Tls(#[source] std::io::Error),
}

/// A bound, not yet serving, listener.
#[derive(Debug)]
pub struct BoundListener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl BoundListener {
    /// Bind to `addr`. Port `0` picks a free port.
    pub fn bind(addr: SocketAddr) -> Result<Self, ListenerError> {
        let bind_err = |source| ListenerError::Bind { addr, source };

        let inner = TcpListener::bind(addr).map_err(bind_err)?;
        inner.set_nonblocking(true).map_err(bind_err)?;
        let local_addr = inner.local_addr().map_err(bind_err)?;

        tracing::debug!(address = %local_addr, "Listener bound");

        Ok(Self { inner, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve `router` until `shutdown` fires, then drain for at most `grace`.
    pub async fn serve(
        self,
        router: Router,
        tls: Option<RustlsConfig>,
        shutdown: Shutdown,
        grace: Duration,
    ) -> Result<(), ListenerError> {
        let addr = self.local_addr;
        let handle = Handle::new();

        let watcher = {
            let handle = handle.clone();
            tokio::spawn(async move {
                shutdown.wait().await;
                tracing::debug!(address = %addr, "Draining listener");
                handle.graceful_shutdown(Some(grace));
            })
        };

        let app = router.into_make_service_with_connect_info::<SocketAddr>();
        let result = match tls {
            Some(config) => {
                tracing::info!(address = %addr, "HTTPS listener starting");
                axum_server::from_tcp_rustls(self.inner, config)
                    .handle(handle)
                    .serve(app)
                    .await
            }
            None => {
                tracing::info!(address = %addr, "HTTP listener starting");
                axum_server::from_tcp(self.inner).handle(handle).serve(app).await
            }
        };
        watcher.abort();

        result.map_err(|source| ListenerError::Serve { addr, source })?;
        tracing::info!(address = %addr, "Listener stopped");
        Ok(())
    }
}
