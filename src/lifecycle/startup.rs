//! Startup orchestration.
//!
//! # Responsibilities
//! - Parse targets and resolve them to bind addresses
//! - Provision the certificate shared by `https` listeners
//! - Bind every proxy listener plus the control plane
//! - Run all listeners under one shutdown scope and report the first failure
//!
//! # Design Decisions
//! - Fail fast: configuration and certificate errors abort before any bind
//! - Every address is bound before any listener serves
//! - Any listener failing stops its siblings

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use url::Url;

use crate::config::{validate_config, ConfigError, GrappleConfig};
use crate::error::{GrappleError, Result};
use crate::http::forward::{build_client, Upstream};
use crate::http::request::ListenerScheme;
use crate::http::server::{proxy_router, ProxyState};
use crate::lifecycle::Shutdown;
use crate::net::cert::{self, CertificateMaterial};
use crate::net::listener::{BoundListener, ListenerError};
use crate::net::target::{common_names, parse_targets, plan_bindings, resolve_bind_address};
use crate::net::tls::load_tls_config;
use crate::registry::Registry;
use crate::routing::RoutingPolicy;
use crate::rpc::endpoint::{control_router, ControlState};

/// A proxy listener that is up and serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyAddr {
    pub scheme: ListenerScheme,
    pub addr: SocketAddr,
}

/// Starts the proxy listeners and the control plane.
pub struct Orchestrator {
    config: GrappleConfig,
    policy: Arc<dyn RoutingPolicy>,
}

impl Orchestrator {
    pub fn new(config: GrappleConfig, policy: Arc<dyn RoutingPolicy>) -> Self {
        Self { config, policy }
    }

    /// Start everything and block until all listeners have stopped.
    pub async fn run(self, shutdown: Shutdown) -> Result<()> {
        self.start(shutdown).await?.wait().await
    }

    /// Bind and start every listener.
    ///
    /// Nothing is bound if the configuration, targets or certificate are
    /// unusable.
    pub async fn start(self, shutdown: Shutdown) -> Result<RunningProxy> {
        let config = self.config;
        validate_config(&config).map_err(ConfigError::Validation)?;

        let targets = parse_targets(&config.proxy.targets)?;
        let backend = Url::parse(&config.proxy.backend_url).map_err(|e| GrappleError::InvalidAddress {
            field: "backend",
            value: config.proxy.backend_url.clone(),
            reason: e.to_string(),
        })?;
        let control_addr = resolve_bind_address(&config.control.bind_address)
            .await
            .map_err(|e| GrappleError::InvalidAddress {
                field: "control address",
                value: config.control.bind_address.clone(),
                reason: e.to_string(),
            })?;

        let bindings = plan_bindings(&targets).await;

        let needs_tls = bindings.iter().any(|b| b.scheme == ListenerScheme::Https);
        let (certificate, tls) = if needs_tls {
            let material = cert::ensure(
                &common_names(&targets),
                config.tls.cert_path.as_deref().map(std::path::Path::new),
                config.tls.key_path.as_deref().map(std::path::Path::new),
            )?;
            let tls = load_tls_config(&material).map_err(ListenerError::Tls)?;
            (Some(material), Some(tls))
        } else {
            (None, None)
        };

        let mut proxy_listeners = Vec::with_capacity(bindings.len());
        for binding in &bindings {
            let listener = BoundListener::bind(binding.addr)?;
            tracing::info!(
                proxy_target = %binding.target,
                address = %listener.local_addr(),
                "Proxy listener bound"
            );
            proxy_listeners.push((binding.scheme, listener));
        }
        let control_listener = BoundListener::bind(control_addr)?;

        let registry = Arc::new(Registry::new(backend.clone(), self.policy));
        let default_backend = Arc::new(Upstream::new(backend, build_client()?));
        let state = ProxyState {
            registry: Arc::clone(&registry),
            default_backend,
        };
        let grace = Duration::from_secs(config.proxy.shutdown_timeout_secs);

        let mut tasks = JoinSet::new();
        let mut proxy_addrs = Vec::with_capacity(proxy_listeners.len());
        for (scheme, listener) in proxy_listeners {
            proxy_addrs.push(ProxyAddr {
                scheme,
                addr: listener.local_addr(),
            });
            let tls = match scheme {
                ListenerScheme::Https => tls.clone(),
                ListenerScheme::Http => None,
            };
            let router = proxy_router(state.clone(), scheme);
            tasks.spawn(listener.serve(router, tls, shutdown.clone(), grace));
        }

        let control_addr = control_listener.local_addr();
        let control = control_router(ControlState::new(
            Arc::clone(&registry),
            &config.control,
            config.proxy.max_body_size,
        ));
        tasks.spawn(control_listener.serve(control, None, shutdown.clone(), grace));
        tracing::info!(
            address = %control_addr,
            endpoint = %config.control.endpoint,
            "Control plane listening"
        );

        Ok(RunningProxy {
            proxy_addrs,
            control_addr,
            registry,
            certificate,
            tasks,
            shutdown,
        })
    }
}

/// Handle to a started proxy.
pub struct RunningProxy {
    proxy_addrs: Vec<ProxyAddr>,
    control_addr: SocketAddr,
    registry: Arc<Registry>,
    certificate: Option<CertificateMaterial>,
    tasks: ListenerTasks,
    shutdown: Shutdown,
}

type ListenerTasks = JoinSet<std::result::Result<(), ListenerError>>;

impl RunningProxy {
    /// Actual addresses of the proxy listeners, in target order.
    pub fn proxy_addrs(&self) -> &[ProxyAddr] {
        &self.proxy_addrs
    }

    pub fn control_addr(&self) -> SocketAddr {
        self.control_addr
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Certificate used by `https` listeners, if there are any.
    pub fn certificate(&self) -> Option<&CertificateMaterial> {
        self.certificate.as_ref()
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Wait for every listener to stop.
    ///
    /// The first listener failure triggers shutdown of the rest and is
    /// returned once all of them have exited.
    pub async fn wait(self) -> Result<()> {
        supervise(self.tasks, &self.shutdown).await
    }
}

/// Join every listener task, triggering `shutdown` on the first failure or
/// on any exit that was not requested.
async fn supervise(mut tasks: ListenerTasks, shutdown: &Shutdown) -> Result<()> {
    let mut first_error: Option<GrappleError> = None;

    while let Some(joined) = tasks.join_next().await {
        let outcome = match joined {
            Ok(result) => result.map_err(GrappleError::from),
            Err(e) => Err(GrappleError::from(e)),
        };

        match outcome {
            Err(e) => {
                tracing::error!(error = %e, "Listener failed, shutting down");
                shutdown.trigger();
                first_error.get_or_insert(e);
            }
            Ok(()) if !shutdown.is_triggered() => {
                tracing::warn!("Listener exited unexpectedly, shutting down");
                shutdown.trigger();
            }
            Ok(()) => {}
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => {
            tracing::info!("Shutdown complete");
            Ok(())
        }
    }
}
