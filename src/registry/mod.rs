//! Service registry.
//!
//! # Data Flow
//! ```text
//! Upsert / Remove batch
//!     → writer lock (one mutation at a time)
//!     → private copy of the current snapshot, batch applied
//!     → RoutingPolicy::compile(new snapshot)
//!     → atomic swap of Arc<RegistryState>
//!
//! Proxy request
//!     → load() current Arc<RegistryState> (lock free)
//! ```
//!
//! # Design Decisions
//! - Snapshot and compiled policy are published together, readers never see
//!   one without the other
//! - A failed batch publishes nothing
//! - Writers are serialized with a mutex; readers only touch the `ArcSwap`

pub mod service;

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use thiserror::Error;
use url::Url;

use crate::routing::{CompiledPolicy, PolicyError, RoutingPolicy};

pub use service::{Service, ServiceId, ServiceSnapshot};

/// Errors returned by registry mutations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("service not found")]
    ServiceNotFound(ServiceId),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// The currently published snapshot and the policy compiled from it.
pub struct RegistryState {
    pub snapshot: Arc<ServiceSnapshot>,
    /// `None` until the first successful mutation.
    pub policy: Option<Arc<dyn CompiledPolicy>>,
}

impl RegistryState {
    fn initial() -> Self {
        Self {
            snapshot: Arc::new(ServiceSnapshot::empty()),
            policy: None,
        }
    }
}

impl std::fmt::Debug for RegistryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryState")
            .field("snapshot", &self.snapshot)
            .field("policy", &self.policy.is_some())
            .finish()
    }
}

/// Concurrency-safe registry of routable services.
pub struct Registry {
    state: ArcSwap<RegistryState>,
    writer: Mutex<()>,
    policy: Arc<dyn RoutingPolicy>,
    default_backend: Url,
}

impl Registry {
    pub fn new(default_backend: Url, policy: Arc<dyn RoutingPolicy>) -> Self {
        Self {
            state: ArcSwap::from_pointee(RegistryState::initial()),
            writer: Mutex::new(()),
            policy,
            default_backend,
        }
    }

    /// The state in effect right now.
    pub fn load(&self) -> Arc<RegistryState> {
        self.state.load_full()
    }

    pub fn snapshot(&self) -> Arc<ServiceSnapshot> {
        Arc::clone(&self.state.load().snapshot)
    }

    pub fn default_backend(&self) -> &Url {
        &self.default_backend
    }

    /// Insert or replace every service in the batch.
    pub fn upsert(&self, services: Vec<Service>) -> Result<(), RegistryError> {
        let _writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());

        let mut builder = self.state.load().snapshot.to_builder();
        for service in services {
            tracing::info!(
                service_id = %service.id,
                backend = %service.address,
                "Upserting service"
            );
            builder.upsert(service);
        }
        self.publish(builder.build())
    }

    /// Delete every listed id. Fails without effect if any id is unknown.
    pub fn remove(&self, ids: Vec<ServiceId>) -> Result<(), RegistryError> {
        let _writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());

        let mut builder = self.state.load().snapshot.to_builder();
        for id in ids {
            if !builder.remove(&id) {
                tracing::warn!(service_id = %id, "Cannot remove unknown service");
                return Err(RegistryError::ServiceNotFound(id));
            }
            tracing::info!(service_id = %id, "Removing service");
        }
        self.publish(builder.build())
    }

    // Caller must hold the writer lock.
    fn publish(&self, snapshot: ServiceSnapshot) -> Result<(), RegistryError> {
        let policy = match self.policy.compile(&snapshot, &self.default_backend) {
            Ok(policy) => policy,
            Err(e) => {
                tracing::error!(error = %e, "Routing policy compilation failed, keeping previous state");
                return Err(e.into());
            }
        };

        let services = snapshot.len();
        self.state.store(Arc::new(RegistryState {
            snapshot: Arc::new(snapshot),
            policy: Some(policy),
        }));
        tracing::debug!(services, "Published registry state");
        Ok(())
    }
}
