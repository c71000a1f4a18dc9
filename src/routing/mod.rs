//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registry mutation
//!     → RoutingPolicy::compile(snapshot, default backend)
//!     → Arc<dyn CompiledPolicy> published together with the snapshot
//!
//! Incoming proxy request
//!     → CompiledPolicy::handle(request, Next)
//!     → registered service backend, or Next (default backend)
//! ```
//!
//! # Design Decisions
//! - The registry never interprets service contents; all matching rules live
//!   behind [`RoutingPolicy`] so deployments can swap them out
//! - Compilation is synchronous and its failure aborts the mutation
//! - Compiled policies are immutable and shared via `Arc`

pub mod matcher;
pub mod router;

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::BoxFuture;
use thiserror::Error;
use url::Url;

use crate::http::forward::Upstream;
use crate::registry::{ServiceId, ServiceSnapshot};

pub use router::PrefixRoutingPolicy;

/// Errors raised while compiling a snapshot into a policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A service address is not a usable backend URL.
    #[error("service {service}: invalid address {address:?}: {reason}")]
    InvalidAddress {
        service: ServiceId,
        address: String,
        reason: String,
    },

    /// A custom field the policy relies on has the wrong shape.
    #[error("service {service}: invalid custom field {key:?}: {reason}")]
    InvalidCustom {
        service: ServiceId,
        key: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

/// Builds an executable routing decision from a snapshot.
///
/// Invoked on every successful registry mutation. Implementations must not
/// hold on to the snapshot itself; clone the `Arc<Service>` entries they need.
pub trait RoutingPolicy: Send + Sync {
    fn compile(
        &self,
        snapshot: &ServiceSnapshot,
        default_backend: &Url,
    ) -> Result<Arc<dyn CompiledPolicy>, PolicyError>;
}

impl<F> RoutingPolicy for F
where
    F: Fn(&ServiceSnapshot, &Url) -> Result<Arc<dyn CompiledPolicy>, PolicyError> + Send + Sync,
{
    fn compile(
        &self,
        snapshot: &ServiceSnapshot,
        default_backend: &Url,
    ) -> Result<Arc<dyn CompiledPolicy>, PolicyError> {
        self(snapshot, default_backend)
    }
}

/// Executable routing decision wrapped around the default-backend handler.
pub trait CompiledPolicy: Send + Sync {
    /// Handle one proxied request, either forwarding to a registered service
    /// or passing it on to `next`.
    fn handle<'a>(&'a self, request: Request<Body>, next: Next) -> BoxFuture<'a, Response>;
}

/// The default-backend forwarding handler a policy falls back to.
#[derive(Clone)]
pub struct Next {
    upstream: Arc<Upstream>,
}

impl Next {
    pub fn new(upstream: Arc<Upstream>) -> Self {
        Self { upstream }
    }

    /// Forward the request to the default backend.
    pub async fn run(self, request: Request<Body>) -> Response {
        self.upstream.forward(request).await
    }
}
