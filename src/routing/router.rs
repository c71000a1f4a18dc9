//! Built-in host/path-prefix routing policy.
//!
//! # Responsibilities
//! - Compile a service snapshot into an ordered route table
//! - Dispatch a request to the first matching service backend
//! - Hand unmatched requests to the default backend
//!
//! # Design Decisions
//! - Reads `custom.path` (required for routing) and `custom.host` (optional)
//! - Services without `path` stay registered but contribute no route
//! - Longest prefix wins; host-qualified routes beat host-agnostic ones of
//!   equal length; remaining ties are broken by service id
//! - Immutable after compilation (thread-safe without locks)

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::BoxFuture;
use serde_json::Value;
use url::Url;

use crate::http::forward::Upstream;
use crate::registry::{Service, ServiceId, ServiceSnapshot};
use crate::routing::matcher::{AndMatcher, HostMatcher, Matcher, PathPrefixMatcher};
use crate::routing::{CompiledPolicy, Next, PolicyError, RoutingPolicy};

pub const CUSTOM_PATH: &str = "path";
pub const CUSTOM_HOST: &str = "host";

/// Routes requests by path prefix and, optionally, host.
#[derive(Debug, Clone)]
pub struct PrefixRoutingPolicy {
    client: reqwest::Client,
}

impl PrefixRoutingPolicy {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[derive(Debug)]
struct Route {
    service: ServiceId,
    prefix_len: usize,
    host_qualified: bool,
    matcher: AndMatcher,
    upstream: Upstream,
}

/// Ordered route table produced by [`PrefixRoutingPolicy`].
#[derive(Debug)]
pub struct CompiledRoutes {
    routes: Vec<Route>,
}

impl CompiledRoutes {
    /// Service that would handle `req`, `None` for the default backend.
    pub fn route_for(&self, req: &Request<Body>) -> Option<&ServiceId> {
        self.find(req).map(|r| &r.service)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn find(&self, req: &Request<Body>) -> Option<&Route> {
        self.routes.iter().find(|r| r.matcher.matches(req))
    }
}

impl CompiledPolicy for CompiledRoutes {
    fn handle<'a>(&'a self, request: Request<Body>, next: Next) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            match self.find(&request) {
                Some(route) => {
                    tracing::debug!(
                        service_id = %route.service,
                        path = %request.uri().path(),
                        "Routing to service"
                    );
                    route.upstream.forward(request).await
                }
                None => {
                    tracing::debug!(path = %request.uri().path(), "Falling back to default backend");
                    next.run(request).await
                }
            }
        })
    }
}

fn parse_backend(service: &Service) -> Result<Url, PolicyError> {
    let invalid = |reason: String| PolicyError::InvalidAddress {
        service: service.id.clone(),
        address: service.address.clone(),
        reason,
    };
    let url = Url::parse(&service.address).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme {other:?}"))),
    }
}

fn custom_str<'s>(service: &'s Service, key: &str) -> Result<Option<&'s str>, PolicyError> {
    match service.custom.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(PolicyError::InvalidCustom {
            service: service.id.clone(),
            key: key.to_string(),
            reason: "expected a string".to_string(),
        }),
    }
}

impl PrefixRoutingPolicy {
    /// Compile `snapshot` into an inspectable route table.
    pub fn compile_routes(&self, snapshot: &ServiceSnapshot) -> Result<CompiledRoutes, PolicyError> {
        let mut routes = Vec::new();

        for service in snapshot.iter() {
            let backend = parse_backend(service)?;

            let Some(path) = custom_str(service, CUSTOM_PATH)? else {
                tracing::debug!(service_id = %service.id, "Service has no path, not routed");
                continue;
            };
            if !path.starts_with('/') {
                return Err(PolicyError::InvalidCustom {
                    service: service.id.clone(),
                    key: CUSTOM_PATH.to_string(),
                    reason: "path must start with '/'".to_string(),
                });
            }
            let mut conditions: Vec<Box<dyn Matcher>> = vec![Box::new(PathPrefixMatcher::new(path))];
            let host = custom_str(service, CUSTOM_HOST)?;
            if let Some(host) = host {
                conditions.push(Box::new(HostMatcher::new(host)));
            }

            routes.push(Route {
                service: service.id.clone(),
                prefix_len: path.len(),
                host_qualified: host.is_some(),
                matcher: AndMatcher::new(conditions),
                upstream: Upstream::new(backend, self.client.clone()),
            });
        }

        routes.sort_by(|a, b| {
            b.prefix_len
                .cmp(&a.prefix_len)
                .then_with(|| b.host_qualified.cmp(&a.host_qualified))
                .then_with(|| a.service.cmp(&b.service))
        });

        tracing::info!(
            services = snapshot.len(),
            routes = routes.len(),
            "Compiled routing table"
        );
        Ok(CompiledRoutes { routes })
    }
}

impl RoutingPolicy for PrefixRoutingPolicy {
    fn compile(
        &self,
        snapshot: &ServiceSnapshot,
        _default_backend: &Url,
    ) -> Result<Arc<dyn CompiledPolicy>, PolicyError> {
        Ok(Arc::new(self.compile_routes(snapshot)?))
    }
}
