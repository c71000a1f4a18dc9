//! webgrapple: a development reverse proxy with a runtime service registry.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod registry;
pub mod routing;
pub mod rpc;

pub use config::GrappleConfig;
pub use error::GrappleError;
pub use lifecycle::{Orchestrator, RunningProxy, Shutdown};
pub use registry::{Registry, Service, ServiceId};
pub use routing::{CompiledPolicy, Next, PrefixRoutingPolicy, RoutingPolicy};
