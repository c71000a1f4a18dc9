//! Control-plane subsystem.
//!
//! # Data Flow
//! ```text
//! Remote client (ServiceClient, webgrapple-cli, browser tooling)
//!     → POST {endpoint}/Upsert | {endpoint}/Remove, body = [args...]
//!     → endpoint.rs (method/operation checks, CORS, body drain)
//!     → wire.rs (positional argument decoding)
//!     → Registry::upsert / Registry::remove
//!     → reply = [null] | [{"Err": "..."}]
//! ```
//!
//! # Design Decisions
//! - Served on its own listener, separate from proxied traffic
//! - Registry state is published before the reply is written
//! - Malformed calls are answered with a status code, failed operations with
//!   a 200 reply carrying the error

pub mod client;
pub mod endpoint;
pub mod wire;

pub use client::{RpcClientError, ServiceClient};
pub use endpoint::{control_router, ControlState, ServiceEndpoint};
pub use wire::{Operation, ServiceError, DEFAULT_ENDPOINT};
