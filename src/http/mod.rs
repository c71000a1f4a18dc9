//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection (net::listener)
//!     → server.rs (Axum setup, request ID, tracing)
//!     → registry state → compiled routing policy
//!     → forward.rs (service backend or default backend)
//!         request.rs  (URL join, X-Forwarded-*)
//!         response.rs (hop-by-hop stripping, streaming)
//!     → Send to client
//! ```

pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use forward::Upstream;
pub use request::ListenerScheme;
pub use server::{proxy_router, ProxyState};
