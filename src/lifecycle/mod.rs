//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Parse targets → Resolve → Provision certificate
//!     → Bind all listeners → Serve
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Drain connections (bounded) → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then certificate, then listeners
//! - One shutdown scope for every listener, control plane included
//! - Shutdown has timeout: in-flight requests get a bounded grace period

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{Orchestrator, ProxyAddr, RunningProxy};
