//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! target strings ("https://host[:port]")
//!     → target.rs (parse, resolve, dedupe bind addresses)
//!     → cert.rs (reuse or generate a certificate for every host)
//!     → tls.rs (rustls server config from PEM files)
//!     → listener.rs (bind, serve, drain on shutdown)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Every address is bound before any listener starts serving
//! - One certificate is shared by all `https` listeners
//! - TLS is optional per listener and handled transparently

pub mod cert;
pub mod listener;
pub mod target;
pub mod tls;

pub use cert::{CertificateError, CertificateMaterial};
pub use listener::{BoundListener, ListenerError};
pub use target::{Binding, Target, TargetError};
