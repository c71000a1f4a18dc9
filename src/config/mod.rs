//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → command-line overrides (main.rs)
//!     → validation.rs (semantic checks)
//!     → GrappleConfig (validated, immutable)
//!     → handed to the Orchestrator
//!
//! service descriptor file (JSON/TOML)
//!     → services.rs
//!     → Vec<Service> sent over the control plane
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod services;
pub mod validation;

pub use loader::{load_config, read_config, ConfigError};
pub use schema::{ControlConfig, GrappleConfig, LogFormat, LoggingConfig, ProxyConfig, TlsConfig};
pub use services::{load_services, ServiceFileError};
pub use validation::{validate_config, ValidationError};
