//! Crate-level error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::net::{CertificateError, ListenerError, TargetError};

/// Anything that stops the proxy from starting or keeps it from running.
#[derive(Debug, Error)]
pub enum GrappleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error("invalid {field} {value:?}: {reason}")]
    InvalidAddress {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Certificate(#[from] CertificateError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("could not build upstream client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("listener task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, GrappleError>;
