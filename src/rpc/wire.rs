//! Control-plane wire format.
//!
//! Request bodies are a JSON array of positional arguments, reply bodies a
//! JSON array of return values. Both operations return a single optional
//! error, so a successful reply is `[null]`.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::RegistryError;

/// Base path the control-plane endpoint is served under.
pub const DEFAULT_ENDPOINT: &str = "/___webgrapple-service";

/// Business error reported back to a control-plane client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceError {
    #[serde(rename = "Err", alias = "err")]
    pub err: String,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.err)
    }
}

impl std::error::Error for ServiceError {}

impl From<&RegistryError> for ServiceError {
    fn from(e: &RegistryError) -> Self {
        Self { err: e.to_string() }
    }
}

/// Operations exposed by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upsert,
    Remove,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Upsert => "Upsert",
            Operation::Remove => "Remove",
        }
    }
}

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Upsert" => Ok(Operation::Upsert),
            "Remove" => Ok(Operation::Remove),
            other => Err(UnknownOperation(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown operation {0:?}")]
pub struct UnknownOperation(pub String);

/// The request arguments could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed argument list: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected {expected} argument(s), got {actual}")]
    Arity { expected: usize, actual: usize },

    #[error("could not read request body: {0}")]
    Body(String),
}

/// Operation name addressed by `path`, relative to `endpoint`.
///
/// `/___webgrapple-service/Upsert` yields `Some("Upsert")`; paths outside
/// the endpoint or without a name yield `None`.
pub fn operation_name<'p>(endpoint: &str, path: &'p str) -> Option<&'p str> {
    let rest = path.strip_prefix(endpoint.trim_end_matches('/'))?;
    let name = rest.strip_prefix('/')?;
    if name.is_empty() || name.contains('/') {
        return None;
    }
    Some(name)
}

/// Decode a body carrying exactly one positional argument.
pub fn decode_single_arg<T: DeserializeOwned>(body: &[u8]) -> Result<T, DecodeError> {
    let mut args: Vec<serde_json::Value> = serde_json::from_slice(body)?;
    if args.len() != 1 {
        return Err(DecodeError::Arity {
            expected: 1,
            actual: args.len(),
        });
    }
    Ok(serde_json::from_value(args.remove(0))?)
}

/// Decode a body carrying exactly one list argument.
///
/// A `null` list is read as empty.
pub fn decode_list_arg<T: DeserializeOwned>(body: &[u8]) -> Result<Vec<T>, DecodeError> {
    Ok(decode_single_arg::<Option<Vec<T>>>(body)?.unwrap_or_default())
}
