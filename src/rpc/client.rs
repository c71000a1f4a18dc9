//! Typed client for the control-plane endpoint.

use serde::Serialize;
use thiserror::Error;

use crate::registry::{Service, ServiceId};
use crate::rpc::wire::{Operation, ServiceError, DEFAULT_ENDPOINT};

#[derive(Debug, Error)]
pub enum RpcClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint rejected the call itself (unknown operation, bad arguments, ...).
    #[error("control plane returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The call went through but the operation failed.
    #[error("service error: {0}")]
    Service(ServiceError),

    #[error("unexpected reply: {0}")]
    Reply(String),
}

/// Client for registering and unregistering services on a running proxy.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    client: reqwest::Client,
    base_url: String,
    endpoint: String,
}

impl ServiceClient {
    /// `base_url` is the control-plane origin, e.g. `http://127.0.0.1:8888`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub async fn upsert(&self, services: &[Service]) -> Result<(), RpcClientError> {
        self.call(Operation::Upsert, (services,)).await
    }

    pub async fn remove(&self, ids: &[ServiceId]) -> Result<(), RpcClientError> {
        self.call(Operation::Remove, (ids,)).await
    }

    async fn call<A: Serialize>(&self, operation: Operation, args: A) -> Result<(), RpcClientError> {
        let url = format!(
            "{}{}/{}",
            self.base_url,
            self.endpoint.trim_end_matches('/'),
            operation.as_str()
        );
        let res = self.client.post(&url).json(&args).send().await?;

        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(RpcClientError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let reply: Vec<Option<ServiceError>> =
            serde_json::from_str(&text).map_err(|e| RpcClientError::Reply(e.to_string()))?;
        match reply.into_iter().next() {
            Some(None) => Ok(()),
            Some(Some(err)) => Err(RpcClientError::Service(err)),
            None => Err(RpcClientError::Reply("empty reply".to_string())),
        }
    }
}
