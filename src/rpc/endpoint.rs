//! Control-plane HTTP endpoint.
//!
//! # Responsibilities
//! - Accept `POST {endpoint}/{Operation}` calls and answer CORS preflights
//! - Decode positional JSON arguments and invoke the registry
//! - Report business failures in the reply body, protocol failures by status
//! - Echo allow-listed origins on every response
//!
//! # Design Decisions
//! - Request bodies are always read to the end so keep-alive connections
//!   survive a rejected call; reading stops after `DRAIN_LIMIT` extra bytes

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use futures_util::StreamExt;
use tower_http::trace::TraceLayer;

use crate::config::ControlConfig;
use crate::registry::{Registry, Service, ServiceId};
use crate::rpc::wire::{decode_list_arg, operation_name, DecodeError, Operation, ServiceError};

/// Body returned when arguments cannot be decoded.
pub const COULD_NOT_LOAD_ARGS: &str = "could not load arguments";

/// Bytes read and discarded past the body limit before giving up on a body.
pub const DRAIN_LIMIT: usize = 1024 * 1024;

/// Registry operations as seen by remote clients.
#[derive(Clone)]
pub struct ServiceEndpoint {
    registry: Arc<Registry>,
}

impl ServiceEndpoint {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn upsert(&self, services: Vec<Service>) -> Option<ServiceError> {
        self.registry
            .upsert(services)
            .err()
            .map(|e| ServiceError::from(&e))
    }

    pub fn remove(&self, ids: Vec<ServiceId>) -> Option<ServiceError> {
        self.registry
            .remove(ids)
            .err()
            .map(|e| ServiceError::from(&e))
    }
}

/// Shared state of the control-plane router.
#[derive(Clone)]
pub struct ControlState {
    service: ServiceEndpoint,
    endpoint: Arc<str>,
    allow_origins: Arc<[HeaderValue]>,
    max_body_size: usize,
}

impl ControlState {
    pub fn new(registry: Arc<Registry>, config: &ControlConfig, max_body_size: usize) -> Self {
        let allow_origins: Vec<HeaderValue> = config
            .allow_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring origin that is not a valid header value");
                    None
                }
            })
            .collect();

        Self {
            service: ServiceEndpoint::new(registry),
            endpoint: Arc::from(config.endpoint.as_str()),
            allow_origins: allow_origins.into(),
            max_body_size,
        }
    }
}

/// Build the router served on the control-plane listener.
pub fn control_router(state: ControlState) -> Router {
    Router::new()
        .fallback(handle_call)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn handle_call(State(state): State<ControlState>, request: Request<Body>) -> Response {
    let mut response = call(&state, request).await;
    apply_cors(&state.allow_origins, response.headers_mut());
    response
}

fn apply_cors(origins: &[HeaderValue], headers: &mut HeaderMap) {
    for origin in origins {
        headers.append(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
}

async fn call(state: &ControlState, request: Request<Body>) -> Response {
    if request.method() != Method::POST {
        if request.method() == Method::OPTIONS {
            return StatusCode::OK.into_response();
        }
        return (StatusCode::METHOD_NOT_ALLOWED, "method not allowed").into_response();
    }

    let path = request.uri().path().to_string();
    let operation = operation_name(&state.endpoint, &path).and_then(|name| name.parse::<Operation>().ok());

    let body = read_body(request.into_body(), state.max_body_size).await;

    let Some(operation) = operation else {
        tracing::debug!(path = %path, "Unknown control-plane operation");
        return (StatusCode::NOT_FOUND, format!("404 - not found {path}")).into_response();
    };

    let reply = match body.and_then(|bytes| dispatch(&state.service, operation, &bytes)) {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(operation = operation.as_str(), error = %e, "Could not decode arguments");
            return (StatusCode::BAD_REQUEST, COULD_NOT_LOAD_ARGS).into_response();
        }
    };

    match &reply {
        Some(err) => tracing::info!(operation = operation.as_str(), error = %err, "Control-plane call failed"),
        None => tracing::debug!(operation = operation.as_str(), "Control-plane call succeeded"),
    }
    Json([reply]).into_response()
}

/// Read at most `limit` bytes, draining whatever follows.
async fn read_body(body: Body, limit: usize) -> Result<Bytes, DecodeError> {
    let mut stream = body.into_data_stream();
    let mut buf = Vec::new();
    let mut total = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DecodeError::Body(e.to_string()))?;
        total = total.saturating_add(chunk.len());
        if total <= limit {
            buf.extend_from_slice(&chunk);
        } else if total > limit.saturating_add(DRAIN_LIMIT) {
            break;
        }
    }

    if total > limit {
        return Err(DecodeError::Body(format!("body exceeds {limit} bytes")));
    }
    Ok(Bytes::from(buf))
}

fn dispatch(
    service: &ServiceEndpoint,
    operation: Operation,
    body: &[u8],
) -> Result<Option<ServiceError>, DecodeError> {
    Ok(match operation {
        Operation::Upsert => service.upsert(decode_list_arg(body)?),
        Operation::Remove => service.remove(decode_list_arg(body)?),
    })
}
