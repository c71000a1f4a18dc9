//! HTTP server setup for proxy listeners.
//!
//! # Responsibilities
//! - Create the Axum Router that every proxy listener serves
//! - Wire up middleware (tracing, request ID, listener scheme)
//! - Dispatch requests through the currently published routing policy

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Extension, Router,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::http::forward::Upstream;
use crate::http::request::ListenerScheme;
use crate::registry::Registry;
use crate::routing::Next;

/// Application state injected into the dispatch handler.
#[derive(Clone)]
pub struct ProxyState {
    pub registry: Arc<Registry>,
    pub default_backend: Arc<Upstream>,
}

/// Build the router served on one proxy listener.
pub fn proxy_router(state: ProxyState, scheme: ListenerScheme) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(Extension(scheme))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Hand the request to the published policy, or refuse until one exists.
async fn dispatch(State(state): State<ProxyState>, request: Request<Body>) -> Response {
    let current = state.registry.load();
    match current.policy.as_ref() {
        Some(policy) => {
            let next = Next::new(Arc::clone(&state.default_backend));
            policy.handle(request, next).await
        }
        None => {
            tracing::info!(
                path = %request.uri().path(),
                "No services registered yet, refusing request"
            );
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "not available - please register at least one service, so that we can bring up your middleware",
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Service, ServiceSnapshot};
    use crate::routing::{CompiledPolicy, PolicyError};
    use futures_util::future::BoxFuture;
    use tower::ServiceExt;
    use url::Url;

    struct Teapot;

    impl CompiledPolicy for Teapot {
        fn handle<'a>(&'a self, _request: Request<Body>, _next: Next) -> BoxFuture<'a, Response> {
            Box::pin(async { StatusCode::IM_A_TEAPOT.into_response() })
        }
    }

    fn state() -> ProxyState {
        let backend = Url::parse("http://127.0.0.1:9").unwrap();
        let policy = |_: &ServiceSnapshot, _: &Url| -> Result<Arc<dyn CompiledPolicy>, PolicyError> {
            Ok(Arc::new(Teapot))
        };
        ProxyState {
            registry: Arc::new(Registry::new(backend.clone(), Arc::new(policy))),
            default_backend: Arc::new(Upstream::new(backend, reqwest::Client::new())),
        }
    }

    #[tokio::test]
    async fn unavailable_until_first_registration() {
        let state = state();
        let app = proxy_router(state.clone(), ListenerScheme::Http);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().contains_key("x-request-id"));

        state
            .registry
            .upsert(vec![Service::new("a", "http://127.0.0.1:4000")])
            .unwrap();

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    }
}
