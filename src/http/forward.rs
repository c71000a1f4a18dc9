//! Forwarding of proxied requests to a single upstream.

use std::net::SocketAddr;
use std::time::Instant;

use axum::body::{Body, HttpBody};
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::response::Response;
use url::Url;

use crate::http::request::{forwarded_headers, upstream_url, ListenerScheme};
use crate::http::response::{bad_gateway, from_upstream};

/// Build the HTTP client shared by every upstream.
///
/// Upstream certificates are not verified.
pub fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
}

/// A single backend that requests can be forwarded to unmodified.
#[derive(Debug, Clone)]
pub struct Upstream {
    base: Url,
    client: reqwest::Client,
}

impl Upstream {
    pub fn new(base: Url, client: reqwest::Client) -> Self {
        Self { base, client }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Forward `request` and stream the reply back.
    pub async fn forward(&self, request: Request<Body>) -> Response {
        let start_time = Instant::now();
        let client_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let scheme = request
            .extensions()
            .get::<ListenerScheme>()
            .copied()
            .unwrap_or(ListenerScheme::Http);

        let (parts, body) = request.into_parts();
        let url = upstream_url(&self.base, &parts.uri);
        let headers = forwarded_headers(&parts.headers, client_addr, scheme);

        tracing::debug!(
            method = %parts.method,
            upstream = %url,
            "Forwarding request"
        );

        let mut upstream_request = self
            .client
            .request(parts.method.clone(), url.clone())
            .headers(headers);
        // Bodiless requests must not turn into chunked uploads.
        if body.size_hint().exact() != Some(0) {
            upstream_request = upstream_request.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }
        let result = upstream_request.send().await;

        match result {
            Ok(upstream) => {
                tracing::debug!(
                    upstream = %url,
                    status = %upstream.status(),
                    elapsed_ms = start_time.elapsed().as_millis() as u64,
                    "Upstream responded"
                );
                from_upstream(upstream)
            }
            Err(e) => {
                tracing::error!(upstream = %url, error = %e, "Upstream error");
                bad_gateway()
            }
        }
    }
}
