//! Request handling and transformation.
//!
//! # Responsibilities
//! - Build the upstream URL from a backend base URL and the request URI
//! - Prepare the forwarded header set (hop-by-hop removal, X-Forwarded-*)
//!
//! # Design Decisions
//! - `Host` is rewritten to the upstream authority by the HTTP client, the
//!   original value travels in `X-Forwarded-Host`
//! - `X-Forwarded-For` is appended to, never replaced

use std::net::SocketAddr;

use axum::http::{header, HeaderMap, HeaderValue, Uri};
use url::Url;

use crate::http::response::strip_hop_by_hop;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Scheme of the listener a request arrived on, stored as a request extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerScheme {
    Http,
    Https,
}

impl ListenerScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerScheme::Http => "http",
            ListenerScheme::Https => "https",
        }
    }
}

/// Join `base` with the request path and query.
///
/// The base path acts as a prefix; queries from both sides are merged with
/// the base query first.
pub fn upstream_url(base: &Url, uri: &Uri) -> Url {
    let mut url = base.clone();

    let base_path = base.path().trim_end_matches('/');
    let request_path = uri.path();
    let joined = if request_path.starts_with('/') {
        format!("{base_path}{request_path}")
    } else {
        format!("{base_path}/{request_path}")
    };
    url.set_path(&joined);

    let query = match (base.query().filter(|q| !q.is_empty()), uri.query().filter(|q| !q.is_empty())) {
        (Some(b), Some(r)) => Some(format!("{b}&{r}")),
        (Some(b), None) => Some(b.to_string()),
        (None, Some(r)) => Some(r.to_string()),
        (None, None) => None,
    };
    url.set_query(query.as_deref());
    url
}

/// Header set to send upstream for an incoming request.
pub fn forwarded_headers(
    incoming: &HeaderMap,
    client: Option<SocketAddr>,
    scheme: ListenerScheme,
) -> HeaderMap {
    let mut headers = incoming.clone();
    strip_hop_by_hop(&mut headers);

    if let Some(host) = headers.remove(header::HOST) {
        headers.insert(X_FORWARDED_HOST, host);
    }

    if let Some(client) = client {
        let ip = client.ip().to_string();
        let value = match incoming.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) => format!("{prior}, {ip}"),
            None => ip,
        };
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static(scheme.as_str()));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn joins_paths_and_queries() {
        let uri: Uri = "/api/items?page=2".parse().unwrap();
        assert_eq!(
            upstream_url(&url("http://127.0.0.1:4000"), &uri).as_str(),
            "http://127.0.0.1:4000/api/items?page=2"
        );
        assert_eq!(
            upstream_url(&url("https://backend.example/base/?token=x"), &uri).as_str(),
            "https://backend.example/base/api/items?token=x&page=2"
        );
    }

    #[test]
    fn root_request_keeps_base_path() {
        let uri: Uri = "/".parse().unwrap();
        assert_eq!(
            upstream_url(&url("http://127.0.0.1:4000/app"), &uri).as_str(),
            "http://127.0.0.1:4000/app/"
        );
    }

    #[test]
    fn sets_forwarding_headers() {
        let mut incoming = HeaderMap::new();
        incoming.insert(header::HOST, HeaderValue::from_static("www.example.com"));
        incoming.insert(X_FORWARDED_FOR, HeaderValue::from_static("10.0.0.1"));
        incoming.insert(header::CONNECTION, HeaderValue::from_static("close"));

        let client: SocketAddr = "192.168.1.7:51000".parse().unwrap();
        let headers = forwarded_headers(&incoming, Some(client), ListenerScheme::Https);

        assert!(headers.get(header::HOST).is_none());
        assert!(headers.get(header::CONNECTION).is_none());
        assert_eq!(headers[X_FORWARDED_HOST], "www.example.com");
        assert_eq!(headers[X_FORWARDED_FOR], "10.0.0.1, 192.168.1.7");
        assert_eq!(headers[X_FORWARDED_PROTO], "https");
    }
}
