//! Listener targets.
//!
//! # Responsibilities
//! - Parse `scheme://host[:port]` target strings
//! - Derive the certificate common-name set from target hosts
//! - Resolve hosts to bind addresses, degrading to loopback on failure
//! - Collapse targets that resolve to the same socket address
//! - Resolve `host:port` bind addresses for the control plane
//!
//! # Design Decisions
//! - Only `http` and `https` are accepted; anything else aborts startup
//! - Each unique host is resolved once, IPv4 addresses are preferred
//! - The first target to claim a socket address wins

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use thiserror::Error;
use url::{Host, Url};

use crate::http::request::ListenerScheme;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("target {0:?} has an empty scheme")]
    EmptyScheme(String),

    #[error("target {target:?} has unsupported scheme {scheme:?}")]
    UnsupportedScheme { target: String, scheme: String },

    #[error("target {target:?} is not a valid URL: {reason}")]
    Invalid { target: String, reason: String },

    #[error("target {0:?} has no host")]
    MissingHost(String),
}

/// Split a `host:port` address. IPv6 hosts must be bracketed.
pub fn split_host_port(raw: &str) -> Option<(&str, u16)> {
    let (host, port) = raw.rsplit_once(':')?;
    let port = port.parse().ok()?;
    let host = match host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        Some(v6) => v6,
        None if host.contains(':') => return None,
        None => host,
    };
    if host.is_empty() {
        return None;
    }
    Some((host, port))
}

/// Resolve a `host:port` bind address the same way target hosts are resolved.
pub async fn resolve_bind_address(raw: &str) -> Result<SocketAddr, TargetError> {
    if let Ok(addr) = raw.parse::<SocketAddr>() {
        return Ok(addr);
    }
    let (host, port) = split_host_port(raw).ok_or_else(|| TargetError::Invalid {
        target: raw.to_string(),
        reason: "expected host:port".to_string(),
    })?;
    Ok(SocketAddr::new(resolve_host(host).await, port))
}

/// A parsed listener target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scheme: ListenerScheme,
    /// Lowercase host, IPv6 literals without brackets.
    pub host: String,
    /// Explicit port, or 80/443 by scheme.
    pub port: u16,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V6(_)) => write!(f, "{}://[{}]:{}", self.scheme.as_str(), self.host, self.port),
            _ => write!(f, "{}://{}:{}", self.scheme.as_str(), self.host, self.port),
        }
    }
}

impl Target {
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let raw = raw.trim();
        match raw.find("://") {
            None | Some(0) => return Err(TargetError::EmptyScheme(raw.to_string())),
            Some(_) => {}
        }

        let url = Url::parse(raw).map_err(|e| TargetError::Invalid {
            target: raw.to_string(),
            reason: e.to_string(),
        })?;

        let scheme = match url.scheme() {
            "http" => ListenerScheme::Http,
            "https" => ListenerScheme::Https,
            other => {
                return Err(TargetError::UnsupportedScheme {
                    target: raw.to_string(),
                    scheme: other.to_string(),
                })
            }
        };

        let host = match url.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_ascii_lowercase(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            _ => return Err(TargetError::MissingHost(raw.to_string())),
        };

        let port = url.port().unwrap_or(match scheme {
            ListenerScheme::Http => 80,
            ListenerScheme::Https => 443,
        });

        Ok(Self { scheme, host, port })
    }
}

pub fn parse_targets<S: AsRef<str>>(raw: &[S]) -> Result<Vec<Target>, TargetError> {
    raw.iter().map(|t| Target::parse(t.as_ref())).collect()
}

/// Sorted, unique hosts of every target.
pub fn common_names(targets: &[Target]) -> Vec<String> {
    targets
        .iter()
        .map(|t| t.host.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Resolve `host` to a single bind address.
///
/// Lookup failures and empty results fall back to `127.0.0.1`.
pub async fn resolve_host(host: &str) -> IpAddr {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip;
    }

    match tokio::net::lookup_host((host, 0)).await {
        Ok(addrs) => {
            let addrs: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
            if let Some(ip) = addrs.iter().find(|ip| ip.is_ipv4()).or_else(|| addrs.first()) {
                return *ip;
            }
            tracing::warn!(host = %host, "Host resolved to no addresses, falling back to loopback");
        }
        Err(e) => {
            tracing::warn!(host = %host, error = %e, "Could not resolve host, falling back to loopback");
        }
    }
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

/// A socket address a listener will be bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub scheme: ListenerScheme,
    pub addr: SocketAddr,
    /// The target that claimed this address.
    pub target: Target,
}

/// Resolve every target and drop those whose address is already claimed.
pub async fn plan_bindings(targets: &[Target]) -> Vec<Binding> {
    let mut resolved: HashMap<&str, IpAddr> = HashMap::new();
    let mut seen: HashSet<SocketAddr> = HashSet::new();
    let mut bindings = Vec::new();

    for target in targets {
        let ip = match resolved.get(target.host.as_str()) {
            Some(ip) => *ip,
            None => {
                let ip = resolve_host(&target.host).await;
                resolved.insert(&target.host, ip);
                ip
            }
        };

        let addr = SocketAddr::new(ip, target.port);
        if !seen.insert(addr) {
            tracing::info!(proxy_target = %target, address = %addr, "Address already bound by an earlier target, skipping");
            continue;
        }

        bindings.push(Binding {
            scheme: target.scheme,
            addr,
            target: target.clone(),
        });
    }

    bindings
}
