//! HTTPS listeners and certificate provisioning through the orchestrator.

use std::net::IpAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use rcgen::{CertificateParams, SanType};
use webgrapple::http::forward::build_client;
use webgrapple::http::ListenerScheme;
use webgrapple::{Orchestrator, PrefixRoutingPolicy, RunningProxy, Shutdown};

mod common;

async fn start_tls(targets: &[&str], dir: &std::path::Path) -> RunningProxy {
    let default_addr = common::start_mock_backend("default").await;
    let mut config = common::test_config(default_addr);
    config.proxy.targets = targets.iter().map(|t| t.to_string()).collect();
    config.tls.cert_path = Some(dir.join("cert.pem").to_string_lossy().into_owned());
    config.tls.key_path = Some(dir.join("key.pem").to_string_lossy().into_owned());

    let policy = PrefixRoutingPolicy::new(build_client().unwrap());
    Orchestrator::new(config, Arc::new(policy))
        .start(Shutdown::new())
        .await
        .unwrap()
}

fn san_names(cert_path: &std::path::Path) -> (Vec<String>, Vec<IpAddr>) {
    let pem = std::fs::read_to_string(cert_path).unwrap();
    let params = CertificateParams::from_ca_cert_pem(&pem).unwrap();
    let mut dns = Vec::new();
    let mut ips = Vec::new();
    for san in params.subject_alt_names {
        match san {
            SanType::DnsName(name) => dns.push(name.as_str().to_string()),
            SanType::IpAddress(ip) => ips.push(ip),
            _ => {}
        }
    }
    dns.sort();
    (dns, ips)
}

#[tokio::test]
async fn https_and_http_listeners_share_one_certificate() {
    let dir = tempfile::tempdir().unwrap();
    let https_target = format!("https://127.0.0.1:{}", common::free_port());
    let http_target = format!("http://localhost:{}", common::free_port());
    let proxy = start_tls(&[https_target.as_str(), http_target.as_str()], dir.path()).await;

    let schemes: Vec<_> = proxy.proxy_addrs().iter().map(|p| p.scheme).collect();
    assert_eq!(schemes, vec![ListenerScheme::Https, ListenerScheme::Http]);

    let certificate = proxy.certificate().unwrap();
    assert_eq!(certificate.cert_path, dir.path().join("cert.pem"));

    let (dns, ips) = san_names(&certificate.cert_path);
    assert_eq!(dns, vec!["localhost"]);
    assert_eq!(ips, vec!["127.0.0.1".parse::<IpAddr>().unwrap()]);

    let https_addr = proxy.proxy_addrs()[0].addr;
    let res = common::insecure_client()
        .get(format!("https://{https_addr}/"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    proxy.shutdown().trigger();
    proxy.wait().await.unwrap();
}

#[tokio::test]
async fn unresolvable_host_still_starts_and_is_certified() {
    let dir = tempfile::tempdir().unwrap();
    let proxy = start_tls(&["https://unknown.invalid:0"], dir.path()).await;

    let addr = proxy.proxy_addrs()[0].addr;
    assert_eq!(addr.ip(), IpAddr::from([127, 0, 0, 1]));

    let (dns, _) = san_names(&proxy.certificate().unwrap().cert_path);
    assert_eq!(dns, vec!["localhost", "unknown.invalid"]);

    proxy.shutdown().trigger();
    proxy.wait().await.unwrap();
}

#[tokio::test]
async fn existing_certificate_is_reused_across_restarts() {
    let dir = tempfile::tempdir().unwrap();

    let first = start_tls(&["https://127.0.0.1:0"], dir.path()).await;
    let pem = std::fs::read(&first.certificate().unwrap().cert_path).unwrap();
    first.shutdown().trigger();
    first.wait().await.unwrap();

    let second = start_tls(&["https://127.0.0.1:0", "https://unknown.invalid:0"], dir.path()).await;
    assert_eq!(std::fs::read(&second.certificate().unwrap().cert_path).unwrap(), pem);
    second.shutdown().trigger();
    second.wait().await.unwrap();
}

#[tokio::test]
async fn plain_targets_need_no_certificate() {
    let default_addr = common::start_mock_backend("default").await;
    let policy = PrefixRoutingPolicy::new(build_client().unwrap());
    let proxy = Orchestrator::new(common::test_config(default_addr), Arc::new(policy))
        .start(Shutdown::new())
        .await
        .unwrap();

    assert!(proxy.certificate().is_none());

    proxy.shutdown().trigger();
    proxy.wait().await.unwrap();
}
