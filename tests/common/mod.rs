//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use webgrapple::config::GrappleConfig;

/// Start a mock backend on an ephemeral port.
///
/// Every response body is `"{name} {method} {path}"`; the `x-forwarded-proto`
/// and `x-forwarded-host` headers it received are echoed back as
/// `x-echo-forwarded-proto` and `x-echo-forwarded-host`.
pub async fn start_mock_backend(name: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let head = read_head(&mut socket).await;
                        let mut lines = head.lines();
                        let mut request_line = lines.next().unwrap_or_default().split(' ');
                        let method = request_line.next().unwrap_or_default().to_string();
                        let path = request_line.next().unwrap_or_default().to_string();

                        let mut echoed = String::new();
                        for line in lines {
                            if let Some((key, value)) = line.split_once(':') {
                                let key = key.trim().to_ascii_lowercase();
                                if key == "x-forwarded-proto" || key == "x-forwarded-host" {
                                    echoed.push_str(&format!("x-echo-{}: {}\r\n", &key[2..], value.trim()));
                                }
                            }
                        }

                        let body = format!("{name} {method} {path}");
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n{}",
                            body.len(),
                            echoed,
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn read_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Config with one plain proxy listener and the control plane on ephemeral ports.
#[allow(dead_code)]
pub fn test_config(backend: SocketAddr) -> GrappleConfig {
    let mut config = GrappleConfig::default();
    config.proxy.targets = vec!["http://127.0.0.1:0".to_string()];
    config.proxy.backend_url = format!("http://{backend}");
    config.proxy.shutdown_timeout_secs = 1;
    config.control.bind_address = "127.0.0.1:0".to_string();
    config
}

/// A port that was free a moment ago.
#[allow(dead_code)]
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Client that trusts any certificate, like a developer clicking through a warning.
#[allow(dead_code)]
pub fn insecure_client() -> reqwest::Client {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .no_proxy()
        .build()
        .unwrap()
}
