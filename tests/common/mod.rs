//! Shared utilities for integration tests: raw-TCP mock LLM backends and a
//! gateway launcher.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use fanout_gateway::backends::SecretStore;
use fanout_gateway::config::{BackendConfig, GatewayConfig};
use fanout_gateway::lifecycle::startup::build_registry;
use fanout_gateway::{HttpServer, Shutdown};

/// A request as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: String,
    pub path: String,
    /// Lowercased header names.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl MockRequest {
    pub fn bearer(&self) -> Option<&str> {
        self.headers.get("authorization").and_then(|v| v.strip_prefix("Bearer "))
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<MockRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    Some(MockRequest { method, path, headers, body })
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        400 => "400 Bad Request",
        401 => "401 Unauthorized",
        404 => "404 Not Found",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Start a programmable mock backend. The handler sees every parsed request.
pub async fn start_mock_llm<F, Fut>(addr: SocketAddr, f: F)
where
    F: Fn(MockRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(request).await;
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text(status),
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Mock that answers chat completions with a fixed text and lists `models`.
pub async fn start_fixed_llm(addr: SocketAddr, answer: &'static str, models: &'static [&'static str]) {
    start_mock_llm(addr, move |req| async move {
        if req.path.ends_with("/models") {
            let data: Vec<_> = models.iter().map(|id| json!({ "id": id })).collect();
            (200, json!({ "data": data }).to_string())
        } else {
            (200, chat_completion(answer))
        }
    })
    .await;
}

pub fn chat_completion(content: &str) -> String {
    json!({
        "choices": [{ "message": { "role": "assistant", "content": content }, "finish_reason": "stop" }]
    })
    .to_string()
}

pub fn backend(id: &str, addr: SocketAddr, requires_secret: bool) -> BackendConfig {
    BackendConfig {
        id: id.into(),
        display_name: format!("{} provider", id),
        base_url: format!("http://{}/v1", addr),
        default_model: format!("{}-model", id),
        requires_secret,
        secret_env: None,
        temperature: 0.7,
        max_tokens: None,
    }
}

/// Test config: metrics off, forwarded headers trusted so tests can pick a client identity.
pub fn gateway_config(addr: SocketAddr, backends: Vec<BackendConfig>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = addr.to_string();
    config.observability.metrics_enabled = false;
    config.security.trust_forwarded_headers = true;
    config.csrf.secret = "integration-csrf-secret".into();
    config.admin.api_key = "bootstrap-admin-key".into();
    config.admin.token_hash_key = "integration-hash-key".into();
    config.backends = backends;
    config
}

/// Spawn the gateway and wait until it accepts connections.
pub async fn spawn_gateway(config: GatewayConfig, secrets: SecretStore) -> Shutdown {
    let addr: SocketAddr = config.listener.bind_address.parse().unwrap();
    let registry = build_registry(&config).unwrap();
    let server = HttpServer::new(config, registry, secrets);

    let shutdown = Shutdown::new();
    let (_, config_updates) = mpsc::unbounded_channel();
    let listener = TcpListener::bind(addr).await.unwrap();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
