//! Admission chain, audit trail and admin surface, exercised over real HTTP.

use std::net::SocketAddr;

use fanout_gateway::backends::SecretStore;
use fanout_gateway::config::GatewayConfig;
use fanout_gateway::Shutdown;
use serde_json::{json, Value};

mod common;

const ADMIN_KEY: &str = "bootstrap-admin-key";

fn addr(port: u16) -> SocketAddr {
    format!("127.0.0.1:{}", port).parse().unwrap()
}

async fn start(backend_port: u16, gateway_port: u16, tweak: impl FnOnce(&mut GatewayConfig)) -> (String, Shutdown) {
    let backend = addr(backend_port);
    common::start_fixed_llm(backend, "fine", &[]).await;
    let gw = addr(gateway_port);
    let mut config = common::gateway_config(gw, vec![common::backend("alpha", backend, false)]);
    tweak(&mut config);
    let shutdown = common::spawn_gateway(config, SecretStore::new()).await;
    (format!("http://{}", gw), shutdown)
}

async fn csrf_token(client: &reqwest::Client, base: &str, who: &str) -> String {
    let res = client
        .get(format!("{}/api/csrf-token", base))
        .header("x-forwarded-for", who)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers()["set-cookie"].to_str().unwrap().contains("HttpOnly"));
    let body: Value = res.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

fn dispatch_body(prompt: &str) -> Value {
    json!({ "prompt": prompt, "backendIds": ["alpha"] })
}

async fn dispatch_with_csrf(client: &reqwest::Client, base: &str, who: &str, token: &str, prompt: &str) -> reqwest::Response {
    client
        .post(format!("{}/api/dispatch", base))
        .header("x-forwarded-for", who)
        .header("x-csrf-token", token)
        .header("cookie", format!("csrf_token={}", token))
        .json(&dispatch_body(prompt))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health_is_open_and_hardened() {
    let (base, shutdown) = start(28401, 28402, |c| c.ip_guard.blacklist = vec!["10.9.9.9".into()]).await;
    let client = common::http_client();

    let res = client
        .get(format!("{}/api/health", base))
        .header("x-forwarded-for", "10.9.9.9")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-content-type-options"], "nosniff");
    assert_eq!(res.headers()["x-frame-options"], "DENY");
    assert!(res.headers().contains_key("x-request-id"));

    let res = client
        .get(format!("{}/api/backends", base))
        .header("x-forwarded-for", "10.9.9.9")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Access denied");

    shutdown.trigger();
}

#[tokio::test]
async fn test_rate_limit_rejects_with_headers() {
    let (base, shutdown) = start(28411, 28412, |c| c.rate_limit.max_requests = 2).await;
    let client = common::http_client();
    let token = csrf_token(&client, &base, "203.0.113.7").await;

    for expected_remaining in ["1", "0"] {
        let res = dispatch_with_csrf(&client, &base, "203.0.113.7", &token, "hi").await;
        assert_eq!(res.status(), 200);
        assert_eq!(res.headers()["x-ratelimit-limit"], "2");
        assert_eq!(res.headers()["x-ratelimit-remaining"], expected_remaining);
    }

    let res = dispatch_with_csrf(&client, &base, "203.0.113.7", &token, "hi").await;
    assert_eq!(res.status(), 429);
    assert!(res.headers().contains_key("retry-after"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Rate limit exceeded");

    // Windows are per client.
    let res = dispatch_with_csrf(&client, &base, "203.0.113.8", &token, "hi").await;
    assert_eq!(res.status(), 200);

    shutdown.trigger();
}

#[tokio::test]
async fn test_csrf_failures_lead_to_block() {
    let (base, shutdown) = start(28421, 28422, |c| {
        c.ip_guard.max_violations_before_block = 3;
        c.audit.escalate_anomalies = false;
    })
    .await;
    let client = common::http_client();

    for _ in 0..3 {
        let res = client
            .post(format!("{}/api/dispatch", base))
            .header("x-forwarded-for", "198.51.100.4")
            .json(&dispatch_body("hi"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 403);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "CSRF validation failed");
    }

    let res = client
        .get(format!("{}/api/backends", base))
        .header("x-forwarded-for", "198.51.100.4")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
    let body: Value = res.json().await.unwrap();
    assert!(body["details"]["retryAfterSecs"].as_u64().unwrap() > 0);

    let res = client
        .get(format!("{}/admin/audit?eventType=ip-blocked&client=198.51.100.4", base))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let events: Vec<Value> = res.json().await.unwrap();
    assert!(!events.is_empty());

    shutdown.trigger();
}

#[tokio::test]
async fn test_foreign_origin_is_rejected() {
    let (base, shutdown) = start(28431, 28432, |_| {}).await;
    let client = common::http_client();
    let token = csrf_token(&client, &base, "192.0.2.10").await;

    let res = client
        .post(format!("{}/api/dispatch", base))
        .header("x-forwarded-for", "192.0.2.10")
        .header("origin", "https://evil.example")
        .header("x-csrf-token", &token)
        .header("cookie", format!("csrf_token={}", token))
        .json(&dispatch_body("hi"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Origin not allowed");

    shutdown.trigger();
}

#[tokio::test]
async fn test_malicious_prompt_is_rejected_and_audited() {
    let (base, shutdown) = start(28441, 28442, |_| {}).await;
    let client = common::http_client();
    let token = csrf_token(&client, &base, "192.0.2.20").await;

    let res = dispatch_with_csrf(&client, &base, "192.0.2.20", &token, "x'; DROP TABLE users; --").await;
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert!(body["details"]["patterns"].as_array().unwrap().contains(&json!("sql_injection")));

    let res = client
        .get(format!("{}/admin/audit?eventType=invalid-input", base))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap();
    let events: Vec<Value> = res.json().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["client"], "192.0.2.20");
    assert_eq!(events[0]["severity"], "high");

    shutdown.trigger();
}

#[tokio::test]
async fn test_admin_token_lifecycle() {
    let (base, shutdown) = start(28451, 28452, |_| {}).await;
    let client = common::http_client();

    let res = client.get(format!("{}/admin/status", base)).send().await.unwrap();
    assert_eq!(res.status(), 401);

    let res = client
        .post(format!("{}/admin/tokens", base))
        .bearer_auth(ADMIN_KEY)
        .json(&json!({ "name": "ci", "scopes": ["dispatch"], "expiryDays": 7 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let issued: Value = res.json().await.unwrap();
    let token = issued["token"].as_str().unwrap().to_string();
    let id = issued["id"].as_str().unwrap().to_string();
    assert!(token.starts_with("fgw_"));
    assert!(issued["expiresAt"].is_string());

    // Bearer tokens with the dispatch scope bypass CSRF.
    let bearer_client = gateway_sdk::GatewayClient::new(&base).with_bearer(token.clone());
    let response = bearer_client
        .dispatch(&gateway_sdk::DispatchRequest {
            prompt: "hi".into(),
            backend_ids: vec!["alpha".into()],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(response.results[0].content.as_deref(), Some("fine"));

    // A dispatch-only token cannot manage tokens.
    let res = client
        .get(format!("{}/admin/tokens", base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);

    let res = client
        .get(format!("{}/admin/tokens", base))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap();
    let listed: Vec<Value> = res.json().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["name"], "ci");
    assert!(listed[0]["lastUsedAt"].is_string());
    assert!(listed[0].get("token").is_none());

    let res = client
        .delete(format!("{}/admin/tokens/{}", base, id))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["revoked"], true);

    let res = bearer_client
        .send_dispatch(&gateway_sdk::DispatchRequest {
            prompt: "hi".into(),
            backend_ids: vec!["alpha".into()],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    let res = client
        .delete(format!("{}/admin/tokens/{}", base, id))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    shutdown.trigger();
}

#[tokio::test]
async fn test_token_validation_and_status() {
    let (base, shutdown) = start(28461, 28462, |_| {}).await;
    let client = common::http_client();

    let res = client
        .post(format!("{}/admin/tokens", base))
        .bearer_auth(ADMIN_KEY)
        .json(&json!({ "name": "", "scopes": ["read"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    let res = client
        .post(format!("{}/admin/tokens", base))
        .bearer_auth(ADMIN_KEY)
        .json(&json!({ "name": "ops", "scopes": ["read"] }))
        .send()
        .await
        .unwrap();
    let issued: Value = res.json().await.unwrap();
    let read_token = issued["token"].as_str().unwrap().to_string();

    let res = client
        .get(format!("{}/admin/status", base))
        .bearer_auth(&read_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let status: Value = res.json().await.unwrap();
    assert_eq!(status["backends"], 1);
    assert_eq!(status["tokens"], 1);

    // Read scope is not enough on /api.
    let res = client
        .post(format!("{}/api/dispatch", base))
        .bearer_auth(&read_token)
        .json(&dispatch_body("hi"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);

    let res = client
        .get(format!("{}/admin/audit/anomalies/127.0.0.1", base))
        .bearer_auth(&read_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let report: Value = res.json().await.unwrap();
    assert_eq!(report["anomalous"], false);
    assert_eq!(report["blocked"], false);

    let res = client
        .get(format!("{}/admin/audit/stats", base))
        .bearer_auth(&read_token)
        .send()
        .await
        .unwrap();
    let stats: Value = res.json().await.unwrap();
    assert!(stats["totalEvents"].as_u64().unwrap() >= 1);

    shutdown.trigger();
}

#[tokio::test]
async fn test_malformed_bodies_are_bad_requests() {
    let (base, shutdown) = start(28471, 28472, |c| c.ip_guard.blacklist = vec!["10.7.7.7".into()]).await;
    let client = common::http_client();
    let token = csrf_token(&client, &base, "10.0.0.71").await;

    for body in [
        json!({ "backendIds": ["alpha"] }),
        json!({ "prompt": 5, "backendIds": ["alpha"] }),
    ] {
        let res = client
            .post(format!("{}/api/dispatch", base))
            .header("x-forwarded-for", "10.0.0.71")
            .header("x-csrf-token", &token)
            .header("cookie", format!("csrf_token={}", token))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 400);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "Invalid request body");
    }

    let res = client
        .post(format!("{}/admin/tokens", base))
        .bearer_auth(ADMIN_KEY)
        .json(&json!({ "scopes": ["read"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    // A list denial is not a violation block.
    let res = client
        .get(format!("{}/admin/audit/anomalies/10.7.7.7", base))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let report: Value = res.json().await.unwrap();
    assert_eq!(report["blocked"], false);
    assert_eq!(report["violationCount"], 0);

    shutdown.trigger();
}
