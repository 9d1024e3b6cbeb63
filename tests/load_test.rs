//! Concurrent dispatch load through the gateway.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use fanout_gateway::backends::SecretStore;
use serde_json::json;

mod common;

#[tokio::test]
async fn test_concurrent_dispatch_load() {
    let a: SocketAddr = "127.0.0.1:28501".parse().unwrap();
    let b: SocketAddr = "127.0.0.1:28502".parse().unwrap();
    let gw: SocketAddr = "127.0.0.1:28503".parse().unwrap();
    common::start_fixed_llm(a, "alpha says hi", &[]).await;
    common::start_mock_llm(b, |_| async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        (200, common::chat_completion("beta says hi"))
    })
    .await;

    let mut config = common::gateway_config(
        gw,
        vec![common::backend("alpha", a, false), common::backend("beta", b, false)],
    );
    config.rate_limit.max_requests = 1_000;
    let shutdown = common::spawn_gateway(config, SecretStore::new()).await;

    let client = common::http_client();
    let issued: serde_json::Value = client
        .post(format!("http://{}/admin/tokens", gw))
        .bearer_auth("bootstrap-admin-key")
        .json(&json!({ "name": "load", "scopes": ["dispatch"] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let token = issued["token"].as_str().unwrap().to_string();

    let concurrency = 10;
    let requests_per_task = 20;
    let total_requests = concurrency * requests_per_task;
    let start = Instant::now();

    let mut tasks = Vec::new();
    for worker in 0..concurrency {
        let client = client.clone();
        let token = token.clone();
        let url = format!("http://{}/api/dispatch", gw);
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            for _ in 0..requests_per_task {
                let req_start = Instant::now();
                let res = client
                    .post(&url)
                    .bearer_auth(&token)
                    .header("x-forwarded-for", format!("10.0.0.{}", worker + 1))
                    .json(&json!({ "prompt": "hello", "backendIds": ["alpha", "beta"] }))
                    .send()
                    .await;
                if let Ok(res) = res {
                    if res.status().is_success() {
                        let body: serde_json::Value = res.json().await.unwrap_or_default();
                        if body["results"].as_array().is_some_and(|r| r.len() == 2) {
                            latencies.push(req_start.elapsed());
                        }
                    }
                }
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }

    let duration = start.elapsed();
    assert_eq!(all_latencies.len(), total_requests, "every dispatch should settle both backends");

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Dispatch Load Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", total_requests as f64 / duration.as_secs_f64());
    println!("P50 Latency:    {:?}", p50);
    println!("P99 Latency:    {:?}", p99);
    println!("-----------------------------\n");

    shutdown.trigger();
}
