//! End-to-end tests for the gateway pipeline.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use payload_gateway::config::GatewayConfig;
use payload_gateway::http::HttpServer;
use payload_gateway::lifecycle::Shutdown;
use payload_gateway::security::PatternSet;
use serde_json::{json, Value};

mod common;

async fn start_gateway(
    gateway_addr: SocketAddr,
    backend_addr: SocketAddr,
    mutate: impl FnOnce(&mut GatewayConfig),
) -> Shutdown {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = gateway_addr.to_string();
    config.upstream.address = backend_addr.to_string();
    mutate(&mut config);

    let patterns = Arc::new(
        PatternSet::with_extensions(
            &config.scanner.extra_keys,
            &config.scanner.extra_value_patterns,
        )
        .unwrap(),
    );

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, patterns);
    let listener = tokio::net::TcpListener::bind(gateway_addr).await.unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

#[tokio::test]
async fn clean_request_is_forwarded() {
    let backend_addr: SocketAddr = "127.0.0.1:29181".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29182".parse().unwrap();

    common::start_mock_backend(backend_addr, r#"{"ok":true}"#).await;
    let shutdown = start_gateway(gateway_addr, backend_addr, |_| {}).await;

    let res = client()
        .post(format!("http://{}/api/events", gateway_addr))
        .json(&json!({"title": "Poetry Night", "year": 2024}))
        .send()
        .await
        .expect("Gateway unreachable");

    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"ok": true}));

    shutdown.trigger();
}

#[tokio::test]
async fn dangerous_body_is_rejected_with_opaque_error() {
    let backend_addr: SocketAddr = "127.0.0.1:29281".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29282".parse().unwrap();

    common::start_mock_backend(backend_addr, r#"{"ok":true}"#).await;
    let shutdown = start_gateway(gateway_addr, backend_addr, |_| {}).await;

    let res = client()
        .post(format!("http://{}/api/events", gateway_addr))
        .json(&json!({"title": "x", "__proto__": {"polluted": true}}))
        .send()
        .await
        .expect("Gateway unreachable");

    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({"error": "Request body contains dangerous patterns"})
    );
    // No scan detail leaks to the client.
    assert!(body.get("details").is_none());

    shutdown.trigger();
}

#[tokio::test]
async fn dangerous_value_is_rejected() {
    let backend_addr: SocketAddr = "127.0.0.1:29381".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29382".parse().unwrap();

    common::start_mock_backend(backend_addr, r#"{"ok":true}"#).await;
    let shutdown = start_gateway(gateway_addr, backend_addr, |_| {}).await;

    let res = client()
        .post(format!("http://{}/api/blogs", gateway_addr))
        .json(&json!({"content": "require('child_process').execSync('id')"}))
        .send()
        .await
        .expect("Gateway unreachable");

    assert_eq!(res.status(), 400);

    shutdown.trigger();
}

#[tokio::test]
async fn component_stream_accept_is_blocked_with_fixed_shape() {
    let backend_addr: SocketAddr = "127.0.0.1:29481".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29482".parse().unwrap();

    common::start_mock_backend(backend_addr, r#"{"ok":true}"#).await;
    let shutdown = start_gateway(gateway_addr, backend_addr, |_| {}).await;

    let res = client()
        .get(format!("http://{}/", gateway_addr))
        .header("accept", "text/x-component")
        .send()
        .await
        .expect("Gateway unreachable");

    assert_eq!(res.status(), 403);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "error": "Forbidden",
            "message": "Request blocked for security reasons"
        })
    );

    shutdown.trigger();
}

#[tokio::test]
async fn server_action_header_is_blocked() {
    let backend_addr: SocketAddr = "127.0.0.1:29581".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29582".parse().unwrap();

    common::start_mock_backend(backend_addr, r#"{"ok":true}"#).await;
    let shutdown = start_gateway(gateway_addr, backend_addr, |_| {}).await;

    let res = client()
        .post(format!("http://{}/api/archives", gateway_addr))
        .header("next-action", "c0ffee")
        .json(&json!({"title": "harmless"}))
        .send()
        .await
        .expect("Gateway unreachable");

    assert_eq!(res.status(), 403);

    shutdown.trigger();
}

#[tokio::test]
async fn url_pattern_is_blocked() {
    let backend_addr: SocketAddr = "127.0.0.1:29681".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29682".parse().unwrap();

    common::start_mock_backend(backend_addr, r#"{"ok":true}"#).await;
    let shutdown = start_gateway(gateway_addr, backend_addr, |_| {}).await;

    let res = client()
        .get(format!("http://{}/api/items?__proto__=1", gateway_addr))
        .send()
        .await
        .expect("Gateway unreachable");

    assert_eq!(res.status(), 403);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "error": "Forbidden",
            "message": "Request contains forbidden patterns"
        })
    );

    shutdown.trigger();
}

#[tokio::test]
async fn disabled_guard_lets_marker_headers_through() {
    let backend_addr: SocketAddr = "127.0.0.1:29781".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29782".parse().unwrap();

    common::start_mock_backend(backend_addr, r#"{"ok":true}"#).await;
    let shutdown = start_gateway(gateway_addr, backend_addr, |config| {
        config.guard.enabled = false;
    })
    .await;

    let res = client()
        .get(format!("http://{}/", gateway_addr))
        .header("accept", "text/x-component")
        .send()
        .await
        .expect("Gateway unreachable");

    assert_eq!(res.status(), 200);

    shutdown.trigger();
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let backend_addr: SocketAddr = "127.0.0.1:29881".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29882".parse().unwrap();

    common::start_mock_backend(backend_addr, r#"{"ok":true}"#).await;
    let shutdown = start_gateway(gateway_addr, backend_addr, |config| {
        config.scanner.max_body_bytes = 256;
    })
    .await;

    let res = client()
        .post(format!("http://{}/api/videos", gateway_addr))
        .json(&json!({"blob": "x".repeat(1024)}))
        .send()
        .await
        .expect("Gateway unreachable");

    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"error": "Request body too large"}));

    shutdown.trigger();
}

#[tokio::test]
async fn unsafe_upstream_response_data_is_dropped() {
    let backend_addr: SocketAddr = "127.0.0.1:29981".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29982".parse().unwrap();

    common::start_mock_backend(
        backend_addr,
        r#"{"records":[{"note":"eval(payload)"}]}"#,
    )
    .await;
    let shutdown = start_gateway(gateway_addr, backend_addr, |config| {
        config.scanner.scan_responses = true;
    })
    .await;

    let res = client()
        .get(format!("http://{}/api/testimonials", gateway_addr))
        .send()
        .await
        .expect("Gateway unreachable");

    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"success": true}));

    shutdown.trigger();
}

#[tokio::test]
async fn safe_upstream_response_passes_unchanged_when_filtering() {
    let backend_addr: SocketAddr = "127.0.0.1:30081".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:30082".parse().unwrap();

    common::start_mock_backend(backend_addr, r#"{"records":[{"note":"fine"}]}"#).await;
    let shutdown = start_gateway(gateway_addr, backend_addr, |config| {
        config.scanner.scan_responses = true;
    })
    .await;

    let res = client()
        .get(format!("http://{}/api/testimonials", gateway_addr))
        .send()
        .await
        .expect("Gateway unreachable");

    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"records": [{"note": "fine"}]}));

    shutdown.trigger();
}

#[tokio::test]
async fn admin_status_requires_bearer_key() {
    let backend_addr: SocketAddr = "127.0.0.1:30181".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:30182".parse().unwrap();

    common::start_mock_backend(backend_addr, r#"{"ok":true}"#).await;
    let shutdown = start_gateway(gateway_addr, backend_addr, |config| {
        config.admin.enabled = true;
        config.admin.api_key = "test-key".to_string();
    })
    .await;

    let res = client()
        .get(format!("http://{}/admin/status", gateway_addr))
        .send()
        .await
        .expect("Gateway unreachable");
    assert_eq!(res.status(), 401);

    let res = client()
        .get(format!("http://{}/admin/status", gateway_addr))
        .header("authorization", "Bearer test-key")
        .send()
        .await
        .expect("Gateway unreachable");
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], json!(true));
    assert!(body["data"]["registry"]["dangerous_keys"].as_u64().unwrap() > 0);

    shutdown.trigger();
}
