//! End-to-end tests over a real TCP listener.
//!
//! These use reqwest as the downstream client so that streaming and
//! disconnect behaviour go through hyper's connection handling.

mod common;

use std::time::{Duration, Instant};

use futures::StreamExt;

use bedrock_relay::config::Config;
use bedrock_relay::upstream::TransportError;

use common::{chunk, parse_sse, test_app, Script, ScriptedInvoker, SseFrame};

/// Serve the relay on an ephemeral port and return its base URL.
async fn spawn_relay(invoker: std::sync::Arc<ScriptedInvoker>, config: Config) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = test_app(invoker, config);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn streams_events_over_http() {
    let invoker = ScriptedInvoker::new(Script::Events(vec![
        chunk("Hello"),
        chunk(", "),
        chunk("world"),
        Err(TransportError::new("upstream closed")),
    ]));
    let base = spawn_relay(invoker.clone(), Config::default()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/generate-text", base))
        .json(&serde_json::json!({ "prompt": "greet me" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );

    let body = response.text().await.unwrap();
    assert_eq!(
        parse_sse(&body),
        vec![
            SseFrame::message("Hello"),
            SseFrame::message(", "),
            SseFrame::message("world"),
            SseFrame::error("stream interrupted"),
        ]
    );
    assert!(invoker.released());
}

#[tokio::test]
async fn validation_error_over_http() {
    let invoker = ScriptedInvoker::new(Script::Events(vec![]));
    let base = spawn_relay(invoker.clone(), Config::default()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/generate-text", base))
        .body(r#"{"prompt": ""}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["error"], "Prompt cannot be empty");
    assert_eq!(invoker.calls(), 0);
}

#[tokio::test]
async fn dropped_client_releases_upstream() {
    let invoker = ScriptedInvoker::new(Script::HoldOpen(vec![chunk("partial")]));
    let mut config = Config::default();
    // Short keep-alive so the server notices the closed socket quickly.
    config.server.keep_alive_secs = 1;
    let base = spawn_relay(invoker.clone(), config).await;

    let response = reqwest::Client::new()
        .post(format!("{}/generate-text", base))
        .json(&serde_json::json!({ "prompt": "hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let mut body = response.bytes_stream();
    let mut received = String::new();
    while !received.contains("\n\n") {
        let bytes = body.next().await.expect("frame").expect("bytes");
        received.push_str(std::str::from_utf8(&bytes).unwrap());
    }
    assert_eq!(parse_sse(&received), vec![SseFrame::message("partial")]);
    assert!(!invoker.released());

    drop(body);

    let deadline = Instant::now() + Duration::from_secs(10);
    while !invoker.released() {
        assert!(
            Instant::now() < deadline,
            "upstream stream was not released after client disconnect"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
