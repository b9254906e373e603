// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use event_relay::sink::{
    DeliveryOutcome, DeliverySink, HttpSink, HttpSinkConfig, RetryPolicy, SOURCE_ID_HEADER,
};
use event_relay::transform::EncodedBatch;
use mockito::{Matcher, Server};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tracing_test::traced_test;

fn sink_for(url: String) -> HttpSink {
    sink_with_timeout(url, Duration::from_secs(2))
}

fn sink_with_timeout(url: String, timeout: Duration) -> HttpSink {
    HttpSink::new(HttpSinkConfig {
        endpoint: format!("{url}/update"),
        source_id: "build-host-1".to_string(),
        timeout,
        https_proxy: None,
        retry_policy: RetryPolicy {
            max_attempts: 3,
            backoff_factor: Duration::from_millis(1),
            ..Default::default()
        },
    })
    .expect("failed to create sink")
}

fn payload() -> Vec<EncodedBatch> {
    vec![EncodedBatch {
        window_start: UNIX_EPOCH + Duration::from_millis(1_500),
        codes: vec![104, 105],
    }]
}

#[tokio::test]
async fn test_accepted_payload_is_delivered() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/update")
        .match_header(SOURCE_ID_HEADER, "build-host-1")
        .match_header("Content-Type", "application/json")
        .match_body(Matcher::Json(serde_json::json!([[1.5, [104, 105]]])))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let outcome = sink_for(server.url()).send(&payload()).await;

    assert_eq!(outcome, DeliveryOutcome::Delivered);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_empty_payload_is_posted() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/update")
        .match_body("[]")
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let outcome = sink_for(server.url()).send(&[]).await;

    assert_eq!(outcome, DeliveryOutcome::Delivered);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_error_retried_then_degraded() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/update")
        .with_status(500)
        .with_body("upstream unavailable")
        .expect(3)
        .create_async()
        .await;

    let outcome = sink_for(server.url()).send(&payload()).await;

    assert_eq!(outcome, DeliveryOutcome::Degraded);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rate_limited_is_degraded() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/update")
        .with_status(429)
        .expect(3)
        .create_async()
        .await;

    let outcome = sink_for(server.url()).send(&payload()).await;

    assert_eq!(outcome, DeliveryOutcome::Degraded);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_client_error_is_fatal_without_retry() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/update")
        .with_status(400)
        .with_body("missing source id")
        .expect(1)
        .create_async()
        .await;

    let outcome = sink_for(server.url()).send(&payload()).await;

    assert_eq!(outcome, DeliveryOutcome::Fatal);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unlisted_server_status_degrades_without_retry() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/update")
        .with_status(501)
        .expect(1)
        .create_async()
        .await;

    let outcome = sink_for(server.url()).send(&payload()).await;

    assert_eq!(outcome, DeliveryOutcome::Degraded);
    mock.assert_async().await;
}

#[tokio::test]
#[traced_test]
async fn test_connection_refused_is_retried_then_degraded() {
    // Reserve a port, then free it so nothing is listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("failed to bind");
    let addr = listener.local_addr().expect("no local addr");
    drop(listener);

    let outcome = sink_for(format!("http://{addr}")).send(&payload()).await;

    assert_eq!(outcome, DeliveryOutcome::Degraded);
    assert!(logs_contain("Failed to deliver after 3 attempts"));
}

#[tokio::test]
#[traced_test]
async fn test_attempt_timeout_is_retried_then_degraded() {
    // Accepts connections and never answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().expect("no local addr");
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            held.push(stream);
        }
    });

    let sink = sink_with_timeout(format!("http://{addr}"), Duration::from_millis(200));
    let outcome = sink.send(&payload()).await;

    assert_eq!(outcome, DeliveryOutcome::Degraded);
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
    assert!(logs_contain("Failed to deliver after 3 attempts"));
}
