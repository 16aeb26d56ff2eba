//! Integration tests for delivery over HTTP.
//!
//! Runs the full client pipeline against a wiremock collector and checks
//! the request shape, status mapping and send state updates.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use flare_core::{EventOptions, Scope};
use flare_delivery::{
    auth::client_identifier, send_state::SendHealth, Client, Configuration, DeliveryError,
    Encoding, SendOutcome, Settings,
};
use flare_testing::MockCollector;
use tracing_test::traced_test;

fn http_client(collector: &MockCollector, encoding: Encoding) -> Client {
    let config = Configuration::new(&collector.dsn()).unwrap().with_encoding(encoding);
    Client::new(config).expect("http client should build")
}

#[tokio::test]
async fn gzip_event_reaches_collector() {
    let collector = MockCollector::start().await;
    collector.accept_events().await;
    let client = http_client(&collector, Encoding::Gzip);

    let sent = client
        .capture_message("deploy finished", &Scope::new(), EventOptions::new())
        .await
        .unwrap()
        .expect("event should be sent");

    let received = collector.received_events().await;
    assert_eq!(received.len(), 1);

    let request = &received[0];
    assert_eq!(request.content_type.as_deref(), Some("application/octet-stream"));

    let auth = request.auth_header.as_deref().unwrap();
    assert!(auth.starts_with("Sentry sentry_version=7, "));
    assert!(auth.contains(&format!("sentry_client={}", client_identifier())));
    assert!(auth.contains("sentry_key=public"));
    assert!(auth.ends_with("sentry_secret=secret"));

    let hash = request.decode().unwrap();
    assert_eq!(hash["message"], "deploy finished");
    assert_eq!(hash["event_id"], sent.event_id.to_string());
}

#[tokio::test]
async fn plain_json_event_reaches_collector() {
    let collector = MockCollector::start().await;
    collector.accept_events().await;
    let client = http_client(&collector, Encoding::None);

    client.capture_message("plain", &Scope::new(), EventOptions::new()).await.unwrap();

    let received = collector.received_events().await;
    assert_eq!(received[0].content_type.as_deref(), Some("application/json"));
    assert_eq!(received[0].decode().unwrap()["message"], "plain");
}

#[tokio::test]
async fn rejection_detail_comes_from_error_header() {
    let collector = MockCollector::start().await;
    collector.reject_events(400, "invalid event payload").await;
    let client = http_client(&collector, Encoding::None);

    let event = flare_core::Event::from_message("bad", EventOptions::new());
    let outcome = client.send_event(event, &flare_core::Hint::default()).await.unwrap();

    match outcome {
        SendOutcome::Failed(DeliveryError::ClientError { status_code, body }) => {
            assert_eq!(status_code, 400);
            assert_eq!(body, "invalid event payload");
        },
        other => panic!("expected client error, got {other:?}"),
    }
}

#[tokio::test]
async fn rate_limit_suppresses_following_sends() {
    let collector = MockCollector::start().await;
    collector.rate_limit(Duration::from_secs(60)).await;
    let client = http_client(&collector, Encoding::None);

    let first = client.capture_message("one", &Scope::new(), EventOptions::new()).await.unwrap();
    let second = client.capture_message("two", &Scope::new(), EventOptions::new()).await.unwrap();

    assert!(first.is_none());
    assert!(second.is_none());
    collector.assert_event_count(1).await;

    let stats = client.send_state().stats().await;
    assert_eq!(stats.health, SendHealth::Suppressed);
    assert_eq!(stats.retry_after, Some(Duration::from_secs(60)));
}

#[tokio::test]
async fn server_errors_count_towards_threshold() {
    let collector = MockCollector::start().await;
    collector.reject_events(503, "maintenance").await;
    let client = http_client(&collector, Encoding::None);

    for _ in 0..5 {
        client.capture_message("retrying", &Scope::new(), EventOptions::new()).await.unwrap();
    }

    collector.assert_event_count(3).await;
    assert_eq!(client.send_state().stats().await.health, SendHealth::Suppressed);
}

#[tokio::test]
async fn slow_collector_times_out() {
    let collector = MockCollector::start().await;
    collector.respond_slowly(Duration::from_secs(5)).await;

    let settings = Settings {
        dsn: Some(collector.dsn()),
        timeout_seconds: 1,
        ..Settings::default()
    };
    let client = Client::new(settings.to_configuration().unwrap()).unwrap();

    let event = flare_core::Event::from_message("slow", EventOptions::new());
    let outcome = client.send_event(event, &flare_core::Hint::default()).await.unwrap();

    assert!(matches!(outcome, SendOutcome::Failed(DeliveryError::Timeout { timeout_seconds: 1 })));
}

#[tokio::test]
#[traced_test]
async fn unreachable_collector_logs_one_line_per_failed_send() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = Configuration::new(&format!("http://public@127.0.0.1:{port}/1")).unwrap();
    let client = Client::builder(config).failure_threshold(1).build().unwrap();

    let outcome = client
        .send_event(
            flare_core::Event::from_message("offline", EventOptions::new()),
            &flare_core::Hint::from_message("offline"),
        )
        .await
        .unwrap();

    assert!(matches!(outcome, SendOutcome::Failed(DeliveryError::NetworkError { .. })));
    assert_eq!(client.send_state().stats().await.health, SendHealth::Suppressed);
    logs_assert(|lines: &[&str]| {
        let loud = lines
            .iter()
            .filter(|line| line.contains(" WARN ") || line.contains(" ERROR "))
            .count();
        match loud {
            1 => Ok(()),
            n => Err(format!("expected one warn/error line, got {n}")),
        }
    });
}
