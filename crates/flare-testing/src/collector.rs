//! Mock collector for end-to-end tests over HTTP.
//!
//! Wraps a wiremock server that serves the store endpoint and decodes every
//! request it received back into a wire hash.

use std::time::Duration;

use bytes::Bytes;
use flare_core::WireHash;
use flare_delivery::{
    encoding::{self, Encoding},
    transport::{AUTH_HEADER, ERROR_HEADER},
};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Project id served by the mock collector.
pub const PROJECT_ID: &str = "42";

/// Public key embedded in [`MockCollector::dsn`].
pub const PUBLIC_KEY: &str = "public";

/// Secret key embedded in [`MockCollector::dsn`].
pub const SECRET_KEY: &str = "secret";

/// Request received by the collector.
#[derive(Debug, Clone)]
pub struct ReceivedEvent {
    /// `X-Sentry-Auth` header value.
    pub auth_header: Option<String>,
    /// `Content-Type` header value.
    pub content_type: Option<String>,
    /// Raw request body.
    pub body: Bytes,
}

impl ReceivedEvent {
    /// Decodes the body into its wire hash.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Serialization` if the body is malformed.
    pub fn decode(&self) -> flare_delivery::Result<WireHash> {
        let encoding = match self.content_type.as_deref() {
            Some(content_type) if content_type == Encoding::None.content_type() => Encoding::None,
            _ => Encoding::Gzip,
        };
        encoding::decode(&self.body, encoding)
    }
}

/// HTTP collector backed by wiremock.
pub struct MockCollector {
    server: MockServer,
}

impl MockCollector {
    /// Starts a collector on a random port with no routes mounted.
    pub async fn start() -> Self {
        Self { server: MockServer::start().await }
    }

    /// DSN pointing at this collector, with both keys set.
    pub fn dsn(&self) -> String {
        let uri = self.server.uri();
        let host = uri.trim_start_matches("http://");
        format!("http://{PUBLIC_KEY}:{SECRET_KEY}@{host}/{PROJECT_ID}")
    }

    /// Path of the store endpoint.
    pub fn store_path() -> String {
        format!("/api/{PROJECT_ID}/store/")
    }

    /// Accepts every event.
    pub async fn accept_events(&self) {
        self.mount(ResponseTemplate::new(200).set_body_string(r#"{"id":"ok"}"#)).await;
    }

    /// Rejects every event with `status` and an `X-Sentry-Error` detail.
    pub async fn reject_events(&self, status: u16, detail: &str) {
        self.mount(ResponseTemplate::new(status).insert_header(ERROR_HEADER, detail)).await;
    }

    /// Answers every event with 429 and a `Retry-After`.
    pub async fn rate_limit(&self, retry_after: Duration) {
        self.mount(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", retry_after.as_secs().to_string().as_str()),
        )
        .await;
    }

    /// Answers every event after `delay`.
    pub async fn respond_slowly(&self, delay: Duration) {
        self.mount(ResponseTemplate::new(200).set_delay(delay)).await;
    }

    /// Removes every mounted route and forgets received requests.
    pub async fn reset(&self) {
        self.server.reset().await;
    }

    async fn mount(&self, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(Self::store_path()))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Every request received on the store endpoint, oldest first.
    pub async fn received_events(&self) -> Vec<ReceivedEvent> {
        let requests = self.server.received_requests().await.unwrap_or_default();

        requests
            .into_iter()
            .filter(|request| request.url.path() == Self::store_path())
            .map(|request| ReceivedEvent {
                auth_header: header(&request, AUTH_HEADER),
                content_type: header(&request, "content-type"),
                body: Bytes::from(request.body),
            })
            .collect()
    }

    /// Asserts that exactly `expected` events were received.
    pub async fn assert_event_count(&self, expected: usize) {
        let received = self.received_events().await.len();
        assert_eq!(received, expected, "expected {expected} events, collector received {received}");
    }
}

fn header(request: &wiremock::Request, name: &str) -> Option<String> {
    request.headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_string)
}
