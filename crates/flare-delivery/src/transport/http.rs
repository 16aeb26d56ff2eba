//! HTTP transport posting events to the collector's store endpoint.
//!
//! Handles request construction, response processing, and error
//! categorization so the client can update its send state.

use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header::HeaderMap, Response};
use tracing::{info_span, Instrument};

use super::Transport;
use crate::{
    auth::client_identifier,
    config::Configuration,
    error::{DeliveryError, Result},
};

/// Header carrying the authentication string.
pub const AUTH_HEADER: &str = "X-Sentry-Auth";

/// Header collectors use to explain a rejection.
pub const ERROR_HEADER: &str = "X-Sentry-Error";

/// Back-off applied to a 429 without a usable `Retry-After`.
const DEFAULT_RETRY_AFTER: u64 = 60;

/// Longest error detail kept from a response body.
const MAX_ERROR_BODY: usize = 1024;

/// Transport for `http` and `https` DSNs.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    store_url: String,
    timeout_seconds: u64,
}

impl HttpTransport {
    /// Creates a transport for the configured collector.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::ConfigurationError` if the HTTP client cannot
    /// be configured with the provided settings.
    pub fn new(config: &Configuration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.open_timeout)
            .user_agent(client_identifier())
            .build()
            .map_err(|e| {
                DeliveryError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            store_url: config.dsn().store_url(),
            timeout_seconds: config.timeout.as_secs(),
        })
    }

    /// Endpoint events are posted to.
    pub fn store_url(&self) -> &str {
        &self.store_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    /// Posts the payload to the store endpoint.
    ///
    /// # Errors
    ///
    /// - `NetworkError` for connection failures
    /// - `Timeout` for request timeouts
    /// - `RateLimited` for 429 responses
    /// - `ClientError` for other 4xx responses
    /// - `ServerError` for 5xx and unexpected responses
    async fn send_event(
        &self,
        auth_header: &str,
        payload: Bytes,
        content_type: &str,
    ) -> Result<()> {
        let span = info_span!("event_delivery", url = %self.store_url, bytes = payload.len());

        async move {
            let start_time = Instant::now();
            tracing::debug!("posting event");

            let response = self
                .client
                .post(&self.store_url)
                .header(AUTH_HEADER, auth_header)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(payload)
                .send()
                .await
                .map_err(|e| {
                    tracing::debug!(
                        duration_ms = start_time.elapsed().as_millis(),
                        "request failed: {}",
                        e
                    );

                    if e.is_timeout() {
                        DeliveryError::timeout(self.timeout_seconds)
                    } else if e.is_connect() {
                        DeliveryError::network(format!("connection failed: {e}"))
                    } else {
                        DeliveryError::network(e.to_string())
                    }
                })?;

            let status_code = response.status().as_u16();
            tracing::debug!(
                status = status_code,
                duration_ms = start_time.elapsed().as_millis(),
                "received response"
            );

            if response.status().is_success() {
                return Ok(());
            }

            Err(error_from_response(response).await)
        }
        .instrument(span)
        .await
    }
}

/// Maps a non-2xx response onto a delivery error.
async fn error_from_response(response: Response) -> DeliveryError {
    let status_code = response.status().as_u16();

    if status_code == 429 {
        let retry_after =
            extract_retry_after_seconds(response.headers()).unwrap_or(DEFAULT_RETRY_AFTER);
        return DeliveryError::rate_limited(retry_after);
    }

    let error_header = header_value(response.headers(), ERROR_HEADER);
    let detail = match error_header {
        Some(detail) => detail,
        None => match response.bytes().await {
            Ok(bytes) => truncate_body(&bytes),
            Err(e) => format!("[failed to read response body: {e}]"),
        },
    };

    match status_code {
        400..=499 => DeliveryError::client_error(status_code, detail),
        _ => DeliveryError::server_error(status_code, detail),
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_string)
}

fn truncate_body(bytes: &[u8]) -> String {
    if bytes.len() > MAX_ERROR_BODY {
        let suffix = "... (truncated)";
        let truncated = String::from_utf8_lossy(&bytes[..MAX_ERROR_BODY - suffix.len()]);
        format!("{truncated}{suffix}")
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Extracts the retry-after delay from response headers.
///
/// Supports both the seconds format and the HTTP-date format. Returns `None`
/// when the header is missing or cannot be parsed.
pub fn extract_retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    let retry_after = header_value(headers, "retry-after")?;
    let retry_after = retry_after.trim();

    if let Ok(seconds) = retry_after.parse::<u64>() {
        return Some(seconds);
    }

    // fractional seconds are rounded up
    if let Ok(seconds) = retry_after.parse::<f64>() {
        if seconds.is_finite() && seconds >= 0.0 {
            return Some(seconds.ceil() as u64);
        }
    }

    let date_time = chrono::DateTime::parse_from_rfc2822(retry_after).ok()?;
    let remaining = date_time.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(remaining.to_std().map(|d| d.as_secs()).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    use super::*;

    fn transport_for_server(server: &MockServer) -> HttpTransport {
        let dsn = format!("{}/42", server.uri().replace("://", "://public:secret@"));
        HttpTransport::new(&Configuration::new(&dsn).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn posts_to_store_endpoint_with_headers() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .and(matchers::path("/api/42/store/"))
            .and(matchers::header(AUTH_HEADER, "Sentry sentry_key=public"))
            .and(matchers::header("content-type", "application/json"))
            .and(matchers::header("user-agent", client_identifier().as_str()))
            .and(matchers::body_string(r#"{"message":"x"}"#))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for_server(&server);
        let result = transport
            .send_event(
                "Sentry sentry_key=public",
                Bytes::from_static(br#"{"message":"x"}"#),
                "application/json",
            )
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn client_error_prefers_error_header() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header(ERROR_HEADER, "project disabled")
                    .set_body_string("Forbidden"),
            )
            .mount(&server)
            .await;

        let transport = transport_for_server(&server);
        let error = transport.send_event("auth", Bytes::new(), "application/json").await;

        match error {
            Err(DeliveryError::ClientError { status_code, body }) => {
                assert_eq!(status_code, 403);
                assert_eq!(body, "project disabled");
            },
            other => panic!("expected client error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_error_uses_body() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .mount(&server)
            .await;

        let transport = transport_for_server(&server);
        let error = transport.send_event("auth", Bytes::new(), "application/json").await;

        assert!(matches!(
            error,
            Err(DeliveryError::ServerError { status_code: 503, ref body }) if body == "Service Unavailable"
        ));
    }

    #[tokio::test]
    async fn rate_limit_with_retry_after() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "120"))
            .mount(&server)
            .await;

        let transport = transport_for_server(&server);
        let error = transport.send_event("auth", Bytes::new(), "application/json").await;

        assert!(matches!(error, Err(DeliveryError::RateLimited { retry_after_seconds: 120 })));
    }

    #[tokio::test]
    async fn rate_limit_without_header_uses_default() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let transport = transport_for_server(&server);
        let error = transport.send_event("auth", Bytes::new(), "application/json").await;

        assert!(matches!(error, Err(DeliveryError::RateLimited { retry_after_seconds: 60 })));
    }

    #[tokio::test]
    async fn connection_refused_is_network_error() {
        let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let config = Configuration::new(&format!("http://public@127.0.0.1:{port}/1")).unwrap();
        let transport = HttpTransport::new(&config).unwrap();

        let error = transport.send_event("auth", Bytes::new(), "application/json").await;
        assert!(matches!(error, Err(DeliveryError::NetworkError { .. })));
    }

    #[test]
    fn retry_after_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_retry_after_seconds(&headers), None);

        headers.insert("retry-after", HeaderValue::from_static("120"));
        assert_eq!(extract_retry_after_seconds(&headers), Some(120));

        headers.insert("retry-after", HeaderValue::from_static("1.5"));
        assert_eq!(extract_retry_after_seconds(&headers), Some(2));

        headers.insert("retry-after", HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(extract_retry_after_seconds(&headers), Some(0));

        headers.insert("retry-after", HeaderValue::from_static("invalid"));
        assert_eq!(extract_retry_after_seconds(&headers), None);
    }

    #[test]
    fn long_bodies_truncated() {
        let body = vec![b'a'; MAX_ERROR_BODY * 2];
        let truncated = truncate_body(&body);

        assert_eq!(truncated.len(), MAX_ERROR_BODY);
        assert!(truncated.ends_with("... (truncated)"));
    }
}
