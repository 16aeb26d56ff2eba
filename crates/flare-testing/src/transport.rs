//! Scriptable transport that records every send.
//!
//! Clones share state, so a test keeps one handle for assertions and hands
//! another to the client under test.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use flare_delivery::{
    encoding::{self, Encoding},
    DeliveryError, Transport,
};
use flare_core::WireHash;

/// Failure injected into a send.
///
/// Mirrors the ways a real transport can fail so the client's categorization
/// and send state handling are exercised without a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection refused or reset.
    Network,
    /// Request timed out after the given number of seconds.
    Timeout(u64),
    /// Collector answered with a 5xx status.
    Server(u16),
    /// Collector rejected the event with a 4xx status.
    Client(u16),
    /// Collector answered 429 with a `Retry-After` in seconds.
    RateLimited(u64),
    /// Local write failed.
    Io,
}

impl FailureKind {
    /// Error a real transport would return for this failure.
    pub fn to_error(&self) -> DeliveryError {
        match self {
            Self::Network => DeliveryError::network("connection refused"),
            Self::Timeout(seconds) => DeliveryError::timeout(*seconds),
            Self::Server(status) => DeliveryError::server_error(*status, "collector unavailable"),
            Self::Client(status) => DeliveryError::client_error(*status, "event rejected"),
            Self::RateLimited(seconds) => DeliveryError::rate_limited(*seconds),
            Self::Io => DeliveryError::io("broken pipe"),
        }
    }
}

/// One call to [`Transport::send_event`].
#[derive(Debug, Clone)]
pub struct RecordedSend {
    /// Authentication header passed by the client.
    pub auth_header: String,
    /// Encoded payload.
    pub payload: Bytes,
    /// Content type of the payload.
    pub content_type: String,
}

impl RecordedSend {
    /// Decodes the payload back into its wire hash, inferring the encoding
    /// from the content type.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Serialization` if the payload is malformed.
    pub fn decode(&self) -> flare_delivery::Result<WireHash> {
        let encoding = if self.content_type == Encoding::None.content_type() {
            Encoding::None
        } else {
            Encoding::Gzip
        };
        encoding::decode(&self.payload, encoding)
    }
}

#[derive(Debug, Default)]
struct State {
    sends: Vec<RecordedSend>,
    scripted: VecDeque<FailureKind>,
    always: Option<FailureKind>,
    latency: Option<Duration>,
}

/// Transport recording sends and failing on demand.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    state: Arc<Mutex<State>>,
}

impl RecordingTransport {
    /// Creates a transport that accepts every send.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport whose next sends fail with `failures`, in order.
    pub fn failing_with(failures: impl IntoIterator<Item = FailureKind>) -> Self {
        let transport = Self::new();
        transport.lock().scripted.extend(failures);
        transport
    }

    /// Creates a transport that fails `times` times with a network error.
    pub fn failing_times(times: usize) -> Self {
        Self::failing_with(std::iter::repeat(FailureKind::Network).take(times))
    }

    /// Creates a transport that always fails with `failure`.
    pub fn always_failing(failure: FailureKind) -> Self {
        let transport = Self::new();
        transport.lock().always = Some(failure);
        transport
    }

    /// Delays every send by `latency` before it completes, so concurrent
    /// sends overlap.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = Some(latency);
        self
    }

    /// Queues one more failure.
    pub fn fail_next(&self, failure: FailureKind) {
        self.lock().scripted.push_back(failure);
    }

    /// Stops failing.
    pub fn recover(&self) {
        let mut state = self.lock();
        state.scripted.clear();
        state.always = None;
    }

    /// Number of send attempts, failed or not.
    pub fn call_count(&self) -> usize {
        self.lock().sends.len()
    }

    /// Every recorded send, oldest first.
    pub fn sends(&self) -> Vec<RecordedSend> {
        self.lock().sends.clone()
    }

    /// Most recent send.
    pub fn last_send(&self) -> Option<RecordedSend> {
        self.lock().sends.last().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // a panicking test thread poisons the lock, the state is still usable
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_event(
        &self,
        auth_header: &str,
        payload: Bytes,
        content_type: &str,
    ) -> flare_delivery::Result<()> {
        let latency = self.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        state.sends.push(RecordedSend {
            auth_header: auth_header.to_string(),
            payload,
            content_type: content_type.to_string(),
        });

        let failure = state.scripted.pop_front().or_else(|| state.always.clone());
        match failure {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}
