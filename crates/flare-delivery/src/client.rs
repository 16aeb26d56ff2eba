//! Client orchestrating capture, filtering, encoding and delivery.
//!
//! Every capture runs the same pipeline:
//!
//! ```text
//!   capture_* ──▶ class filter ──▶ build Event ──▶ apply Scope
//!                                                     │
//!          ┌──────────────────────────────────────────┘
//!          ▼
//!   sending_allowed ──▶ before_send ──▶ wire hash + scrub ──▶ SendState gate
//!                                                               │
//!          ┌────────────────────────────────────────────────────┘
//!          ▼
//!   encode ──▶ async hook ─(err)─▶ transport ──▶ record success / failure
//! ```
//!
//! Delivery failures never escape as `Err`: they are logged, recorded in the
//! send state and returned as [`SendOutcome::Failed`]. Only a broken event
//! (one that cannot be serialized) is reported as an error to the caller.

use std::{error::Error as StdError, sync::Arc};

use flare_core::{
    Clock, ErrorReport, Event, EventId, EventOptions, Hint, RealClock, Reportable, Scope,
};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{
    auth,
    config::Configuration,
    encoding::{self, EncodedPayload},
    error::{DeliveryError, ErrorCategory, Result},
    scrub::Scrubber,
    send_state::{SendState, DEFAULT_FAILURE_THRESHOLD},
    transport::{self, Transport},
};

/// Longest error text included in a failure log line.
const MAX_LOGGED_ERROR_CHARS: usize = 256;

/// Summary used when an event has neither a message nor an exception.
const NO_MESSAGE: &str = "<no message value>";

/// Result of [`Client::send_event`].
#[derive(Debug, Clone)]
pub enum SendOutcome {
    /// Delivered, possibly modified by the before-send hook.
    Sent(Event),
    /// Rejected by environment, sampling or the should-capture predicate.
    NotAllowed,
    /// Dropped by the before-send hook.
    Discarded,
    /// Skipped because earlier deliveries failed.
    Suppressed,
    /// Delivery attempted and failed.
    Failed(DeliveryError),
}

impl SendOutcome {
    /// Whether the event was delivered.
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent(_))
    }

    /// Delivered event, if any.
    pub fn into_event(self) -> Option<Event> {
        match self {
            Self::Sent(event) => Some(event),
            _ => None,
        }
    }
}

/// Event reporting client.
///
/// Holds an immutable configuration, one transport and the send state for
/// the collector. Cheap to share behind an `Arc` across tasks.
#[derive(Debug)]
pub struct Client {
    config: Arc<Configuration>,
    transport: Box<dyn Transport>,
    send_state: SendState,
    scrubber: Option<Scrubber>,
    clock: Arc<dyn Clock>,
    last_event_id: RwLock<Option<EventId>>,
}

impl Client {
    /// Creates a client with the transport selected by the DSN scheme.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::ConfigurationError` for unsupported schemes or
    /// invalid sanitize fields.
    pub fn new(config: Configuration) -> Result<Self> {
        ClientBuilder::new(config).build()
    }

    /// Starts a builder for overriding the transport, clock or threshold.
    pub fn builder(config: Configuration) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Configuration in use.
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Send state shared by every delivery of this client.
    pub fn send_state(&self) -> &SendState {
        &self.send_state
    }

    /// Captures an error.
    ///
    /// Returns `Ok(None)` when the error type is excluded or the event was
    /// not delivered.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Serialization` if the event cannot be encoded.
    pub async fn capture_exception(
        &self,
        exception: &dyn Reportable,
        scope: &Scope,
        options: EventOptions,
    ) -> Result<Option<Event>> {
        if !self.config.exception_class_allowed(exception) {
            tracing::info!(
                exception_type = %exception.type_name(),
                "excluded error type, not capturing: {}",
                exception
            );
            return Ok(None);
        }

        let mut event =
            Event::from_exception_with_defaults(exception, self.config.event_defaults(), options);
        scope.apply_to_event(&mut event);

        let hint = Hint::from_exception(exception);
        Ok(self.send_event(event, &hint).await?.into_event())
    }

    /// Captures any `std::error::Error` along with its source chain.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Client::capture_exception`].
    pub async fn capture_error<E>(
        &self,
        error: &E,
        scope: &Scope,
        options: EventOptions,
    ) -> Result<Option<Event>>
    where
        E: StdError + ?Sized + 'static,
    {
        let report = ErrorReport::from_error(error);
        self.capture_exception(&report, scope, options).await
    }

    /// Captures a plain message.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Serialization` if the event cannot be encoded.
    pub async fn capture_message(
        &self,
        message: &str,
        scope: &Scope,
        options: EventOptions,
    ) -> Result<Option<Event>> {
        let mut event = Event::from_message(message, self.config.event_defaults().merge(options));
        scope.apply_to_event(&mut event);

        let hint = Hint::from_message(message);
        Ok(self.send_event(event, &hint).await?.into_event())
    }

    /// Sends a prepared event through filtering, the send gate and the
    /// transport.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Serialization` if the event cannot be turned
    /// into its wire form. Every delivery failure is reported through
    /// [`SendOutcome::Failed`] instead.
    pub async fn send_event(&self, event: Event, hint: &Hint) -> Result<SendOutcome> {
        if !self.config.sending_allowed(&event) {
            return Ok(SendOutcome::NotAllowed);
        }

        let event = match self.config.before_send() {
            Some(before_send) => {
                let event_id = event.event_id;
                match before_send(event, hint) {
                    Some(event) => event,
                    None => {
                        tracing::info!(%event_id, "event discarded by before-send");
                        return Ok(SendOutcome::Discarded);
                    },
                }
            },
            None => event,
        };

        let mut hash = event.to_hash()?;
        if let Some(scrubber) = &self.scrubber {
            scrubber.scrub(&mut hash);
        }

        if !self.send_state.try_acquire().await {
            tracing::warn!(
                event_id = %event.event_id,
                summary = %event_summary(&event),
                "not sending event due to previous failure(s)"
            );
            return Ok(SendOutcome::Suppressed);
        }

        tracing::info!(event_id = %event.event_id, "sending event");

        let payload = match encoding::encode(&hash, self.config.encoding) {
            Ok(payload) => payload,
            Err(error) => {
                self.send_state.release_probe().await;
                return Err(error);
            },
        };

        match self.dispatch(&event, Value::Object(hash), payload).await {
            Ok(()) => {
                self.send_state.success().await;
                *self.last_event_id.write().await = Some(event.event_id);
                Ok(SendOutcome::Sent(event))
            },
            Err(error) => {
                let health = if error.is_delivery_failure() {
                    self.send_state.failure_with_retry_after(error.retry_after()).await
                } else {
                    self.send_state.release_probe().await;
                    self.send_state.stats().await.health
                };
                tracing::error!(
                    event_id = %event.event_id,
                    category = %ErrorCategory::from(&error),
                    error = %truncate(&error.to_string(), MAX_LOGGED_ERROR_CHARS),
                    summary = %event_summary(&event),
                    send_health = %health,
                    "unable to record event"
                );
                Ok(SendOutcome::Failed(error))
            },
        }
    }

    async fn dispatch(
        &self,
        event: &Event,
        wire_hash: Value,
        payload: EncodedPayload,
    ) -> std::result::Result<(), DeliveryError> {
        if let Some(async_dispatch) = self.config.async_dispatch() {
            match async_dispatch(wire_hash) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    let error = DeliveryError::async_dispatch(format!("{e:#}"));
                    tracing::warn!(
                        event_id = %event.event_id,
                        error = %error,
                        "async dispatch failed, falling back to synchronous send"
                    );
                },
            }
        }

        let auth_header = self.generate_auth_header();
        self.transport.send_event(&auth_header, payload.body, payload.content_type).await
    }

    /// Authentication header for the configured keys at the current time.
    pub fn generate_auth_header(&self) -> String {
        auth::generate_auth_header(
            self.config.public_key(),
            self.config.secret_key(),
            self.clock.unix_timestamp(),
        )
    }

    /// Id of the last event that was delivered.
    pub async fn last_event_id(&self) -> Option<EventId> {
        *self.last_event_id.read().await
    }
}

/// Builder for [`Client`].
#[derive(Debug)]
pub struct ClientBuilder {
    config: Configuration,
    transport: Option<Box<dyn Transport>>,
    clock: Option<Arc<dyn Clock>>,
    failure_threshold: u32,
}

impl ClientBuilder {
    /// Starts a builder with defaults for everything but the configuration.
    pub fn new(config: Configuration) -> Self {
        Self { config, transport: None, clock: None, failure_threshold: DEFAULT_FAILURE_THRESHOLD }
    }

    /// Uses `transport` instead of the one selected by the DSN scheme.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Uses `clock` for auth timestamps and cooldowns.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Consecutive failures before sending is suppressed.
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::ConfigurationError` if no transport was given
    /// and the scheme is unsupported, or the sanitize fields are invalid.
    pub fn build(self) -> Result<Client> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => transport::transport_for(&self.config)?,
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(RealClock::new()));
        let scrubber = if self.config.scrub_data {
            Some(Scrubber::new(&self.config.sanitize_fields)?)
        } else {
            None
        };

        Ok(Client {
            send_state: SendState::with_threshold(self.failure_threshold, Arc::clone(&clock)),
            config: Arc::new(self.config),
            transport,
            scrubber,
            clock,
            last_event_id: RwLock::new(None),
        })
    }
}

/// One-line description of an event for log lines.
pub fn event_summary(event: &Event) -> String {
    if let Some(message) = &event.message {
        return message.clone();
    }

    event
        .exception
        .as_ref()
        .and_then(|exception| exception.values.first())
        .map_or_else(|| NO_MESSAGE.to_string(), |value| format!("{}: {}", value.ty, value.value))
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
