//! Event delivery pipeline with failure-aware sending.
//!
//! This crate turns captured events into requests against a remote collector.
//! It owns everything between "an event exists" and "the collector has it":
//! filtering, scrubbing, encoding, authentication and transport, plus the
//! send state that stops the client from hammering a collector that is down.
//!
//! # Architecture
//!
//! A [`Client`] holds an immutable [`Configuration`], one [`Transport`] and a
//! [`SendState`](send_state::SendState). Each send runs the same steps:
//!
//! 1. **Filter** - environment, sampling, should-capture and before-send
//! 2. **Scrub** - mask sensitive values in the wire hash
//! 3. **Gate** - skip the send while the collector is considered down
//! 4. **Encode** - plain JSON or deflate + base64
//! 5. **Dispatch** - async hook, falling back to the transport
//! 6. **Record** - update the send state from the outcome
//!
//! # Key Features
//!
//! - **Never throws on delivery** - transport failures are logged and
//!   returned as [`SendOutcome::Failed`]
//! - **Failure gating** - consecutive failures suppress sending until a
//!   cooldown probe or a success
//! - **Pluggable transports** - `http(s)`, `stdout` and `dummy`, selected by
//!   the DSN scheme
//!
//! # Example
//!
//! ```no_run
//! use flare_core::{EventOptions, Scope};
//! use flare_delivery::{Client, Configuration, DeliveryError};
//!
//! # async fn example() -> std::result::Result<(), DeliveryError> {
//! let config = Configuration::new("https://public@sentry.example.com/42")?;
//! let client = Client::new(config)?;
//!
//! client.capture_message("deploy finished", &Scope::new(), EventOptions::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod encoding;
pub mod error;
pub mod scrub;
pub mod send_state;
pub mod transport;

pub use client::{Client, ClientBuilder, SendOutcome};
pub use config::{Configuration, Dsn, Settings};
pub use encoding::Encoding;
pub use error::{DeliveryError, Result};
pub use transport::Transport;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 2;

/// Default HTTP connect timeout in seconds.
pub const DEFAULT_OPEN_TIMEOUT_SECONDS: u64 = 1;
