//! Test infrastructure for the flare client.
//!
//! Provides scriptable transports that record what they were asked to send,
//! a wiremock-backed collector that decodes received events, and fixtures for
//! configurations and error chains. Time is controlled through the
//! re-exported [`TestClock`].

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod collector;
pub mod fixtures;
pub mod transport;

pub use collector::{MockCollector, ReceivedEvent};
pub use fixtures::{config_for, dummy_config, ChainedError, RootCause};
pub use flare_core::TestClock;
pub use transport::{FailureKind, RecordedSend, RecordingTransport};
