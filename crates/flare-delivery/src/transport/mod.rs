//! Pluggable event transports.
//!
//! A transport receives an already-encoded payload plus the authentication
//! header and performs delivery. It never sees events, so every transport
//! behaves identically with respect to filtering, scrubbing and encoding.
//! The DSN scheme picks the implementation:
//!
//! | scheme          | transport            |
//! |-----------------|----------------------|
//! | `http`, `https` | [`HttpTransport`]    |
//! | `stdout`        | [`StdoutTransport`]  |
//! | `dummy`         | [`DummyTransport`]   |

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    config::Configuration,
    error::{DeliveryError, Result},
};

mod dummy;
mod http;
mod stdout;

pub use dummy::DummyTransport;
pub use http::{extract_retry_after_seconds, HttpTransport, AUTH_HEADER, ERROR_HEADER};
pub use stdout::StdoutTransport;

/// Delivery backend for encoded events.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Delivers one payload.
    ///
    /// # Errors
    ///
    /// Returns a delivery error when the payload could not be handed over.
    async fn send_event(&self, auth_header: &str, payload: Bytes, content_type: &str)
        -> Result<()>;
}

/// Builds the transport matching the configured scheme.
///
/// # Errors
///
/// Returns `DeliveryError::ConfigurationError` for unknown schemes or when
/// the HTTP client cannot be built.
pub fn transport_for(config: &Configuration) -> Result<Box<dyn Transport>> {
    match config.scheme() {
        "http" | "https" => Ok(Box::new(HttpTransport::new(config)?)),
        "stdout" => Ok(Box::new(StdoutTransport::new())),
        "dummy" => Ok(Box::new(DummyTransport::new())),
        other => Err(DeliveryError::configuration(format!("unsupported transport scheme: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_selects_transport() {
        for dsn in [
            "http://public@localhost/1",
            "https://public@localhost/1",
            "stdout://public@localhost/1",
            "dummy://public@localhost/1",
        ] {
            let config = Configuration::new(dsn).unwrap();
            assert!(transport_for(&config).is_ok(), "no transport for {dsn}");
        }
    }

    #[test]
    fn unknown_scheme_is_configuration_error() {
        let config = Configuration::new("carrier-pigeon://public@localhost/1").unwrap();
        let error = transport_for(&config).unwrap_err();

        assert!(matches!(error, DeliveryError::ConfigurationError { .. }));
        assert!(error.to_string().contains("carrier-pigeon"));
    }
}
