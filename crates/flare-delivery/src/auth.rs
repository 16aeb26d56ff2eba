//! Protocol authentication header.

use std::fmt;

/// Protocol version announced in every header.
pub const PROTOCOL_VERSION: u32 = 7;

/// Client name announced in `sentry_client`.
pub const CLIENT_NAME: &str = "flare-rust";

/// Identifier of this client, `name/version`.
pub fn client_identifier() -> String {
    format!("{CLIENT_NAME}/{}", env!("CARGO_PKG_VERSION"))
}

/// Fields of the authentication header.
///
/// Renders as `Sentry key=value, key=value, ...` with a fixed field order;
/// `sentry_secret` is only emitted when a secret key is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeader<'a> {
    /// Protocol version.
    pub version: u32,
    /// Client identifier.
    pub client: &'a str,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Public key.
    pub public_key: &'a str,
    /// Secret key, for collectors that still require it.
    pub secret_key: Option<&'a str>,
}

impl fmt::Display for AuthHeader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sentry sentry_version={}, sentry_client={}, sentry_timestamp={}, sentry_key={}",
            self.version, self.client, self.timestamp, self.public_key
        )?;
        if let Some(secret) = self.secret_key {
            write!(f, ", sentry_secret={secret}")?;
        }
        Ok(())
    }
}

/// Builds the header value for the given keys and timestamp.
pub fn generate_auth_header(public_key: &str, secret_key: Option<&str>, timestamp: u64) -> String {
    let client = client_identifier();
    AuthHeader { version: PROTOCOL_VERSION, client: &client, timestamp, public_key, secret_key }
        .to_string()
}
