//! Transport that prints payloads, one per line.

use std::{
    fmt,
    io::{self, Write},
    sync::Mutex,
};

use async_trait::async_trait;
use bytes::Bytes;

use super::Transport;
use crate::error::{DeliveryError, Result};

/// Writes each payload followed by a newline.
///
/// Defaults to the process stdout; tests inject any `Write` sink.
pub struct StdoutTransport {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl StdoutTransport {
    /// Creates a transport writing to stdout.
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }

    /// Creates a transport writing to `writer`.
    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self { writer: Mutex::new(Box::new(writer)) }
    }
}

impl Default for StdoutTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdoutTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdoutTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for StdoutTransport {
    async fn send_event(
        &self,
        _auth_header: &str,
        payload: Bytes,
        _content_type: &str,
    ) -> Result<()> {
        let mut writer =
            self.writer.lock().map_err(|_| DeliveryError::io("stdout writer lock poisoned"))?;

        writer
            .write_all(&payload)
            .and_then(|()| writer.write_all(b"\n"))
            .and_then(|()| writer.flush())
            .map_err(|e| DeliveryError::io(e.to_string()))
    }
}
