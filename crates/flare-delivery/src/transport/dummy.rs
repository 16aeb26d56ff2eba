//! No-op transport.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use super::Transport;
use crate::error::Result;

/// Accepts every payload and discards it, counting calls.
#[derive(Debug, Default)]
pub struct DummyTransport {
    calls: AtomicU64,
}

impl DummyTransport {
    /// Creates a transport with a zeroed call counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of payloads received.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Transport for DummyTransport {
    async fn send_event(&self, _auth_header: &str, _payload: Bytes, _content_type: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
