//! Payload encoding for the wire hash.
//!
//! Events travel either as plain JSON or as JSON that has been zlib-deflated
//! and then base64-encoded. The compressed form is a text body, which is what
//! collectors accept under `application/octet-stream`.

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use flare_core::WireHash;
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use serde::{Deserialize, Serialize};

use crate::error::{DeliveryError, Result};

/// Content type of plain JSON payloads.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Content type of compressed payloads.
pub const COMPRESSED_CONTENT_TYPE: &str = "application/octet-stream";

/// How event payloads are encoded before transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Plain JSON.
    None,
    /// Deflated JSON, base64 encoded.
    #[default]
    Gzip,
}

impl Encoding {
    /// Content type sent alongside payloads in this encoding.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::None => JSON_CONTENT_TYPE,
            Self::Gzip => COMPRESSED_CONTENT_TYPE,
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Gzip => write!(f, "gzip"),
        }
    }
}

impl std::str::FromStr for Encoding {
    type Err = DeliveryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "json" => Ok(Self::None),
            "gzip" | "deflate" => Ok(Self::Gzip),
            other => Err(DeliveryError::configuration(format!("unknown encoding: {other}"))),
        }
    }
}

/// Encoded event ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    /// Content type matching the encoding.
    pub content_type: &'static str,
    /// Payload bytes.
    pub body: Bytes,
}

/// Serializes a wire hash using the given encoding.
///
/// # Errors
///
/// Returns `DeliveryError::Serialization` if the hash cannot be serialized
/// or compressed.
pub fn encode(hash: &WireHash, encoding: Encoding) -> Result<EncodedPayload> {
    let json = serde_json::to_vec(hash)
        .map_err(|e| DeliveryError::serialization(format!("failed to serialize event: {e}")))?;

    let body = match encoding {
        Encoding::None => json,
        Encoding::Gzip => BASE64.encode(deflate(&json)?).into_bytes(),
    };

    Ok(EncodedPayload { content_type: encoding.content_type(), body: Bytes::from(body) })
}

/// Reverses [`encode`], yielding the original wire hash.
///
/// # Errors
///
/// Returns `DeliveryError::Serialization` if the payload is not valid for
/// the encoding or does not contain a JSON object.
pub fn decode(body: &[u8], encoding: Encoding) -> Result<WireHash> {
    let json = match encoding {
        Encoding::None => body.to_vec(),
        Encoding::Gzip => inflate(body)?,
    };

    serde_json::from_slice(&json)
        .map_err(|e| DeliveryError::serialization(format!("payload is not a JSON object: {e}")))
}

/// Decodes a compressed payload back to its raw JSON bytes.
///
/// # Errors
///
/// Returns `DeliveryError::Serialization` on invalid base64 or zlib data.
pub fn inflate(body: &[u8]) -> Result<Vec<u8>> {
    let compressed = BASE64
        .decode(body)
        .map_err(|e| DeliveryError::serialization(format!("invalid base64 payload: {e}")))?;

    let mut json = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut json)
        .map_err(|e| DeliveryError::serialization(format!("invalid deflate stream: {e}")))?;
    Ok(json)
}

fn deflate(json: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(json.len() / 2), Compression::default());
    let compress_error =
        |e: std::io::Error| DeliveryError::serialization(format!("failed to compress event: {e}"));

    encoder.write_all(json).map_err(compress_error)?;
    encoder.finish().map_err(compress_error)
}
