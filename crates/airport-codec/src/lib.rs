//! Metadata codec for Airport wire records
//!
//! Compact-binary (msgpack) records exchanged as action bodies and results,
//! the zstd compressed-content envelope, and Arrow IPC helpers for schemas
//! and parameter streams.

mod wire_bytes;
pub mod compression;
pub mod ipc;
pub mod messages;

pub use wire_bytes::WireBytes;
pub use messages::*;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("msgpack decode failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("msgpack encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("decompression failed: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("compression failed: {0}")]
    Compress(#[source] std::io::Error),

    #[error("decompressed length {actual} does not match declared length {declared}")]
    LengthMismatch { declared: u32, actual: usize },

    #[error("IPC error: {0}")]
    Ipc(#[from] arrow::error::ArrowError),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Decode a record. Fields absent from the payload take their defaults.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// Encode a record. Structs are written in map form (field names as keys)
/// unless the type itself converts to a tuple first.
pub fn encode<T: Serialize>(value: &T) -> CodecResult<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(value)?)
}
