//! Compressed list encoding used for world-init and player-list payloads.
//!
//! A list is serialized with `bincode` and the bytes are LZ4-compressed with
//! the uncompressed size prepended, so the receiver can allocate once.
//! Encoding is deterministic: equal values always produce equal bytes.

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Errors produced while packing or unpacking a compressed list.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode payload: {0}")]
    Encode(bincode::Error),
    #[error("failed to decode payload: {0}")]
    Decode(bincode::Error),
    #[error("LZ4 decompression failed: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),
}

pub fn compress<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    let raw = bincode::serialize(value).map_err(CodecError::Encode)?;
    Ok(compress_prepend_size(&raw))
}

pub fn decompress<T: DeserializeOwned>(data: &[u8]) -> Result<T, CodecError> {
    let raw = decompress_size_prepended(data)?;
    bincode::deserialize(&raw).map_err(CodecError::Decode)
}
