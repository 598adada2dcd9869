//! Payload encoding applied between the repository and the store.

use crate::error::CodecError;

/// Transform applied to serialized payload bytes on the way into and out of
/// the store. `decode(encode(x)) == x` must hold.
pub trait PayloadCodec: Send + Sync {
    fn encode(&self, raw: Vec<u8>) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, stored: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// Stores payloads as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl PayloadCodec for IdentityCodec {
    fn encode(&self, raw: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        Ok(raw)
    }

    fn decode(&self, stored: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(stored.to_vec())
    }
}
