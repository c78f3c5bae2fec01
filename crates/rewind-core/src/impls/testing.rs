//! Test doubles shared by the repository tests.

use serde_json::Value;

use super::JsonCodec;
use crate::domain::CodecError;
use crate::ports::{ArgsHash, Codec};

/// Every encoding lands in the same hash bucket.
pub(crate) struct CollidingCodec;

impl Codec for CollidingCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        JsonCodec.encode(value)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        JsonCodec.decode(bytes)
    }

    fn hash(&self, _bytes: &[u8]) -> ArgsHash {
        ArgsHash::new("0")
    }
}
