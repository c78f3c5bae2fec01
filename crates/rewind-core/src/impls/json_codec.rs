//! JsonCodec - serde_json + SHA-256 による正規化エンコード
//!
//! `serde_json::Value` の object は key 順にソートされた map なので、
//! 同じ論理値は常に同じ bytes になります。

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

use crate::domain::CodecError;
use crate::ports::{ArgsHash, Codec};

/// Compact JSON encoding hashed with SHA-256.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }

    fn hash(&self, bytes: &[u8]) -> ArgsHash {
        let digest = Sha256::digest(bytes);
        let mut out = String::with_capacity(64);
        for byte in digest {
            let _ = write!(out, "{byte:02x}");
        }
        ArgsHash::new(out)
    }
}
