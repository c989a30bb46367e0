//! Canonical JSON encoding shared by hashing and signing.
//!
//! Every digest and signature in the ledger is computed over the same byte
//! encoding: compact JSON with object keys sorted at every nesting depth.
//! `serde_json::Map` is backed by a `BTreeMap`, so routing any serializable
//! value through `serde_json::Value` yields sorted keys for free, and the
//! resulting bytes are identical across runs for identical field values.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Encode `value` as compact sorted-key JSON bytes.
pub fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let normalized = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&normalized)?)
}

/// SHA-256 of the canonical encoding, as lowercase hex.
pub fn digest_hex<T: Serialize>(value: &T) -> Result<String> {
    let bytes = to_bytes(value)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
