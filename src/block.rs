//! Block structure and hash linkage

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::canonical;
use crate::error::Result;
use crate::transaction::Transaction;

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// One sealed (or about-to-be-sealed) unit of the chain. `hash` caches the
/// digest of the other five fields and must be recomputed whenever any of
/// them changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub nonce: u64,
    pub hash: String,
}

impl Block {
    /// Creates a block stamped with the current time, nonce 0, hash cached.
    pub fn new(index: u64, transactions: Vec<Transaction>, previous_hash: String) -> Result<Self> {
        let timestamp = Utc::now().timestamp_millis() as u64;
        Self::new_at(index, transactions, previous_hash, timestamp)
    }

    /// Creates a block with an explicit timestamp.
    pub fn new_at(
        index: u64,
        transactions: Vec<Transaction>,
        previous_hash: String,
        timestamp: u64,
    ) -> Result<Self> {
        let mut block = Block {
            index,
            timestamp,
            transactions,
            previous_hash,
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.digest()?;
        Ok(block)
    }

    /// SHA-256 over the canonical encoding of `{index, timestamp,
    /// transactions, previous_hash, nonce}`. The cached `hash` is not part
    /// of its own preimage.
    pub fn digest(&self) -> Result<String> {
        let fields = json!({
            "index": self.index,
            "timestamp": self.timestamp,
            "transactions": self.transactions,
            "previous_hash": self.previous_hash,
            "nonce": self.nonce,
        });
        canonical::digest_hex(&fields)
    }

    /// True when this block's `previous_hash` matches the predecessor's
    /// cached hash.
    pub fn links_to(&self, previous: &Block) -> bool {
        self.previous_hash == previous.hash
    }

    /// True when the cached hash equals the recomputed digest.
    pub fn verify_integrity(&self) -> bool {
        match self.digest() {
            Ok(digest) => digest == self.hash,
            Err(_) => false,
        }
    }

    /// True when the cached hash starts with `difficulty` zero characters.
    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        let prefix_len = difficulty as usize;
        self.hash.len() >= prefix_len
            && self.hash.as_bytes()[..prefix_len].iter().all(|&b| b == b'0')
    }
}
