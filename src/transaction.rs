//! Transaction model for EduLedger
//!
//! Every ledger event (registration, assignment, submission, grade,
//! announcement, seal reward) is one `Transaction`. The `data` object is
//! opaque to the chain; its shape is a contract between the flows that
//! write it and the queries that read it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::canonical;
use crate::crypto;
use crate::error::{ChainError, Result};

/// Reserved address for ledger-synthesized events (registrations, seal
/// rewards); also the receiver of record for submissions.
pub const SYSTEM: &str = "SYSTEM";

/// Broadcast receiver, visible to every participant.
pub const BROADCAST: &str = "ALL";

/// The kind of educational event a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxKind {
    Registration,
    Assignment,
    Submission,
    Grade,
    Announcement,
    Reward,
}

impl std::fmt::Display for TxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TxKind::Registration => "REGISTRATION",
            TxKind::Assignment => "ASSIGNMENT",
            TxKind::Submission => "SUBMISSION",
            TxKind::Grade => "GRADE",
            TxKind::Announcement => "ANNOUNCEMENT",
            TxKind::Reward => "REWARD",
        };
        f.write_str(name)
    }
}

/// A single ledger event.
///
/// `transaction_id` is the SHA-256 digest of the canonical encoding of
/// `{sender, receiver, type, timestamp}`. Two transactions created with
/// identical values for those four fields share an id; the ledger does not
/// deduplicate, so callers relying on id uniqueness need distinct
/// timestamps. `sender` and `receiver` hold a participant address,
/// [`SYSTEM`], [`BROADCAST`], or a comma-joined address list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub sender: String,
    pub receiver: String,
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub data: Map<String, Value>,
    pub timestamp: u64,
    pub signature: Option<String>,
}

impl Transaction {
    /// Creates an unsigned transaction stamped with the current time.
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        kind: TxKind,
        data: Map<String, Value>,
    ) -> Result<Self> {
        let timestamp = Utc::now().timestamp_millis() as u64;
        Self::new_at(sender, receiver, kind, data, timestamp)
    }

    /// Creates an unsigned transaction with an explicit timestamp.
    pub fn new_at(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        kind: TxKind,
        data: Map<String, Value>,
        timestamp: u64,
    ) -> Result<Self> {
        let sender = sender.into();
        let receiver = receiver.into();
        let id_fields = json!({
            "sender": sender,
            "receiver": receiver,
            "type": kind,
            "timestamp": timestamp,
        });
        let transaction_id = canonical::digest_hex(&id_fields)?;

        Ok(Transaction {
            transaction_id,
            sender,
            receiver,
            kind,
            data,
            timestamp,
            signature: None,
        })
    }

    /// Canonical bytes of every field except the signature itself.
    pub fn signable_bytes(&self) -> Result<Vec<u8>> {
        let fields = json!({
            "transaction_id": self.transaction_id,
            "sender": self.sender,
            "receiver": self.receiver,
            "type": self.kind,
            "data": self.data,
            "timestamp": self.timestamp,
        });
        canonical::to_bytes(&fields)
    }

    /// Signs the transaction in place with a PKCS#8 private key PEM.
    pub fn sign(&mut self, private_pem: &str) -> Result<()> {
        let payload = self.signable_bytes()?;
        self.signature = Some(crypto::sign_payload(&payload, private_pem)?);
        Ok(())
    }

    /// Verifies the signature against an SPKI public key PEM. An unsigned
    /// transaction verifies false.
    pub fn verify(&self, public_pem: &str) -> bool {
        let signature = match &self.signature {
            Some(sig) => sig,
            None => return false,
        };
        match self.signable_bytes() {
            Ok(payload) => crypto::verify_payload(&payload, signature, public_pem),
            Err(_) => false,
        }
    }

    /// Structural checks applied before a transaction enters the pending
    /// buffer.
    pub fn validate(&self) -> Result<()> {
        if self.sender.is_empty() {
            return Err(ChainError::Rejected("sender must not be empty".to_string()));
        }
        if self.receiver.is_empty() {
            return Err(ChainError::Rejected(
                "receiver must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Convenience accessor for a string field of the data object.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}
