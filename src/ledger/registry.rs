use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use tracing::info;

use crate::crypto;
use crate::error::{ChainError, Result};
use crate::transaction::{Transaction, TxKind, SYSTEM};

use super::chain::Ledger;

/// What a participant is allowed to do. Teachers author assignments,
/// grades and announcements; students submit work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Teacher,
    Student,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Teacher => f.write_str("TEACHER"),
            Role::Student => f.write_str("STUDENT"),
        }
    }
}

/// A registered identity, keyed by the address derived from its public
/// key. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub address: String,
    pub role: Role,
    pub public_key: String,
    pub name: String,
    pub email: String,
    pub registered_at: u64,
}

impl Ledger {
    /// Registers a participant under the address derived from their public
    /// key and queues the REGISTRATION event recording it. Rejects an
    /// address that is already taken.
    pub fn register(
        &mut self,
        role: Role,
        public_key: &str,
        name: &str,
        email: &str,
    ) -> Result<Participant> {
        let address = crypto::derive_address(public_key);
        if self.participants.contains_key(&address) {
            return Err(ChainError::AlreadyRegistered(address));
        }

        let mut data = Map::new();
        data.insert("role".to_string(), json!(role));
        data.insert("name".to_string(), json!(name));
        data.insert("email".to_string(), json!(email));
        data.insert("public_key".to_string(), json!(public_key));
        let registration =
            Transaction::new(SYSTEM, address.clone(), TxKind::Registration, data)?;
        self.submit(registration)?;

        let participant = Participant {
            address: address.clone(),
            role,
            public_key: public_key.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            registered_at: Utc::now().timestamp_millis() as u64,
        };
        info!(%address, role = %role, name, "participant registered");
        self.participants.insert(address, participant.clone());
        Ok(participant)
    }

    /// Looks up a registered participant by address.
    pub fn participant(&self, address: &str) -> Option<&Participant> {
        self.participants.get(address)
    }

    /// Every registered participant, ordered by registration time.
    pub fn list_participants(&self) -> Vec<Participant> {
        let mut all: Vec<Participant> = self.participants.values().cloned().collect();
        all.sort_by(|a, b| {
            a.registered_at
                .cmp(&b.registered_at)
                .then_with(|| a.address.cmp(&b.address))
        });
        all
    }
}
