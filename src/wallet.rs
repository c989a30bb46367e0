//! Credential store
//!
//! Holds the signing wallet issued to each participant and, in a separate
//! namespace, the encryption keypair each assignment issuer uses to
//! receive confidential submissions. Private signing material is handed
//! out exactly once, at creation; every later read goes through
//! [`WalletProfile`].

use std::collections::HashMap;

use serde::Serialize;
use tracing::info;

use crate::crypto::Keypair;
use crate::error::Result;
use crate::ledger::Role;

/// A stored wallet: identity fields plus both key halves.
#[derive(Debug, Clone)]
pub struct Wallet {
    pub address: String,
    pub role: Role,
    pub name: String,
    pub email: String,
    pub public_pem: String,
    pub private_pem: String,
}

/// Private-key-free view of a stored wallet.
#[derive(Debug, Clone, Serialize)]
pub struct WalletProfile {
    pub address: String,
    pub role: Role,
    pub name: String,
    pub email: String,
    pub public_key: String,
}

/// In-memory store for signing wallets and issuer encryption keypairs.
#[derive(Default)]
pub struct WalletStore {
    wallets: HashMap<String, Wallet>,
    encryption_keys: HashMap<String, Keypair>,
}

impl WalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a keypair and stores the wallet under its derived
    /// address. The returned record is the only copy of the private key a
    /// caller will ever see.
    pub fn create_wallet(&mut self, role: Role, name: &str, email: &str) -> Result<Wallet> {
        let keypair = Keypair::generate()?;
        Ok(self.store_wallet(keypair, role, name, email))
    }

    /// Stores a pregenerated keypair as a wallet. The service layer uses
    /// this to keep key generation outside the store lock.
    pub fn store_wallet(&mut self, keypair: Keypair, role: Role, name: &str, email: &str) -> Wallet {
        let address = keypair.address();
        let wallet = Wallet {
            address: address.clone(),
            role,
            name: name.to_string(),
            email: email.to_string(),
            public_pem: keypair.public_pem,
            private_pem: keypair.private_pem,
        };
        info!(%address, role = %role, "wallet created");
        self.wallets.insert(address, wallet.clone());
        wallet
    }

    pub fn wallet(&self, address: &str) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    pub fn profile(&self, address: &str) -> Option<WalletProfile> {
        self.wallets.get(address).map(|wallet| WalletProfile {
            address: wallet.address.clone(),
            role: wallet.role,
            name: wallet.name.clone(),
            email: wallet.email.clone(),
            public_key: wallet.public_pem.clone(),
        })
    }

    /// Returns the issuer's encryption keypair, generating and storing one
    /// on first use. Encryption keys never overlap with signing keys, even
    /// for the same address.
    pub fn encryption_keys_or_create(&mut self, issuer: &str) -> Result<Keypair> {
        if let Some(existing) = self.encryption_keys.get(issuer) {
            return Ok(existing.clone());
        }
        let keypair = Keypair::generate()?;
        Ok(self.store_encryption_keys(issuer, keypair))
    }

    /// Stores a pregenerated encryption keypair for an issuer.
    pub fn store_encryption_keys(&mut self, issuer: &str, keypair: Keypair) -> Keypair {
        info!(%issuer, "encryption keypair issued");
        self.encryption_keys
            .insert(issuer.to_string(), keypair.clone());
        keypair
    }

    pub fn encryption_keys(&self, issuer: &str) -> Option<&Keypair> {
        self.encryption_keys.get(issuer)
    }
}
