//! EduLedger - An append-only ledger of educational events with
//! proof-of-work sealing and RSA credentials
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Ledger Engine
//! - [`ledger`] - Chain management, participant registry, queries
//! - [`transaction`] - Transaction model
//! - [`block`] - Block structure and hash linkage
//! - [`sealer`] - Proof-of-work sealing
//!
//! ## Cryptography
//! - [`crypto`] - RSA keypairs, signatures, submission encryption
//! - [`canonical`] - Canonical JSON encoding shared by digests and signatures
//!
//! ## Credentials
//! - [`wallet`] - Wallet and encryption-key store
//!
//! ## Service Layer
//! - [`service`] - Async facade and education flows
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Ledger Engine
// ============================================================================
pub mod block;
pub mod ledger;
pub mod sealer;
pub mod transaction;

// ============================================================================
// Cryptography
// ============================================================================
pub mod canonical;
pub mod crypto;

// ============================================================================
// Credentials
// ============================================================================
pub mod wallet;

// ============================================================================
// Service Layer
// ============================================================================
pub mod service;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
