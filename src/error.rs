//! Error types for EduLedger

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("no pending transactions to seal")]
    NothingToSeal,

    #[error("a seal is already in progress")]
    SealInProgress,

    #[error("participant already registered: {0}")]
    AlreadyRegistered(String),

    #[error("assignment {assignment_id} already graded for student {student}")]
    AlreadyGraded {
        assignment_id: String,
        student: String,
    },

    #[error("role violation: {0}")]
    RoleViolation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("payload of {len} bytes exceeds the {max} byte encryption limit")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("invalid block: {0}")]
    InvalidBlock(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Serialization(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
