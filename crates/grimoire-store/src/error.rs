//! Error types for store operations.

use grimoire_canonical::ContentHash;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Journal backend error.
    #[error("journal error: {0}")]
    Journal(#[from] grimoire_journal::JournalError),
    /// Record-level failure (validation, canonicalization, sanitization).
    #[error(transparent)]
    Core(#[from] grimoire_core::CoreError),
    /// Canonicalization failure outside a record save.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] grimoire_canonical::CanonicalizationError),
    /// Vault failure.
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),
    /// Payload serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// One hash would name two different contents.
    #[error("hash collision on {hash}: record {incoming} differs from record {existing}")]
    HashCollision {
        /// The contested hash.
        hash: ContentHash,
        /// Record already holding the hash.
        existing: i64,
        /// Record whose write was rejected.
        incoming: i64,
    },
    /// No record with this id.
    #[error("record {0} not found")]
    NotFound(i64),
}

/// Errors raised by the content-addressable vault.
#[derive(Error, Debug)]
pub enum VaultError {
    /// I/O error under the vault root.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Bytes handed to `put` do not hash to the given key.
    #[error("bytes hash to {actual}, not {expected}")]
    HashMismatch {
        /// Key the caller gave.
        expected: ContentHash,
        /// Hash of the bytes.
        actual: ContentHash,
    },
}
