//! Journal-backed spell record store with a content-addressed vault.
//!
//! This crate provides:
//! - `RecordStore`, an in-memory record index rebuilt from an append-only
//!   journal, with one journal frame per committed batch
//! - `Vault`, canonical bytes stored by content hash with garbage
//!   collection and an integrity pass that regenerates damaged entries
//! - Chunked, resumable hash backfill over unhashed records
//! - Import staging, conflict decisions and transactional apply
//! - Recompute, integrity and collision reports
//! - Keyed locks serializing writers on one record or one hash
//!
//! Core invariants:
//! - A content hash names one canonical content; a write that would give a
//!   hash to different content is refused
//! - A batch is visible in full or not at all, on disk and in memory
//! - A vault entry's bytes always hash to its file name
//! - Garbage collection never removes an entry a concurrent writer is about
//!   to reference

#![deny(missing_docs)]

/// Recompute, integrity and collision reports.
pub mod admin;
/// Bulk hash backfill.
pub mod backfill;
/// Error types for store and vault operations.
pub mod error;
/// Record selection filters.
pub mod filter;
/// Import staging and apply.
pub mod import;
/// Per-record and per-hash write locks.
pub mod locks;
/// Scoped worker pool for pure stages.
pub mod pool;
/// Journal-backed record store.
pub mod store;
/// Content-addressed vault.
pub mod vault;

pub use admin::{
    check_integrity, detect_collisions, recompute_all, CollisionGroup, CollisionKind, HashChange,
    HashMismatch, IntegrityReport, RecomputeReport, RecordFailure, StoreRegenerator,
};
pub use backfill::{
    backfill, backfill_until, BackfillCheckpoint, BackfillItem, BackfillOptions, BackfillSummary,
};
pub use error::{StoreError, VaultError};
pub use filter::{HashFilter, IdentityFilter, MissingHash, NameFilter, OrFilter, RecordFilter};
pub use import::{apply, stage, Applied, ImportReport, ImportSession, RejectedImport};
pub use locks::{KeyGuard, KeyedLocks, LockKey};
pub use pool::{default_workers, parallel_map};
pub use store::{content_bytes, BatchOutcome, Commit, RecordStore, RejectedWrite, StoreOptions};
pub use vault::{
    GcReport, IntegrityIssue, IssueKind, ReferenceSource, Regenerator, Vault, VaultConfig,
    VaultPin, VaultReport,
};
