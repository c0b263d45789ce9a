//! Record-level engine for spell records.
//!
//! This crate provides:
//! - Total parsers from legacy free text to structured field shapes
//! - `SpellRecord` and assembly of its structured document
//! - Finalization on save (blob, canonical bytes, content hash)
//! - Live preview and legacy/blob sync checks
//! - Untrusted import sanitization
//! - Duplicate / conflict classification and resolution planning
//!
//! Core invariants:
//! - Parsing never fails and never drops the original text
//! - The structured blob wins over flat text; flat text only fills gaps
//! - Classification and planning are pure; nothing here writes to a store
//!
#![deny(missing_docs)]

/// Import classification and conflict resolution.
pub mod dedup;
/// Document assembly, finalization and sync checks.
pub mod document;
/// Error types for core operations.
pub mod errors;
/// Legacy free-text field parsers.
pub mod parse;
/// Live preview for editors.
pub mod preview;
/// The stored record.
pub mod record;
/// Import policy and input sanitization.
pub mod sanitize;

pub use dedup::{
    classify, disambiguate_name, plan, plan_duplicate, presentation, union_metadata,
    BulkDecision, Classification, FieldDiff, IdentityKey, ImportConflict, MergeSide, Prepared,
    Presentation, Resolution, ResolutionPlan,
};
pub use document::{assemble, finalize, sync_check, Assembled, Finalized, SyncMismatch};
pub use errors::CoreError;
pub use parse::{parse, FieldKind, ParsedField};
pub use preview::{preview, preview_record, Preview};
pub use record::{RecordMetadata, SourceRef, SpellRecord};
pub use sanitize::{ImportPolicy, SanitizeError};
