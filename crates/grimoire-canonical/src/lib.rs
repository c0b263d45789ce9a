//! Canonical content model for spell records.
//!
//! This crate provides:
//! - Structured shapes for every free-text field kind
//! - The schema model, record validator and materializer
//! - The canonicalization pipeline producing byte-exact content
//! - `ContentHash`, the SHA-256 digest of canonical bytes
//!
//! Core invariants:
//! - Equal content always yields equal bytes and an equal hash
//! - Every field that participates in hashing is decided here

#![deny(missing_docs)]

/// Content-only projection produced by the canonicalizer.
pub mod canonical_spell;
/// Canonicalization pipeline for deterministic hashing.
pub mod canonicalizer;
/// Content hash primitive.
pub mod digest;
/// Hygiene report types emitted during canonicalization.
pub mod hygiene;
mod path;
/// Fixed-or-per-level quantities.
pub mod scalar;
/// Active schema model.
pub mod schema;
/// Byte-exact serializer.
pub mod serializer;
/// Structured field shapes.
pub mod spec;
/// String sanitation and enum lookup folding.
pub mod text;
/// Record validation, materialization and schema migration.
pub mod validation;

pub use canonical_spell::CanonicalSpell;
pub use canonicalizer::{CanonicalizationError, CanonicalizationResult, Canonicalizer};
pub use digest::ContentHash;
pub use hygiene::{HygieneReport, HygieneStatus, HygieneWarning};
pub use scalar::{Rounding, Scalar, ScalarMode};
pub use schema::{SchemaError, SpellSchema, Tradition};
pub use serializer::to_canonical_bytes;
pub use text::TextMode;
pub use validation::{ValidationError, Violation, VersionStatus};
