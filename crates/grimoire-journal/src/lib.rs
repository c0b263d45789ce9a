//! Append-only commit log for Grimoire record stores.
//!
//! This crate provides:
//! - Framed, append-only storage for JSON commit and checkpoint payloads
//! - Reader/writer APIs with strict and permissive modes
//! - Torn-tail recovery: a frame cut short by a crash is discarded on open
//!
//! Core invariants:
//! - Every frame carries its payload length and a SHA-256-derived checksum
//! - A reader never yields a frame whose payload fails its checksum
//! - After [`JournalWriter::open`], the file is a complete prefix of frames
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use grimoire_journal::{FrameKind, JournalReader, JournalWriter, ReadMode, WriteOptions};
//! use serde_json::{json, Value};
//!
//! let mut writer = JournalWriter::open("records.grj", WriteOptions::default())?;
//! writer.append_commit(&json!({"seq": 1, "records": []}))?;
//! writer.append_checkpoint(&json!({"processed": 0}))?;
//! writer.finish()?;
//!
//! let mut reader = JournalReader::open("records.grj", ReadMode::Permissive)?;
//! while let Some(entry) = reader.read_entry()? {
//!     if entry.kind == FrameKind::Commit {
//!         let commit: Value = entry.decode()?;
//!         println!("commit {}", commit["seq"]);
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]

/// Error types for journal operations.
pub mod errors;
/// Frame structure and serialization.
pub mod frame;
/// Journal reader implementation.
pub mod reader;
/// Journal writer implementation.
pub mod writer;

pub use errors::JournalError;
pub use frame::{FrameKind, JournalHeader, RecordFrame};
pub use reader::{Entry, JournalReader, ReadMode};
pub use writer::{JournalWriter, WriteOptions};
