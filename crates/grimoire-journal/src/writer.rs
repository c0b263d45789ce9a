//! Journal writer implementation.

use crate::errors::JournalError;
use crate::frame::{FrameKind, JournalHeader, RecordFrame, HEADER_SIZE};
use crate::reader::{JournalReader, ReadMode};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Options for journal writing.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Whether to fsync after each append (default: false).
    pub sync: bool,
    /// Whether to create the file if it doesn't exist (default: true).
    pub create: bool,
    /// Whether to append to an existing file (default: true).
    pub append: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            sync: false,
            create: true,
            append: true,
        }
    }
}

/// Append-only writer.
///
/// Opening an existing journal discards a torn trailing frame left by an
/// interrupted append, so new frames always follow the last complete one.
///
/// # Example
///
/// ```rust,no_run
/// use grimoire_journal::{JournalWriter, WriteOptions};
/// use serde_json::json;
///
/// let mut writer = JournalWriter::open("records.grj", WriteOptions::default())?;
/// writer.append_commit(&json!({"seq": 1, "records": []}))?;
/// writer.finish()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct JournalWriter {
    file: File,
    sync: bool,
    discarded: u64,
}

impl JournalWriter {
    /// Opens or creates a journal file for writing.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the file cannot be opened, is not a
    /// journal, or is non-empty but shorter than a header.
    pub fn open<P: AsRef<Path>>(path: P, options: WriteOptions) -> Result<Self, JournalError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(options.create)
            .write(true)
            .read(true)
            .open(path)?;

        let mut writer = Self {
            file,
            sync: options.sync,
            discarded: 0,
        };

        let len = writer.file.metadata()?.len();
        if len == 0 {
            writer.write_header()?;
            return Ok(writer);
        }
        if len < HEADER_SIZE as u64 {
            return Err(JournalError::FileNotEmpty);
        }

        let mut header_bytes = [0u8; HEADER_SIZE];
        writer.file.seek(io::SeekFrom::Start(0))?;
        writer.file.read_exact(&mut header_bytes)?;
        JournalHeader::from_bytes(&header_bytes)?;

        let keep = if options.append {
            JournalReader::open(path, ReadMode::Permissive)?.valid_len()?
        } else {
            HEADER_SIZE as u64
        };
        if keep < len {
            if options.append {
                warn!(path = %path.display(), kept = keep, discarded = len - keep, "discarding torn journal tail");
            }
            writer.file.set_len(keep)?;
            writer.discarded = len - keep;
        }
        writer.file.seek(io::SeekFrom::Start(keep))?;
        Ok(writer)
    }

    fn write_header(&mut self) -> Result<(), JournalError> {
        self.file.write_all(&JournalHeader::new().to_bytes())?;
        self.file.flush()?;
        if self.sync {
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Bytes cut from the end of the file when it was opened.
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded
    }

    /// Appends a commit frame carrying `payload` as JSON.
    pub fn append_commit<T: Serialize>(&mut self, payload: &T) -> Result<u64, JournalError> {
        let bytes = serde_json::to_vec(payload)?;
        self.append_raw(FrameKind::Commit, &bytes)
    }

    /// Appends a checkpoint frame carrying `payload` as JSON.
    pub fn append_checkpoint<T: Serialize>(&mut self, payload: &T) -> Result<u64, JournalError> {
        let bytes = serde_json::to_vec(payload)?;
        self.append_raw(FrameKind::Checkpoint, &bytes)
    }

    /// Appends a raw frame and returns its offset.
    ///
    /// Header and payload go out in one write so a crash leaves at most one
    /// torn frame at the tail.
    pub fn append_raw(&mut self, kind: FrameKind, payload: &[u8]) -> Result<u64, JournalError> {
        let frame = RecordFrame::for_payload(kind, payload)?;
        let offset = self.file.stream_position()?;

        let mut buf = Vec::with_capacity(frame.to_bytes().len() + payload.len());
        buf.extend_from_slice(&frame.to_bytes());
        buf.extend_from_slice(payload);
        self.file.write_all(&buf)?;
        self.file.flush()?;
        if self.sync {
            self.file.sync_data()?;
        }

        debug!(offset, kind = kind.to_byte(), len = payload.len(), "appended journal frame");
        Ok(offset)
    }

    /// Finishes writing and closes the file.
    pub fn finish(mut self) -> Result<(), JournalError> {
        self.file.flush()?;
        if self.sync {
            self.file.sync_all()?;
        }
        Ok(())
    }
}

impl Drop for JournalWriter {
    fn drop(&mut self) {
        let _ = self.file.flush();
        if self.sync {
            let _ = self.file.sync_all();
        }
    }
}
