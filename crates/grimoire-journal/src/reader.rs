//! Journal reader implementation.

use crate::errors::JournalError;
use crate::frame::{FrameKind, JournalHeader, RecordFrame, FRAME_HEADER_SIZE, HEADER_SIZE};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{self, Read, Seek};
use std::path::Path;
use tracing::warn;

/// Read mode for handling a torn tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Truncated frames and checksum mismatches are errors.
    Strict,
    /// A truncated or corrupt frame ends the journal.
    Permissive,
}

/// One complete frame read from the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Frame kind.
    pub kind: FrameKind,
    /// Byte offset of the frame header.
    pub offset: u64,
    /// Payload bytes, checksum verified.
    pub payload: Vec<u8>,
}

impl Entry {
    /// Decodes the JSON payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, JournalError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

/// Sequential reader over a journal file.
///
/// In [`ReadMode::Permissive`] the first frame that is cut short or fails
/// its checksum is treated as end-of-file, and [`JournalReader::torn_at`]
/// reports where it began. Everything before that offset is a complete
/// prefix of commits.
///
/// # Example
///
/// ```rust,no_run
/// use grimoire_journal::{JournalReader, ReadMode};
///
/// let mut reader = JournalReader::open("records.grj", ReadMode::Strict)?;
/// while let Some(entry) = reader.read_entry()? {
///     println!("{:?} frame at {}", entry.kind, entry.offset);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct JournalReader {
    file: File,
    mode: ReadMode,
    position: u64,
    file_size: u64,
    torn_at: Option<u64>,
}

impl JournalReader {
    /// Opens a journal file for reading.
    ///
    /// The file header is validated and the reader is positioned at the first
    /// frame after the header.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the file cannot be opened or its header
    /// is invalid.
    pub fn open<P: AsRef<Path>>(path: P, mode: ReadMode) -> Result<Self, JournalError> {
        let mut file = File::open(path)?;
        file.seek(io::SeekFrom::Start(0))?;
        let mut header_bytes = [0u8; HEADER_SIZE];
        file.read_exact(&mut header_bytes)?;
        JournalHeader::from_bytes(&header_bytes)?;
        let file_size = file.metadata()?.len();

        Ok(Self {
            file,
            mode,
            position: HEADER_SIZE as u64,
            file_size,
            torn_at: None,
        })
    }

    /// Returns the current read position in the file.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Offset of the torn frame that ended a permissive read, if any.
    pub fn torn_at(&self) -> Option<u64> {
        self.torn_at
    }

    fn torn(&mut self, offset: u64, err: JournalError) -> Result<Option<Entry>, JournalError> {
        if self.mode == ReadMode::Strict {
            return Err(err);
        }
        warn!(offset, error = %err, "journal ends in a torn frame");
        self.torn_at = Some(offset);
        Ok(None)
    }

    /// Reads the next complete frame of any kind.
    ///
    /// Returns `Ok(None)` at end-of-file, and in permissive mode at the
    /// first torn frame.
    pub fn read_frame(&mut self) -> Result<Option<Entry>, JournalError> {
        if self.torn_at.is_some() || self.position >= self.file_size {
            return Ok(None);
        }
        let offset = self.position;
        self.file.seek(io::SeekFrom::Start(offset))?;

        let mut header_bytes = [0u8; FRAME_HEADER_SIZE];
        match self.file.read_exact(&mut header_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return self.torn(offset, JournalError::TruncatedFrame { offset });
            }
            Err(e) => return Err(e.into()),
        }

        let frame = match RecordFrame::from_bytes(&header_bytes) {
            Ok(frame) => frame,
            Err(JournalError::InvalidFrame { reason, .. }) => {
                return self.torn(offset, JournalError::InvalidFrame { offset, reason });
            }
            Err(other) => return Err(other),
        };

        let mut payload = vec![0u8; frame.len as usize];
        match self.file.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return self.torn(offset, JournalError::TruncatedFrame { offset });
            }
            Err(e) => return Err(e.into()),
        }
        if !frame.verifies(&payload) {
            return self.torn(offset, JournalError::ChecksumMismatch { offset });
        }

        self.position = offset + FRAME_HEADER_SIZE as u64 + frame.len as u64;
        Ok(Some(Entry {
            kind: frame.kind,
            offset,
            payload,
        }))
    }

    /// Reads the next commit or checkpoint frame, skipping unknown kinds.
    pub fn read_entry(&mut self) -> Result<Option<Entry>, JournalError> {
        loop {
            match self.read_frame()? {
                None => return Ok(None),
                Some(Entry {
                    kind: FrameKind::Unknown(_),
                    ..
                }) => continue,
                Some(entry) => return Ok(Some(entry)),
            }
        }
    }

    /// Reads every remaining frame and returns the length of the complete
    /// prefix: the offset just past the last good frame.
    pub fn valid_len(&mut self) -> Result<u64, JournalError> {
        while self.read_frame()?.is_some() {}
        Ok(self.position)
    }
}
