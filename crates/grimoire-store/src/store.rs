//! Journal-backed record store.

use grimoire_canonical::{to_canonical_bytes, ContentHash};
use grimoire_core::SpellRecord;
use grimoire_journal::{FrameKind, JournalReader, JournalWriter, ReadMode, WriteOptions};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::filter::{NameFilter, RecordFilter};
use crate::locks::KeyedLocks;
use crate::vault::ReferenceSource;

/// One journal commit: record upserts and removals applied together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    /// Commit sequence number, starting at 1.
    pub seq: u64,
    /// Records written in full.
    #[serde(default)]
    pub upserts: Vec<SpellRecord>,
    /// Record ids removed.
    #[serde(default)]
    pub removed: Vec<i64>,
}

/// Options for opening a store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Whether each commit is fsynced before it becomes visible (default: true).
    pub sync: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self { sync: true }
    }
}

/// A write refused because its hash already names different content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedWrite {
    /// Position of the record in the batch.
    pub index: usize,
    /// Id of the rejected record.
    pub id: i64,
    /// The contested hash.
    pub hash: ContentHash,
    /// Record already holding the hash.
    pub existing: i64,
}

impl RejectedWrite {
    /// The matching [`StoreError::HashCollision`].
    pub fn to_error(&self) -> StoreError {
        StoreError::HashCollision {
            hash: self.hash.clone(),
            existing: self.existing,
            incoming: self.id,
        }
    }
}

/// Result of [`RecordStore::write_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Ids written, in batch order. New records get their assigned id.
    pub written: Vec<i64>,
    /// Writes stored alongside another row with identical content.
    pub duplicates: usize,
    /// Writes refused at the uniqueness boundary.
    pub collisions: Vec<RejectedWrite>,
}

/// Canonical content bytes of a hashed record's structured blob, without
/// the stored schema version. `None` when the record has no object blob.
pub fn content_bytes(record: &SpellRecord) -> Option<Vec<u8>> {
    let Some(Value::Object(map)) = &record.structured else {
        return None;
    };
    let mut map = map.clone();
    map.remove("schema_version");
    to_canonical_bytes(&Value::Object(map)).ok()
}

struct State {
    records: BTreeMap<i64, SpellRecord>,
    by_hash: HashMap<ContentHash, BTreeSet<i64>>,
    next_id: i64,
    seq: u64,
    checkpoint: Option<Value>,
}

impl State {
    fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            by_hash: HashMap::new(),
            next_id: 1,
            seq: 0,
            checkpoint: None,
        }
    }

    fn apply(&mut self, commit: Commit) {
        for id in commit.removed {
            self.unindex(id);
            self.records.remove(&id);
        }
        for record in commit.upserts {
            self.unindex(record.id);
            if let Some(hash) = &record.content_hash {
                self.by_hash.entry(hash.clone()).or_default().insert(record.id);
            }
            self.next_id = self.next_id.max(record.id + 1);
            self.records.insert(record.id, record);
        }
        self.seq = self.seq.max(commit.seq);
    }

    fn unindex(&mut self, id: i64) {
        let Some(hash) = self.records.get(&id).and_then(|r| r.content_hash.clone()) else {
            return;
        };
        if let Some(ids) = self.by_hash.get_mut(&hash) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_hash.remove(&hash);
            }
        }
    }

    /// Another record holding `hash`: first among this batch, then stored.
    fn holder<'a>(
        &'a self,
        batch: &'a [SpellRecord],
        hash: &ContentHash,
        id: i64,
    ) -> Option<&'a SpellRecord> {
        batch
            .iter()
            .find(|r| r.id != id && r.content_hash.as_ref() == Some(hash))
            .or_else(|| {
                self.by_hash
                    .get(hash)?
                    .iter()
                    .filter(|other| **other != id)
                    .find_map(|other| self.records.get(other))
            })
    }
}

/// Spell records keyed by id, persisted as a journal of commits.
///
/// Every batch is one commit frame; readers see either all of a batch or
/// none of it. Opening the store replays the journal and discards a torn
/// trailing frame, so the store is always at its last complete commit.
///
/// A content hash names one content: a write whose hash is already held by
/// a record with different canonical content is refused and logged as a
/// collision. A second row with identical content is allowed and logged as
/// a duplicate.
pub struct RecordStore {
    path: PathBuf,
    state: RwLock<State>,
    journal: Mutex<JournalWriter>,
    locks: KeyedLocks,
}

impl RecordStore {
    /// Opens or creates the store journal at `path`.
    pub fn open<P: AsRef<Path>>(path: P, options: StoreOptions) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut state = State::new();
        if path.exists() && fs::metadata(&path)?.len() > 0 {
            let mut reader = JournalReader::open(&path, ReadMode::Permissive)?;
            while let Some(entry) = reader.read_entry()? {
                match entry.kind {
                    FrameKind::Commit => state.apply(entry.decode::<Commit>()?),
                    FrameKind::Checkpoint => state.checkpoint = Some(entry.decode()?),
                    FrameKind::Unknown(_) => {}
                }
            }
            if let Some(offset) = reader.torn_at() {
                warn!(path = %path.display(), offset, "store journal had a torn commit; rolled back to the last complete one");
            }
        }

        let journal = JournalWriter::open(
            &path,
            WriteOptions {
                sync: options.sync,
                ..WriteOptions::default()
            },
        )?;
        info!(path = %path.display(), records = state.records.len(), seq = state.seq, "opened record store");

        Ok(Self {
            path,
            state: RwLock::new(state),
            journal: Mutex::new(journal),
            locks: KeyedLocks::new(),
        })
    }

    /// Journal path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Per-key write locks for callers composing multi-step writes.
    pub fn locks(&self) -> &KeyedLocks {
        &self.locks
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence number of the last commit.
    pub fn seq(&self) -> u64 {
        self.state.read().seq
    }

    /// Record by id.
    pub fn get(&self, id: i64) -> Option<SpellRecord> {
        self.state.read().records.get(&id).cloned()
    }

    /// Every record, by id.
    pub fn all(&self) -> Vec<SpellRecord> {
        self.state.read().records.values().cloned().collect()
    }

    /// Records matching `filter`, by id.
    pub fn select(&self, filter: &dyn RecordFilter) -> Vec<SpellRecord> {
        self.state
            .read()
            .records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }

    /// Ids of records carrying `hash`.
    pub fn ids_with_hash(&self, hash: &ContentHash) -> Vec<i64> {
        self.state
            .read()
            .by_hash
            .get(hash)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Hashes carried by more than one record, with their ids.
    pub fn hash_groups(&self) -> Vec<(ContentHash, Vec<i64>)> {
        let state = self.state.read();
        let mut groups: Vec<_> = state
            .by_hash
            .iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(hash, ids)| (hash.clone(), ids.iter().copied().collect()))
            .collect();
        groups.sort();
        groups
    }

    /// Whether a record already uses `name` for display, ignoring case.
    pub fn name_taken(&self, name: &str) -> bool {
        let filter = NameFilter {
            name: name.to_string(),
        };
        self.state.read().records.values().any(|r| filter.matches(r))
    }

    /// Payload of the most recent checkpoint frame.
    pub fn last_checkpoint(&self) -> Option<Value> {
        self.state.read().checkpoint.clone()
    }

    /// Writes `records` as one commit.
    ///
    /// Records with id `<= 0` are assigned the next free id. A record whose
    /// hash is held by different content is left out of the commit and
    /// reported in [`BatchOutcome::collisions`]; the rest of the batch is
    /// still written.
    pub fn write_batch(&self, records: Vec<SpellRecord>) -> Result<BatchOutcome, StoreError> {
        let mut state = self.state.write();
        let mut outcome = BatchOutcome::default();
        let mut accepted: Vec<SpellRecord> = Vec::with_capacity(records.len());
        let mut next_id = state.next_id;

        for (index, mut record) in records.into_iter().enumerate() {
            if record.id <= 0 {
                record.id = next_id;
                next_id += 1;
            }
            if let Some(hash) = record.content_hash.clone() {
                if let Some(holder) = state.holder(&accepted, &hash, record.id) {
                    let existing = holder.id;
                    match (content_bytes(holder), content_bytes(&record)) {
                        (Some(held), Some(incoming)) if held != incoming => {
                            error!(hash = %hash, existing, incoming = record.id, "hash collision: write refused");
                            outcome.collisions.push(RejectedWrite {
                                index,
                                id: record.id,
                                hash,
                                existing,
                            });
                            continue;
                        }
                        (Some(_), Some(_)) => {
                            info!(hash = %hash, existing, record_id = record.id, "duplicate content stored as a second row");
                            outcome.duplicates += 1;
                        }
                        _ => {
                            warn!(hash = %hash, existing, record_id = record.id, "shared hash with content that cannot be compared");
                        }
                    }
                }
            }
            accepted.push(record);
        }

        if accepted.is_empty() {
            return Ok(outcome);
        }
        outcome.written = accepted.iter().map(|r| r.id).collect();
        let commit = Commit {
            seq: state.seq + 1,
            upserts: accepted,
            removed: Vec::new(),
        };
        self.journal.lock().append_commit(&commit)?;
        debug!(seq = commit.seq, records = commit.upserts.len(), "committed batch");
        state.apply(commit);
        Ok(outcome)
    }

    /// Removes records by id as one commit. Returns how many existed.
    pub fn remove(&self, ids: &[i64]) -> Result<usize, StoreError> {
        let mut state = self.state.write();
        let removed: Vec<i64> = ids
            .iter()
            .copied()
            .filter(|id| state.records.contains_key(id))
            .collect();
        if removed.is_empty() {
            return Ok(0);
        }
        let commit = Commit {
            seq: state.seq + 1,
            upserts: Vec::new(),
            removed,
        };
        self.journal.lock().append_commit(&commit)?;
        let count = commit.removed.len();
        state.apply(commit);
        Ok(count)
    }

    /// Appends a checkpoint frame after the last commit.
    pub fn checkpoint<T: Serialize>(&self, payload: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(payload)?;
        let mut state = self.state.write();
        self.journal.lock().append_checkpoint(&value)?;
        state.checkpoint = Some(value);
        Ok(())
    }
}

impl ReferenceSource for RecordStore {
    fn live_hashes(&self) -> BTreeSet<ContentHash> {
        self.state.read().by_hash.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn make_store(dir: &TempDir) -> RecordStore {
        RecordStore::open(dir.path().join("records.grj"), StoreOptions { sync: false }).unwrap()
    }

    fn make_hashed(id: i64, name: &str, blob: Value, hash: &ContentHash) -> SpellRecord {
        let mut record = SpellRecord::new(id, name, 1, "x");
        record.structured = Some(blob);
        record.content_hash = Some(hash.clone());
        record
    }

    #[test]
    fn new_records_get_ids() {
        let dir = TempDir::new().unwrap();
        let store = make_store(&dir);
        let outcome = store
            .write_batch(vec![SpellRecord::new(0, "Sleep", 1, "x"), SpellRecord::new(0, "Light", 1, "y")])
            .unwrap();
        assert_eq!(outcome.written, vec![1, 2]);
        assert_eq!(store.get(2).unwrap().name, "Light");
        assert_eq!(store.seq(), 1);
    }

    #[test]
    fn identical_content_is_a_duplicate() {
        let dir = TempDir::new().unwrap();
        let store = make_store(&dir);
        let hash = ContentHash::of(b"same");
        let blob = json!({"name": "Sleep", "schema_version": 2});
        let outcome = store
            .write_batch(vec![
                make_hashed(1, "Sleep", blob.clone(), &hash),
                make_hashed(2, "Sleep", json!({"name": "Sleep", "schema_version": 1}), &hash),
            ])
            .unwrap();
        assert_eq!(outcome.duplicates, 1);
        assert!(outcome.collisions.is_empty());
        assert_eq!(store.ids_with_hash(&hash), vec![1, 2]);
    }

    #[test]
    fn different_content_under_one_hash_is_refused() {
        let dir = TempDir::new().unwrap();
        let store = make_store(&dir);
        let hash = ContentHash::of(b"contested");
        store
            .write_batch(vec![make_hashed(1, "Sleep", json!({"name": "Sleep"}), &hash)])
            .unwrap();
        let outcome = store
            .write_batch(vec![
                make_hashed(2, "Light", json!({"name": "Light"}), &hash),
                SpellRecord::new(3, "Mending", 0, "z"),
            ])
            .unwrap();
        assert_eq!(outcome.written, vec![3]);
        assert_eq!(outcome.collisions.len(), 1);
        assert_eq!(outcome.collisions[0].existing, 1);
        assert!(matches!(outcome.collisions[0].to_error(), StoreError::HashCollision { .. }));
        assert!(store.get(2).is_none());
    }

    #[test]
    fn rewriting_a_row_keeps_its_own_hash() {
        let dir = TempDir::new().unwrap();
        let store = make_store(&dir);
        let hash = ContentHash::of(b"mine");
        store
            .write_batch(vec![make_hashed(1, "Sleep", json!({"name": "Sleep"}), &hash)])
            .unwrap();
        let mut again = store.get(1).unwrap();
        again.metadata.author = Some("Someone".into());
        let outcome = store.write_batch(vec![again]).unwrap();
        assert_eq!(outcome, BatchOutcome { written: vec![1], ..BatchOutcome::default() });
    }

    #[test]
    fn reopen_replays_commits_and_checkpoint() {
        let dir = TempDir::new().unwrap();
        {
            let store = make_store(&dir);
            store.write_batch(vec![SpellRecord::new(0, "Sleep", 1, "x")]).unwrap();
            store.write_batch(vec![SpellRecord::new(0, "Light", 1, "y")]).unwrap();
            store.remove(&[1]).unwrap();
            store.checkpoint(&json!({"processed": 2})).unwrap();
        }
        let store = make_store(&dir);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(2).unwrap().name, "Light");
        assert_eq!(store.seq(), 3);
        assert_eq!(store.last_checkpoint().unwrap()["processed"], 2);
        let outcome = store.write_batch(vec![SpellRecord::new(0, "Mending", 0, "z")]).unwrap();
        assert_eq!(outcome.written, vec![3]);
    }
}
