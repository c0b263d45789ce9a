//! Bulk hash backfill over records that have never been hashed.
//!
//! Work proceeds in chunks. The pure stage (assembly, parsing,
//! canonicalization, hashing) of a chunk runs on a worker pool; the chunk's
//! results are then committed as one journal frame followed by a checkpoint
//! frame with the running counts. Only unhashed records are selected, so an
//! interrupted run resumes where the last committed chunk left off.
//!
//! Each chunk is committed under the vault pin and the lock of every record
//! in it. A record edited after selection is rehashed from its current
//! state, or skipped if another writer already hashed or removed it.

use chrono::{DateTime, Utc};
use grimoire_canonical::{ContentHash, SpellSchema};
use grimoire_core::{finalize, Finalized, SpellRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::filter::MissingHash;
use crate::locks::LockKey;
use crate::pool::{default_workers, parallel_map};
use crate::store::RecordStore;
use crate::vault::Vault;

/// Backfill tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillOptions {
    /// Records per commit.
    pub chunk_size: usize,
    /// Progress is logged each time this many more records are processed.
    pub progress_every: usize,
    /// Worker threads for the pure stage.
    pub workers: usize,
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            progress_every: 100,
            workers: default_workers(),
        }
    }
}

/// Per-record backfill result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillItem {
    /// Record id.
    pub id: i64,
    /// New hash, when the record was updated.
    pub hash: Option<ContentHash>,
    /// Whether any legacy field fell back to its special form.
    pub fallback_used: bool,
    /// Why the record was not updated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate backfill result, serializable as the migration report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillSummary {
    /// Records examined.
    pub processed: usize,
    /// Records given a hash.
    pub updated: usize,
    /// Updated records with at least one fallback field.
    pub fallback: usize,
    /// Records that failed validation, canonicalization or storage.
    pub failed: usize,
    /// Writes refused as hash collisions.
    pub collisions: usize,
    /// Records another writer hashed or removed after selection.
    #[serde(default)]
    pub skipped: usize,
    /// Whether the run stopped before every pending record was processed.
    pub interrupted: bool,
    /// Per-record results.
    pub items: Vec<BackfillItem>,
}

impl BackfillSummary {
    /// Updated records whose legacy text parsed without a fallback.
    pub fn clean(&self) -> usize {
        self.updated - self.fallback
    }
}

/// Running counts written after each committed chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillCheckpoint {
    /// Job name.
    pub job: String,
    /// Records examined so far in this run.
    pub processed: usize,
    /// Records updated so far.
    pub updated: usize,
    /// Updated records with a fallback so far.
    pub fallback: usize,
    /// Failures so far.
    pub failed: usize,
    /// Collisions so far.
    pub collisions: usize,
    /// When the chunk was committed.
    pub at: DateTime<Utc>,
}

impl BackfillCheckpoint {
    fn of(summary: &BackfillSummary, at: DateTime<Utc>) -> Self {
        Self {
            job: "backfill".into(),
            processed: summary.processed,
            updated: summary.updated,
            fallback: summary.fallback,
            failed: summary.failed,
            collisions: summary.collisions,
            at,
        }
    }
}

/// Hashes every unhashed record.
pub fn backfill(
    store: &RecordStore,
    vault: Option<&Vault>,
    schema: &SpellSchema,
    options: &BackfillOptions,
) -> Result<BackfillSummary, StoreError> {
    backfill_until(store, vault, schema, options, || false)
}

/// Like [`backfill`], checking `stop` before each chunk. A stopped run
/// leaves every committed chunk in place and can be rerun to finish.
pub fn backfill_until(
    store: &RecordStore,
    vault: Option<&Vault>,
    schema: &SpellSchema,
    options: &BackfillOptions,
    stop: impl Fn() -> bool,
) -> Result<BackfillSummary, StoreError> {
    let pending = store.select(&MissingHash);
    let chunk_size = options.chunk_size.max(1);
    let progress_every = options.progress_every.max(1);
    info!(pending = pending.len(), chunk_size, workers = options.workers, "starting hash backfill");

    let mut summary = BackfillSummary::default();
    let mut next_report = progress_every;
    for chunk in pending.chunks(chunk_size) {
        if stop() {
            summary.interrupted = true;
            warn!(processed = summary.processed, remaining = pending.len() - summary.processed, "backfill interrupted; rerun to resume");
            break;
        }

        let results = parallel_map(chunk, options.workers, |record| finalize(schema, record));
        let now = Utc::now();
        let _pin = vault.map(Vault::pin);
        let _guards = store
            .locks()
            .lock_all(chunk.iter().map(|record| LockKey::Record(record.id)).collect());
        let mut staged = Vec::with_capacity(chunk.len());
        for (snapshot, result) in chunk.iter().zip(results) {
            summary.processed += 1;
            let result = match store.get(snapshot.id) {
                Some(current) if current == *snapshot => result.map(|f| (current, f)),
                Some(current) if !current.is_hashed() => {
                    debug!(record_id = current.id, "record changed after selection; rehashing");
                    finalize(schema, &current).map(|f| (current, f))
                }
                _ => {
                    debug!(record_id = snapshot.id, "record hashed or removed after selection; skipped");
                    summary.skipped += 1;
                    continue;
                }
            };
            match result {
                Ok((current, finalized)) => {
                    let mut updated = current;
                    finalized.apply_to(&mut updated, schema.version);
                    updated.touch(now);
                    staged.push((updated, finalized));
                }
                Err(err) => {
                    warn!(record_id = snapshot.id, error = %err, "backfill could not hash record");
                    summary.failed += 1;
                    summary.items.push(BackfillItem {
                        id: snapshot.id,
                        hash: None,
                        fallback_used: false,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        commit_chunk(store, vault, staged, &mut summary)?;
        store.checkpoint(&BackfillCheckpoint::of(&summary, now))?;

        while summary.processed >= next_report {
            info!(
                processed = summary.processed,
                updated = summary.updated,
                fallback = summary.fallback,
                failed = summary.failed,
                "backfill progress"
            );
            next_report += progress_every;
        }
    }

    info!(
        processed = summary.processed,
        updated = summary.updated,
        fallback = summary.fallback,
        failed = summary.failed,
        collisions = summary.collisions,
        skipped = summary.skipped,
        interrupted = summary.interrupted,
        "backfill finished"
    );
    store.locks().prune();
    Ok(summary)
}

/// Stores vault entries and commits one chunk. The caller holds the vault
/// pin and the chunk's record locks.
fn commit_chunk(
    store: &RecordStore,
    vault: Option<&Vault>,
    staged: Vec<(SpellRecord, Finalized)>,
    summary: &mut BackfillSummary,
) -> Result<(), StoreError> {
    let mut records = Vec::with_capacity(staged.len());
    let mut fallbacks = Vec::with_capacity(staged.len());
    for (record, finalized) in staged {
        if let Some(vault) = vault {
            if let Err(err) = vault.put(&finalized.hash, &finalized.canonical_bytes) {
                warn!(record_id = record.id, error = %err, "vault write failed; record left unhashed");
                summary.failed += 1;
                summary.items.push(BackfillItem {
                    id: record.id,
                    hash: None,
                    fallback_used: finalized.fallback_used(),
                    error: Some(err.to_string()),
                });
                continue;
            }
        }
        fallbacks.push(finalized.fallback_used());
        records.push(record);
    }

    let outcome = store.write_batch(records.clone())?;
    for (index, (record, fallback_used)) in records.into_iter().zip(fallbacks).enumerate() {
        if let Some(rejected) = outcome.collisions.iter().find(|c| c.index == index) {
            summary.collisions += 1;
            summary.items.push(BackfillItem {
                id: record.id,
                hash: None,
                fallback_used,
                error: Some(rejected.to_error().to_string()),
            });
            continue;
        }
        summary.updated += 1;
        if fallback_used {
            summary.fallback += 1;
        }
        summary.items.push(BackfillItem {
            id: record.id,
            hash: record.content_hash,
            fallback_used,
            error: None,
        });
    }
    Ok(())
}
