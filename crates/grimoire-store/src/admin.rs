//! Administrative surface: recompute, integrity and collision reports.

use grimoire_canonical::{Canonicalizer, ContentHash, SpellSchema};
use grimoire_core::{finalize, Finalized, SpellRecord};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::locks::LockKey;
use crate::pool::parallel_map;
use crate::store::{content_bytes, RecordStore};
use crate::vault::{Regenerator, Vault, VaultReport};

/// Mismatch examples kept in an integrity report.
pub const MAX_EXAMPLES: usize = 10;

/// One record whose hash changed on recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashChange {
    /// Record id.
    pub id: i64,
    /// Hash before.
    pub old: Option<ContentHash>,
    /// Hash after.
    pub new: ContentHash,
}

/// One record that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    /// Record id.
    pub id: i64,
    /// What went wrong.
    pub error: String,
}

/// Result of [`recompute_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecomputeReport {
    /// Records examined.
    pub processed: usize,
    /// Records whose hash changed and was rewritten.
    pub changed: Vec<HashChange>,
    /// Records that could not be finalized.
    pub failed: Vec<RecordFailure>,
    /// Rewrites refused as hash collisions.
    pub collisions: usize,
}

/// Recomputes every record's hash and rewrites those that changed, as one
/// commit.
///
/// The pure stage runs on a snapshot. The commit holds the vault pin and
/// the lock of every record it rewrites; a record edited since the snapshot
/// is recomputed from its current state.
pub fn recompute_all(
    store: &RecordStore,
    vault: Option<&Vault>,
    schema: &SpellSchema,
    workers: usize,
) -> Result<RecomputeReport, StoreError> {
    let records = store.all();
    let results = parallel_map(&records, workers, |record| finalize(schema, record));
    let mut report = RecomputeReport {
        processed: records.len(),
        ..RecomputeReport::default()
    };

    let mut candidates: Vec<(&SpellRecord, Finalized)> = Vec::new();
    for (record, result) in records.iter().zip(results) {
        match result {
            Ok(finalized) if record.content_hash.as_ref() == Some(&finalized.hash) => {}
            Ok(finalized) => candidates.push((record, finalized)),
            Err(err) => {
                warn!(record_id = record.id, error = %err, "recompute failed");
                report.failed.push(RecordFailure {
                    id: record.id,
                    error: err.to_string(),
                });
            }
        }
    }

    let _pin = vault.map(Vault::pin);
    let _guards = store.locks().lock_all(
        candidates
            .iter()
            .map(|(record, _)| LockKey::Record(record.id))
            .collect(),
    );
    let mut staged: Vec<(SpellRecord, Option<ContentHash>)> = Vec::new();
    for (snapshot, finalized) in candidates {
        let Some(current) = store.get(snapshot.id) else {
            continue;
        };
        let finalized = if current == *snapshot {
            finalized
        } else {
            debug!(record_id = current.id, "record changed during recompute; using current state");
            match finalize(schema, &current) {
                Ok(finalized) => finalized,
                Err(err) => {
                    warn!(record_id = current.id, error = %err, "recompute failed");
                    report.failed.push(RecordFailure {
                        id: current.id,
                        error: err.to_string(),
                    });
                    continue;
                }
            }
        };
        if current.content_hash.as_ref() == Some(&finalized.hash) {
            continue;
        }
        if let Some(vault) = vault {
            vault.put(&finalized.hash, &finalized.canonical_bytes)?;
        }
        let old = current.content_hash.clone();
        let mut updated = current;
        finalized.apply_to(&mut updated, schema.version);
        staged.push((updated, old));
    }

    let (updated, old): (Vec<SpellRecord>, Vec<Option<ContentHash>>) = staged.into_iter().unzip();
    let outcome = store.write_batch(updated.clone())?;
    report.collisions = outcome.collisions.len();
    for (index, (record, old)) in updated.into_iter().zip(old).enumerate() {
        if outcome.collisions.iter().any(|c| c.index == index) {
            continue;
        }
        if let Some(new) = record.content_hash {
            report.changed.push(HashChange {
                id: record.id,
                old,
                new,
            });
        }
    }

    info!(
        processed = report.processed,
        changed = report.changed.len(),
        failed = report.failed.len(),
        collisions = report.collisions,
        "recomputed hashes"
    );
    Ok(report)
}

/// A record whose stored hash disagrees with its structured blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashMismatch {
    /// Record id.
    pub id: i64,
    /// Hash on the record.
    pub stored: ContentHash,
    /// Hash of the blob, when it could be computed.
    pub recomputed: Option<ContentHash>,
    /// Why no hash could be computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of [`check_integrity`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// Records examined.
    pub total: usize,
    /// Records with no hash.
    pub missing_hash: usize,
    /// Records whose hash disagrees with their blob.
    pub mismatched: usize,
    /// The first few mismatches.
    pub examples: Vec<HashMismatch>,
    /// Hashes held by more than one record.
    pub duplicate_groups: usize,
    /// Vault pass, when a vault was given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault: Option<VaultReport>,
}

impl IntegrityReport {
    /// Whether nothing needs attention.
    pub fn is_clean(&self) -> bool {
        self.missing_hash == 0
            && self.mismatched == 0
            && self.vault.as_ref().map_or(true, |v| v.issues.is_empty())
    }
}

fn blob_hash(schema: &SpellSchema, record: &SpellRecord) -> Result<ContentHash, String> {
    let blob = record
        .structured
        .as_ref()
        .ok_or_else(|| "no structured blob".to_string())?;
    Canonicalizer::new(schema)
        .canonicalize(blob)
        .map(|result| result.hash)
        .map_err(|e| e.to_string())
}

/// Checks stored hashes against structured blobs store-wide, then runs the
/// vault integrity pass with regeneration from the store.
pub fn check_integrity(
    store: &RecordStore,
    vault: Option<&Vault>,
    schema: &SpellSchema,
) -> Result<IntegrityReport, StoreError> {
    let records = store.all();
    let mut report = IntegrityReport {
        total: records.len(),
        duplicate_groups: store.hash_groups().len(),
        ..IntegrityReport::default()
    };

    for record in &records {
        let Some(stored) = &record.content_hash else {
            report.missing_hash += 1;
            continue;
        };
        let (recomputed, error) = match blob_hash(schema, record) {
            Ok(hash) if &hash == stored => continue,
            Ok(hash) => (Some(hash), None),
            Err(why) => (None, Some(why)),
        };
        report.mismatched += 1;
        warn!(record_id = record.id, stored = %stored, "stored hash disagrees with structured blob");
        if report.examples.len() < MAX_EXAMPLES {
            report.examples.push(HashMismatch {
                id: record.id,
                stored: stored.clone(),
                recomputed,
                error,
            });
        }
    }

    if let Some(vault) = vault {
        let regen = StoreRegenerator { store, schema };
        report.vault = Some(vault.check_integrity(store, &regen)?);
    }

    info!(
        total = report.total,
        missing_hash = report.missing_hash,
        mismatched = report.mismatched,
        duplicate_groups = report.duplicate_groups,
        "integrity checked"
    );
    Ok(report)
}

/// How records sharing a hash relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionKind {
    /// Identical canonical content stored in several rows.
    SameContent,
    /// Different canonical content under one hash.
    TrueCollision,
    /// Some member's canonical content is unavailable.
    Undetermined,
}

/// Records sharing one hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollisionGroup {
    /// The shared hash.
    pub hash: ContentHash,
    /// Member record ids.
    pub ids: Vec<i64>,
    /// Classification.
    pub kind: CollisionKind,
}

/// Groups records sharing a hash and tells duplicates from collisions.
pub fn detect_collisions(store: &RecordStore) -> Vec<CollisionGroup> {
    store
        .hash_groups()
        .into_iter()
        .map(|(hash, ids)| {
            let contents: Vec<Option<Vec<u8>>> = ids
                .iter()
                .map(|id| store.get(*id).as_ref().and_then(content_bytes))
                .collect();
            let kind = if contents.iter().any(Option::is_none) {
                CollisionKind::Undetermined
            } else if contents.windows(2).all(|pair| pair[0] == pair[1]) {
                CollisionKind::SameContent
            } else {
                CollisionKind::TrueCollision
            };
            if kind == CollisionKind::TrueCollision {
                error!(hash = %hash, ids = ?ids, "true hash collision in store");
            }
            CollisionGroup { hash, ids, kind }
        })
        .collect()
}

/// Regenerates vault entries by re-finalizing the records that carry a hash.
pub struct StoreRegenerator<'a> {
    /// Authoritative records.
    pub store: &'a RecordStore,
    /// Schema the hashes were computed under.
    pub schema: &'a SpellSchema,
}

impl Regenerator for StoreRegenerator<'_> {
    fn regenerate(&self, hash: &ContentHash) -> Option<Vec<u8>> {
        self.store
            .ids_with_hash(hash)
            .into_iter()
            .filter_map(|id| self.store.get(id))
            .filter_map(|record| finalize(self.schema, &record).ok())
            .find(|finalized| &finalized.hash == hash)
            .map(|finalized| finalized.canonical_bytes)
    }
}
