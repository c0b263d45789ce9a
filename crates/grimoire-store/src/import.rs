//! Import staging and transactional application of decisions.
//!
//! Staging classifies every incoming record against the store, and against
//! the records staged before it in the same import, without taking any
//! lock. A session can wait on user decisions for as long as it likes and
//! be dropped with nothing written. Committing takes the vault pin and the
//! existing record's lock, re-checks that the record is unchanged since
//! staging, then writes vault entry and record under the hash lock.

use chrono::{DateTime, Utc};
use grimoire_canonical::SpellSchema;
use grimoire_core::{
    classify, plan, plan_duplicate, presentation, union_metadata, Classification, ImportConflict,
    ImportPolicy, Prepared, Presentation, Resolution, ResolutionPlan, SpellRecord,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::filter::{HashFilter, IdentityFilter, OrFilter, RecordFilter};
use crate::locks::LockKey;
use crate::store::RecordStore;
use crate::vault::Vault;

/// What [`apply`] wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "id")]
pub enum Applied {
    /// Nothing.
    Skipped,
    /// A new record.
    Inserted(i64),
    /// New content over an existing record.
    Updated(i64),
    /// Metadata only.
    Metadata(i64),
}

fn commit_one(store: &RecordStore, record: SpellRecord) -> Result<i64, StoreError> {
    let id = record.id;
    let outcome = store.write_batch(vec![record])?;
    if let Some(rejected) = outcome.collisions.first() {
        return Err(rejected.to_error());
    }
    outcome.written.first().copied().ok_or(StoreError::NotFound(id))
}

/// Writes `plan` under its hash lock. The caller holds the vault pin and
/// the lock of any existing record the plan touches.
fn write_held(
    store: &RecordStore,
    vault: Option<&Vault>,
    plan: ResolutionPlan,
    now: DateTime<Utc>,
) -> Result<Applied, StoreError> {
    match plan {
        ResolutionPlan::Skip => Ok(Applied::Skipped),
        ResolutionPlan::Metadata(mut record) => {
            record.touch(now);
            Ok(Applied::Metadata(commit_one(store, record)?))
        }
        ResolutionPlan::Update(prepared) | ResolutionPlan::Insert(prepared) => {
            let is_update = prepared.record.id > 0;
            let _hash = store.locks().lock(LockKey::Hash(prepared.hash.clone()));
            if let Some(vault) = vault {
                vault.put(&prepared.hash, &prepared.canonical_bytes)?;
            }
            let mut record = prepared.record;
            record.touch(now);
            let id = commit_one(store, record)?;
            Ok(if is_update {
                Applied::Updated(id)
            } else {
                Applied::Inserted(id)
            })
        }
    }
}

fn target_id(plan: &ResolutionPlan) -> Option<i64> {
    match plan {
        ResolutionPlan::Skip => None,
        ResolutionPlan::Metadata(record) => Some(record.id),
        ResolutionPlan::Update(prepared) | ResolutionPlan::Insert(prepared) => {
            (prepared.record.id > 0).then_some(prepared.record.id)
        }
    }
}

/// Applies one plan atomically: vault entry, record content and hash land
/// together or not at all.
///
/// Locks are taken in a fixed order: vault pin, record, hash.
pub fn apply(
    store: &RecordStore,
    vault: Option<&Vault>,
    plan: ResolutionPlan,
    now: DateTime<Utc>,
) -> Result<Applied, StoreError> {
    let _pin = vault.map(Vault::pin);
    let _record = target_id(&plan).map(|id| store.locks().lock(LockKey::Record(id)));
    write_held(store, vault, plan, now)
}

/// An incoming record refused before classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedImport {
    /// Position in the incoming batch, when refused before classification.
    pub index: Option<usize>,
    /// Incoming name.
    pub name: String,
    /// Reason.
    pub reason: String,
}

/// Outcome of committing a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Ids inserted.
    pub inserted: Vec<i64>,
    /// Ids overwritten.
    pub updated: Vec<i64>,
    /// Ids that only gained metadata.
    pub metadata: Vec<i64>,
    /// Decisions that wrote nothing.
    pub skipped: usize,
    /// Existing ids that changed after staging; their decisions were dropped.
    pub stale: Vec<i64>,
    /// Incoming records that repeated an earlier record of the same import.
    pub folded: usize,
    /// Writes refused as hash collisions.
    pub collisions: usize,
    /// Records refused before classification or while planning.
    pub rejected: Vec<RejectedImport>,
}

fn is_stale(store: &RecordStore, snapshots: &BTreeMap<i64, SpellRecord>, id: i64) -> bool {
    store.get(id).as_ref() != snapshots.get(&id)
}

fn refresh(snapshots: &mut BTreeMap<i64, SpellRecord>, store: &RecordStore, id: i64) {
    if let Some(record) = store.get(id) {
        snapshots.insert(id, record);
    }
}

/// Tallies one write. Returns whether it touched an existing record.
fn record_applied(report: &mut ImportReport, result: Result<Applied, StoreError>, name: &str) -> bool {
    match result {
        Ok(Applied::Skipped) => report.skipped += 1,
        Ok(Applied::Inserted(id)) => report.inserted.push(id),
        Ok(Applied::Updated(id)) => {
            report.updated.push(id);
            return true;
        }
        Ok(Applied::Metadata(id)) => {
            report.metadata.push(id);
            return true;
        }
        Err(StoreError::HashCollision { .. }) => report.collisions += 1,
        Err(err) => {
            warn!(name, error = %err, "import write failed");
            report.rejected.push(RejectedImport {
                index: None,
                name: name.to_string(),
                reason: err.to_string(),
            });
        }
    }
    false
}

/// A classified import awaiting decisions.
pub struct ImportSession {
    /// Records with no match.
    pub new: Vec<Prepared>,
    /// Incoming records whose content is already stored.
    pub duplicates: Vec<(Prepared, Prepared)>,
    /// Same spell, different content. A conflict whose existing record has
    /// id 0 is with an earlier record of this import; it is matched to that
    /// record's stored row once the record is inserted.
    pub conflicts: Vec<ImportConflict>,
    /// Records refused by sanitization or validation.
    pub rejected: Vec<RejectedImport>,
    /// Incoming records whose content repeated an earlier record of this
    /// import; their metadata was merged into that record.
    pub folded: usize,
    snapshots: BTreeMap<i64, SpellRecord>,
    /// Conflict index -> index into `new` of the record it conflicts with.
    staged_links: BTreeMap<usize, usize>,
}

/// Sanitizes, finalizes and classifies `incoming` against the store.
pub fn stage(
    store: &RecordStore,
    schema: &SpellSchema,
    policy: &ImportPolicy,
    incoming: Vec<SpellRecord>,
) -> ImportSession {
    let mut session = ImportSession {
        new: Vec::new(),
        duplicates: Vec::new(),
        conflicts: Vec::new(),
        rejected: Vec::new(),
        folded: 0,
        snapshots: BTreeMap::new(),
        staged_links: BTreeMap::new(),
    };

    for (index, mut record) in incoming.into_iter().enumerate() {
        record.id = 0;
        record.content_hash = None;
        let name = record.name.clone();
        let prepared = match Prepared::untrusted(schema, policy, record) {
            Ok(prepared) => prepared,
            Err(err) => {
                warn!(index, name = %name, error = %err, "import record rejected");
                session.rejected.push(RejectedImport {
                    index: Some(index),
                    name,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        let matching = OrFilter {
            filters: vec![
                Box::new(IdentityFilter { key: prepared.key() }),
                Box::new(HashFilter {
                    hash: prepared.hash.clone(),
                }),
            ],
        };
        let stored = store.select(&matching);
        let mut candidates: Vec<Prepared> = stored
            .iter()
            .filter_map(|r| Prepared::new(schema, r.clone()).ok())
            .collect();
        candidates.extend(
            session
                .new
                .iter()
                .filter(|staged| matching.matches(&staged.record) || staged.hash == prepared.hash)
                .cloned(),
        );
        match classify(prepared, &candidates) {
            Classification::New(prepared) => session.new.push(prepared),
            Classification::Duplicate { existing, incoming } if existing.record.id == 0 => {
                if let Some(staged) = session.new.iter_mut().find(|s| s.hash == existing.hash) {
                    union_metadata(&mut staged.record, &incoming.record);
                }
                debug!(index, name = %incoming.record.name, "repeated record folded into earlier one");
                session.folded += 1;
            }
            Classification::Duplicate { existing, incoming } => {
                session.remember(&stored, existing.record.id);
                session.duplicates.push((existing, incoming));
            }
            Classification::Conflict(conflict) if conflict.existing.record.id == 0 => {
                if let Some(position) = session.new.iter().position(|s| s.hash == conflict.existing.hash) {
                    session.staged_links.insert(session.conflicts.len(), position);
                }
                session.conflicts.push(conflict);
            }
            Classification::Conflict(conflict) => {
                session.remember(&stored, conflict.existing.record.id);
                session.conflicts.push(conflict);
            }
        }
    }

    info!(
        new = session.new.len(),
        duplicates = session.duplicates.len(),
        conflicts = session.conflicts.len(),
        rejected = session.rejected.len(),
        folded = session.folded,
        "import staged"
    );
    session
}

impl ImportSession {
    fn remember(&mut self, stored: &[SpellRecord], id: i64) {
        if let Some(record) = stored.iter().find(|r| r.id == id) {
            self.snapshots.insert(id, record.clone());
        }
    }

    /// How the pending conflicts should be offered.
    pub fn presentation(&self, policy: &ImportPolicy) -> Presentation {
        presentation(self.conflicts.len(), policy)
    }

    /// Applies every new record and duplicate, and each conflict's
    /// decision from `decide`. Each write is its own transaction; one
    /// failure does not stop the rest.
    ///
    /// A decision is only asked for while its existing record still matches
    /// the staged snapshot, and is written only if it still matches once the
    /// record lock is held.
    pub fn commit(
        self,
        store: &RecordStore,
        vault: Option<&Vault>,
        schema: &SpellSchema,
        mut decide: impl FnMut(&ImportConflict) -> Resolution,
    ) -> Result<ImportReport, StoreError> {
        let ImportSession {
            new,
            duplicates,
            conflicts,
            rejected,
            folded,
            mut snapshots,
            staged_links,
        } = self;
        let now = Utc::now();
        let mut report = ImportReport {
            rejected,
            folded,
            ..ImportReport::default()
        };
        let mut names: BTreeSet<String> = BTreeSet::new();
        let mut inserted: BTreeMap<usize, i64> = BTreeMap::new();

        for (position, prepared) in new.into_iter().enumerate() {
            let name = prepared.record.name.clone();
            let result = apply(store, vault, ResolutionPlan::Insert(prepared), now);
            if let Ok(Applied::Inserted(id)) = &result {
                inserted.insert(position, *id);
            }
            record_applied(&mut report, result, &name);
        }

        for (existing, incoming) in &duplicates {
            let id = existing.record.id;
            let _pin = vault.map(Vault::pin);
            let _record = store.locks().lock(LockKey::Record(id));
            if is_stale(store, &snapshots, id) {
                report.stale.push(id);
                continue;
            }
            let result = write_held(store, vault, plan_duplicate(existing, incoming), now);
            if record_applied(&mut report, result, &incoming.record.name) {
                refresh(&mut snapshots, store, id);
            }
        }

        for (index, conflict) in conflicts.into_iter().enumerate() {
            let conflict = match staged_links.get(&index) {
                None => conflict,
                Some(position) => {
                    let stored = inserted.get(position).and_then(|id| store.get(*id));
                    let linked = stored
                        .ok_or_else(|| "earlier record of this import was not stored".to_string())
                        .and_then(|record| {
                            Prepared::new(schema, record).map_err(|err| err.to_string())
                        });
                    match linked {
                        Ok(existing) => {
                            snapshots
                                .entry(existing.record.id)
                                .or_insert_with(|| existing.record.clone());
                            ImportConflict::new(existing, conflict.incoming)
                        }
                        Err(reason) => {
                            report.rejected.push(RejectedImport {
                                index: None,
                                name: conflict.incoming.record.name.clone(),
                                reason,
                            });
                            continue;
                        }
                    }
                }
            };

            let id = conflict.existing.record.id;
            if is_stale(store, &snapshots, id) {
                warn!(existing_id = id, "existing record changed since staging; decision dropped");
                report.stale.push(id);
                continue;
            }
            let resolution = decide(&conflict);

            let _pin = vault.map(Vault::pin);
            let _record = store.locks().lock(LockKey::Record(id));
            if is_stale(store, &snapshots, id) {
                warn!(existing_id = id, "existing record changed while deciding; decision dropped");
                report.stale.push(id);
                continue;
            }
            let taken = |candidate: &str| {
                store.name_taken(candidate) || names.contains(&candidate.to_lowercase())
            };
            let planned = match plan(schema, &conflict, &resolution, taken) {
                Ok(planned) => planned,
                Err(err) => {
                    report.rejected.push(RejectedImport {
                        index: None,
                        name: conflict.incoming.record.name.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            if let ResolutionPlan::Insert(prepared) = &planned {
                names.insert(prepared.record.name.to_lowercase());
            }
            let result = write_held(store, vault, planned, now);
            if record_applied(&mut report, result, &conflict.incoming.record.name) {
                refresh(&mut snapshots, store, id);
            }
        }

        store.locks().prune();
        info!(
            inserted = report.inserted.len(),
            updated = report.updated.len(),
            metadata = report.metadata.len(),
            skipped = report.skipped,
            stale = report.stale.len(),
            folded = report.folded,
            collisions = report.collisions,
            "import committed"
        );
        Ok(report)
    }
}
