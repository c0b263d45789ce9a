use grimoire_canonical::text::fold_token;
use grimoire_canonical::{CanonicalSpell, ContentHash, SpellSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::document::{finalize, Finalized};
use crate::errors::CoreError;
use crate::parse::FieldKind;
use crate::record::SpellRecord;
use crate::sanitize::ImportPolicy;

/// Non-content tuple used to find a "same spell" candidate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdentityKey {
    /// Folded name.
    pub name: String,
    /// Folded tradition.
    pub context: String,
    /// Spell level.
    pub level: i64,
    /// Folded source.
    pub source: String,
}

impl IdentityKey {
    /// Key of `record`. Case, spacing and punctuation are ignored.
    pub fn of(record: &SpellRecord) -> Self {
        Self {
            name: fold_token(&record.name),
            context: record.effective_tradition().map(|t| fold_token(&t)).unwrap_or_default(),
            level: record.level,
            source: record.metadata.source.as_deref().map(fold_token).unwrap_or_default(),
        }
    }
}

/// A record with its canonical content and hash computed.
#[derive(Debug, Clone)]
pub struct Prepared {
    /// The record, with blob and hash set.
    pub record: SpellRecord,
    /// Canonical content.
    pub spell: CanonicalSpell,
    /// Canonical bytes.
    pub canonical_bytes: Vec<u8>,
    /// Content hash.
    pub hash: ContentHash,
    /// Fields that fell back to a special variant.
    pub fallbacks: Vec<FieldKind>,
}

impl Prepared {
    /// Finalizes `record` under `schema`.
    pub fn new(schema: &SpellSchema, mut record: SpellRecord) -> Result<Self, CoreError> {
        let finalized = finalize(schema, &record)?;
        finalized.apply_to(&mut record, schema.version);
        Self::from_finalized(record, finalized)
    }

    /// Applies the import policy, then finalizes.
    pub fn untrusted(
        schema: &SpellSchema,
        policy: &ImportPolicy,
        mut record: SpellRecord,
    ) -> Result<Self, CoreError> {
        policy.sanitize_record(&mut record)?;
        Self::new(schema, record)
    }

    fn from_finalized(record: SpellRecord, finalized: Finalized) -> Result<Self, CoreError> {
        Ok(Self {
            spell: CanonicalSpell::from_bytes(&finalized.canonical_bytes)?,
            canonical_bytes: finalized.canonical_bytes,
            hash: finalized.hash,
            fallbacks: finalized.fallbacks,
            record,
        })
    }

    /// Identity key of the record.
    pub fn key(&self) -> IdentityKey {
        IdentityKey::of(&self.record)
    }
}

/// One canonical top-level field that differs between two records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    /// Field name.
    pub field: String,
    /// Value in the existing record.
    pub existing: Option<Value>,
    /// Value in the incoming record.
    pub incoming: Option<Value>,
}

/// Differing top-level fields, in field-name order.
pub fn diff_fields(existing: &CanonicalSpell, incoming: &CanonicalSpell) -> Vec<FieldDiff> {
    let names: BTreeSet<&String> = existing
        .fields()
        .map(|(k, _)| k)
        .chain(incoming.fields().map(|(k, _)| k))
        .collect();
    names
        .into_iter()
        .filter_map(|name| {
            let a = existing.get(name);
            let b = incoming.get(name);
            (a != b).then(|| FieldDiff {
                field: name.clone(),
                existing: a.cloned(),
                incoming: b.cloned(),
            })
        })
        .collect()
}

/// Existing and incoming records sharing an identity key but not content.
#[derive(Debug, Clone)]
pub struct ImportConflict {
    /// The stored record.
    pub existing: Prepared,
    /// The incoming record.
    pub incoming: Prepared,
    /// Fields that differ.
    pub diffs: Vec<FieldDiff>,
}

impl ImportConflict {
    /// Pairs two records and computes their differences.
    pub fn new(existing: Prepared, incoming: Prepared) -> Self {
        let diffs = diff_fields(&existing.spell, &incoming.spell);
        Self {
            existing,
            incoming,
            diffs,
        }
    }
}

/// Outcome of comparing an incoming record to stored candidates.
#[derive(Debug, Clone)]
pub enum Classification {
    /// No candidate matches.
    New(Prepared),
    /// A candidate has the same content hash.
    Duplicate {
        /// The stored record.
        existing: Prepared,
        /// The incoming record.
        incoming: Prepared,
    },
    /// A candidate shares the identity key with different content.
    Conflict(ImportConflict),
}

impl Classification {
    /// Short label for reports.
    pub fn label(&self) -> &'static str {
        match self {
            Classification::New(_) => "new",
            Classification::Duplicate { .. } => "duplicate",
            Classification::Conflict(_) => "conflict",
        }
    }
}

/// Classifies `incoming` against `candidates`.
///
/// An equal hash is a duplicate whatever the key; otherwise an equal
/// identity key is a conflict; otherwise the record is new.
pub fn classify(incoming: Prepared, candidates: &[Prepared]) -> Classification {
    if let Some(existing) = candidates.iter().find(|c| c.hash == incoming.hash) {
        debug!(hash = %incoming.hash, existing_id = existing.record.id, "duplicate content");
        return Classification::Duplicate {
            existing: existing.clone(),
            incoming,
        };
    }
    let key = incoming.key();
    if let Some(existing) = candidates.iter().find(|c| c.key() == key) {
        debug!(existing_id = existing.record.id, "identity conflict");
        return Classification::Conflict(ImportConflict::new(existing.clone(), incoming));
    }
    Classification::New(incoming)
}

/// Which side a merged field comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeSide {
    /// Keep the stored value.
    Existing,
    /// Take the incoming value.
    Incoming,
}

/// A decision for one conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Leave the store unchanged.
    KeepExisting,
    /// Overwrite the stored record's content with the incoming one.
    Replace,
    /// Insert the incoming record under a disambiguated name.
    KeepBoth,
    /// Field-by-field merge; unlisted fields keep the existing value.
    Merge(BTreeMap<String, MergeSide>),
}

/// Store changes for one decision, computed before anything is written.
#[derive(Debug, Clone)]
pub enum ResolutionPlan {
    /// Nothing to write.
    Skip,
    /// Overwrite record `id` with new content.
    Update(Prepared),
    /// Insert a new record.
    Insert(Prepared),
    /// Metadata-only update; the hash does not change.
    Metadata(SpellRecord),
}

/// `"Name (n)"` for the smallest `n >= 1` not already taken.
pub fn disambiguate_name(name: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut n = 1;
    loop {
        let candidate = format!("{} ({})", name, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Plans the store change for `resolution` of `conflict`.
///
/// `taken` reports whether a display name is already used.
pub fn plan(
    schema: &SpellSchema,
    conflict: &ImportConflict,
    resolution: &Resolution,
    taken: impl Fn(&str) -> bool,
) -> Result<ResolutionPlan, CoreError> {
    let existing = &conflict.existing.record;
    let incoming = &conflict.incoming.record;
    let plan = match resolution {
        Resolution::KeepExisting => ResolutionPlan::Skip,
        Resolution::Replace => {
            let mut record = incoming.clone();
            record.id = existing.id;
            record.metadata.created_at = existing.metadata.created_at;
            ResolutionPlan::Update(Prepared::new(schema, record)?)
        }
        Resolution::KeepBoth => {
            let mut record = incoming.clone();
            record.id = 0;
            record.rename(disambiguate_name(&incoming.name, taken));
            ResolutionPlan::Insert(Prepared::new(schema, record)?)
        }
        Resolution::Merge(choices) => {
            ResolutionPlan::Update(merge(schema, conflict, choices)?)
        }
    };
    info!(existing_id = existing.id, resolution = resolution_label(resolution), "planned conflict resolution");
    Ok(plan)
}

fn resolution_label(resolution: &Resolution) -> &'static str {
    match resolution {
        Resolution::KeepExisting => "keep_existing",
        Resolution::Replace => "replace",
        Resolution::KeepBoth => "keep_both",
        Resolution::Merge(_) => "merge",
    }
}

fn merge(
    schema: &SpellSchema,
    conflict: &ImportConflict,
    choices: &BTreeMap<String, MergeSide>,
) -> Result<Prepared, CoreError> {
    let mut doc: Map<String, Value> = match conflict.existing.spell.to_value() {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let mut record = conflict.existing.record.clone();
    for (field, side) in choices {
        if !conflict.diffs.iter().any(|d| &d.field == field) {
            return Err(CoreError::UnknownMergeField(field.clone()));
        }
        if *side == MergeSide::Existing {
            continue;
        }
        match conflict.incoming.spell.get(field) {
            Some(value) => {
                doc.insert(field.clone(), value.clone());
            }
            None => {
                doc.remove(field);
                record.clear_flat(field);
            }
        }
    }
    if let Some(Value::String(name)) = doc.get("name") {
        record.name = name.clone();
    }
    if let Some(level) = doc.get("level").and_then(Value::as_i64) {
        record.level = level;
    }
    record.structured = Some(Value::Object(doc));
    Prepared::new(schema, record)
}

/// Unions incoming non-content metadata into `existing`. Returns whether
/// anything changed.
pub fn union_metadata(existing: &mut SpellRecord, incoming: &SpellRecord) -> bool {
    let mut changed = false;
    for reference in &incoming.metadata.source_refs {
        if !existing.metadata.source_refs.contains(reference) {
            existing.metadata.source_refs.push(reference.clone());
            changed = true;
        }
    }
    let fills = [
        (&mut existing.metadata.author, &incoming.metadata.author),
        (&mut existing.metadata.license, &incoming.metadata.license),
        (&mut existing.metadata.edition, &incoming.metadata.edition),
    ];
    for (target, source) in fills {
        if target.is_none() && source.is_some() {
            *target = source.clone();
            changed = true;
        }
    }
    changed
}

/// Plans the store change for a duplicate.
pub fn plan_duplicate(existing: &Prepared, incoming: &Prepared) -> ResolutionPlan {
    let mut record = existing.record.clone();
    if union_metadata(&mut record, &incoming.record) {
        ResolutionPlan::Metadata(record)
    } else {
        ResolutionPlan::Skip
    }
}

/// A decision applied to every conflict at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkDecision {
    /// Keep every existing record.
    SkipAll,
    /// Replace every existing record.
    ReplaceAll,
    /// Keep both for every conflict.
    KeepAll,
    /// Decide each conflict individually.
    ReviewEach,
}

impl BulkDecision {
    /// Per-conflict resolution, or `None` for individual review.
    pub fn resolution(self) -> Option<Resolution> {
        match self {
            BulkDecision::SkipAll => Some(Resolution::KeepExisting),
            BulkDecision::ReplaceAll => Some(Resolution::Replace),
            BulkDecision::KeepAll => Some(Resolution::KeepBoth),
            BulkDecision::ReviewEach => None,
        }
    }
}

/// How pending conflicts are offered for decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presentation {
    /// One at a time.
    Individual,
    /// A bulk choice, with individual review as one of its options.
    Bulk(Vec<BulkDecision>),
}

/// Chooses the presentation for `conflicts` pending conflicts.
pub fn presentation(conflicts: usize, policy: &ImportPolicy) -> Presentation {
    if conflicts >= policy.bulk_threshold {
        Presentation::Bulk(vec![
            BulkDecision::SkipAll,
            BulkDecision::ReplaceAll,
            BulkDecision::KeepAll,
            BulkDecision::ReviewEach,
        ])
    } else {
        Presentation::Individual
    }
}
