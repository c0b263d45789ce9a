use grimoire_canonical::{
    to_canonical_bytes, Canonicalizer, ContentHash, HygieneReport, SpellSchema,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::CoreError;
use crate::parse::{self, parse_material, FieldKind, ParsedField};
use crate::record::SpellRecord;

/// A structured document built from a record, before canonicalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
    /// Document with schema field names.
    pub document: Value,
    /// Fields whose legacy text fell back to a special variant.
    pub fallbacks: Vec<FieldKind>,
}

/// The triple persisted on save, plus what it took to produce it.
#[derive(Debug, Clone)]
pub struct Finalized {
    /// Structured blob to store on the record.
    pub structured: Value,
    /// Content hash.
    pub hash: ContentHash,
    /// Canonical bytes, as stored in the vault.
    pub canonical_bytes: Vec<u8>,
    /// Hygiene report of the canonicalization.
    pub report: HygieneReport,
    /// Fields that fell back to a special variant.
    pub fallbacks: Vec<FieldKind>,
}

impl Finalized {
    /// Whether any legacy field fell back.
    pub fn fallback_used(&self) -> bool {
        !self.fallbacks.is_empty()
    }

    /// Writes blob, hash and schema version onto `record`.
    pub fn apply_to(&self, record: &mut SpellRecord, schema_version: u32) {
        record.structured = Some(self.structured.clone());
        record.content_hash = Some(self.hash.clone());
        record.metadata.schema_version = Some(schema_version);
    }
}

/// A legacy field whose parsed form disagrees with the structured blob.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncMismatch {
    /// Field kind.
    pub field: FieldKind,
    /// Legacy text on the record.
    pub legacy: String,
    /// Value in the blob, if any.
    pub structured: Option<Value>,
    /// Value parsed from the legacy text, normalized.
    pub parsed: Value,
}

fn absent(map: &Map<String, Value>, key: &str) -> bool {
    matches!(map.get(key), None | Some(Value::Null))
}

fn fill(map: &mut Map<String, Value>, key: &str, value: impl Into<Value>) {
    if absent(map, key) {
        map.insert(key.to_string(), value.into());
    }
}

fn fill_text(map: &mut Map<String, Value>, key: &str, text: Option<&str>) {
    if let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) {
        fill(map, key, text);
    }
}

fn fill_list(map: &mut Map<String, Value>, key: &str, items: Vec<String>) {
    if !items.is_empty() {
        fill(map, key, items);
    }
}

/// Builds the structured document for `record`.
///
/// The stored blob wins field by field; flat text only fills fields the
/// blob lacks. Free-text fields are parsed, never rejected.
pub fn assemble(record: &SpellRecord) -> Result<Assembled, CoreError> {
    let mut map = match &record.structured {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => {
            return Err(CoreError::MalformedField {
                field: "structured".into(),
                reason: "expected an object".into(),
            })
        }
    };

    fill_text(&mut map, "name", Some(&record.name));
    fill(&mut map, "level", record.level);
    fill_text(&mut map, "description", Some(&record.description));
    fill_text(&mut map, "school", record.school.as_deref());
    fill_text(&mut map, "sphere", record.sphere.as_deref());
    if let Some(tradition) = record.effective_tradition() {
        fill(&mut map, "tradition", tradition);
    }
    fill_list(&mut map, "class_list", record.class_items());
    fill_list(&mut map, "tags", record.tag_items());
    fill(&mut map, "reversible", record.reversible);
    fill(&mut map, "is_quest_spell", record.is_quest_spell);
    fill(&mut map, "is_cantrip", record.is_cantrip);

    let mut fallbacks = Vec::new();
    let mut inline_materials = Vec::new();
    for kind in FieldKind::ALL {
        if !absent(&map, kind.field()) {
            continue;
        }
        let Some(text) = record.legacy_text(kind) else {
            continue;
        };
        let parsed = parse::parse(kind, text);
        if parsed.is_fallback() {
            fallbacks.push(kind);
        }
        if let ParsedField::Components(p) = &parsed {
            inline_materials = p.materials.clone();
        }
        map.insert(kind.field().to_string(), parsed.to_value()?);
    }

    if absent(&map, "material_components") {
        let materials = match record.material_components.as_deref() {
            Some(text) if !text.trim().is_empty() => text
                .split(';')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(parse_material)
                .collect(),
            _ => inline_materials,
        };
        if !materials.is_empty() {
            map.insert("material_components".into(), serde_json::to_value(materials)?);
        }
    }

    if let Some(version) = record.metadata.schema_version {
        fill(&mut map, "schema_version", version);
    }

    if !fallbacks.is_empty() {
        warn!(record_id = record.id, fallbacks = fallbacks.len(), "legacy fields kept as special");
    }
    Ok(Assembled {
        document: Value::Object(map),
        fallbacks,
    })
}

/// Assembles, canonicalizes and hashes `record` without modifying it.
pub fn finalize(schema: &SpellSchema, record: &SpellRecord) -> Result<Finalized, CoreError> {
    let assembled = assemble(record)?;
    let result = Canonicalizer::new(schema).canonicalize(&assembled.document)?;

    let mut structured = result.spell.to_value();
    if let Value::Object(map) = &mut structured {
        map.insert("schema_version".into(), Value::from(schema.version));
    }
    debug!(record_id = record.id, hash = %result.hash, "finalized record");
    Ok(Finalized {
        structured,
        hash: result.hash,
        canonical_bytes: result.bytes,
        report: result.report,
        fallbacks: assembled.fallbacks,
    })
}

/// Re-parses each populated legacy field and reports those that disagree
/// with the structured blob. Both sides are normalized under `schema`
/// before comparing, so defaults and ordering never count as drift.
pub fn sync_check(schema: &SpellSchema, record: &SpellRecord) -> Result<Vec<SyncMismatch>, CoreError> {
    let canon = Canonicalizer::new(schema);
    let blob = match &record.structured {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    };
    let mut mismatches = Vec::new();
    for kind in FieldKind::ALL {
        let Some(text) = record.legacy_text(kind) else {
            continue;
        };
        let parsed = canon.normalize_field(kind.field(), &parse::parse(kind, text).to_value()?)?;
        let structured = blob.and_then(|m| m.get(kind.field())).filter(|v| !v.is_null());
        let agrees = match structured {
            Some(existing) => {
                let existing = canon.normalize_field(kind.field(), existing)?;
                to_canonical_bytes(&existing)? == to_canonical_bytes(&parsed)?
            }
            None => false,
        };
        if !agrees {
            mismatches.push(SyncMismatch {
                field: kind,
                legacy: text.to_string(),
                structured: structured.cloned(),
                parsed,
            });
        }
    }
    Ok(mismatches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> SpellSchema {
        SpellSchema::builtin().unwrap()
    }

    fn legacy() -> SpellRecord {
        let mut record = SpellRecord::new(1, "Fireball", 3, "A burst of flame.");
        record.school = Some("Evocation".into());
        record.range = Some("10 yds. + 10 yds./level".into());
        record.components = Some("V, S, M (bat guano and sulphur)".into());
        record.duration = Some("Instantaneous".into());
        record.damage = Some("1d6/level (max 10d6)".into());
        record.saving_throw = Some("1/2".into());
        record
    }

    #[test]
    fn flat_fields_fill_the_document() {
        let assembled = assemble(&legacy()).unwrap();
        let doc = &assembled.document;
        assert_eq!(doc["tradition"], "Arcane");
        assert_eq!(doc["range"]["kind"], "distance");
        assert_eq!(doc["components"], json!({"verbal": true, "somatic": true, "material": true}));
        assert_eq!(doc["material_components"][0]["name"], "bat guano and sulphur");
        assert!(assembled.fallbacks.is_empty());
    }

    #[test]
    fn blob_wins_over_flat_text() {
        let mut record = legacy();
        record.structured = Some(json!({"range": {"kind": "touch"}}));
        let doc = assemble(&record).unwrap().document;
        assert_eq!(doc["range"], json!({"kind": "touch"}));
    }

    #[test]
    fn fallbacks_are_listed() {
        let mut record = legacy();
        record.area = Some("The whole valley, more or less".into());
        let assembled = assemble(&record).unwrap();
        assert_eq!(assembled.fallbacks, vec![FieldKind::Area]);
        assert_eq!(assembled.document["area"]["raw_legacy_value"], "The whole valley, more or less");
    }

    #[test]
    fn finalize_hash_matches_blob() {
        let schema = schema();
        let finalized = finalize(&schema, &legacy()).unwrap();
        let again = Canonicalizer::new(&schema).canonicalize(&finalized.structured).unwrap();
        assert_eq!(again.hash, finalized.hash);
        assert_eq!(finalized.structured["school"], "Invocation/Evocation");
    }

    #[test]
    fn non_object_blob_is_rejected() {
        let mut record = legacy();
        record.structured = Some(json!([1, 2]));
        assert!(matches!(assemble(&record), Err(CoreError::MalformedField { .. })));
    }

    #[test]
    fn finalized_blob_is_in_sync() {
        let mut record = legacy();
        let finalized = finalize(&schema(), &record).unwrap();
        finalized.apply_to(&mut record, schema().version);
        assert!(sync_check(&schema(), &record).unwrap().is_empty());
    }

    #[test]
    fn sync_check_reports_drift() {
        let mut record = legacy();
        let assembled = assemble(&record).unwrap();
        record.structured = Some(assembled.document);
        assert!(sync_check(&schema(), &record).unwrap().is_empty());

        record.duration = Some("1 round/level".into());
        let drift = sync_check(&schema(), &record).unwrap();
        assert_eq!(drift.len(), 1);
        assert_eq!(drift[0].field, FieldKind::Duration);
    }
}
