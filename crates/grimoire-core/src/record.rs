use chrono::{DateTime, Utc};
use grimoire_canonical::ContentHash;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parse::FieldKind;

/// A reference to where a spell was published.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    /// Reference URL.
    pub url: String,
    /// Optional label (e.g. a book abbreviation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Non-content fields of a record. Never hashed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Source book or collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Rules edition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,
    /// Author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// License.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// Publication references.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_refs: Vec<SourceRef>,
    /// Schema version the structured blob was written under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A stored spell: legacy flat text, an optional structured blob, the
/// content hash and metadata.
///
/// The blob and flat fields are authoritative; the hash is derived from
/// them and may be recomputed at any time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpellRecord {
    /// Row identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Arcane, Divine or Both.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tradition: Option<String>,
    /// Arcane school.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
    /// Divine sphere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sphere: Option<String>,
    /// Comma-separated caster classes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_list: Option<String>,
    /// Spell level.
    pub level: i64,
    /// Legacy range text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    /// Legacy components text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<String>,
    /// Legacy material components text, `;`-separated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_components: Option<String>,
    /// Legacy casting time text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub casting_time: Option<String>,
    /// Legacy duration text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Legacy area text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    /// Legacy saving throw text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saving_throw: Option<String>,
    /// Legacy damage text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage: Option<String>,
    /// Legacy magic resistance text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magic_resistance: Option<String>,
    /// Whether the spell has a reverse form.
    #[serde(default)]
    pub reversible: bool,
    /// Full description.
    pub description: String,
    /// Comma-separated tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    /// Quest spell flag.
    #[serde(default)]
    pub is_quest_spell: bool,
    /// Cantrip flag.
    #[serde(default)]
    pub is_cantrip: bool,
    /// Structured document, when one has been computed or edited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<Value>,
    /// Hash of the canonical content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<ContentHash>,
    /// Metadata.
    #[serde(default)]
    pub metadata: RecordMetadata,
}

fn split_list(text: Option<&str>) -> Vec<String> {
    text.map(|t| {
        t.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

impl SpellRecord {
    /// A record with the required content fields and nothing else.
    pub fn new(id: i64, name: impl Into<String>, level: i64, description: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            level,
            description: description.into(),
            ..Default::default()
        }
    }

    /// Legacy text for a parsed field kind.
    pub fn legacy_text(&self, kind: FieldKind) -> Option<&str> {
        let text = match kind {
            FieldKind::Range => &self.range,
            FieldKind::Duration => &self.duration,
            FieldKind::CastingTime => &self.casting_time,
            FieldKind::Area => &self.area,
            FieldKind::Damage => &self.damage,
            FieldKind::SavingThrow => &self.saving_throw,
            FieldKind::MagicResistance => &self.magic_resistance,
            FieldKind::Components => &self.components,
        };
        text.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// Class list split into entries.
    pub fn class_items(&self) -> Vec<String> {
        split_list(self.class_list.as_deref())
    }

    /// Tags split into entries.
    pub fn tag_items(&self) -> Vec<String> {
        split_list(self.tags.as_deref())
    }

    /// Renames the record, keeping the structured blob in step.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        if let Some(Value::Object(map)) = self.structured.as_mut() {
            map.insert("name".into(), Value::String(self.name.clone()));
        }
    }

    /// Tradition as written, or derived from which discriminants are set.
    pub fn effective_tradition(&self) -> Option<String> {
        if let Some(t) = self.tradition.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return Some(t.to_string());
        }
        let has = |v: &Option<String>| v.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false);
        let derived = match (has(&self.school), has(&self.sphere)) {
            (true, true) => "Both",
            (true, false) => "Arcane",
            (false, true) => "Divine",
            (false, false) => return None,
        };
        Some(derived.to_string())
    }

    /// Clears the flat field feeding document field `field`, so assembly
    /// does not fill it back in.
    pub fn clear_flat(&mut self, field: &str) {
        match field {
            "tradition" => self.tradition = None,
            "school" => self.school = None,
            "sphere" => self.sphere = None,
            "class_list" => self.class_list = None,
            "tags" => self.tags = None,
            "range" => self.range = None,
            "components" => self.components = None,
            "material_components" => self.material_components = None,
            "casting_time" => self.casting_time = None,
            "duration" => self.duration = None,
            "area" => self.area = None,
            "saving_throw" => self.saving_throw = None,
            "damage" => self.damage = None,
            "magic_resistance" => self.magic_resistance = None,
            _ => {}
        }
    }

    /// Whether the record has been hashed.
    pub fn is_hashed(&self) -> bool {
        self.content_hash.is_some()
    }

    /// Stamps `updated_at`, and `created_at` when unset.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.metadata.created_at.get_or_insert(now);
        self.metadata.updated_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lists_split_on_commas() {
        let mut record = SpellRecord::new(1, "Light", 1, "Makes light.");
        record.class_list = Some("Wizard, Cleric,, ".into());
        assert_eq!(record.class_items(), vec!["Wizard".to_string(), "Cleric".to_string()]);
        assert!(record.tag_items().is_empty());
    }

    #[test]
    fn blank_legacy_text_is_absent() {
        let mut record = SpellRecord::new(1, "Light", 1, "Makes light.");
        record.range = Some("  ".into());
        record.duration = Some("1 turn/level".into());
        assert_eq!(record.legacy_text(FieldKind::Range), None);
        assert_eq!(record.legacy_text(FieldKind::Duration), Some("1 turn/level"));
    }

    #[test]
    fn tradition_is_derived_from_discriminants() {
        let mut record = SpellRecord::new(1, "Bless", 1, "Blessed.");
        assert_eq!(record.effective_tradition(), None);
        record.sphere = Some("All".into());
        assert_eq!(record.effective_tradition().as_deref(), Some("Divine"));
        record.school = Some("Abjuration".into());
        assert_eq!(record.effective_tradition().as_deref(), Some("Both"));
        record.tradition = Some("Arcane".into());
        assert_eq!(record.effective_tradition().as_deref(), Some("Arcane"));
    }

    #[test]
    fn rename_updates_blob() {
        let mut record = SpellRecord::new(1, "Fireball", 3, "Boom.");
        record.structured = Some(json!({"name": "Fireball", "level": 3}));
        record.rename("Fireball (1)");
        assert_eq!(record.name, "Fireball (1)");
        assert_eq!(record.structured.unwrap()["name"], "Fireball (1)");
    }

    #[test]
    fn metadata_round_trips_through_json() {
        let mut record = SpellRecord::new(7, "Sleep", 1, "Zzz.");
        record.metadata.source_refs.push(SourceRef {
            url: "https://example.test/phb".into(),
            label: Some("PHB".into()),
        });
        let text = serde_json::to_string(&record).unwrap();
        let back: SpellRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
    }
}
