use crate::path::lookup;
use crate::schema::{SpellSchema, Tradition};
use crate::text::fold_token;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// One violated rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Dotted path of the offending field.
    pub path: String,
    /// Stable rule code.
    pub rule: String,
}

impl Violation {
    fn new(path: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            rule: rule.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.rule)
    }
}

fn join(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validation errors for records and canonical primitives.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The record broke one or more rules.
    #[error("invalid record: {}", join(.0))]
    Invalid(Vec<Violation>),
    /// The record was written by a schema this build cannot read.
    #[error("schema version {found} is newer than supported {supported}")]
    IncompatibleSchemaVersion {
        /// Version on the record.
        found: u32,
        /// Newest compatible version.
        supported: u32,
    },
    /// When a value does not match the required pattern.
    #[error("{field} ('{value}') is not allowed")]
    PatternMismatch {
        /// Field name that failed validation.
        field: &'static str,
        /// Offending value.
        value: String,
    },
}

impl ValidationError {
    /// The violations, if this is a rule failure.
    pub fn violations(&self) -> &[Violation] {
        match self {
            ValidationError::Invalid(v) => v,
            _ => &[],
        }
    }
}

/// Outcome of the schema version check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStatus {
    /// Written by the current schema.
    Current,
    /// Written by an older schema and migrated.
    Migrated {
        /// Version found on the record.
        from: u32,
    },
    /// Written by a newer schema inside the compatibility window.
    NewerCompatible {
        /// Version found on the record.
        found: u32,
    },
}

impl VersionStatus {
    /// Hygiene note for non-current versions.
    pub fn note(&self) -> Option<String> {
        match self {
            VersionStatus::Current => None,
            VersionStatus::Migrated { from } => Some(format!("migrated_from:{}", from)),
            VersionStatus::NewerCompatible { found } => Some(format!("newer_compatible:{}", found)),
        }
    }
}

fn record_version(value: &Value) -> Result<u32, ValidationError> {
    match value.get("schema_version") {
        None | Some(Value::Null) => Ok(1),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| {
                ValidationError::Invalid(vec![Violation::new("schema_version", "type:integer")])
            }),
    }
}

/// Classifies the record's schema version. A missing version reads as 1.
pub fn check_version(schema: &SpellSchema, value: &Value) -> Result<VersionStatus, ValidationError> {
    let found = record_version(value)?;
    if found == schema.version {
        Ok(VersionStatus::Current)
    } else if found < schema.version {
        Ok(VersionStatus::Migrated { from: found })
    } else if schema.is_compatible_newer(found) {
        info!(found, current = schema.version, "record uses a newer compatible schema");
        Ok(VersionStatus::NewerCompatible { found })
    } else {
        Err(ValidationError::IncompatibleSchemaVersion {
            found,
            supported: schema.compatible_up_to,
        })
    }
}

fn merge_defaults(target: &mut Map<String, Value>, defaults: &Map<String, Value>) {
    for (key, default) in defaults {
        match target.get_mut(key) {
            None | Some(Value::Null) => {
                target.insert(key.clone(), default.clone());
            }
            Some(Value::Object(existing)) => {
                if let Value::Object(nested) = default {
                    merge_defaults(existing, nested);
                }
            }
            Some(_) => {}
        }
    }
}

/// Fills every absent default-bearing field. Non-objects are left alone.
pub fn materialize(schema: &SpellSchema, value: &mut Value) {
    if let Value::Object(map) = value {
        merge_defaults(map, &schema.defaults);
    }
}

/// Checks the version, then materializes and stamps older records with the
/// current version.
pub fn migrate(schema: &SpellSchema, value: &mut Value) -> Result<VersionStatus, ValidationError> {
    let status = check_version(schema, value)?;
    if let VersionStatus::Migrated { from } = status {
        materialize(schema, value);
        if let Value::Object(map) = value {
            map.insert("schema_version".into(), Value::from(schema.version));
        }
        debug!(from, to = schema.version, "migrated record schema version");
    }
    Ok(status)
}

fn non_empty_text(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .map(|s| !s.trim().is_empty())
        .unwrap_or(false)
}

fn present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Resolves each class through the `class_list[]` table before comparing,
/// so legacy spellings such as "Magic-User" count as their canonical class.
fn has_class(schema: &SpellSchema, classes: &[String], allowed: &[String]) -> bool {
    let table = schema.enum_table("class_list[]");
    classes.iter().any(|class| {
        let token = match table {
            Some(table) => table.resolve(class).0,
            None => class.clone(),
        };
        let folded = fold_token(&token);
        allowed.iter().any(|a| fold_token(a) == folded)
    })
}

/// Validates a record against structural and cross-field rules.
///
/// Every violation is collected; the record is rejected if any exist.
pub fn validate(schema: &SpellSchema, value: &Value) -> Result<(), ValidationError> {
    let Some(map) = value.as_object() else {
        return Err(ValidationError::Invalid(vec![Violation::new("root", "type:object")]));
    };
    let mut violations = Vec::new();

    for (key, child) in map {
        if schema.is_metadata(key) || child.is_null() {
            continue;
        }
        match schema.fields.get(key) {
            None => violations.push(Violation::new(key.as_str(), "unknown_field")),
            Some(shape) if !shape.accepts(child) => {
                let rule = serde_json::to_value(shape)
                    .ok()
                    .and_then(|v| v.as_str().map(|s| format!("type:{}", s)))
                    .unwrap_or_else(|| "type".into());
                violations.push(Violation::new(key.as_str(), rule));
            }
            Some(_) => {}
        }
    }

    for path in &schema.required {
        if !present(lookup(value, path)) {
            violations.push(Violation::new(path.as_str(), "required"));
        }
    }
    for field in ["name", "description"] {
        if map.contains_key(field) && !non_empty_text(map.get(field)) {
            violations.push(Violation::new(field, "non_empty"));
        }
    }

    let level = map.get("level").and_then(Value::as_i64);
    if let Some(level) = level {
        if !(0..=schema.max_level).contains(&level) {
            violations.push(Violation::new("level", format!("range:0..={}", schema.max_level)));
        }
    }

    let rule = &schema.tradition;
    if let Some(tradition) = map.get(&rule.field).and_then(Value::as_str) {
        let arcane = present(map.get(&rule.arcane_field));
        let divine = present(map.get(&rule.divine_field));
        match rule.classify(tradition) {
            Some(Tradition::Arcane) => {
                if !arcane {
                    violations.push(Violation::new(rule.arcane_field.as_str(), "required_for_arcane"));
                }
                if divine {
                    violations.push(Violation::new(rule.divine_field.as_str(), "forbidden_for_arcane"));
                }
            }
            Some(Tradition::Divine) => {
                if !divine {
                    violations.push(Violation::new(rule.divine_field.as_str(), "required_for_divine"));
                }
                if arcane {
                    violations.push(Violation::new(rule.arcane_field.as_str(), "forbidden_for_divine"));
                }
            }
            Some(Tradition::Both) => {
                if !arcane {
                    violations.push(Violation::new(rule.arcane_field.as_str(), "required_for_both"));
                }
                if !divine {
                    violations.push(Violation::new(rule.divine_field.as_str(), "required_for_both"));
                }
            }
            None => violations.push(Violation::new(rule.field.as_str(), "enum")),
        }
    }

    let classes: Vec<String> = map
        .get("class_list")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    let flag = |name: &str| map.get(name).and_then(Value::as_bool).unwrap_or(false);

    if let Some(level) = level {
        if flag("is_cantrip") && level != 0 {
            violations.push(Violation::new("level", "cantrip_level_zero"));
        }
        if flag("is_quest_spell") {
            if level > 9 {
                violations.push(Violation::new("is_quest_spell", "quest_above_ninth"));
            } else if level != 8 {
                violations.push(Violation::new("level", "quest_level_eight"));
            }
            if !classes.is_empty() && !has_class(schema, &classes, &schema.divine_classes) {
                violations.push(Violation::new("class_list", "quest_divine_caster"));
            }
        }
        if level > 9 && !classes.is_empty() && !has_class(schema, &classes, &schema.arcane_classes) {
            violations.push(Violation::new("class_list", "above_ninth_arcane_caster"));
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Invalid(violations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> SpellSchema {
        SpellSchema::builtin().unwrap()
    }

    fn arcane() -> Value {
        json!({
            "name": "Magic Missile",
            "tradition": "Arcane",
            "school": "Evocation",
            "level": 1,
            "description": "Darts of force.",
            "components": {"verbal": true, "somatic": true, "material": false},
            "reversible": false,
            "is_cantrip": false,
            "is_quest_spell": false
        })
    }

    fn rules(err: ValidationError) -> Vec<(String, String)> {
        err.violations()
            .iter()
            .map(|v| (v.path.clone(), v.rule.clone()))
            .collect()
    }

    #[test]
    fn accepts_valid_arcane_record() {
        validate(&schema(), &arcane()).unwrap();
    }

    #[test]
    fn arcane_requires_school_and_forbids_sphere() {
        let mut doc = arcane();
        doc.as_object_mut().unwrap().remove("school");
        doc["sphere"] = json!("Combat");
        let found = rules(validate(&schema(), &doc).unwrap_err());
        assert!(found.contains(&("school".into(), "required_for_arcane".into())));
        assert!(found.contains(&("sphere".into(), "forbidden_for_arcane".into())));
    }

    #[test]
    fn both_requires_both_discriminants() {
        let mut doc = arcane();
        doc["tradition"] = json!("Both");
        let found = rules(validate(&schema(), &doc).unwrap_err());
        assert_eq!(found, vec![("sphere".into(), "required_for_both".into())]);
    }

    #[test]
    fn collects_every_violation() {
        let mut doc = arcane();
        doc["name"] = json!("   ");
        doc["level"] = json!(13);
        doc["is_cantrip"] = json!(true);
        let found = rules(validate(&schema(), &doc).unwrap_err());
        assert!(found.contains(&("name".into(), "required".into())));
        assert!(found.contains(&("name".into(), "non_empty".into())));
        assert!(found.contains(&("level".into(), "range:0..=12".into())));
        assert!(found.contains(&("level".into(), "cantrip_level_zero".into())));
    }

    #[test]
    fn quest_spells_are_eighth_level_divine() {
        let mut doc = arcane();
        doc["tradition"] = json!("Divine");
        doc.as_object_mut().unwrap().remove("school");
        doc["sphere"] = json!("All");
        doc["is_quest_spell"] = json!(true);
        doc["level"] = json!(7);
        doc["class_list"] = json!(["Wizard"]);
        let found = rules(validate(&schema(), &doc).unwrap_err());
        assert!(found.contains(&("level".into(), "quest_level_eight".into())));
        assert!(found.contains(&("class_list".into(), "quest_divine_caster".into())));

        doc["level"] = json!(8);
        doc["class_list"] = json!(["Priest"]);
        validate(&schema(), &doc).unwrap();
    }

    #[test]
    fn above_ninth_needs_arcane_caster() {
        let mut doc = arcane();
        doc["level"] = json!(10);
        doc["class_list"] = json!(["Cleric"]);
        let found = rules(validate(&schema(), &doc).unwrap_err());
        assert_eq!(found, vec![("class_list".into(), "above_ninth_arcane_caster".into())]);
    }

    #[test]
    fn caster_classes_accept_legacy_spellings() {
        let mut doc = arcane();
        doc["level"] = json!(10);
        doc["class_list"] = json!(["Magic-User"]);
        validate(&schema(), &doc).unwrap();

        doc["class_list"] = json!([" mu "]);
        validate(&schema(), &doc).unwrap();

        doc["class_list"] = json!(["Magesmith"]);
        let found = rules(validate(&schema(), &doc).unwrap_err());
        assert_eq!(found, vec![("class_list".into(), "above_ninth_arcane_caster".into())]);
    }

    #[test]
    fn rejects_wrong_shapes_and_unknown_fields() {
        let mut doc = arcane();
        doc["level"] = json!("one");
        doc["colour"] = json!("blue");
        let found = rules(validate(&schema(), &doc).unwrap_err());
        assert!(found.contains(&("level".into(), "type:integer".into())));
        assert!(found.contains(&("colour".into(), "unknown_field".into())));
    }

    #[test]
    fn older_version_is_migrated_and_materialized() {
        let mut doc = json!({"name": "Light", "schema_version": 1});
        let status = migrate(&schema(), &mut doc).unwrap();
        assert_eq!(status, VersionStatus::Migrated { from: 1 });
        assert_eq!(status.note().as_deref(), Some("migrated_from:1"));
        assert_eq!(doc["schema_version"], json!(2));
        assert_eq!(doc["components"]["verbal"], json!(false));
        assert_eq!(doc["is_cantrip"], json!(false));
    }

    #[test]
    fn missing_version_reads_as_one() {
        let doc = json!({"name": "Light"});
        assert_eq!(
            check_version(&schema(), &doc).unwrap(),
            VersionStatus::Migrated { from: 1 }
        );
    }

    #[test]
    fn incompatible_newer_version_is_rejected() {
        let doc = json!({"schema_version": 9});
        let err = check_version(&schema(), &doc).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::IncompatibleSchemaVersion { found: 9, supported: 2 }
        ));
    }

    #[test]
    fn newer_compatible_version_validates() {
        let mut custom = schema();
        custom.compatible_up_to = 3;
        let doc = json!({"schema_version": 3});
        let status = check_version(&custom, &doc).unwrap();
        assert_eq!(status.note().as_deref(), Some("newer_compatible:3"));
    }

    #[test]
    fn materialize_keeps_existing_values() {
        let mut doc = json!({"components": {"verbal": true}, "reversible": true});
        materialize(&schema(), &mut doc);
        assert_eq!(doc["components"], json!({"verbal": true, "somatic": false, "material": false}));
        assert_eq!(doc["reversible"], json!(true));
    }
}
