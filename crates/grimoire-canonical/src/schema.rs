use crate::text::{fold_token, to_snake, to_title, TextMode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};

const BUILTIN_SCHEMA: &str = include_str!("../schema/spell.schema.json");

/// Error returned when a schema document cannot be loaded.
#[derive(thiserror::Error, Debug)]
pub enum SchemaError {
    /// The schema document is not valid JSON for this model.
    #[error("invalid schema document: {0}")]
    Parse(#[from] serde_json::Error),
    /// An alias points at a value the table does not list.
    #[error("enum table {table}: alias '{alias}' targets unknown value '{target}'")]
    UnknownAliasTarget {
        /// Path pattern of the table.
        table: String,
        /// Offending alias.
        alias: String,
        /// Missing target.
        target: String,
    },
    /// The compatibility window ends before the schema version.
    #[error("compatible_up_to {compatible_up_to} is below version {version}")]
    InvalidWindow {
        /// Schema version.
        version: u32,
        /// Upper end of the window.
        compatible_up_to: u32,
    },
}

/// JSON type expected for a top-level field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldShape {
    /// String.
    String,
    /// Integer.
    Integer,
    /// Any number.
    Number,
    /// Boolean.
    Boolean,
    /// Array.
    Array,
    /// Object.
    Object,
}

impl FieldShape {
    /// Whether `value` has this shape.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            FieldShape::String => value.is_string(),
            FieldShape::Integer => value.is_i64() || value.is_u64(),
            FieldShape::Number => value.is_number(),
            FieldShape::Boolean => value.is_boolean(),
            FieldShape::Array => value.is_array(),
            FieldShape::Object => value.is_object(),
        }
    }
}

/// Output style for an enum table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumStyle {
    /// `lower_snake` technical tokens.
    #[default]
    Snake,
    /// `Title Case` taxonomic labels.
    Title,
}

/// Known spellings for one enum-bearing field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnumTable {
    /// Output style, also used for unrecognized values.
    #[serde(default)]
    pub style: EnumStyle,
    /// Canonical tokens.
    #[serde(default)]
    pub values: Vec<String>,
    /// Legacy spelling -> canonical token.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    #[serde(skip)]
    index: HashMap<String, String>,
}

impl EnumTable {
    fn build_index(&mut self, table: &str) -> Result<(), SchemaError> {
        let mut index = HashMap::new();
        for value in &self.values {
            index.insert(fold_token(value), value.clone());
        }
        for (alias, target) in &self.aliases {
            if !self.values.contains(target) {
                return Err(SchemaError::UnknownAliasTarget {
                    table: table.to_string(),
                    alias: alias.clone(),
                    target: target.clone(),
                });
            }
            index.insert(fold_token(alias), target.clone());
        }
        self.index = index;
        Ok(())
    }

    /// Rewrites `input` to its canonical token.
    ///
    /// Returns the token and whether it was found in the table. Unknown
    /// values keep their content but are re-cased to the table's style.
    pub fn resolve(&self, input: &str) -> (String, bool) {
        if let Some(token) = self.index.get(&fold_token(input)) {
            return (token.clone(), true);
        }
        let fallback = match self.style {
            EnumStyle::Snake => to_snake(input),
            EnumStyle::Title => to_title(input),
        };
        (fallback, self.values.is_empty())
    }
}

/// Which field carries the arcane and divine discriminants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraditionRule {
    /// Field holding the tradition.
    pub field: String,
    /// Arcane-only discriminant.
    pub arcane_field: String,
    /// Divine-only discriminant.
    pub divine_field: String,
    /// Tradition values meaning arcane only.
    pub arcane: Vec<String>,
    /// Tradition values meaning divine only.
    pub divine: Vec<String>,
    /// Tradition values meaning both.
    pub both: Vec<String>,
}

/// Classified tradition of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tradition {
    /// Arcane only.
    Arcane,
    /// Divine only.
    Divine,
    /// Both.
    Both,
}

impl TraditionRule {
    /// Classifies a tradition value, ignoring case and punctuation.
    pub fn classify(&self, value: &str) -> Option<Tradition> {
        let folded = fold_token(value);
        let hit = |list: &[String]| list.iter().any(|v| fold_token(v) == folded);
        if hit(&self.arcane) {
            Some(Tradition::Arcane)
        } else if hit(&self.divine) {
            Some(Tradition::Divine)
        } else if hit(&self.both) {
            Some(Tradition::Both)
        } else {
            None
        }
    }
}

/// Condition under which a keyed list keeps its given order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderedWhen {
    /// Sibling field of the list.
    pub field: String,
    /// Value that selects execution order.
    pub equals: String,
}

/// A list of objects sorted by key fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyedList {
    /// Fields compared in order.
    pub sort_by: Vec<String>,
    /// When set and matched, the list is an execution-ordered sequence.
    #[serde(default)]
    pub ordered_when: Option<OrderedWhen>,
}

/// The active spell schema.
///
/// Paths are dotted; `[]` stands for every element of an array and a
/// leading `**.` matches any prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpellSchema {
    /// Current schema version.
    pub version: u32,
    /// Newest version that still validates directly.
    pub compatible_up_to: u32,
    /// Top-level fields excluded from content.
    pub metadata_fields: BTreeSet<String>,
    /// Top-level content fields and their shapes.
    pub fields: BTreeMap<String, FieldShape>,
    /// Paths retained by lean pruning.
    pub required: BTreeSet<String>,
    /// Defaults filled in by materialization.
    #[serde(default)]
    pub defaults: Map<String, Value>,
    /// Nested fields omitted when they equal their default.
    #[serde(default)]
    pub lean_defaults: BTreeMap<String, Value>,
    /// Paths holding prose.
    #[serde(default)]
    pub textual: BTreeSet<String>,
    /// Tradition discriminants.
    pub tradition: TraditionRule,
    /// Classes that may cast above 9th level.
    #[serde(default)]
    pub arcane_classes: Vec<String>,
    /// Classes that may cast quest spells.
    #[serde(default)]
    pub divine_classes: Vec<String>,
    /// Highest spell level.
    pub max_level: i64,
    /// Enum tables by path pattern.
    #[serde(default)]
    pub enums: BTreeMap<String, EnumTable>,
    /// Unordered string sets.
    #[serde(default)]
    pub sets: BTreeSet<String>,
    /// Object lists sorted by key.
    #[serde(default)]
    pub keyed_lists: BTreeMap<String, KeyedList>,
    /// Execution-ordered sequences, never sorted.
    #[serde(default)]
    pub sequences: BTreeSet<String>,
}

impl SpellSchema {
    /// The schema shipped with this crate.
    pub fn builtin() -> Result<Self, SchemaError> {
        Self::from_json(BUILTIN_SCHEMA)
    }

    /// Loads a schema document.
    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        let mut schema: SpellSchema = serde_json::from_str(text)?;
        if schema.compatible_up_to < schema.version {
            return Err(SchemaError::InvalidWindow {
                version: schema.version,
                compatible_up_to: schema.compatible_up_to,
            });
        }
        for (name, table) in schema.enums.iter_mut() {
            table.build_index(name)?;
        }
        Ok(schema)
    }

    /// Whether a top-level field is metadata.
    pub fn is_metadata(&self, field: &str) -> bool {
        self.metadata_fields.contains(field)
    }

    /// Whether lean pruning must keep `path`.
    pub fn is_required(&self, path: &str) -> bool {
        self.required.contains(path)
    }

    /// Whether `value` at `path` is a default that lean output omits.
    pub fn is_lean_default(&self, path: &str, value: &Value) -> bool {
        match (self.lean_defaults.get(path), value) {
            (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() == b.as_f64(),
            (Some(default), value) => default == value,
            (None, _) => false,
        }
    }

    /// Whitespace policy for a string at `path`.
    pub fn text_mode(&self, path: &str) -> TextMode {
        if self.textual.contains(path) {
            TextMode::Textual
        } else {
            TextMode::Structured
        }
    }

    /// Enum table for `path`, exact patterns first.
    pub fn enum_table(&self, path: &str) -> Option<&EnumTable> {
        if let Some(table) = self.enums.get(path) {
            return Some(table);
        }
        self.enums.iter().find_map(|(pattern, table)| {
            let suffix = pattern.strip_prefix("**.")?;
            let matches = path == suffix || path.ends_with(&format!(".{}", suffix));
            matches.then_some(table)
        })
    }

    /// Whether `path` is an unordered string set.
    pub fn is_set(&self, path: &str) -> bool {
        self.sets.contains(path)
    }

    /// Sort policy for a list of objects at `path`.
    pub fn keyed_list(&self, path: &str) -> Option<&KeyedList> {
        self.keyed_lists.get(path)
    }

    /// Whether `version` is newer than current but inside the window.
    pub fn is_compatible_newer(&self, version: u32) -> bool {
        version > self.version && version <= self.compatible_up_to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_schema_loads() {
        let schema = SpellSchema::builtin().unwrap();
        assert_eq!(schema.version, 2);
        assert!(schema.is_metadata("source_refs"));
        assert!(schema.is_required("components.verbal"));
        assert_eq!(schema.text_mode("damage.parts[].notes"), TextMode::Textual);
        assert_eq!(schema.text_mode("name"), TextMode::Structured);
    }

    #[test]
    fn enum_lookup_accepts_legacy_spellings() {
        let schema = SpellSchema::builtin().unwrap();
        let units = schema.enum_table("range.unit").unwrap();
        assert_eq!(units.resolve("Yards"), ("yd".to_string(), true));
        let school = schema.enum_table("school").unwrap();
        assert_eq!(school.resolve("EVOCATION"), ("Invocation/Evocation".to_string(), true));
        assert_eq!(
            school.resolve("invocation / evocation"),
            ("Invocation/Evocation".to_string(), true)
        );
    }

    #[test]
    fn unknown_enum_values_are_recased() {
        let schema = SpellSchema::builtin().unwrap();
        let kinds = schema.enum_table("range.kind").unwrap();
        assert_eq!(kinds.resolve("Far Away"), ("far_away".to_string(), false));
        let tags = schema.enum_table("tags[]").unwrap();
        assert_eq!(tags.resolve("fire"), ("Fire".to_string(), true));
    }

    #[test]
    fn wildcard_patterns_match_nested_paths() {
        let schema = SpellSchema::builtin().unwrap();
        assert!(schema.enum_table("range.distance.mode").is_some());
        assert!(schema.enum_table("saving_throw.multiple[].save_type").is_some());
        assert!(schema.enum_table("range.distance.value").is_none());
    }

    #[test]
    fn lean_defaults_compare_numbers_by_value() {
        let schema = SpellSchema::builtin().unwrap();
        let path = "material_components[].quantity";
        assert!(schema.is_lean_default(path, &serde_json::json!(1)));
        assert!(schema.is_lean_default(path, &serde_json::json!(1.0)));
        assert!(!schema.is_lean_default(path, &serde_json::json!(2)));
        assert!(!schema.is_lean_default("quantity", &serde_json::json!(1)));
    }

    #[test]
    fn alias_to_unknown_value_is_rejected() {
        let mut doc: Value = serde_json::from_str(BUILTIN_SCHEMA).unwrap();
        doc["enums"]["tradition"]["aliases"] = serde_json::json!({"Mixed": "Hybrid"});
        let err = SpellSchema::from_json(&doc.to_string()).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownAliasTarget { .. }));
    }

    #[test]
    fn tradition_classification_ignores_case() {
        let schema = SpellSchema::builtin().unwrap();
        assert_eq!(schema.tradition.classify("ARCANE"), Some(Tradition::Arcane));
        assert_eq!(schema.tradition.classify("both"), Some(Tradition::Both));
        assert_eq!(schema.tradition.classify("psionic"), None);
    }
}
