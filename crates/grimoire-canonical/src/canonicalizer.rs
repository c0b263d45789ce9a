use serde_json::{Map, Value};
use std::cmp::Ordering;
use tracing::{debug, warn};

use crate::canonical_spell::CanonicalSpell;
use crate::digest::ContentHash;
use crate::hygiene::{HygieneReport, HygieneStatus};
use crate::path::Path;
use crate::schema::{KeyedList, SpellSchema, Tradition};
use crate::serializer::to_canonical_bytes;
use crate::text::sanitize;
use crate::validation::{self, ValidationError};

/// Error returned when canonicalization fails.
#[derive(thiserror::Error, Debug)]
pub enum CanonicalizationError {
    /// Provided JSON could not be canonicalized.
    #[error("invalid JSON structure: {0}")]
    InvalidStructure(String),
    /// Non-finite number (NaN/Infinity) detected.
    #[error("non-finite number detected at {0}")]
    NonFiniteNumber(String),
    /// The record failed schema validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Generic failure.
    #[error("other error: {0}")]
    Other(String),
}

/// Result of canonicalization.
#[derive(Debug)]
pub struct CanonicalizationResult {
    /// Content-only projection.
    pub spell: CanonicalSpell,
    /// Canonical UTF-8 bytes of `spell`.
    pub bytes: Vec<u8>,
    /// SHA-256 of `bytes`.
    pub hash: ContentHash,
    /// Hygiene report describing normalization.
    pub report: HygieneReport,
}

const DECIMALS: f64 = 1e6;

/// Runs the normalization pipeline under one schema.
///
/// Steps, in order: materialize defaults, drop metadata, clear the
/// discriminant the tradition excludes, sanitize strings, normalize enums,
/// fix numeric precision, drop nested defaults, prune empty values, order
/// collections. Record validation runs after the tradition step, before any
/// rewriting. Ordering runs last so list positions only depend on the final
/// content of each element.
pub struct Canonicalizer<'s> {
    schema: &'s SpellSchema,
}

impl<'s> Canonicalizer<'s> {
    /// Creates a canonicalizer for the provided schema.
    pub fn new(schema: &'s SpellSchema) -> Self {
        Self { schema }
    }

    /// Produces the canonical projection, bytes, hash and hygiene report.
    pub fn canonicalize(
        &self,
        value: &Value,
    ) -> Result<CanonicalizationResult, CanonicalizationError> {
        self.canonicalize_with_report(value).map_err(|(err, _)| err)
    }

    /// Same as [`Canonicalizer::canonicalize`], returning the report even on error.
    pub fn canonicalize_with_report(
        &self,
        value: &Value,
    ) -> Result<CanonicalizationResult, (CanonicalizationError, HygieneReport)> {
        let mut report = HygieneReport::new(self.schema.version);
        match self.run(value, &mut report) {
            Ok(spell) => {
                let bytes = match to_canonical_bytes(&spell.to_value()) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        report.escalate(HygieneStatus::Invalid);
                        return Err((err, report));
                    }
                };
                let hash = ContentHash::of(&bytes);
                debug!(hash = %hash, bytes = bytes.len(), "canonicalized record");
                Ok(CanonicalizationResult {
                    spell,
                    bytes,
                    hash,
                    report,
                })
            }
            Err(err) => {
                report.escalate(HygieneStatus::Invalid);
                Err((err, report))
            }
        }
    }

    /// Normalizes the value of one top-level content field the way
    /// [`Canonicalizer::canonicalize`] would, without record validation.
    /// Returns `Value::Null` when nothing survives pruning.
    pub fn normalize_field(&self, field: &str, value: &Value) -> Result<Value, CanonicalizationError> {
        let mut report = HygieneReport::new(self.schema.version);
        let path = Path::root().push_field(field);
        let mut value = value.clone();
        self.sanitize_strings(&mut value, &path, &mut report);
        self.normalize_enums(&mut value, &path, &mut report);
        self.fix_precision(&mut value, &path)?;
        self.drop_lean_defaults(&mut value, &path, &mut report);
        if !self.prune(&mut value, &path, &mut report) {
            return Ok(Value::Null);
        }
        self.order_collections(&mut value, &path);
        Ok(value)
    }

    fn run(
        &self,
        value: &Value,
        report: &mut HygieneReport,
    ) -> Result<CanonicalSpell, CanonicalizationError> {
        let Value::Object(_) = value else {
            return Err(CanonicalizationError::InvalidStructure(
                "root: expected an object".into(),
            ));
        };
        let mut doc = value.clone();
        let status = validation::migrate(self.schema, &mut doc)?;
        if let Some(note) = status.note() {
            report.notes.push(note);
        }

        validation::materialize(self.schema, &mut doc);
        let Value::Object(mut map) = doc else {
            return Err(CanonicalizationError::InvalidStructure(
                "root: expected an object".into(),
            ));
        };
        self.filter_metadata(&mut map, report);
        self.clear_tradition(&mut map, report);

        let mut doc = Value::Object(map);
        validation::validate(self.schema, &doc)?;

        self.sanitize_strings(&mut doc, &Path::root(), report);
        self.normalize_enums(&mut doc, &Path::root(), report);
        self.fix_precision(&mut doc, &Path::root())?;
        self.drop_lean_defaults(&mut doc, &Path::root(), report);
        self.prune(&mut doc, &Path::root(), report);
        self.order_collections(&mut doc, &Path::root());
        self.note_fallbacks(&doc, report);

        match doc {
            Value::Object(map) => Ok(CanonicalSpell::from_map(map)),
            _ => Err(CanonicalizationError::InvalidStructure(
                "root: expected an object".into(),
            )),
        }
    }

    fn filter_metadata(&self, map: &mut Map<String, Value>, report: &mut HygieneReport) {
        map.retain(|key, _| {
            let keep = !self.schema.is_metadata(key);
            if !keep {
                report.bump("metadata_fields_dropped");
            }
            keep
        });
    }

    fn clear_tradition(&self, map: &mut Map<String, Value>, report: &mut HygieneReport) {
        let rule = &self.schema.tradition;
        let tradition = map
            .get(&rule.field)
            .and_then(Value::as_str)
            .and_then(|t| rule.classify(t));
        let cleared = match tradition {
            Some(Tradition::Arcane) => map.remove(&rule.divine_field),
            Some(Tradition::Divine) => map.remove(&rule.arcane_field),
            Some(Tradition::Both) | None => None,
        };
        if matches!(cleared, Some(ref v) if !v.is_null()) {
            report.warn("ClearedExcludedDiscriminant", "discriminants_cleared");
            debug!("cleared discriminant excluded by tradition");
        }
    }

    fn sanitize_strings(&self, value: &mut Value, path: &Path, report: &mut HygieneReport) {
        match value {
            Value::String(s) => {
                let clean = sanitize(s, self.schema.text_mode(&path.pattern()));
                if clean != *s {
                    report.bump("strings_normalized");
                    report.escalate(HygieneStatus::Ambiguous);
                    *s = clean;
                }
            }
            Value::Array(items) => {
                for (idx, item) in items.iter_mut().enumerate() {
                    self.sanitize_strings(item, &path.push_index(idx), report);
                }
            }
            Value::Object(map) => {
                for (key, child) in map.iter_mut() {
                    self.sanitize_strings(child, &path.push_field(key), report);
                }
            }
            _ => {}
        }
    }

    fn normalize_enums(&self, value: &mut Value, path: &Path, report: &mut HygieneReport) {
        match value {
            Value::String(s) => {
                let Some(table) = self.schema.enum_table(&path.pattern()) else {
                    return;
                };
                let (token, known) = table.resolve(s);
                if !known {
                    report.warn("UnknownEnumValue", "unknown_enum_values");
                    warn!(path = %path, value = %s, "unrecognized enum value kept");
                }
                if token != *s {
                    report.bump("enums_normalized");
                    report.escalate(HygieneStatus::Ambiguous);
                    *s = token;
                }
            }
            Value::Array(items) => {
                for (idx, item) in items.iter_mut().enumerate() {
                    self.normalize_enums(item, &path.push_index(idx), report);
                }
            }
            Value::Object(map) => {
                for (key, child) in map.iter_mut() {
                    self.normalize_enums(child, &path.push_field(key), report);
                }
            }
            _ => {}
        }
    }

    fn fix_precision(&self, value: &mut Value, path: &Path) -> Result<(), CanonicalizationError> {
        match value {
            Value::Number(num) => {
                if num.is_i64() || num.is_u64() {
                    return Ok(());
                }
                let f = num.as_f64().unwrap_or(f64::NAN);
                if !f.is_finite() {
                    return Err(CanonicalizationError::NonFiniteNumber(path.to_string()));
                }
                *value = round_number(f);
                Ok(())
            }
            Value::Array(items) => items
                .iter_mut()
                .enumerate()
                .try_for_each(|(idx, item)| self.fix_precision(item, &path.push_index(idx))),
            Value::Object(map) => map
                .iter_mut()
                .try_for_each(|(key, child)| self.fix_precision(child, &path.push_field(key))),
            _ => Ok(()),
        }
    }

    fn drop_lean_defaults(&self, value: &mut Value, path: &Path, report: &mut HygieneReport) {
        match value {
            Value::Array(items) => {
                for (idx, item) in items.iter_mut().enumerate() {
                    self.drop_lean_defaults(item, &path.push_index(idx), report);
                }
            }
            Value::Object(map) => {
                map.retain(|key, child| {
                    let lean = self.schema.is_lean_default(&path.push_field(key).pattern(), child);
                    if lean {
                        report.bump("defaults_dropped");
                    }
                    !lean
                });
                for (key, child) in map.iter_mut() {
                    self.drop_lean_defaults(child, &path.push_field(key), report);
                }
            }
            _ => {}
        }
    }

    fn order_collections(&self, value: &mut Value, path: &Path) {
        match value {
            Value::Array(items) => {
                for (idx, item) in items.iter_mut().enumerate() {
                    self.order_collections(item, &path.push_index(idx));
                }
            }
            Value::Object(map) => {
                for (key, child) in map.iter_mut() {
                    self.order_collections(child, &path.push_field(key));
                }
                let keys: Vec<String> = map.keys().cloned().collect();
                for key in keys {
                    let pattern = path.push_field(&key).pattern();
                    if self.schema.sequences.contains(&pattern) {
                        continue;
                    }
                    if self.schema.is_set(&pattern) {
                        if let Some(Value::Array(items)) = map.get_mut(&key) {
                            sort_set(items);
                        }
                    } else if let Some(policy) = self.schema.keyed_list(&pattern) {
                        if execution_ordered(policy, map) {
                            continue;
                        }
                        if let Some(Value::Array(items)) = map.get_mut(&key) {
                            sort_keyed(items, &policy.sort_by);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Returns whether `value` survives.
    fn prune(&self, value: &mut Value, path: &Path, report: &mut HygieneReport) -> bool {
        let required = path.depth() == 0 || self.schema.is_required(&path.pattern());
        match value {
            Value::Null => false,
            Value::String(s) => required || !s.is_empty(),
            Value::Array(items) => {
                let mut idx = 0;
                items.retain_mut(|item| {
                    let keep = self.prune(item, &path.push_index(idx), report);
                    idx += 1;
                    keep
                });
                required || !items.is_empty()
            }
            Value::Object(map) => {
                map.retain(|key, child| {
                    let keep = self.prune(child, &path.push_field(key), report);
                    if !keep {
                        report.bump("fields_pruned");
                    }
                    keep
                });
                required || !map.is_empty()
            }
            Value::Bool(_) | Value::Number(_) => true,
        }
    }

    fn note_fallbacks(&self, value: &Value, report: &mut HygieneReport) {
        let Value::Object(map) = value else {
            return;
        };
        for (key, child) in map {
            let fallback = match child {
                Value::Object(inner) => {
                    inner.contains_key("raw_legacy_value")
                        || inner.get("kind").and_then(Value::as_str) == Some("dm_adjudicated")
                        || (key == "magic_resistance"
                            && inner.get("kind").and_then(Value::as_str) == Some("special"))
                }
                _ => false,
            };
            if fallback {
                report.warn("SpecialFallback", "special_fallbacks");
                report.escalate(HygieneStatus::Lossy);
            }
        }
    }
}

fn round_number(f: f64) -> Value {
    let rounded = if f.abs() < 1e15 {
        (f * DECIMALS).round() / DECIMALS
    } else {
        f
    };
    if rounded.fract() == 0.0 && rounded.abs() < 9.0e15 {
        Value::from(rounded as i64)
    } else {
        serde_json::Number::from_f64(rounded)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn execution_ordered(policy: &KeyedList, parent: &Map<String, Value>) -> bool {
    match &policy.ordered_when {
        Some(cond) => parent.get(&cond.field).and_then(Value::as_str) == Some(cond.equals.as_str()),
        None => false,
    }
}

fn canonical_text(value: &Value) -> String {
    canonical_json::to_string(value).unwrap_or_default()
}

fn sort_set(items: &mut Vec<Value>) {
    items.sort_by(|a, b| match (a.as_str(), b.as_str()) {
        (Some(x), Some(y)) => x.cmp(y),
        _ => canonical_text(a).cmp(&canonical_text(b)),
    });
    items.dedup();
}

fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => canonical_text(x).cmp(&canonical_text(y)),
    }
}

fn sort_keyed(items: &mut Vec<Value>, keys: &[String]) {
    items.sort_by(|a, b| {
        keys.iter()
            .map(|k| compare_field(a.get(k), b.get(k)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| canonical_text(a).cmp(&canonical_text(b)))
    });
}
