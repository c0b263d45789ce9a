use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::record::SpellRecord;

/// Limits applied to untrusted import input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportPolicy {
    /// Largest accepted text field, in bytes.
    pub max_field_bytes: usize,
    /// Largest accepted serialized record, in bytes.
    pub max_record_bytes: usize,
    /// URL schemes allowed in source references.
    pub allowed_url_schemes: Vec<String>,
    /// Conflict count at which a bulk decision is offered.
    pub bulk_threshold: usize,
}

impl Default for ImportPolicy {
    fn default() -> Self {
        Self {
            max_field_bytes: 64 * 1024,
            max_record_bytes: 512 * 1024,
            allowed_url_schemes: vec!["https".into(), "http".into()],
            bulk_threshold: 10,
        }
    }
}

/// Reason an incoming field or record was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizeError {
    /// A text field exceeds `max_field_bytes`.
    #[error("field {field} is {len} bytes, limit is {max}")]
    FieldTooLarge {
        /// Field name.
        field: String,
        /// Actual size.
        len: usize,
        /// Limit.
        max: usize,
    },
    /// The serialized record exceeds `max_record_bytes`.
    #[error("record is {len} bytes, limit is {max}")]
    RecordTooLarge {
        /// Actual size.
        len: usize,
        /// Limit.
        max: usize,
    },
    /// Script content found in a text field.
    #[error("field {field} contains script content")]
    ScriptContent {
        /// Field name.
        field: String,
    },
    /// A reference URL does not parse.
    #[error("invalid reference URL '{url}': {reason}")]
    InvalidUrl {
        /// The URL as given.
        url: String,
        /// Parser message.
        reason: String,
    },
    /// A reference URL uses a scheme outside the allow-list.
    #[error("URL scheme '{scheme}' is not allowed")]
    DisallowedScheme {
        /// Offending scheme.
        scheme: String,
    },
}

fn script_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)<\s*script|javascript\s*:|vbscript\s*:|\bon[a-z]+\s*=\s*['\x22]")
            .expect("invalid regex")
    })
}

fn markup_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"</?[A-Za-z][A-Za-z0-9]*(?:\s[^<>]*)?/?>").expect("invalid regex"))
}

impl ImportPolicy {
    /// Checks size and script content of one field, returning it with
    /// markup tags removed.
    pub fn clean_text(&self, field: &str, text: &str) -> Result<String, SanitizeError> {
        if text.len() > self.max_field_bytes {
            return Err(SanitizeError::FieldTooLarge {
                field: field.to_string(),
                len: text.len(),
                max: self.max_field_bytes,
            });
        }
        if script_pattern().is_match(text) {
            warn!(field, "rejected script content");
            return Err(SanitizeError::ScriptContent {
                field: field.to_string(),
            });
        }
        let cleaned = markup_pattern().replace_all(text, "");
        if cleaned.len() != text.len() {
            debug!(field, "stripped markup");
        }
        Ok(cleaned.into_owned())
    }

    /// Checks a reference URL against the scheme allow-list.
    pub fn check_url(&self, url: &str) -> Result<Url, SanitizeError> {
        let parsed = Url::parse(url.trim()).map_err(|err| SanitizeError::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        if !self
            .allowed_url_schemes
            .iter()
            .any(|s| s.eq_ignore_ascii_case(parsed.scheme()))
        {
            return Err(SanitizeError::DisallowedScheme {
                scheme: parsed.scheme().to_string(),
            });
        }
        Ok(parsed)
    }

    fn clean_option(&self, field: &str, text: &mut Option<String>) -> Result<(), SanitizeError> {
        if let Some(value) = text.as_mut() {
            *value = self.clean_text(field, value)?;
        }
        Ok(())
    }

    fn clean_value(&self, field: &str, value: &mut Value) -> Result<(), SanitizeError> {
        match value {
            Value::String(s) => *s = self.clean_text(field, s)?,
            Value::Array(items) => {
                for item in items {
                    self.clean_value(field, item)?;
                }
            }
            Value::Object(map) => {
                for (key, child) in map.iter_mut() {
                    self.clean_value(&format!("{}.{}", field, key), child)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Applies the policy to an incoming record in place. The first
    /// violation rejects the record.
    pub fn sanitize_record(&self, record: &mut SpellRecord) -> Result<(), SanitizeError> {
        let len = serde_json::to_vec(&*record).map(|b| b.len()).unwrap_or(usize::MAX);
        if len > self.max_record_bytes {
            return Err(SanitizeError::RecordTooLarge {
                len,
                max: self.max_record_bytes,
            });
        }

        record.name = self.clean_text("name", &record.name)?;
        record.description = self.clean_text("description", &record.description)?;
        for (field, text) in [
            ("tradition", &mut record.tradition),
            ("school", &mut record.school),
            ("sphere", &mut record.sphere),
            ("class_list", &mut record.class_list),
            ("range", &mut record.range),
            ("components", &mut record.components),
            ("material_components", &mut record.material_components),
            ("casting_time", &mut record.casting_time),
            ("duration", &mut record.duration),
            ("area", &mut record.area),
            ("saving_throw", &mut record.saving_throw),
            ("damage", &mut record.damage),
            ("magic_resistance", &mut record.magic_resistance),
            ("tags", &mut record.tags),
        ] {
            self.clean_option(field, text)?;
        }

        let meta = &mut record.metadata;
        for (field, text) in [
            ("source", &mut meta.source),
            ("edition", &mut meta.edition),
            ("author", &mut meta.author),
            ("license", &mut meta.license),
        ] {
            self.clean_option(field, text)?;
        }
        for reference in &mut meta.source_refs {
            reference.url = self.check_url(&reference.url)?.to_string();
            self.clean_option("source_refs.label", &mut reference.label)?;
        }

        if let Some(structured) = record.structured.as_mut() {
            self.clean_value("structured", structured)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SourceRef;

    fn record() -> SpellRecord {
        SpellRecord::new(0, "Light", 1, "Makes <b>light</b>.")
    }

    #[test]
    fn markup_is_stripped() {
        let mut record = record();
        ImportPolicy::default().sanitize_record(&mut record).unwrap();
        assert_eq!(record.description, "Makes light.");
    }

    #[test]
    fn comparisons_are_not_markup() {
        let policy = ImportPolicy::default();
        assert_eq!(policy.clean_text("damage", "1d6 < 2d6 > 1").unwrap(), "1d6 < 2d6 > 1");
    }

    #[test]
    fn script_is_rejected() {
        let mut record = record();
        record.range = Some("<script>alert(1)</script>".into());
        let err = ImportPolicy::default().sanitize_record(&mut record).unwrap_err();
        assert_eq!(err, SanitizeError::ScriptContent { field: "range".into() });
    }

    #[test]
    fn oversized_field_is_rejected() {
        let policy = ImportPolicy {
            max_field_bytes: 8,
            ..Default::default()
        };
        let err = policy.clean_text("name", "A very long name").unwrap_err();
        assert!(matches!(err, SanitizeError::FieldTooLarge { len: 16, max: 8, .. }));
    }

    #[test]
    fn url_schemes_are_restricted() {
        let policy = ImportPolicy::default();
        assert!(policy.check_url("https://example.test/phb").is_ok());
        assert_eq!(
            policy.check_url("javascript:alert(1)").unwrap_err(),
            SanitizeError::DisallowedScheme { scheme: "javascript".into() }
        );
        assert!(matches!(policy.check_url("not a url"), Err(SanitizeError::InvalidUrl { .. })));

        let mut record = record();
        record.metadata.source_refs.push(SourceRef {
            url: "ftp://example.test/x".into(),
            label: None,
        });
        assert!(policy.sanitize_record(&mut record).is_err());
    }

    #[test]
    fn structured_strings_are_checked() {
        let mut record = record();
        record.structured = Some(serde_json::json!({"range": {"kind": "special", "raw_legacy_value": "javascript:x"}}));
        let err = ImportPolicy::default().sanitize_record(&mut record).unwrap_err();
        assert_eq!(err, SanitizeError::ScriptContent { field: "structured.range.raw_legacy_value".into() });
    }
}
