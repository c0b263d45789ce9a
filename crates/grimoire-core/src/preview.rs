use grimoire_canonical::{Canonicalizer, ContentHash, HygieneReport, SpellSchema, Violation};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::document::assemble;
use crate::parse::{FieldKind, ParsedField};
use crate::record::SpellRecord;

/// Display text and hash for an unsaved document.
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    /// Display text per structured field present in the document.
    pub display: BTreeMap<FieldKind, String>,
    /// Content hash, when the document canonicalizes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<ContentHash>,
    /// Hygiene report of the attempt.
    pub report: HygieneReport,
    /// Rule violations blocking a hash.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
    /// Any other reason the hash is missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Computes display text and content hash of `document` without saving.
/// Problems are reported in the result, never raised.
pub fn preview(schema: &SpellSchema, document: &Value) -> Preview {
    let mut display = BTreeMap::new();
    for kind in FieldKind::ALL {
        let Some(value) = document.get(kind.field()).filter(|v| !v.is_null()) else {
            continue;
        };
        let text = match ParsedField::from_value(kind, value) {
            Ok(parsed) => parsed.display(),
            Err(err) => format!("<unreadable: {}>", err),
        };
        display.insert(kind, text);
    }

    match Canonicalizer::new(schema).canonicalize_with_report(document) {
        Ok(result) => {
            debug!(hash = %result.hash, "computed preview");
            Preview {
                display,
                content_hash: Some(result.hash),
                report: result.report,
                violations: Vec::new(),
                error: None,
            }
        }
        Err((err, report)) => {
            let violations = match &err {
                grimoire_canonical::CanonicalizationError::Validation(v) => v.violations().to_vec(),
                _ => Vec::new(),
            };
            Preview {
                display,
                content_hash: None,
                report,
                error: violations.is_empty().then(|| err.to_string()),
                violations,
            }
        }
    }
}

/// Preview of a record's assembled document.
pub fn preview_record(schema: &SpellSchema, record: &SpellRecord) -> Preview {
    match assemble(record) {
        Ok(assembled) => preview(schema, &assembled.document),
        Err(err) => Preview {
            display: BTreeMap::new(),
            content_hash: None,
            report: HygieneReport::new(schema.version),
            violations: Vec::new(),
            error: Some(err.to_string()),
        },
    }
}
