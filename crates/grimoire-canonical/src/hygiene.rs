use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hygiene status for canonicalization attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HygieneStatus {
    /// The input was canonicalizable without issues.
    Ok,
    /// The input was accepted but some legacy text fell back to a special variant.
    Lossy,
    /// The input needed normalization (whitespace, casing, legacy spellings).
    Ambiguous,
    /// The input was invalid and must be rejected.
    Invalid,
}

/// Stable warning code emitted by canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HygieneWarning(String);

impl HygieneWarning {
    /// Creates a warning from a literal code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The warning code.
    pub fn code(&self) -> &str {
        &self.0
    }
}

/// Hygiene reports produced during canonicalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HygieneReport {
    /// Overall hygiene status.
    pub status: HygieneStatus,
    /// Stable warning codes.
    pub warnings: Vec<HygieneWarning>,
    /// Counters such as pruned fields or unknown enum values.
    pub metrics: BTreeMap<String, u64>,
    /// Schema version the bytes were produced under.
    pub schema_version: u32,
    /// Version notes such as `migrated_from:1`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl HygieneReport {
    /// Empty report for `schema_version`.
    pub fn new(schema_version: u32) -> Self {
        Self {
            status: HygieneStatus::Ok,
            warnings: Vec::new(),
            metrics: BTreeMap::new(),
            schema_version,
            notes: Vec::new(),
        }
    }

    /// Adds `code` once and increments its counter.
    pub fn warn(&mut self, code: &str, metric: &str) {
        if !self.warnings.iter().any(|w| w.code() == code) {
            self.warnings.push(HygieneWarning::new(code));
        }
        self.bump(metric);
    }

    /// Increments a counter.
    pub fn bump(&mut self, metric: &str) {
        *self.metrics.entry(metric.to_string()).or_insert(0) += 1;
    }

    /// Raises the status, never lowering it.
    pub fn escalate(&mut self, status: HygieneStatus) {
        let rank = |s: &HygieneStatus| match s {
            HygieneStatus::Ok => 0,
            HygieneStatus::Ambiguous => 1,
            HygieneStatus::Lossy => 2,
            HygieneStatus::Invalid => 3,
        };
        if rank(&status) > rank(&self.status) {
            self.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warn_deduplicates_codes_but_counts() {
        let mut report = HygieneReport::new(2);
        report.warn("UnknownEnumValue", "unknown_enum_values");
        report.warn("UnknownEnumValue", "unknown_enum_values");
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.metrics["unknown_enum_values"], 2);
    }

    #[test]
    fn escalate_never_lowers() {
        let mut report = HygieneReport::new(2);
        report.escalate(HygieneStatus::Lossy);
        report.escalate(HygieneStatus::Ambiguous);
        assert_eq!(report.status, HygieneStatus::Lossy);
    }
}
