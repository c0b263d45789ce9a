//! Record filtering for selective iteration.

use grimoire_canonical::ContentHash;
use grimoire_core::{IdentityKey, SpellRecord};

/// Trait for selecting records from the store.
pub trait RecordFilter {
    /// Returns true if the record matches the filter criteria.
    fn matches(&self, record: &SpellRecord) -> bool;
}

/// Records that have never been hashed.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingHash;

impl RecordFilter for MissingHash {
    fn matches(&self, record: &SpellRecord) -> bool {
        !record.is_hashed()
    }
}

/// Records carrying one content hash.
#[derive(Debug, Clone)]
pub struct HashFilter {
    /// Hash to match.
    pub hash: ContentHash,
}

impl RecordFilter for HashFilter {
    fn matches(&self, record: &SpellRecord) -> bool {
        record.content_hash.as_ref() == Some(&self.hash)
    }
}

/// Filter by display name, ignoring case.
#[derive(Debug, Clone)]
pub struct NameFilter {
    /// Name to match.
    pub name: String,
}

impl RecordFilter for NameFilter {
    fn matches(&self, record: &SpellRecord) -> bool {
        record.name.trim().eq_ignore_ascii_case(self.name.trim())
    }
}

/// Records that name the same spell as `key`.
#[derive(Debug, Clone)]
pub struct IdentityFilter {
    /// Identity key to match.
    pub key: IdentityKey,
}

impl RecordFilter for IdentityFilter {
    fn matches(&self, record: &SpellRecord) -> bool {
        IdentityKey::of(record) == self.key
    }
}

/// Composite filter: any filter must match (OR).
pub struct OrFilter {
    /// Filters to combine with OR logic.
    pub filters: Vec<Box<dyn RecordFilter>>,
}

impl RecordFilter for OrFilter {
    fn matches(&self, record: &SpellRecord) -> bool {
        self.filters.iter().any(|f| f.matches(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(name: &str, hashed: bool) -> SpellRecord {
        let mut record = SpellRecord::new(1, name, 3, "x");
        if hashed {
            record.content_hash = Some(ContentHash::of(name.as_bytes()));
        }
        record
    }

    #[test]
    fn missing_hash_selects_unhashed() {
        assert!(MissingHash.matches(&make_record("Sleep", false)));
        assert!(!MissingHash.matches(&make_record("Sleep", true)));
    }

    #[test]
    fn names_match_ignoring_case_and_padding() {
        let name = NameFilter {
            name: "fireball ".into(),
        };
        assert!(name.matches(&make_record("Fireball", false)));
        assert!(!name.matches(&make_record("Fireball (1)", false)));
    }

    #[test]
    fn any_filter_may_match() {
        let name = NameFilter {
            name: "fireball".into(),
        };
        let either = OrFilter {
            filters: vec![Box::new(name), Box::new(MissingHash)],
        };
        assert!(either.matches(&make_record("Fireball", true)));
        assert!(!either.matches(&make_record("Sleep", true)));
    }
}
