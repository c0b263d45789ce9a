use crate::canonicalizer::CanonicalizationError;
use crate::digest::ContentHash;
use crate::serializer::to_canonical_bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Content-only projection of a record after canonicalization.
///
/// Carries no identity or metadata; its bytes and hash are pure functions
/// of its content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalSpell(Map<String, Value>);

impl CanonicalSpell {
    pub(crate) fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Parses previously stored canonical bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CanonicalizationError> {
        serde_json::from_slice(bytes)
            .map_err(|err| CanonicalizationError::InvalidStructure(err.to_string()))
    }

    /// A top-level content field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Top-level fields in key order.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// The projection as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Canonical bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CanonicalizationError> {
        to_canonical_bytes(&Value::Object(self.0.clone()))
    }

    /// Content hash of the canonical bytes.
    pub fn content_hash(&self) -> Result<ContentHash, CanonicalizationError> {
        Ok(ContentHash::of(&self.to_bytes()?))
    }
}
