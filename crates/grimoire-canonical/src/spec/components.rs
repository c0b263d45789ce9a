use serde::{Deserialize, Serialize};
use std::fmt;

/// Verbal / somatic / material flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellComponents {
    /// Verbal.
    pub verbal: bool,
    /// Somatic.
    pub somatic: bool,
    /// Material.
    pub material: bool,
    /// Original text when some tokens were not recognized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_legacy_value: Option<String>,
}

impl SpellComponents {
    /// Flags with no legacy text.
    pub fn new(verbal: bool, somatic: bool, material: bool) -> Self {
        Self {
            verbal,
            somatic,
            material,
            raw_legacy_value: None,
        }
    }

    /// Fallback preserving `text`, with every flag cleared.
    pub fn special(text: impl Into<String>) -> Self {
        Self {
            raw_legacy_value: Some(text.into()),
            ..Default::default()
        }
    }

    /// Whether the legacy text could not be fully interpreted.
    pub fn is_special(&self) -> bool {
        self.raw_legacy_value.is_some()
    }
}

impl fmt::Display for SpellComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(raw) = &self.raw_legacy_value {
            return f.write_str(raw);
        }
        let letters: Vec<&str> = [
            (self.verbal, "V"),
            (self.somatic, "S"),
            (self.material, "M"),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, letter)| *letter)
        .collect();
        if letters.is_empty() {
            f.write_str("None")
        } else {
            f.write_str(&letters.join(", "))
        }
    }
}

/// A named material component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialComponent {
    /// Name as written.
    pub name: String,
    /// Quantity; 1 is the default and is omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    /// Unit of `quantity`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Value in gold pieces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gp_value: Option<f64>,
    /// Whether casting uses it up; false is the default and is omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_consumed: Option<bool>,
    /// Longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MaterialComponent {
    /// A component with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Drops fields equal to their defaults (`quantity` 1, `is_consumed` false).
    pub fn lean(mut self) -> Self {
        if self.quantity == Some(1.0) {
            self.quantity = None;
        }
        if self.is_consumed == Some(false) {
            self.is_consumed = None;
        }
        self
    }
}

impl fmt::Display for MaterialComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
