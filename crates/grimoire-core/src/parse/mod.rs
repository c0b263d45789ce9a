//! Legacy free-text field parsers.
//!
//! Every parser is total: text it cannot read comes back as the field's
//! special (or DM-guidance) variant carrying the input verbatim.

mod area;
mod casting_time;
mod components;
mod damage;
mod duration;
mod magic_resistance;
mod quantity;
mod range;
mod saving_throw;

pub use area::parse_area;
pub use casting_time::parse_casting_time;
pub use components::{parse_components, parse_material, ComponentsParse};
pub use damage::parse_damage;
pub use duration::parse_duration;
pub use magic_resistance::parse_magic_resistance;
pub use range::parse_range;
pub use saving_throw::parse_saving_throw;

use grimoire_canonical::spec::{
    AreaSpec, CastingTime, DurationSpec, MagicResistanceSpec, RangeSpec, SavingThrowSpec,
    SpellDamageSpec,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Removes the first match of `pattern` from `text`, returning capture 1.
pub(crate) fn strip(pattern: &Regex, text: &mut String) -> Option<String> {
    let caps = pattern.captures(text)?;
    let whole = caps.get(0)?.range();
    let word = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
    text.replace_range(whole, "");
    Some(word)
}

/// The free-text field kinds with a structured shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Range.
    Range,
    /// Duration.
    Duration,
    /// Casting time.
    CastingTime,
    /// Area of effect.
    Area,
    /// Damage.
    Damage,
    /// Saving throw.
    SavingThrow,
    /// Magic resistance.
    MagicResistance,
    /// Components.
    Components,
}

impl FieldKind {
    /// Every kind, in record field order.
    pub const ALL: [FieldKind; 8] = [
        FieldKind::Range,
        FieldKind::Components,
        FieldKind::CastingTime,
        FieldKind::Duration,
        FieldKind::Area,
        FieldKind::SavingThrow,
        FieldKind::Damage,
        FieldKind::MagicResistance,
    ];

    /// Field name in the structured document.
    pub fn field(self) -> &'static str {
        match self {
            FieldKind::Range => "range",
            FieldKind::Duration => "duration",
            FieldKind::CastingTime => "casting_time",
            FieldKind::Area => "area",
            FieldKind::Damage => "damage",
            FieldKind::SavingThrow => "saving_throw",
            FieldKind::MagicResistance => "magic_resistance",
            FieldKind::Components => "components",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

/// Error for an unknown field kind name.
#[derive(Debug, thiserror::Error)]
#[error("unknown field kind '{0}'")]
pub struct UnknownFieldKind(String);

impl FromStr for FieldKind {
    type Err = UnknownFieldKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded = s.trim().to_lowercase().replace(['-', ' '], "_");
        FieldKind::ALL
            .into_iter()
            .find(|kind| kind.field() == folded || (folded == "mr" && *kind == FieldKind::MagicResistance))
            .ok_or_else(|| UnknownFieldKind(s.to_string()))
    }
}

/// Result of parsing one field.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedField {
    /// Range.
    Range(RangeSpec),
    /// Duration.
    Duration(DurationSpec),
    /// Casting time.
    CastingTime(CastingTime),
    /// Area.
    Area(AreaSpec),
    /// Damage.
    Damage(SpellDamageSpec),
    /// Saving throw.
    SavingThrow(SavingThrowSpec),
    /// Magic resistance.
    MagicResistance(MagicResistanceSpec),
    /// Components and any materials named with them.
    Components(ComponentsParse),
}

impl ParsedField {
    /// Kind of field this value belongs to.
    pub fn kind(&self) -> FieldKind {
        match self {
            ParsedField::Range(_) => FieldKind::Range,
            ParsedField::Duration(_) => FieldKind::Duration,
            ParsedField::CastingTime(_) => FieldKind::CastingTime,
            ParsedField::Area(_) => FieldKind::Area,
            ParsedField::Damage(_) => FieldKind::Damage,
            ParsedField::SavingThrow(_) => FieldKind::SavingThrow,
            ParsedField::MagicResistance(_) => FieldKind::MagicResistance,
            ParsedField::Components(_) => FieldKind::Components,
        }
    }

    /// Whether the parser fell back to the special variant.
    pub fn is_special(&self) -> bool {
        match self {
            ParsedField::Range(s) => s.is_special(),
            ParsedField::Duration(s) => s.is_special(),
            ParsedField::CastingTime(s) => s.is_special(),
            ParsedField::Area(s) => s.is_special(),
            ParsedField::Damage(s) => s.is_special(),
            ParsedField::SavingThrow(s) => s.is_special(),
            ParsedField::MagicResistance(s) => s.is_special(),
            ParsedField::Components(p) => p.components.is_special(),
        }
    }

    /// Text preserved by a special variant.
    pub fn preserved_text(&self) -> Option<&str> {
        match self {
            ParsedField::Range(s) => s.raw_legacy_value.as_deref(),
            ParsedField::Duration(s) => s.raw_legacy_value.as_deref(),
            ParsedField::CastingTime(s) => s.raw_legacy_value.as_deref(),
            ParsedField::Area(s) => s.raw_legacy_value.as_deref(),
            ParsedField::Damage(s) => s.dm_guidance.as_deref(),
            ParsedField::SavingThrow(s) => s.dm_guidance.as_deref(),
            ParsedField::MagicResistance(s) => s.special_rule.as_deref(),
            ParsedField::Components(p) => p.components.raw_legacy_value.as_deref(),
        }
    }

    /// A special variant over real text. Empty text and the literal word
    /// "special" are not counted.
    pub fn is_fallback(&self) -> bool {
        self.is_special()
            && self
                .preserved_text()
                .map(|text| {
                    let text = text.trim();
                    !text.is_empty() && !text.eq_ignore_ascii_case("special")
                })
                .unwrap_or(false)
    }

    /// Reads a structured document field back into its typed spec.
    pub fn from_value(kind: FieldKind, value: &Value) -> Result<Self, serde_json::Error> {
        let value = value.clone();
        Ok(match kind {
            FieldKind::Range => ParsedField::Range(serde_json::from_value(value)?),
            FieldKind::Duration => ParsedField::Duration(serde_json::from_value(value)?),
            FieldKind::CastingTime => ParsedField::CastingTime(serde_json::from_value(value)?),
            FieldKind::Area => ParsedField::Area(serde_json::from_value(value)?),
            FieldKind::Damage => ParsedField::Damage(serde_json::from_value(value)?),
            FieldKind::SavingThrow => ParsedField::SavingThrow(serde_json::from_value(value)?),
            FieldKind::MagicResistance => {
                ParsedField::MagicResistance(serde_json::from_value(value)?)
            }
            FieldKind::Components => ParsedField::Components(ComponentsParse {
                components: serde_json::from_value(value)?,
                materials: Vec::new(),
            }),
        })
    }

    /// Structured value for the document. Components yield only the flags.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            ParsedField::Range(s) => serde_json::to_value(s),
            ParsedField::Duration(s) => serde_json::to_value(s),
            ParsedField::CastingTime(s) => serde_json::to_value(s),
            ParsedField::Area(s) => serde_json::to_value(s),
            ParsedField::Damage(s) => serde_json::to_value(s),
            ParsedField::SavingThrow(s) => serde_json::to_value(s),
            ParsedField::MagicResistance(s) => serde_json::to_value(s),
            ParsedField::Components(p) => serde_json::to_value(&p.components),
        }
    }

    /// Display text, which parses back to an equivalent value.
    pub fn display(&self) -> String {
        match self {
            ParsedField::Range(s) => s.to_string(),
            ParsedField::Duration(s) => s.to_string(),
            ParsedField::CastingTime(s) => s.to_string(),
            ParsedField::Area(s) => s.to_string(),
            ParsedField::Damage(s) => s.to_string(),
            ParsedField::SavingThrow(s) => s.to_string(),
            ParsedField::MagicResistance(s) => s.to_string(),
            ParsedField::Components(p) => p.components.to_string(),
        }
    }
}

/// Parses `text` as a field of `kind`. Never fails.
pub fn parse(kind: FieldKind, text: &str) -> ParsedField {
    let parsed = match kind {
        FieldKind::Range => ParsedField::Range(parse_range(text)),
        FieldKind::Duration => ParsedField::Duration(parse_duration(text)),
        FieldKind::CastingTime => ParsedField::CastingTime(parse_casting_time(text)),
        FieldKind::Area => ParsedField::Area(parse_area(text)),
        FieldKind::Damage => ParsedField::Damage(parse_damage(text)),
        FieldKind::SavingThrow => ParsedField::SavingThrow(parse_saving_throw(text)),
        FieldKind::MagicResistance => ParsedField::MagicResistance(parse_magic_resistance(text)),
        FieldKind::Components => ParsedField::Components(parse_components(text)),
    };
    if parsed.is_fallback() {
        warn!(field = %kind, text, "legacy text kept as special");
    } else {
        debug!(field = %kind, "parsed legacy text");
    }
    parsed
}
