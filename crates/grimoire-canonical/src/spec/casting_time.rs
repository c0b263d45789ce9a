use crate::scalar::format_number;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Casting time unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastingTimeUnit {
    /// Segment.
    Segment,
    /// Round.
    Round,
    /// Turn.
    Turn,
    /// Minute.
    Minute,
    /// Hour.
    Hour,
    /// Action.
    Action,
    /// Bonus action.
    BonusAction,
    /// Reaction.
    Reaction,
    /// Unparsed legacy text.
    #[default]
    Special,
}

impl CastingTimeUnit {
    fn words(self) -> (&'static str, &'static str) {
        match self {
            CastingTimeUnit::Segment => ("segment", "segments"),
            CastingTimeUnit::Round => ("round", "rounds"),
            CastingTimeUnit::Turn => ("turn", "turns"),
            CastingTimeUnit::Minute => ("minute", "minutes"),
            CastingTimeUnit::Hour => ("hour", "hours"),
            CastingTimeUnit::Action => ("action", "actions"),
            CastingTimeUnit::BonusAction => ("bonus action", "bonus actions"),
            CastingTimeUnit::Reaction => ("reaction", "reactions"),
            CastingTimeUnit::Special => ("special", "special"),
        }
    }
}

/// Structured casting time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CastingTime {
    /// Unit.
    pub unit: CastingTimeUnit,
    /// Fixed number of units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_value: Option<f64>,
    /// Units added per caster level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_level: Option<f64>,
    /// Levels per increment of `per_level`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_divisor: Option<f64>,
    /// Original text when the casting time could not be parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_legacy_value: Option<String>,
}

impl CastingTime {
    /// Fallback variant preserving `text`.
    pub fn special(text: impl Into<String>) -> Self {
        Self {
            unit: CastingTimeUnit::Special,
            raw_legacy_value: Some(text.into()),
            ..Default::default()
        }
    }

    /// A fixed number of units.
    pub fn fixed(base: f64, unit: CastingTimeUnit) -> Self {
        Self {
            unit,
            base_value: Some(base),
            ..Default::default()
        }
    }

    /// Whether this is the fallback variant.
    pub fn is_special(&self) -> bool {
        self.unit == CastingTimeUnit::Special
    }
}

impl fmt::Display for CastingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_special() {
            return f.write_str(self.raw_legacy_value.as_deref().unwrap_or("Special"));
        }
        let (one, many) = self.unit.words();
        match self.per_level {
            Some(step) => {
                write!(f, "{} {}/", format_number(step), one)?;
                match self.level_divisor {
                    Some(div) if div != 1.0 => write!(f, "{} levels", format_number(div)),
                    _ => f.write_str("level"),
                }
            }
            None => {
                let n = self.base_value.unwrap_or(1.0);
                let word = if n == 1.0 { one } else { many };
                write!(f, "{} {}", format_number(n), word)
            }
        }
    }
}
