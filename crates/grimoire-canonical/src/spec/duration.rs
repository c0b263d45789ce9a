use crate::scalar::{format_number, Scalar, ScalarMode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Duration category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationKind {
    /// Instantaneous.
    Instant,
    /// A measured time span.
    Time,
    /// As long as the caster concentrates.
    Concentration,
    /// Until a stated condition is met.
    Conditional,
    /// Permanent.
    Permanent,
    /// Until dispelled.
    UntilDispelled,
    /// Until triggered.
    UntilTriggered,
    /// A number of uses or charges.
    UsageLimited,
    /// Tied to planar presence.
    Planar,
    /// Unparsed legacy text.
    #[default]
    Special,
}

/// Time unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    /// Segment (1/10 round).
    Segment,
    /// Round.
    Round,
    /// Turn.
    Turn,
    /// Minute.
    Minute,
    /// Hour.
    Hour,
    /// Day.
    Day,
    /// Week.
    Week,
    /// Month.
    Month,
    /// Year.
    Year,
}

impl DurationUnit {
    /// Singular label.
    pub fn label(self) -> &'static str {
        match self {
            DurationUnit::Segment => "segment",
            DurationUnit::Round => "round",
            DurationUnit::Turn => "turn",
            DurationUnit::Minute => "minute",
            DurationUnit::Hour => "hour",
            DurationUnit::Day => "day",
            DurationUnit::Week => "week",
            DurationUnit::Month => "month",
            DurationUnit::Year => "year",
        }
    }
}

/// Structured duration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DurationSpec {
    /// Duration category.
    pub kind: DurationKind,
    /// Unit for `time` durations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<DurationUnit>,
    /// Length for `time` durations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<Scalar>,
    /// Ending condition, free text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Number of uses for `usage_limited`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<Scalar>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Original text when the duration could not be parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_legacy_value: Option<String>,
}

impl DurationSpec {
    /// Fallback variant preserving `text`.
    pub fn special(text: impl Into<String>) -> Self {
        Self {
            kind: DurationKind::Special,
            raw_legacy_value: Some(text.into()),
            ..Default::default()
        }
    }

    /// A bare kind with no sub-fields.
    pub fn of_kind(kind: DurationKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// A measured time span.
    pub fn time(duration: Scalar, unit: DurationUnit) -> Self {
        Self {
            kind: DurationKind::Time,
            unit: Some(unit),
            duration: Some(duration),
            ..Default::default()
        }
    }

    /// Whether this is the fallback variant.
    pub fn is_special(&self) -> bool {
        self.kind == DurationKind::Special
    }
}

fn unit_text(scalar: &Scalar, unit: DurationUnit) -> String {
    let label = unit.label();
    let plural = scalar.mode == ScalarMode::Fixed && scalar.value.unwrap_or(0.0) != 1.0;
    if plural {
        format!("{}s", label)
    } else {
        label.to_string()
    }
}

impl fmt::Display for DurationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DurationKind::Special => f.write_str(self.raw_legacy_value.as_deref().unwrap_or("Special")),
            DurationKind::Instant => f.write_str("Instantaneous"),
            DurationKind::Permanent => f.write_str("Permanent"),
            DurationKind::Concentration => f.write_str("Concentration"),
            DurationKind::UntilDispelled => f.write_str("Until dispelled"),
            DurationKind::UntilTriggered => match &self.condition {
                Some(cond) => write!(f, "Until triggered ({})", cond),
                None => f.write_str("Until triggered"),
            },
            DurationKind::Planar => match &self.condition {
                Some(cond) => write!(f, "Planar ({})", cond),
                None => f.write_str("Planar"),
            },
            DurationKind::Conditional => {
                write!(f, "Until {}", self.condition.as_deref().unwrap_or("ended"))
            }
            DurationKind::UsageLimited => {
                let uses = self.uses.clone().unwrap_or_else(|| Scalar::fixed(1.0));
                match uses.mode {
                    ScalarMode::Fixed => {
                        let n = uses.value.unwrap_or(1.0);
                        let word = if n == 1.0 { "use" } else { "uses" };
                        write!(f, "{} {}", format_number(n), word)
                    }
                    ScalarMode::PerLevel => {
                        write!(f, "{} use/level", format_number(uses.per_level.unwrap_or(1.0)))
                    }
                }
            }
            DurationKind::Time => {
                let scalar = self.duration.clone().unwrap_or_default();
                let text = match self.unit {
                    Some(unit) => scalar.describe(&unit_text(&scalar, unit)),
                    None => scalar.describe(""),
                };
                f.write_str(&text)?;
                if let Some(cond) = &self.condition {
                    write!(f, " or until {}", cond)?;
                }
                Ok(())
            }
        }
    }
}
