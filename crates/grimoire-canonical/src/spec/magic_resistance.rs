use serde::{Deserialize, Serialize};
use std::fmt;

/// Magic resistance category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagicResistanceKind {
    /// Not recorded.
    #[default]
    Unknown,
    /// Magic resistance applies.
    Normal,
    /// Magic resistance does not apply.
    IgnoresMr,
    /// Applies to part of the spell only.
    Partial,
    /// Spell-specific rule; see `special_rule`.
    Special,
}

/// Which effects magic resistance is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MrAppliesTo {
    /// Every effect.
    WholeSpell,
    /// Harmful effects only.
    HarmfulEffectsOnly,
    /// Beneficial effects only.
    BeneficialEffectsOnly,
    /// Referee decides.
    Dm,
}

impl MrAppliesTo {
    fn words(self) -> &'static str {
        match self {
            MrAppliesTo::WholeSpell => "whole spell",
            MrAppliesTo::HarmfulEffectsOnly => "harmful effects only",
            MrAppliesTo::BeneficialEffectsOnly => "beneficial effects only",
            MrAppliesTo::Dm => "DM",
        }
    }
}

/// Scope of a partial magic resistance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MrPartialScope {
    /// Damage only.
    DamageOnly,
    /// Non-damage effects only.
    NonDamageOnly,
    /// The primary effect only.
    PrimaryEffectOnly,
    /// Secondary effects only.
    SecondaryEffectsOnly,
    /// The damage parts listed in `part_ids`.
    ByPartId,
}

impl MrPartialScope {
    fn words(self) -> &'static str {
        match self {
            MrPartialScope::DamageOnly => "damage only",
            MrPartialScope::NonDamageOnly => "non-damage only",
            MrPartialScope::PrimaryEffectOnly => "primary effect only",
            MrPartialScope::SecondaryEffectsOnly => "secondary effects only",
            MrPartialScope::ByPartId => "parts",
        }
    }
}

/// Partial magic resistance detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MrPartial {
    /// Scope.
    pub scope: MrPartialScope,
    /// Damage part ids, for `by_part_id` (unordered).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub part_ids: Vec<String>,
}

/// Structured magic resistance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MagicResistanceSpec {
    /// Category.
    pub kind: MagicResistanceKind,
    /// Which effects are checked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applies_to: Option<MrAppliesTo>,
    /// Partial detail, for `partial`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<MrPartial>,
    /// Rule text; holds the legacy text on fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_rule: Option<String>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl MagicResistanceSpec {
    /// Fallback preserving `text`.
    pub fn special(text: impl Into<String>) -> Self {
        Self {
            kind: MagicResistanceKind::Special,
            special_rule: Some(text.into()),
            ..Default::default()
        }
    }

    /// A bare kind.
    pub fn of_kind(kind: MagicResistanceKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// Whether this is the fallback variant.
    pub fn is_special(&self) -> bool {
        self.kind == MagicResistanceKind::Special
    }

    /// Whether magic resistance is checked against damage part `part_id`.
    pub fn covers_part(&self, part_id: &str) -> Option<bool> {
        match self.kind {
            MagicResistanceKind::Normal => Some(true),
            MagicResistanceKind::IgnoresMr => Some(false),
            MagicResistanceKind::Partial => match &self.partial {
                Some(p) => match p.scope {
                    MrPartialScope::DamageOnly => Some(true),
                    MrPartialScope::NonDamageOnly => Some(false),
                    MrPartialScope::ByPartId => Some(p.part_ids.iter().any(|id| id == part_id)),
                    _ => None,
                },
                None => None,
            },
            MagicResistanceKind::Unknown | MagicResistanceKind::Special => None,
        }
    }
}

impl fmt::Display for MagicResistanceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MagicResistanceKind::Special => {
                return f.write_str(self.special_rule.as_deref().unwrap_or("Special"));
            }
            MagicResistanceKind::Unknown => f.write_str("Unknown")?,
            MagicResistanceKind::Normal => f.write_str("Yes")?,
            MagicResistanceKind::IgnoresMr => f.write_str("No")?,
            MagicResistanceKind::Partial => {
                f.write_str("Partial")?;
                if let Some(partial) = &self.partial {
                    if partial.scope == MrPartialScope::ByPartId {
                        write!(f, " (parts: {})", partial.part_ids.join(", "))?;
                    } else {
                        write!(f, " ({})", partial.scope.words())?;
                    }
                }
            }
        }
        if let Some(applies) = self.applies_to {
            if applies != MrAppliesTo::WholeSpell {
                write!(f, " ({})", applies.words())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_by_part_display() {
        let spec = MagicResistanceSpec {
            kind: MagicResistanceKind::Partial,
            partial: Some(MrPartial {
                scope: MrPartialScope::ByPartId,
                part_ids: vec!["part_1".into(), "part_2".into()],
            }),
            ..Default::default()
        };
        assert_eq!(spec.to_string(), "Partial (parts: part_1, part_2)");
        assert_eq!(spec.covers_part("part_2"), Some(true));
        assert_eq!(spec.covers_part("part_3"), Some(false));
    }

    #[test]
    fn applies_to_is_appended() {
        let mut spec = MagicResistanceSpec::of_kind(MagicResistanceKind::Normal);
        spec.applies_to = Some(MrAppliesTo::HarmfulEffectsOnly);
        assert_eq!(spec.to_string(), "Yes (harmful effects only)");
    }
}
