use serde::{Deserialize, Serialize};
use std::fmt;

/// Saving throw category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavingThrowKind {
    /// No save allowed.
    #[default]
    None,
    /// One save.
    Single,
    /// Several saves resolved in order.
    Multiple,
    /// Left to the referee; see `dm_guidance`.
    DmAdjudicated,
}

/// Save category from the five-column save table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveType {
    /// Paralyzation, poison or death magic.
    ParalyzationPoisonDeath,
    /// Rod, staff or wand.
    RodStaffWand,
    /// Petrification or polymorph.
    PetrificationPolymorph,
    /// Breath weapon.
    BreathWeapon,
    /// Spell.
    #[default]
    Spell,
    /// Anything else.
    Special,
}

impl SaveType {
    /// Label used in display text.
    pub fn label(self) -> &'static str {
        match self {
            SaveType::ParalyzationPoisonDeath => "paralyzation/poison/death",
            SaveType::RodStaffWand => "rod/staff/wand",
            SaveType::PetrificationPolymorph => "petrification/polymorph",
            SaveType::BreathWeapon => "breath weapon",
            SaveType::Spell => "spell",
            SaveType::Special => "special",
        }
    }
}

/// What happens on a given save result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    /// The spell has no effect.
    NoEffect,
    /// The effect is halved or otherwise reduced.
    ReducedEffect,
    /// The full effect applies.
    FullEffect,
    /// Only the damage portion applies.
    PartialDamageOnly,
    /// Only the non-damage portion applies.
    PartialNonDamageOnly,
    /// Referee decides.
    Special,
}

impl SaveOutcome {
    fn success_word(self) -> &'static str {
        match self {
            SaveOutcome::NoEffect => "Negates",
            SaveOutcome::ReducedEffect => "1/2",
            SaveOutcome::FullEffect => "Full effect",
            SaveOutcome::PartialDamageOnly => "Partial",
            SaveOutcome::PartialNonDamageOnly => "Partial (non-damage)",
            SaveOutcome::Special => "Special",
        }
    }
}

fn default_success() -> SaveOutcome {
    SaveOutcome::NoEffect
}

fn default_failure() -> SaveOutcome {
    SaveOutcome::FullEffect
}

/// One saving throw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleSave {
    /// Stable identifier within a multi-save sequence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Save category.
    #[serde(default)]
    pub save_type: SaveType,
    /// Modifier applied to the roll.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub modifier: i32,
    /// Who or what the save applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applies_to: Option<String>,
    /// Outcome on a successful save.
    #[serde(default = "default_success")]
    pub on_success: SaveOutcome,
    /// Outcome on a failed save.
    #[serde(default = "default_failure")]
    pub on_failure: SaveOutcome,
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}

impl SingleSave {
    /// A save of `save_type` whose success yields `on_success`.
    pub fn new(save_type: SaveType, on_success: SaveOutcome) -> Self {
        Self {
            id: None,
            save_type,
            modifier: 0,
            applies_to: None,
            on_success,
            on_failure: SaveOutcome::FullEffect,
        }
    }
}

impl fmt::Display for SingleSave {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.on_success.success_word())?;
        if self.save_type != SaveType::Spell {
            write!(f, " vs. {}", self.save_type.label())?;
        }
        if self.modifier != 0 {
            write!(f, " at {:+}", self.modifier)?;
        }
        Ok(())
    }
}

/// Structured saving throw.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavingThrowSpec {
    /// Category.
    pub kind: SavingThrowKind,
    /// The save, for `single`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single: Option<SingleSave>,
    /// The saves in resolution order, for `multiple`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub multiple: Vec<SingleSave>,
    /// Referee guidance; holds the legacy text on fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dm_guidance: Option<String>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SavingThrowSpec {
    /// Guidance fallback preserving `text`.
    pub fn dm_adjudicated(text: impl Into<String>) -> Self {
        Self {
            kind: SavingThrowKind::DmAdjudicated,
            dm_guidance: Some(text.into()),
            ..Default::default()
        }
    }

    /// No save.
    pub fn none() -> Self {
        Self::default()
    }

    /// One save.
    pub fn single(save: SingleSave) -> Self {
        Self {
            kind: SavingThrowKind::Single,
            single: Some(save),
            ..Default::default()
        }
    }

    /// Several saves in order.
    pub fn multiple(saves: Vec<SingleSave>) -> Self {
        Self {
            kind: SavingThrowKind::Multiple,
            multiple: saves,
            ..Default::default()
        }
    }

    /// Whether this is the guidance fallback.
    pub fn is_special(&self) -> bool {
        self.kind == SavingThrowKind::DmAdjudicated
    }
}

impl fmt::Display for SavingThrowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SavingThrowKind::None => f.write_str("None"),
            SavingThrowKind::DmAdjudicated => {
                f.write_str(self.dm_guidance.as_deref().unwrap_or("Special"))
            }
            SavingThrowKind::Single => match &self.single {
                Some(save) => write!(f, "{}", save),
                None => f.write_str("None"),
            },
            SavingThrowKind::Multiple => {
                let parts: Vec<String> = self.multiple.iter().map(|s| s.to_string()).collect();
                f.write_str(&parts.join("; "))
            }
        }
    }
}
