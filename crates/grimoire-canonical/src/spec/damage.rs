use super::magic_resistance::{MagicResistanceKind, MagicResistanceSpec};
use super::saving_throw::{SaveOutcome, SavingThrowKind, SavingThrowSpec};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Damage category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageKind {
    /// Deals no damage.
    #[default]
    None,
    /// Modeled as dice parts.
    Modeled,
    /// Left to the referee; see `dm_guidance`.
    DmAdjudicated,
}

/// How the parts of a modeled damage spec combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineMode {
    /// All parts add up.
    #[default]
    Sum,
    /// The highest part applies.
    Max,
    /// The caster picks one part.
    ChooseOne,
    /// Parts resolve in listed order.
    Sequence,
}

impl CombineMode {
    fn prefix(self) -> &'static str {
        match self {
            CombineMode::Sum => "",
            CombineMode::Max => "Max of: ",
            CombineMode::ChooseOne => "Choose one: ",
            CombineMode::Sequence => "In sequence: ",
        }
    }
}

/// Damage type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    /// Acid.
    Acid,
    /// Cold.
    Cold,
    /// Electricity.
    Electricity,
    /// Fire.
    Fire,
    /// Sonic.
    Sonic,
    /// Force.
    Force,
    /// Raw magic.
    Magic,
    /// Negative energy.
    NegativeEnergy,
    /// Positive energy.
    PositiveEnergy,
    /// Poison.
    Poison,
    /// Psychic.
    Psychic,
    /// Bludgeoning.
    Bludgeoning,
    /// Piercing.
    Piercing,
    /// Slashing.
    Slashing,
    /// No type.
    #[default]
    Untyped,
    /// Anything else.
    Special,
}

impl DamageType {
    /// Every type, in declaration order.
    pub const ALL: [DamageType; 16] = [
        DamageType::Acid,
        DamageType::Cold,
        DamageType::Electricity,
        DamageType::Fire,
        DamageType::Sonic,
        DamageType::Force,
        DamageType::Magic,
        DamageType::NegativeEnergy,
        DamageType::PositiveEnergy,
        DamageType::Poison,
        DamageType::Psychic,
        DamageType::Bludgeoning,
        DamageType::Piercing,
        DamageType::Slashing,
        DamageType::Untyped,
        DamageType::Special,
    ];

    /// Lower-case words used in display text.
    pub fn label(self) -> &'static str {
        match self {
            DamageType::Acid => "acid",
            DamageType::Cold => "cold",
            DamageType::Electricity => "electricity",
            DamageType::Fire => "fire",
            DamageType::Sonic => "sonic",
            DamageType::Force => "force",
            DamageType::Magic => "magic",
            DamageType::NegativeEnergy => "negative energy",
            DamageType::PositiveEnergy => "positive energy",
            DamageType::Poison => "poison",
            DamageType::Psychic => "psychic",
            DamageType::Bludgeoning => "bludgeoning",
            DamageType::Piercing => "piercing",
            DamageType::Slashing => "slashing",
            DamageType::Untyped => "untyped",
            DamageType::Special => "special",
        }
    }
}

/// `count`d`sides`, optionally with a per-die modifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceTerm {
    /// Number of dice.
    pub count: u32,
    /// Faces per die.
    pub sides: u32,
    /// Added to every die rolled.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub per_die_modifier: i32,
}

impl DiceTerm {
    /// `count`d`sides` with no modifier.
    pub fn new(count: u32, sides: u32) -> Self {
        Self {
            count,
            sides,
            per_die_modifier: 0,
        }
    }
}

impl fmt::Display for DiceTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        if self.per_die_modifier != 0 {
            write!(f, "{:+}/die", self.per_die_modifier)?;
        }
        Ok(())
    }
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}

/// Sum of dice terms plus a flat modifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DicePool {
    /// Dice terms.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub terms: Vec<DiceTerm>,
    /// Flat modifier.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub flat_modifier: i32,
}

impl DicePool {
    /// Whether the pool rolls nothing and adds nothing.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.flat_modifier == 0
    }
}

impl fmt::Display for DicePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = self.terms.iter().map(|t| t.to_string()).collect();
        f.write_str(&terms.join(" + "))?;
        if self.flat_modifier != 0 {
            if terms.is_empty() {
                write!(f, "{}", self.flat_modifier)?;
            } else {
                write!(f, "{:+}", self.flat_modifier)?;
            }
        }
        Ok(())
    }
}

/// Scaling rule category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingKind {
    /// Adds dice or a flat amount every `step` levels.
    #[default]
    PerLevel,
    /// Replaces the base pool by level band.
    LevelBands,
}

/// What the scaling step counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingDriver {
    /// Caster level.
    #[default]
    CasterLevel,
    /// Spell level.
    SpellLevel,
    /// Target hit dice.
    TargetHd,
}

impl ScalingDriver {
    fn word(self) -> &'static str {
        match self {
            ScalingDriver::CasterLevel => "level",
            ScalingDriver::SpellLevel => "spell level",
            ScalingDriver::TargetHd => "hd",
        }
    }
}

/// Inclusive level range with its own base pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelBand {
    /// Lowest level.
    pub min: u32,
    /// Highest level.
    pub max: u32,
    /// Pool used inside the band.
    pub base: DicePool,
}

fn default_step() -> u32 {
    1
}

/// How a damage part grows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingRule {
    /// Category.
    pub kind: ScalingKind,
    /// What the step counts.
    #[serde(default)]
    pub driver: ScalingDriver,
    /// Driver units per increment.
    #[serde(default = "default_step")]
    pub step: u32,
    /// Upper bound on the number of increments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,
    /// Dice added per increment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dice_increment: Option<DiceTerm>,
    /// Flat amount added per increment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flat_increment: Option<i32>,
    /// Bands, for `level_bands`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub level_bands: Vec<LevelBand>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ScalingRule {
    /// Dice added every `step` units of `driver`.
    pub fn per_level_dice(dice: DiceTerm, driver: ScalingDriver, step: u32) -> Self {
        Self {
            kind: ScalingKind::PerLevel,
            driver,
            step,
            dice_increment: Some(dice),
            ..Default::default()
        }
    }

    /// Number of increments earned at `level`, honoring `max_steps`.
    pub fn steps_at(&self, level: u32) -> u32 {
        let steps = level / self.step.max(1);
        match self.max_steps {
            Some(max) => steps.min(max),
            None => steps,
        }
    }
}

impl fmt::Display for ScalingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == ScalingKind::LevelBands {
            let bands: Vec<String> = self
                .level_bands
                .iter()
                .map(|b| format!("{}-{}: {}", b.min, b.max, b.base))
                .collect();
            return write!(f, "by {} [{}]", self.driver.word(), bands.join(", "));
        }
        match (&self.dice_increment, self.flat_increment) {
            (Some(dice), _) => write!(f, "{}", dice)?,
            (None, Some(flat)) => write!(f, "{}", flat)?,
            (None, None) => f.write_str("0")?,
        }
        if self.step > 1 {
            write!(f, "/{} {}s", self.step, self.driver.word())?;
        } else {
            write!(f, "/{}", self.driver.word())?;
        }
        if let Some(max) = self.max_steps {
            match (&self.dice_increment, self.flat_increment) {
                (Some(dice), _) => write!(f, " (max {}d{})", dice.count * max, dice.sides)?,
                (None, Some(flat)) => write!(f, " (max {:+})", flat * max as i32)?,
                (None, None) => {}
            }
        }
        Ok(())
    }
}

/// Effect of a saving throw on one damage part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageSave {
    /// No save.
    None,
    /// Half damage on a save.
    Half,
    /// No damage on a save.
    Negates,
    /// Reduced damage on a save.
    Partial,
    /// Referee decides.
    Special,
}

impl DamageSave {
    fn words(self) -> &'static str {
        match self {
            DamageSave::None => "no save",
            DamageSave::Half => "half save",
            DamageSave::Negates => "save negates",
            DamageSave::Partial => "partial save",
            DamageSave::Special => "special save",
        }
    }
}

/// How magic resistance treats one damage part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MrInteraction {
    /// Magic resistance applies.
    Normal,
    /// Magic resistance does not apply.
    IgnoresMr,
    /// Part-specific rule.
    Special,
    /// Not recorded.
    Unknown,
}

impl MrInteraction {
    fn words(self) -> &'static str {
        match self {
            MrInteraction::Normal => "MR applies",
            MrInteraction::IgnoresMr => "ignores MR",
            MrInteraction::Special => "special MR",
            MrInteraction::Unknown => "MR unknown",
        }
    }
}

/// One damage component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DamagePart {
    /// Stable lower-case identifier.
    pub id: String,
    /// Short label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Damage type.
    #[serde(default)]
    pub damage_type: DamageType,
    /// Base pool before scaling.
    #[serde(default)]
    pub base: DicePool,
    /// Scaling rules.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scaling: Vec<ScalingRule>,
    /// Upper bound on the rolled total.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clamp_total: Option<u32>,
    /// Part-level save override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save: Option<DamageSave>,
    /// Part-level magic resistance override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mr_interaction: Option<MrInteraction>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl DamagePart {
    /// Part with a base pool and no scaling or overrides.
    pub fn new(id: impl Into<String>, damage_type: DamageType, base: DicePool) -> Self {
        Self {
            id: id.into(),
            damage_type,
            base,
            ..Default::default()
        }
    }
}

impl fmt::Display for DamagePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.label {
            write!(f, "{}: ", label)?;
        }
        let base = self.base.to_string();
        f.write_str(&base)?;
        for rule in &self.scaling {
            if base.is_empty() {
                write!(f, "{}", rule)?;
            } else {
                write!(f, " + {}", rule)?;
            }
        }
        if let Some(clamp) = self.clamp_total {
            write!(f, " (max total {})", clamp)?;
        }
        if self.damage_type != DamageType::Untyped {
            write!(f, " {}", self.damage_type.label())?;
        }
        if let Some(save) = self.save {
            write!(f, " ({})", save.words())?;
        }
        if let Some(mr) = self.mr_interaction {
            write!(f, " ({})", mr.words())?;
        }
        Ok(())
    }
}

/// Structured damage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpellDamageSpec {
    /// Category.
    pub kind: DamageKind,
    /// How parts combine.
    #[serde(default)]
    pub combine_mode: CombineMode,
    /// Parts, for `modeled`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<DamagePart>,
    /// Referee guidance; holds the legacy text on fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dm_guidance: Option<String>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SpellDamageSpec {
    /// Guidance fallback preserving `text`.
    pub fn dm_adjudicated(text: impl Into<String>) -> Self {
        Self {
            kind: DamageKind::DmAdjudicated,
            dm_guidance: Some(text.into()),
            ..Default::default()
        }
    }

    /// Modeled damage from `parts`.
    pub fn modeled(combine_mode: CombineMode, parts: Vec<DamagePart>) -> Self {
        Self {
            kind: DamageKind::Modeled,
            combine_mode,
            parts,
            ..Default::default()
        }
    }

    /// Whether this is the guidance fallback.
    pub fn is_special(&self) -> bool {
        self.kind == DamageKind::DmAdjudicated
    }
}

impl fmt::Display for SpellDamageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DamageKind::None => f.write_str("None"),
            DamageKind::DmAdjudicated => {
                f.write_str(self.dm_guidance.as_deref().unwrap_or("Special"))
            }
            DamageKind::Modeled => {
                let parts: Vec<String> = self.parts.iter().map(|p| p.to_string()).collect();
                write!(f, "{}{}", self.combine_mode.prefix(), parts.join("; "))
            }
        }
    }
}

fn save_from_outcome(outcome: SaveOutcome) -> DamageSave {
    match outcome {
        SaveOutcome::NoEffect => DamageSave::Negates,
        SaveOutcome::ReducedEffect => DamageSave::Half,
        SaveOutcome::PartialDamageOnly | SaveOutcome::PartialNonDamageOnly => DamageSave::Partial,
        SaveOutcome::FullEffect => DamageSave::None,
        SaveOutcome::Special => DamageSave::Special,
    }
}

/// Save that governs `part`.
///
/// The record-level saving throw is authoritative for the spell; a part's
/// own `save` overrides it for that part only.
pub fn effective_save(part: &DamagePart, record: Option<&SavingThrowSpec>) -> DamageSave {
    if let Some(save) = part.save {
        return save;
    }
    let Some(record) = record else {
        return DamageSave::None;
    };
    match record.kind {
        SavingThrowKind::None => DamageSave::None,
        SavingThrowKind::DmAdjudicated => DamageSave::Special,
        SavingThrowKind::Single => record
            .single
            .as_ref()
            .map(|s| save_from_outcome(s.on_success))
            .unwrap_or(DamageSave::None),
        SavingThrowKind::Multiple => record
            .multiple
            .first()
            .map(|s| save_from_outcome(s.on_success))
            .unwrap_or(DamageSave::None),
    }
}

/// Magic resistance treatment of `part`.
///
/// Same precedence as [`effective_save`]: `mr_interaction` on the part
/// wins, otherwise the record-level spec decides.
pub fn effective_mr(part: &DamagePart, record: Option<&MagicResistanceSpec>) -> MrInteraction {
    if let Some(mr) = part.mr_interaction {
        return mr;
    }
    let Some(record) = record else {
        return MrInteraction::Unknown;
    };
    match record.covers_part(&part.id) {
        Some(true) => MrInteraction::Normal,
        Some(false) => MrInteraction::IgnoresMr,
        None if record.kind == MagicResistanceKind::Special => MrInteraction::Special,
        None => MrInteraction::Unknown,
    }
}
