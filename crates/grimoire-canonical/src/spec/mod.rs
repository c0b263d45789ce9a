//! Structured shapes for every free-text field kind.
//!
//! Each kind is a closed set of tagged variants carrying only its own
//! sub-fields, plus a `special` variant that keeps the legacy text.
//! `Display` renders text that the matching parser reads back to an
//! equivalent value.

mod area;
mod casting_time;
mod components;
mod damage;
mod duration;
mod magic_resistance;
mod range;
mod saving_throw;

pub use area::{AreaKind, AreaSpec, AreaUnit, CountSubject, TileUnit};
pub use casting_time::{CastingTime, CastingTimeUnit};
pub use components::{MaterialComponent, SpellComponents};
pub use damage::{
    effective_mr, effective_save, CombineMode, DamageKind, DamagePart, DamageSave, DamageType,
    DicePool, DiceTerm, LevelBand, MrInteraction, ScalingDriver, ScalingKind, ScalingRule,
    SpellDamageSpec,
};
pub use duration::{DurationKind, DurationSpec, DurationUnit};
pub use magic_resistance::{
    MagicResistanceKind, MagicResistanceSpec, MrAppliesTo, MrPartial, MrPartialScope,
};
pub use range::{RangeAnchor, RangeKind, RangeRequirement, RangeSpec, RangeUnit, RegionUnit};
pub use saving_throw::{SaveOutcome, SaveType, SavingThrowKind, SavingThrowSpec, SingleSave};

