use crate::scalar::Scalar;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Range category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeKind {
    /// Caster only.
    Personal,
    /// Touch.
    Touch,
    /// A measured distance.
    Distance,
    /// A measured distance that also needs line of sight.
    DistanceLos,
    /// A measured distance that also needs line of effect.
    DistanceLoe,
    /// Line of sight.
    Los,
    /// Line of effect.
    Loe,
    /// Sight.
    Sight,
    /// Hearing.
    Hearing,
    /// Voice.
    Voice,
    /// Any sense.
    Senses,
    /// Same room.
    SameRoom,
    /// Same structure.
    SameStructure,
    /// Same dungeon level.
    SameDungeonLevel,
    /// Wilderness.
    Wilderness,
    /// Same plane.
    SamePlane,
    /// Across planes.
    Interplanar,
    /// Anywhere on the current plane.
    AnywhereOnPlane,
    /// Caster's domain.
    Domain,
    /// Unlimited.
    Unlimited,
    /// Unparsed legacy text.
    #[default]
    Special,
}

/// Distance unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeUnit {
    /// Feet.
    Ft,
    /// Yards.
    Yd,
    /// Miles.
    Mi,
    /// Inches (tabletop scale).
    Inch,
}

impl RangeUnit {
    /// Short label used in display text.
    pub fn label(self) -> &'static str {
        match self {
            RangeUnit::Ft => "ft",
            RangeUnit::Yd => "yd",
            RangeUnit::Mi => "mi",
            RangeUnit::Inch => "inch",
        }
    }
}

/// Visibility requirement attached to a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeRequirement {
    /// Line of sight.
    Los,
    /// Line of effect.
    Loe,
}

/// What the range is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeAnchor {
    /// The caster.
    Caster,
    /// The target.
    Target,
    /// An object.
    Object,
    /// A fixed point.
    Fixed,
}

/// Region bounding a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionUnit {
    /// A structure.
    Structure,
    /// A building.
    Building,
    /// A bridge.
    Bridge,
    /// A ship.
    Ship,
    /// A fortress.
    Fortress,
    /// A region.
    Region,
    /// A domain.
    Domain,
    /// A demiplane.
    Demiplane,
    /// A plane.
    Plane,
}

impl RegionUnit {
    /// Lower-case word used in display text.
    pub fn label(self) -> &'static str {
        match self {
            RegionUnit::Structure => "structure",
            RegionUnit::Building => "building",
            RegionUnit::Bridge => "bridge",
            RegionUnit::Ship => "ship",
            RegionUnit::Fortress => "fortress",
            RegionUnit::Region => "region",
            RegionUnit::Domain => "domain",
            RegionUnit::Demiplane => "demiplane",
            RegionUnit::Plane => "plane",
        }
    }
}

/// Structured range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeSpec {
    /// Range category.
    pub kind: RangeKind,
    /// Editor-entered display text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Distance unit, for distance kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<RangeUnit>,
    /// Distance, for distance kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<Scalar>,
    /// Visibility requirements (unordered).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<RangeRequirement>,
    /// Anchor point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<RangeAnchor>,
    /// Bounding region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_unit: Option<RegionUnit>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Original text when the range could not be parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_legacy_value: Option<String>,
}

impl RangeSpec {
    /// Fallback variant preserving `text`.
    pub fn special(text: impl Into<String>) -> Self {
        Self {
            kind: RangeKind::Special,
            raw_legacy_value: Some(text.into()),
            ..Default::default()
        }
    }

    /// Keyword-only range of the given kind.
    pub fn keyword(kind: RangeKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// Measured distance.
    pub fn distance(distance: Scalar, unit: RangeUnit) -> Self {
        Self {
            kind: RangeKind::Distance,
            unit: Some(unit),
            distance: Some(distance),
            ..Default::default()
        }
    }

    /// Whether this is the fallback variant.
    pub fn is_special(&self) -> bool {
        self.kind == RangeKind::Special
    }
}

impl fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match self.kind {
            RangeKind::Special => {
                return f.write_str(self.raw_legacy_value.as_deref().unwrap_or("Special"));
            }
            RangeKind::Distance | RangeKind::DistanceLos | RangeKind::DistanceLoe => {
                let unit = self.unit.map(RangeUnit::label).unwrap_or("");
                let mut text = self
                    .distance
                    .as_ref()
                    .map(|d| d.describe(unit))
                    .unwrap_or_default();
                match self.kind {
                    RangeKind::DistanceLos => text.push_str(" (LOS)"),
                    RangeKind::DistanceLoe => text.push_str(" (LOE)"),
                    _ => {}
                }
                text
            }
            RangeKind::Personal => "Personal".into(),
            RangeKind::Touch => "Touch".into(),
            RangeKind::Los => "Line of sight".into(),
            RangeKind::Loe => "Line of effect".into(),
            RangeKind::Sight => "Sight".into(),
            RangeKind::Hearing => "Hearing".into(),
            RangeKind::Voice => "Voice".into(),
            RangeKind::Senses => "Senses".into(),
            RangeKind::SameRoom => "Same room".into(),
            RangeKind::SameStructure => "Same structure".into(),
            RangeKind::SameDungeonLevel => "Same dungeon level".into(),
            RangeKind::Wilderness => "Wilderness".into(),
            RangeKind::SamePlane => "Same plane".into(),
            RangeKind::Interplanar => "Interplanar".into(),
            RangeKind::AnywhereOnPlane => "Anywhere on plane".into(),
            RangeKind::Domain => "Domain".into(),
            RangeKind::Unlimited => "Unlimited".into(),
        };
        f.write_str(&body)?;
        if let Some(anchor) = self.anchor {
            let word = match anchor {
                RangeAnchor::Caster => "caster",
                RangeAnchor::Target => "target",
                RangeAnchor::Object => "object",
                RangeAnchor::Fixed => "fixed",
            };
            write!(f, " from {}", word)?;
        }
        if let Some(region) = self.region_unit {
            write!(f, " ({})", region.label())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_displays_original_text() {
        let spec = RangeSpec::special("Special (DM discretion)");
        assert_eq!(spec.to_string(), "Special (DM discretion)");
        assert!(spec.is_special());
    }

    #[test]
    fn distance_display_includes_qualifier() {
        let mut spec = RangeSpec::distance(Scalar::fixed(60.0), RangeUnit::Yd);
        spec.kind = RangeKind::DistanceLos;
        spec.requires = vec![RangeRequirement::Los];
        assert_eq!(spec.to_string(), "60 yd (LOS)");
    }

    #[test]
    fn serializes_snake_case_tokens() {
        let spec = RangeSpec::keyword(RangeKind::SameDungeonLevel);
        assert_eq!(
            serde_json::to_string(&spec).unwrap(),
            r#"{"kind":"same_dungeon_level"}"#
        );
    }

    #[test]
    fn text_is_kept_alongside_kind() {
        let spec: RangeSpec =
            serde_json::from_str(r#"{"kind":"touch","text":"Touch (see below)"}"#).unwrap();
        assert_eq!(spec.text.as_deref(), Some("Touch (see below)"));
        assert_eq!(spec.to_string(), "Touch");
    }
}
