use grimoire_canonical::spec::{RangeAnchor, RangeKind, RangeRequirement, RangeSpec, RangeUnit, RegionUnit};
use regex::Regex;
use std::sync::OnceLock;

use super::quantity::quantity;
use super::strip;

fn anchor_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\s*(?:from|centered on)\s+(caster|target|object|fixed|self|point of impact)\b")
            .expect("invalid regex")
    })
}

fn region_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\s*\((structure|building|bridge|ship|fortress|region|domain|demiplane|plane)\)",
        )
        .expect("invalid regex")
    })
}

fn los_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\s*(?:\(los\)|\(line of sight\)|line of sight)").expect("invalid regex")
    })
}

fn loe_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\s*(?:\(loe\)|\(line of effect\)|line of effect)").expect("invalid regex")
    })
}

pub(crate) fn range_unit(word: &str) -> Option<RangeUnit> {
    match word.trim_end_matches('.') {
        "ft" | "feet" | "foot" | "'" => Some(RangeUnit::Ft),
        "yd" | "yds" | "yard" | "yards" => Some(RangeUnit::Yd),
        "mi" | "mile" | "miles" => Some(RangeUnit::Mi),
        "in" | "inch" | "inches" | "\"" => Some(RangeUnit::Inch),
        _ => None,
    }
}

fn keyword(text: &str) -> Option<RangeKind> {
    let kind = match text {
        "personal" | "self" | "caster" | "0" => RangeKind::Personal,
        "touch" => RangeKind::Touch,
        "sight" => RangeKind::Sight,
        "hearing" => RangeKind::Hearing,
        "voice" => RangeKind::Voice,
        "senses" => RangeKind::Senses,
        "same room" => RangeKind::SameRoom,
        "same structure" => RangeKind::SameStructure,
        "same dungeon level" => RangeKind::SameDungeonLevel,
        "wilderness" => RangeKind::Wilderness,
        "same plane" => RangeKind::SamePlane,
        "interplanar" => RangeKind::Interplanar,
        "anywhere on plane" | "anywhere on the same plane" => RangeKind::AnywhereOnPlane,
        "domain" => RangeKind::Domain,
        "unlimited" => RangeKind::Unlimited,
        _ => return None,
    };
    Some(kind)
}

/// Parses legacy range text. Unrecognized text degrades to the special
/// variant carrying the input verbatim.
pub fn parse_range(text: &str) -> RangeSpec {
    let mut rest = text.trim().to_lowercase();
    if rest.is_empty() {
        return RangeSpec::special(text);
    }

    let anchor = strip(anchor_pattern(), &mut rest).map(|word| match word.as_str() {
        "caster" | "self" => RangeAnchor::Caster,
        "target" => RangeAnchor::Target,
        "object" => RangeAnchor::Object,
        _ => RangeAnchor::Fixed,
    });
    let region_unit = strip(region_pattern(), &mut rest).and_then(|word| region(&word));
    let requires = if strip(los_pattern(), &mut rest).is_some() {
        Some(RangeRequirement::Los)
    } else if strip(loe_pattern(), &mut rest).is_some() {
        Some(RangeRequirement::Loe)
    } else {
        None
    };
    let rest = rest.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut spec = if rest.is_empty() {
        match requires {
            Some(RangeRequirement::Los) => RangeSpec::keyword(RangeKind::Los),
            Some(RangeRequirement::Loe) => RangeSpec::keyword(RangeKind::Loe),
            None => return RangeSpec::special(text),
        }
    } else if let Some(kind) = keyword(&rest) {
        RangeSpec::keyword(kind)
    } else if let Some(q) = quantity(&rest) {
        let unit = match q.unit.as_deref() {
            Some(word) => match range_unit(word) {
                Some(unit) => Some(unit),
                None => return RangeSpec::special(text),
            },
            None => None,
        };
        let kind = match requires {
            Some(RangeRequirement::Los) => RangeKind::DistanceLos,
            Some(RangeRequirement::Loe) => RangeKind::DistanceLoe,
            None => RangeKind::Distance,
        };
        RangeSpec {
            kind,
            unit,
            distance: Some(q.scalar),
            ..Default::default()
        }
    } else {
        return RangeSpec::special(text);
    };
    spec.requires = requires.into_iter().collect();
    spec.anchor = anchor;
    spec.region_unit = region_unit;
    spec
}

fn region(word: &str) -> Option<RegionUnit> {
    let unit = match word {
        "structure" => RegionUnit::Structure,
        "building" => RegionUnit::Building,
        "bridge" => RegionUnit::Bridge,
        "ship" => RegionUnit::Ship,
        "fortress" => RegionUnit::Fortress,
        "region" => RegionUnit::Region,
        "domain" => RegionUnit::Domain,
        "demiplane" => RegionUnit::Demiplane,
        "plane" => RegionUnit::Plane,
        _ => return None,
    };
    Some(unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grimoire_canonical::Scalar;
    use pretty_assertions::assert_eq;

    #[test]
    fn keywords() {
        assert_eq!(parse_range("Touch").kind, RangeKind::Touch);
        assert_eq!(parse_range("0").kind, RangeKind::Personal);
        assert_eq!(parse_range("Same dungeon level").kind, RangeKind::SameDungeonLevel);
    }

    #[test]
    fn fixed_and_scaling_distances() {
        let spec = parse_range("60 yds.");
        assert_eq!(spec, RangeSpec::distance(Scalar::fixed(60.0), RangeUnit::Yd));

        let spec = parse_range("10 yds. + 10 yds./level");
        assert_eq!(spec.distance, Some(Scalar::scaling(10.0, 10.0)));
        assert_eq!(spec.unit, Some(RangeUnit::Yd));
    }

    #[test]
    fn line_of_sight_qualifier() {
        let spec = parse_range("60 yd (LOS)");
        assert_eq!(spec.kind, RangeKind::DistanceLos);
        assert_eq!(spec.requires, vec![RangeRequirement::Los]);

        let bare = parse_range("Line of Sight");
        assert_eq!(bare.kind, RangeKind::Los);
    }

    #[test]
    fn anchor_and_region() {
        let spec = parse_range("30 ft from target (building)");
        assert_eq!(spec.anchor, Some(RangeAnchor::Target));
        assert_eq!(spec.region_unit, Some(RegionUnit::Building));
        assert_eq!(spec.to_string(), "30 ft from target (building)");
    }

    #[test]
    fn unknown_text_is_preserved() {
        let spec = parse_range("Special (DM discretion)");
        assert!(spec.is_special());
        assert_eq!(spec.raw_legacy_value.as_deref(), Some("Special (DM discretion)"));

        let spec = parse_range("10 leagues");
        assert_eq!(spec.raw_legacy_value.as_deref(), Some("10 leagues"));
    }

    #[test]
    fn display_reads_back() {
        for text in ["60 yd (LOS)", "10 yd + 5 yd/level", "Touch", "5 ft/level (max 60)", "Line of sight"] {
            let spec = parse_range(text);
            assert_eq!(parse_range(&spec.to_string()), spec, "{}", text);
        }
    }
}
