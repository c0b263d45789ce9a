use grimoire_canonical::spec::{DurationKind, DurationSpec, DurationUnit};
use grimoire_canonical::Scalar;
use regex::Regex;
use std::sync::OnceLock;

use super::quantity::{number, quantity};

fn usage_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^(\d+(?:\.\d+)?)\s*(/\s*level\s*)?(?:uses?|charges?|activations?|strikes?|discharges?)(\s*/\s*level)?$",
        )
        .expect("invalid regex")
    })
}

fn or_until_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^(.+?)\s+or\s+until\s+(.+)$").expect("invalid regex"))
}

fn wrapped_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(until triggered|planar)(?:\s*\((.+)\))?$").expect("invalid regex")
    })
}

fn until_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^until\s+(.+)$").expect("invalid regex"))
}

pub(crate) fn duration_unit(word: &str) -> Option<DurationUnit> {
    let unit = match word.trim_end_matches('.') {
        "segment" | "segments" | "seg" | "segs" => DurationUnit::Segment,
        "round" | "rounds" | "rd" | "rds" | "rnd" | "rnds" => DurationUnit::Round,
        "turn" | "turns" | "tn" => DurationUnit::Turn,
        "minute" | "minutes" | "min" | "mins" => DurationUnit::Minute,
        "hour" | "hours" | "hr" | "hrs" => DurationUnit::Hour,
        "day" | "days" => DurationUnit::Day,
        "week" | "weeks" | "wk" | "wks" => DurationUnit::Week,
        "month" | "months" | "mo" => DurationUnit::Month,
        "year" | "years" | "yr" | "yrs" => DurationUnit::Year,
        _ => return None,
    };
    Some(unit)
}

fn time_span(text: &str) -> Option<(Scalar, DurationUnit)> {
    let q = quantity(text)?;
    let unit = duration_unit(&q.unit?.to_lowercase())?;
    Some((q.scalar, unit))
}

/// Parses legacy duration text. Unrecognized text degrades to the special
/// variant carrying the input verbatim.
pub fn parse_duration(text: &str) -> DurationSpec {
    let trimmed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let lower = trimmed.to_lowercase();
    let kind = match lower.trim_end_matches('.') {
        "" => return DurationSpec::special(text),
        "instantaneous" | "instant" | "inst" => Some(DurationKind::Instant),
        "permanent" | "perm" => Some(DurationKind::Permanent),
        "concentration" => Some(DurationKind::Concentration),
        "until dispelled" | "permanent until dispelled" => Some(DurationKind::UntilDispelled),
        _ => None,
    };
    if let Some(kind) = kind {
        return DurationSpec::of_kind(kind);
    }

    if let Some(caps) = wrapped_pattern().captures(&trimmed) {
        let kind = if caps[1].eq_ignore_ascii_case("planar") {
            DurationKind::Planar
        } else {
            DurationKind::UntilTriggered
        };
        return DurationSpec {
            condition: caps.get(2).map(|m| m.as_str().trim().to_string()),
            ..DurationSpec::of_kind(kind)
        };
    }

    if let Some(caps) = usage_pattern().captures(&trimmed) {
        let Some(n) = number(&caps[1]) else {
            return DurationSpec::special(text);
        };
        let per_level = caps.get(2).is_some() || caps.get(3).is_some();
        return DurationSpec {
            uses: Some(if per_level { Scalar::per_level(n) } else { Scalar::fixed(n) }),
            ..DurationSpec::of_kind(DurationKind::UsageLimited)
        };
    }

    if let Some(caps) = or_until_pattern().captures(&trimmed) {
        if let Some((scalar, unit)) = time_span(&caps[1]) {
            return DurationSpec {
                condition: Some(caps[2].trim().to_string()),
                ..DurationSpec::time(scalar, unit)
            };
        }
    }

    if let Some((scalar, unit)) = time_span(&trimmed) {
        return DurationSpec::time(scalar, unit);
    }

    if let Some(caps) = until_pattern().captures(&trimmed) {
        return DurationSpec {
            condition: Some(caps[1].to_string()),
            ..DurationSpec::of_kind(DurationKind::Conditional)
        };
    }

    DurationSpec::special(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keywords() {
        assert_eq!(parse_duration("Instantaneous").kind, DurationKind::Instant);
        assert_eq!(parse_duration("Perm.").kind, DurationKind::Permanent);
        assert_eq!(parse_duration("until dispelled").kind, DurationKind::UntilDispelled);
    }

    #[test]
    fn time_spans() {
        assert_eq!(
            parse_duration("10 rounds"),
            DurationSpec::time(Scalar::fixed(10.0), DurationUnit::Round)
        );
        assert_eq!(
            parse_duration("1 rd./level"),
            DurationSpec::time(Scalar::per_level(1.0), DurationUnit::Round)
        );
        assert_eq!(
            parse_duration("1 turn + 1 turn/level").duration,
            Some(Scalar::scaling(1.0, 1.0))
        );
    }

    #[test]
    fn conditional_phrasing() {
        let spec = parse_duration("1 round/level or until discharged");
        assert_eq!(spec.kind, DurationKind::Time);
        assert_eq!(spec.condition.as_deref(), Some("discharged"));

        let spec = parse_duration("Until the Sun Rises");
        assert_eq!(spec.kind, DurationKind::Conditional);
        assert_eq!(spec.condition.as_deref(), Some("the Sun Rises"));

        let spec = parse_duration("Until triggered (a creature enters)");
        assert_eq!(spec.kind, DurationKind::UntilTriggered);
        assert_eq!(spec.condition.as_deref(), Some("a creature enters"));
    }

    #[test]
    fn usage_limits() {
        let spec = parse_duration("3 charges");
        assert_eq!(spec.kind, DurationKind::UsageLimited);
        assert_eq!(spec.uses, Some(Scalar::fixed(3.0)));
        assert_eq!(parse_duration("1 use/level").uses, Some(Scalar::per_level(1.0)));
    }

    #[test]
    fn unknown_text_is_preserved() {
        let spec = parse_duration("As long as the caster sings");
        assert!(spec.is_special());
        assert_eq!(spec.raw_legacy_value.as_deref(), Some("As long as the caster sings"));
    }

    #[test]
    fn display_reads_back() {
        for text in [
            "10 rounds",
            "1 round/level or until discharged",
            "Until the sun rises",
            "Planar (Prime)",
            "2 uses",
            "1 use/level",
            "1 hour",
        ] {
            let spec = parse_duration(text);
            assert_eq!(parse_duration(&spec.to_string()), spec, "{}", text);
        }
    }
}
