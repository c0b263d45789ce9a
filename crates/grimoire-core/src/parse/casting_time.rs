use grimoire_canonical::spec::{CastingTime, CastingTimeUnit};
use regex::Regex;
use std::sync::OnceLock;

use super::quantity::number;

fn fixed_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(\d+(?:\.\d+)?)(?:\s*([a-z][a-z\. ]*?))?$").expect("invalid regex")
    })
}

fn per_level_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(\d+(?:\.\d+)?)\s*([a-z][a-z\. ]*?)\s*/\s*(?:(\d+(?:\.\d+)?)\s+)?levels?$")
            .expect("invalid regex")
    })
}

fn unit(word: &str) -> Option<CastingTimeUnit> {
    let unit = match word.trim().trim_end_matches('.') {
        "segment" | "segments" | "seg" | "segs" => CastingTimeUnit::Segment,
        "round" | "rounds" | "rd" | "rds" => CastingTimeUnit::Round,
        "turn" | "turns" => CastingTimeUnit::Turn,
        "minute" | "minutes" | "min" | "mins" => CastingTimeUnit::Minute,
        "hour" | "hours" | "hr" | "hrs" => CastingTimeUnit::Hour,
        "action" | "actions" => CastingTimeUnit::Action,
        "bonus action" | "bonus actions" => CastingTimeUnit::BonusAction,
        "reaction" | "reactions" => CastingTimeUnit::Reaction,
        _ => return None,
    };
    Some(unit)
}

/// Parses legacy casting time text.
///
/// A bare number counts segments. Unrecognized text degrades to the special
/// variant carrying the input verbatim.
pub fn parse_casting_time(text: &str) -> CastingTime {
    let trimmed = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();

    if let Some(caps) = per_level_pattern().captures(&trimmed) {
        let (Some(step), Some(unit)) = (number(&caps[1]), unit(&caps[2])) else {
            return CastingTime::special(text);
        };
        return CastingTime {
            unit,
            per_level: Some(step),
            level_divisor: caps.get(3).and_then(|m| number(m.as_str())).filter(|d| *d != 1.0),
            ..Default::default()
        };
    }

    if let Some(caps) = fixed_pattern().captures(&trimmed) {
        let Some(n) = number(&caps[1]) else {
            return CastingTime::special(text);
        };
        let unit = match caps.get(2) {
            Some(word) => unit(word.as_str()),
            None => Some(CastingTimeUnit::Segment),
        };
        if let Some(unit) = unit {
            return CastingTime::fixed(n, unit);
        }
    }

    CastingTime::special(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn simple_units() {
        assert_eq!(parse_casting_time("3"), CastingTime::fixed(3.0, CastingTimeUnit::Segment));
        assert_eq!(parse_casting_time("1 rd."), CastingTime::fixed(1.0, CastingTimeUnit::Round));
        assert_eq!(
            parse_casting_time("1 bonus action"),
            CastingTime::fixed(1.0, CastingTimeUnit::BonusAction)
        );
    }

    #[test]
    fn per_level_times() {
        let spec = parse_casting_time("1 round/2 levels");
        assert_eq!(spec.unit, CastingTimeUnit::Round);
        assert_eq!(spec.per_level, Some(1.0));
        assert_eq!(spec.level_divisor, Some(2.0));
        assert_eq!(spec.to_string(), "1 round/2 levels");
    }

    #[test]
    fn unknown_text_is_preserved() {
        let spec = parse_casting_time("Special");
        assert!(spec.is_special());
        assert_eq!(spec.raw_legacy_value.as_deref(), Some("Special"));
        assert!(parse_casting_time("1 full moon").is_special());
    }

    #[test]
    fn display_reads_back() {
        for text in ["3", "1 round", "2 turns", "1 round/level", "1 reaction"] {
            let spec = parse_casting_time(text);
            assert_eq!(parse_casting_time(&spec.to_string()), spec, "{}", text);
        }
    }
}
