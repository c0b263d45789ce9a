use grimoire_canonical::Scalar;
use regex::Regex;
use std::sync::OnceLock;

/// A scalar lifted out of legacy text, with the unit word it was written in.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Quantity {
    pub scalar: Scalar,
    pub unit: Option<String>,
}

const UNIT: &str = r#"(?:(?:sq|cu|square|cubic)\.?\s+)?[a-z][a-z\.]*|'|""#;
const CAP: &str = r"(?:\s*\(max\s+(?P<cap>\d+(?:\.\d+)?)[^)]*\))?";

fn fixed_or_scaling() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)^(?P<base>\d+(?:\.\d+)?)\s*(?P<bu>{u})?(?:\s*\+\s*(?P<step>\d+(?:\.\d+)?)\s*(?P<su>{u})?\s*/\s*level(?:\s+(?P<tu>{u}))?)?{c}$",
            u = UNIT,
            c = CAP
        ))
        .expect("invalid regex")
    })
}

fn per_level_only() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)^(?P<step>\d+(?:\.\d+)?)\s*(?P<su>{u})?\s*/\s*level(?:\s+(?P<tu>{u}))?{c}$",
            u = UNIT,
            c = CAP
        ))
        .expect("invalid regex")
    })
}

pub(crate) fn number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Reads `10 yd`, `5 yd/level`, `10 yd + 5 yd/level`, `1/level (max 10)`.
pub(crate) fn quantity(text: &str) -> Option<Quantity> {
    let text = text.trim();
    if let Some(caps) = fixed_or_scaling().captures(text) {
        let base = number(caps.name("base")?.as_str())?;
        let unit = ["bu", "su", "tu"]
            .iter()
            .find_map(|g| caps.name(g))
            .map(|m| m.as_str().to_lowercase());
        let mut scalar = match caps.name("step") {
            Some(step) => Scalar::scaling(base, number(step.as_str())?),
            None => Scalar::fixed(base),
        };
        scalar.cap_value = caps.name("cap").and_then(|m| number(m.as_str()));
        return Some(Quantity { scalar, unit });
    }
    let caps = per_level_only().captures(text)?;
    let step = number(caps.name("step")?.as_str())?;
    let unit = ["su", "tu"]
        .iter()
        .find_map(|g| caps.name(g))
        .map(|m| m.as_str().to_lowercase());
    let mut scalar = Scalar::per_level(step);
    scalar.cap_value = caps.name("cap").and_then(|m| number(m.as_str()));
    Some(Quantity { scalar, unit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use grimoire_canonical::ScalarMode;

    #[test]
    fn reads_fixed_values() {
        let q = quantity("60 yd").unwrap();
        assert_eq!(q.scalar, Scalar::fixed(60.0));
        assert_eq!(q.unit.as_deref(), Some("yd"));
        assert_eq!(quantity("10'").unwrap().unit.as_deref(), Some("'"));
        assert_eq!(quantity("3").unwrap().unit, None);
    }

    #[test]
    fn reads_scaling_values() {
        let q = quantity("10 yd + 5 yd/level").unwrap();
        assert_eq!(q.scalar, Scalar::scaling(10.0, 5.0));
        let q = quantity("10 + 10/level yards").unwrap();
        assert_eq!(q.unit.as_deref(), Some("yards"));
        let q = quantity("5 ft/level (max 60)").unwrap();
        assert_eq!(q.scalar.mode, ScalarMode::PerLevel);
        assert_eq!(q.scalar.cap_value, Some(60.0));
    }

    #[test]
    fn reads_area_units() {
        assert_eq!(quantity("100 sq ft").unwrap().unit.as_deref(), Some("sq ft"));
        assert_eq!(quantity("1000 cu. yd").unwrap().unit.as_deref(), Some("cu. yd"));
    }

    #[test]
    fn rejects_prose() {
        assert!(quantity("a long way").is_none());
        assert!(quantity("10 yd or so").is_none());
    }
}
