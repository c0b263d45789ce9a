use grimoire_canonical::spec::{
    MagicResistanceKind, MagicResistanceSpec, MrAppliesTo, MrPartial, MrPartialScope,
};
use regex::Regex;
use std::sync::OnceLock;

use super::strip;

fn applies_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\s*\((whole spell|harmful effects only|beneficial effects only|dm)\)$")
            .expect("invalid regex")
    })
}

fn partial_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^partial(?:\s*\((?:parts:\s*([^)]*)|([a-z -]+))\))?$").expect("invalid regex")
    })
}

fn scope(words: &str) -> Option<MrPartialScope> {
    let scope = match words.trim() {
        "damage only" | "damage" => MrPartialScope::DamageOnly,
        "non-damage only" | "non-damage" => MrPartialScope::NonDamageOnly,
        "primary effect only" | "primary effect" => MrPartialScope::PrimaryEffectOnly,
        "secondary effects only" | "secondary effects" => MrPartialScope::SecondaryEffectsOnly,
        _ => return None,
    };
    Some(scope)
}

fn partial(rest: &str) -> Option<MagicResistanceSpec> {
    let caps = partial_pattern().captures(rest)?;
    let partial = if let Some(ids) = caps.get(1) {
        let part_ids: Vec<String> = ids
            .as_str()
            .split(',')
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if part_ids.is_empty() {
            return None;
        }
        Some(MrPartial {
            scope: MrPartialScope::ByPartId,
            part_ids,
        })
    } else if let Some(words) = caps.get(2) {
        Some(MrPartial {
            scope: scope(words.as_str())?,
            part_ids: Vec::new(),
        })
    } else {
        None
    };
    Some(MagicResistanceSpec {
        partial,
        ..MagicResistanceSpec::of_kind(MagicResistanceKind::Partial)
    })
}

/// Parses legacy magic-resistance text. Unrecognized rules become the
/// special variant with the text kept as the rule.
pub fn parse_magic_resistance(text: &str) -> MagicResistanceSpec {
    let mut rest = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    let applies_to = strip(applies_pattern(), &mut rest).map(|word| match word.as_str() {
        "harmful effects only" => MrAppliesTo::HarmfulEffectsOnly,
        "beneficial effects only" => MrAppliesTo::BeneficialEffectsOnly,
        "dm" => MrAppliesTo::Dm,
        _ => MrAppliesTo::WholeSpell,
    });
    let rest = rest.trim().trim_end_matches('.');

    let mut spec = match rest {
        "" | "unknown" | "?" if applies_to.is_none() => {
            MagicResistanceSpec::of_kind(MagicResistanceKind::Unknown)
        }
        "yes" | "y" | "normal" | "standard" => {
            MagicResistanceSpec::of_kind(MagicResistanceKind::Normal)
        }
        "no" | "n" | "none" | "0" | "ignores mr" => {
            MagicResistanceSpec::of_kind(MagicResistanceKind::IgnoresMr)
        }
        _ => match partial(rest) {
            Some(spec) => spec,
            None => return MagicResistanceSpec::special(text.trim()),
        },
    };
    spec.applies_to = applies_to;
    spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_answers() {
        assert_eq!(parse_magic_resistance("Yes").kind, MagicResistanceKind::Normal);
        assert_eq!(parse_magic_resistance("no").kind, MagicResistanceKind::IgnoresMr);
        assert_eq!(parse_magic_resistance("").kind, MagicResistanceKind::Unknown);
    }

    #[test]
    fn partial_scopes() {
        let spec = parse_magic_resistance("Partial (damage only)");
        assert_eq!(spec.partial.unwrap().scope, MrPartialScope::DamageOnly);

        let spec = parse_magic_resistance("Partial (parts: part_1, part_2)");
        let partial = spec.partial.unwrap();
        assert_eq!(partial.scope, MrPartialScope::ByPartId);
        assert_eq!(partial.part_ids, vec!["part_1".to_string(), "part_2".to_string()]);
    }

    #[test]
    fn applies_to_qualifier() {
        let spec = parse_magic_resistance("Yes (harmful effects only)");
        assert_eq!(spec.kind, MagicResistanceKind::Normal);
        assert_eq!(spec.applies_to, Some(MrAppliesTo::HarmfulEffectsOnly));
    }

    #[test]
    fn unknown_rule_is_kept() {
        let spec = parse_magic_resistance("Only vs. undead");
        assert!(spec.is_special());
        assert_eq!(spec.special_rule.as_deref(), Some("Only vs. undead"));
    }

    #[test]
    fn display_reads_back() {
        for text in ["Unknown", "No (DM)", "Partial (non-damage only)", "Partial (parts: part_2)"] {
            let spec = parse_magic_resistance(text);
            assert_eq!(parse_magic_resistance(&spec.to_string()), spec, "{}", text);
        }
    }
}
