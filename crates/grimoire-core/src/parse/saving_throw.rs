use grimoire_canonical::spec::{SaveOutcome, SaveType, SavingThrowSpec, SingleSave};
use regex::Regex;
use std::sync::OnceLock;

fn save_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^(partial \(non-damage\)|partial|negates|neg\.?|1/2|½|half|full effect|special)(?:\s+vs\.?\s+([a-z/ ]+?))?(?:\s+at\s+([+-]\d+))?$",
        )
        .expect("invalid regex")
    })
}

fn conjunction_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\s+(?:and|or|then)\s+").expect("invalid regex"))
}

fn outcome(word: &str) -> Option<SaveOutcome> {
    let outcome = match word.trim_end_matches('.') {
        "negates" | "neg" => SaveOutcome::NoEffect,
        "1/2" | "½" | "half" => SaveOutcome::ReducedEffect,
        "full effect" => SaveOutcome::FullEffect,
        "partial" => SaveOutcome::PartialDamageOnly,
        "partial (non-damage)" => SaveOutcome::PartialNonDamageOnly,
        "special" => SaveOutcome::Special,
        _ => return None,
    };
    Some(outcome)
}

pub(crate) fn save_type(word: &str) -> Option<SaveType> {
    let save = match word.trim() {
        "paralyzation/poison/death" | "paralyzation" | "poison" | "death" | "death magic" | "ppd" => {
            SaveType::ParalyzationPoisonDeath
        }
        "rod/staff/wand" | "rod" | "staff" | "wand" | "rsw" => SaveType::RodStaffWand,
        "petrification/polymorph" | "petrification" | "polymorph" | "pp" => {
            SaveType::PetrificationPolymorph
        }
        "breath weapon" | "breath" => SaveType::BreathWeapon,
        "spell" | "spells" => SaveType::Spell,
        "special" => SaveType::Special,
        _ => return None,
    };
    Some(save)
}

fn single(segment: &str) -> Option<SingleSave> {
    let lowered = segment.trim().to_lowercase();
    let caps = save_pattern().captures(&lowered)?;
    let on_success = outcome(caps.get(1)?.as_str())?;
    let kind = match caps.get(2) {
        Some(m) => save_type(m.as_str())?,
        None => SaveType::Spell,
    };
    let modifier = match caps.get(3) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    Some(SingleSave {
        modifier,
        ..SingleSave::new(kind, on_success)
    })
}

fn all(segments: &[&str]) -> Option<Vec<SingleSave>> {
    segments.iter().map(|s| single(s)).collect()
}

/// Parses legacy saving-throw text. Anything that does not resolve to
/// standard save categories becomes DM-adjudicated guidance.
pub fn parse_saving_throw(text: &str) -> SavingThrowSpec {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let lowered = collapsed.to_lowercase();
    match lowered.as_str() {
        "" => return SavingThrowSpec::dm_adjudicated(text),
        "none" | "no" | "n/a" | "-" => return SavingThrowSpec::none(),
        "special" => return SavingThrowSpec::dm_adjudicated(text),
        _ => {}
    }

    let segments: Vec<&str> = collapsed.split(';').map(str::trim).collect();
    let saves = all(&segments).or_else(|| {
        // "Neg. and 1/2" style compounds, only when no category is named.
        if segments.len() != 1 || lowered.contains(" vs") {
            return None;
        }
        let pieces: Vec<&str> = conjunction_pattern().split(&collapsed).collect();
        if pieces.len() < 2 {
            return None;
        }
        all(&pieces)
    });

    match saves {
        Some(mut saves) if saves.len() == 1 => SavingThrowSpec::single(saves.remove(0)),
        Some(saves) if !saves.is_empty() => SavingThrowSpec::multiple(saves),
        _ => SavingThrowSpec::dm_adjudicated(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grimoire_canonical::spec::SavingThrowKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn common_forms() {
        let spec = parse_saving_throw("Neg.");
        assert_eq!(spec.kind, SavingThrowKind::Single);
        assert_eq!(spec.single.unwrap().on_success, SaveOutcome::NoEffect);

        let spec = parse_saving_throw("½");
        assert_eq!(spec.single.unwrap().on_success, SaveOutcome::ReducedEffect);

        assert_eq!(parse_saving_throw("None").kind, SavingThrowKind::None);
    }

    #[test]
    fn category_and_modifier() {
        let save = parse_saving_throw("Negates vs. breath weapon at -2").single.unwrap();
        assert_eq!(save.save_type, SaveType::BreathWeapon);
        assert_eq!(save.modifier, -2);
    }

    #[test]
    fn compound_saves() {
        let spec = parse_saving_throw("Neg. and 1/2");
        assert_eq!(spec.kind, SavingThrowKind::Multiple);
        assert_eq!(spec.multiple.len(), 2);

        let spec = parse_saving_throw("1/2; Negates vs. paralyzation/poison/death");
        assert_eq!(spec.multiple[1].save_type, SaveType::ParalyzationPoisonDeath);
    }

    #[test]
    fn unreadable_text_becomes_guidance() {
        let spec = parse_saving_throw("See below");
        assert!(spec.is_special());
        assert_eq!(spec.dm_guidance.as_deref(), Some("See below"));

        let spec = parse_saving_throw("Negates vs. dragons");
        assert_eq!(spec.kind, SavingThrowKind::DmAdjudicated);
    }

    #[test]
    fn display_reads_back() {
        for text in ["Negates", "1/2 vs. rod/staff/wand at +1", "Partial (non-damage); Negates", "None"] {
            let spec = parse_saving_throw(text);
            assert_eq!(parse_saving_throw(&spec.to_string()), spec, "{}", text);
        }
    }
}
