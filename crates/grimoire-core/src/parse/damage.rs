use grimoire_canonical::spec::{
    CombineMode, DamagePart, DamageSave, DamageType, DicePool, DiceTerm, LevelBand,
    MrInteraction, ScalingDriver, ScalingKind, ScalingRule, SpellDamageSpec,
};
use regex::Regex;
use std::sync::OnceLock;

struct Patterns {
    label: Regex,
    trailing_paren: Regex,
    per_levels: Regex,
    per_level: Regex,
    legacy_max: Regex,
    dice_scaling: Regex,
    flat_scaling: Regex,
    bands: Regex,
    band: Regex,
    pool_term: Regex,
    flat: Regex,
    max_total: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let build = |pattern: &str| Regex::new(pattern).expect("invalid regex");
        Patterns {
            label: build(r"^([A-Za-z][A-Za-z '\-]*?):\s+(.+)$"),
            trailing_paren: build(r"\s*\(([^()]*)\)$"),
            per_levels: build(r"\s*per\s+(\d+)\s+(levels?|spell levels?|hd)\b"),
            per_level: build(r"\s*(?:per|/)\s*(?:caster\s+)?(level|spell level|hd|lvl)\b"),
            legacy_max: build(r",?\s*\(?max(?:imum)?\s+(?:of\s+)?(\d+d\d+|[+-]?\d+)\)?$"),
            dice_scaling: build(
                r"^(\d+)d(\d+)(?:([+-]\d+)/die)?/(?:(\d+)\s+)?(spell level|level|hd)s?(?:\s*\(max\s+(\d+)d(\d+)\))?$",
            ),
            flat_scaling: build(
                r"^([+-]?\d+)/(?:(\d+)\s+)?(spell level|level|hd)s?(?:\s*\(max\s+([+-]?\d+)\))?$",
            ),
            bands: build(r"^by\s+(spell level|level|hd)\s+\[(.+)\]$"),
            band: build(r"^(\d+)\s*-\s*(\d+):\s*(.+)$"),
            pool_term: build(r"^(\d+)d(\d+)(?:([+-]\d+)/die)?([+-]\d+)?$"),
            flat: build(r"^([+-]?\d+)$"),
            max_total: build(r"^max total (\d+)$"),
        }
    })
}

fn driver(word: &str) -> ScalingDriver {
    match word {
        "spell level" => ScalingDriver::SpellLevel,
        "hd" => ScalingDriver::TargetHd,
        _ => ScalingDriver::CasterLevel,
    }
}

fn save_words(text: &str) -> Option<DamageSave> {
    let save = match text {
        "half save" | "save half" | "save for half" | "1/2 save" | "half" => DamageSave::Half,
        "save negates" | "negates" | "neg" | "neg." => DamageSave::Negates,
        "no save" => DamageSave::None,
        "partial save" | "partial" => DamageSave::Partial,
        "special save" => DamageSave::Special,
        _ => return None,
    };
    Some(save)
}

fn mr_words(text: &str) -> Option<MrInteraction> {
    let mr = match text {
        "mr applies" => MrInteraction::Normal,
        "ignores mr" | "no mr" => MrInteraction::IgnoresMr,
        "special mr" => MrInteraction::Special,
        "mr unknown" => MrInteraction::Unknown,
        _ => return None,
    };
    Some(mr)
}

fn damage_type_suffix(body: &str) -> Option<(DamageType, usize)> {
    let aliases = [("lightning", DamageType::Electricity)];
    DamageType::ALL
        .iter()
        .map(|t| (t.label(), *t))
        .chain(aliases)
        .filter(|(label, _)| body.ends_with(label))
        .map(|(label, t)| (t, body.len() - label.len()))
        .find(|(_, at)| *at > 0 && body[..*at].ends_with(' '))
}

/// Splits on ` + ` outside brackets and parentheses.
fn split_terms(body: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    let chars: Vec<char> = body.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            _ => {}
        }
        if depth == 0 && c == '+' && i > 0 && chars[i - 1] == ' ' && chars.get(i + 1) == Some(&' ') {
            out.push(current.trim().to_string());
            current.clear();
            i += 2;
            continue;
        }
        current.push(c);
        i += 1;
    }
    out.push(current.trim().to_string());
    out.retain(|t| !t.is_empty());
    out
}

fn int<T: std::str::FromStr>(text: &str) -> Option<T> {
    text.trim_start_matches('+').parse().ok()
}

fn dice(caps: &regex::Captures<'_>) -> Option<DiceTerm> {
    Some(DiceTerm {
        count: int(&caps[1])?,
        sides: int(&caps[2])?,
        per_die_modifier: match caps.get(3) {
            Some(m) => int(m.as_str())?,
            None => 0,
        },
    })
}

fn add_to_pool(pool: &mut DicePool, term: &str) -> Option<()> {
    let p = patterns();
    if let Some(caps) = p.pool_term.captures(term) {
        pool.terms.push(dice(&caps)?);
        if let Some(flat) = caps.get(4) {
            pool.flat_modifier += int::<i32>(flat.as_str())?;
        }
        return Some(());
    }
    let caps = p.flat.captures(term)?;
    pool.flat_modifier += int::<i32>(&caps[1])?;
    Some(())
}

fn parse_pool(text: &str) -> Option<DicePool> {
    let mut pool = DicePool::default();
    for term in split_terms(text) {
        add_to_pool(&mut pool, &term)?;
    }
    (!pool.is_empty()).then_some(pool)
}

fn scaling_rule(chunk: &str) -> Option<ScalingRule> {
    let p = patterns();
    if let Some(caps) = p.dice_scaling.captures(chunk) {
        let term = dice(&caps)?;
        let step = caps.get(4).map(|m| int::<u32>(m.as_str())).unwrap_or(Some(1))?;
        let max_steps = match (caps.get(6), caps.get(7)) {
            (Some(total), Some(sides)) => {
                let (total, sides) = (int::<u32>(total.as_str())?, int::<u32>(sides.as_str())?);
                (sides == term.sides && term.count > 0).then(|| total / term.count)
            }
            _ => None,
        };
        return Some(ScalingRule {
            max_steps,
            ..ScalingRule::per_level_dice(term, driver(&caps[5]), step.max(1))
        });
    }
    if let Some(caps) = p.flat_scaling.captures(chunk) {
        let flat: i32 = int(&caps[1])?;
        let step = caps.get(2).map(|m| int::<u32>(m.as_str())).unwrap_or(Some(1))?;
        let max_steps = match caps.get(4) {
            Some(total) if flat != 0 => Some((int::<i32>(total.as_str())? / flat).unsigned_abs()),
            _ => None,
        };
        return Some(ScalingRule {
            kind: ScalingKind::PerLevel,
            driver: driver(&caps[3]),
            step: step.max(1),
            max_steps,
            flat_increment: Some(flat),
            ..Default::default()
        });
    }
    let caps = p.bands.captures(chunk)?;
    let mut level_bands = Vec::new();
    for item in caps[2].split(',') {
        let band = p.band.captures(item.trim())?;
        level_bands.push(LevelBand {
            min: int(&band[1])?,
            max: int(&band[2])?,
            base: parse_pool(&band[3])?,
        });
    }
    Some(ScalingRule {
        kind: ScalingKind::LevelBands,
        driver: driver(&caps[1]),
        step: 1,
        level_bands,
        ..Default::default()
    })
}

fn parse_part(segment: &str, index: usize) -> Option<DamagePart> {
    let p = patterns();
    let mut part = DamagePart {
        id: format!("part_{}", index + 1),
        ..Default::default()
    };
    let mut body = segment.trim().to_string();
    if let Some(caps) = p.label.captures(&body) {
        if !caps[1].chars().any(|c| c.is_ascii_digit()) {
            part.label = Some(caps[1].trim().to_string());
            body = caps[2].to_string();
        }
    }
    let mut body = body.to_lowercase();
    if let Some(stripped) = body.strip_suffix(" damage") {
        body = stripped.to_string();
    }

    let mut typed = false;
    loop {
        if let Some(caps) = p.trailing_paren.captures(&body) {
            let inner = caps[1].trim().to_string();
            let start = caps.get(0).map(|m| m.start()).unwrap_or(body.len());
            let consumed = if let Some(save) = save_words(&inner) {
                part.save.get_or_insert(save);
                true
            } else if let Some(mr) = mr_words(&inner) {
                part.mr_interaction.get_or_insert(mr);
                true
            } else if let Some(total) = p.max_total.captures(&inner) {
                part.clamp_total = int(&total[1]);
                true
            } else {
                false
            };
            if consumed {
                body.truncate(start);
                continue;
            }
        }
        if !typed {
            if let Some((damage_type, at)) = damage_type_suffix(&body) {
                part.damage_type = damage_type;
                body.truncate(at);
                body = body.trim_end().to_string();
                typed = true;
                continue;
            }
        }
        break;
    }

    let body = p.per_levels.replace_all(&body, "/$1 $2");
    let body = p.per_level.replace_all(&body, "/$1").replace("/lvl", "/level");
    let body = p.legacy_max.replace(&body, " (max $1)").trim().to_string();

    for chunk in split_terms(&body) {
        if let Some(rule) = scaling_rule(&chunk) {
            part.scaling.push(rule);
        } else {
            add_to_pool(&mut part.base, &chunk)?;
        }
    }
    (!part.base.is_empty() || !part.scaling.is_empty()).then_some(part)
}

/// Parses legacy damage text into modeled parts.
///
/// Parts are separated by `;`; a leading `Max of:`, `Choose one:` or
/// `In sequence:` sets the combine mode. Text that does not read as dice
/// degrades to the guidance variant carrying the input verbatim.
pub fn parse_damage(text: &str) -> SpellDamageSpec {
    let trimmed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let lower = trimmed.to_lowercase();
    if matches!(lower.as_str(), "none" | "-" | "n/a") {
        return SpellDamageSpec::default();
    }
    if lower.is_empty() {
        return SpellDamageSpec::dm_adjudicated(text);
    }

    let prefixes = [
        ("max of:", CombineMode::Max),
        ("choose one:", CombineMode::ChooseOne),
        ("in sequence:", CombineMode::Sequence),
    ];
    let (mode, rest) = prefixes
        .iter()
        .find(|(prefix, _)| lower.starts_with(prefix))
        .map(|(prefix, mode)| (*mode, trimmed.get(prefix.len()..).unwrap_or("").trim()))
        .unwrap_or((CombineMode::Sum, trimmed.as_str()));

    let parts: Option<Vec<DamagePart>> = rest
        .split(';')
        .filter(|s| !s.trim().is_empty())
        .enumerate()
        .map(|(idx, segment)| parse_part(segment, idx))
        .collect();
    match parts {
        Some(parts) if !parts.is_empty() => SpellDamageSpec::modeled(mode, parts),
        _ => SpellDamageSpec::dm_adjudicated(text),
    }
}
