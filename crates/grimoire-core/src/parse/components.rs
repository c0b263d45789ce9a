use grimoire_canonical::spec::{MaterialComponent, SpellComponents};
use regex::Regex;
use std::sync::OnceLock;

/// Flags plus any material components named in a parenthetical.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentsParse {
    /// Verbal / somatic / material flags.
    pub components: SpellComponents,
    /// Materials read from the text, in order of appearance.
    pub materials: Vec<MaterialComponent>,
}

fn gp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)[,;]?\s*(?:worth\s+)?(?:at\s+least\s+)?(\d+(?:,\d{3})*(?:\.\d+)?)\s*gp\.?")
            .expect("invalid regex")
    })
}

fn consumed_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)[,;]?\s*(?:which\s+is\s+)?\b(consumed|expended|destroyed)\b")
            .expect("invalid regex")
    })
}

/// Reads one material description such as `"pearl worth 100 gp, consumed"`.
pub fn parse_material(text: &str) -> MaterialComponent {
    let mut rest = text.trim().to_string();
    let gp_match = gp_pattern().captures(&rest).and_then(|caps| {
        let value = caps.get(1)?.as_str().replace(',', "").parse::<f64>().ok()?;
        let whole = caps.get(0)?.range();
        Some((value, whole))
    });
    let gp_value = gp_match.map(|(value, whole)| {
        rest.replace_range(whole, "");
        value
    });
    let consumed_match = consumed_pattern().captures(&rest).and_then(|caps| {
        let whole = caps.get(0)?.range();
        Some(whole)
    });
    let is_consumed = consumed_match.map(|whole| {
        rest.replace_range(whole, "");
        true
    });
    let name = rest.trim().trim_matches(|c: char| c == ',' || c == ';' || c == '.').trim();
    let name = if name.is_empty() { text.trim() } else { name };

    MaterialComponent {
        gp_value,
        is_consumed,
        ..MaterialComponent::named(name)
    }
    .lean()
}

/// Parses a components line such as `"V, S, M (bat guano)"`.
pub fn parse_components(text: &str) -> ComponentsParse {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let (letters, paren) = match collapsed.find('(') {
        Some(open) => {
            let inner = collapsed[open + 1..].trim_end();
            let inner = inner.strip_suffix(')').unwrap_or(inner);
            (collapsed[..open].trim(), Some(inner.trim()))
        }
        None => (collapsed.as_str(), None),
    };

    let lowered = letters.to_lowercase();
    if matches!(lowered.as_str(), "none" | "-" | "") && paren.is_none() {
        return ComponentsParse::default();
    }

    let mut components = SpellComponents::default();
    for token in lowered
        .split(|c: char| c == ',' || c == '/' || c == '+' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        match token.trim_end_matches('.') {
            "v" | "verbal" => components.verbal = true,
            "s" | "somatic" => components.somatic = true,
            "m" | "material" => components.material = true,
            "vs" => {
                components.verbal = true;
                components.somatic = true;
            }
            "vsm" => {
                components.verbal = true;
                components.somatic = true;
                components.material = true;
            }
            _ => return special(text),
        }
    }

    let materials = match paren {
        Some(inner) if components.material && !inner.is_empty() => inner
            .split(';')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(parse_material)
            .collect(),
        Some(_) => return special(text),
        None => Vec::new(),
    };
    ComponentsParse {
        components,
        materials,
    }
}

fn special(text: &str) -> ComponentsParse {
    ComponentsParse {
        components: SpellComponents::special(text.trim()),
        materials: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn letters() {
        let parsed = parse_components("V, S, M");
        assert_eq!(parsed.components, SpellComponents::new(true, true, true));
        assert!(parsed.materials.is_empty());

        assert_eq!(parse_components("None").components, SpellComponents::default());
        assert_eq!(parse_components("Verbal, Somatic").components, SpellComponents::new(true, true, false));
    }

    #[test]
    fn parenthetical_materials() {
        let parsed = parse_components("V, S, M (a pearl worth 100 gp, consumed; bat guano)");
        assert_eq!(parsed.materials.len(), 2);
        assert_eq!(parsed.materials[0].name, "a pearl");
        assert_eq!(parsed.materials[0].gp_value, Some(100.0));
        assert_eq!(parsed.materials[0].is_consumed, Some(true));
        assert_eq!(parsed.materials[1], MaterialComponent::named("bat guano"));
    }

    #[test]
    fn unknown_tokens_keep_the_text() {
        let parsed = parse_components("V, S, DF");
        assert!(parsed.components.is_special());
        assert_eq!(parsed.components.raw_legacy_value.as_deref(), Some("V, S, DF"));

        let parsed = parse_components("V (shouted)");
        assert!(parsed.components.is_special());
    }

    #[test]
    fn material_value_with_thousands() {
        let material = parse_material("diamond dust worth 1,000 gp");
        assert_eq!(material.name, "diamond dust");
        assert_eq!(material.gp_value, Some(1000.0));
        assert_eq!(material.is_consumed, None);
    }
}
