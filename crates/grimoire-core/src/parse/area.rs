use grimoire_canonical::spec::{AreaKind, AreaSpec, AreaUnit, CountSubject, TileUnit};
use grimoire_canonical::Scalar;
use regex::Regex;
use std::sync::OnceLock;

use super::quantity::{number, quantity};

const UNIT: &str = r#"sq\.?\s*ft\.?|sq\.?\s*yd\.?|square\s+feet|square\s+yards|cu\.?\s*ft\.?|cu\.?\s*yd\.?|cubic\s+feet|cubic\s+yards|feet|foot|ft\.?|yards?|yds?\.?|miles?|mi\.?|inch(?:es)?|in\.?|'|""#;

fn dim() -> String {
    format!(
        r"\d+(?:\.\d+)?\s*(?:{u})?(?:\s*\+\s*\d+(?:\.\d+)?\s*(?:{u})?\s*/\s*level)?(?:\s*/\s*level)?(?:\s*\(max\s+\d+(?:\.\d+)?[^)]*\))?",
        u = UNIT
    )
}

struct Shapes {
    cylinder: Regex,
    sphere: Regex,
    circle: Regex,
    diameter: Regex,
    cone: Regex,
    line: Regex,
    wall: Regex,
    cube: Regex,
    rect: Regex,
    tiles: Regex,
    count: Regex,
}

fn shapes() -> &'static Shapes {
    static SHAPES: OnceLock<Shapes> = OnceLock::new();
    SHAPES.get_or_init(|| {
        let d = dim();
        let build = |pattern: String| Regex::new(&pattern).expect("invalid regex");
        Shapes {
            cylinder: build(format!(r"^({d})\s+radius\s+cylinder,?\s+({d})\s+(?:high|tall)$")),
            sphere: build(format!(r"^({d})\s+(?:radius\s+)?sphere$")),
            circle: build(format!(r"^({d})\s+(?:radius(?:\s+circle)?|circle)$")),
            diameter: build(format!(r"^({d})\s+diameter(?:\s+circle)?$")),
            cone: build(format!(r"^({d})\s+cone(?:\s*\((\d+(?:\.\d+)?)\s*degrees?\))?$")),
            line: build(format!(r"^({d})\s+line(?:,\s*({d})\s+wide)?$")),
            wall: build(format!(r"^({d})\s+wall(?:,\s*({d})\s+high)?(?:,\s*({d})\s+thick)?$")),
            cube: build(format!(r"^({d})\s+cube$")),
            rect: build(format!(r"^({d})\s*(?:x|by|×)\s*({d})(?:\s*(?:x|by|×)\s*({d}))?$")),
            tiles: build(r"^(\d+(?:\.\d+)?)(\s*/\s*level)?\s+(squares?|hex(?:es)?|rooms?|floors?)$".into()),
            count: build(
                r"^(?:up to\s+)?(\d+(?:\.\d+)?)(\s*/\s*level)?\s+(creatures?|targets?|undead|ally|allies|enemy|enemies|objects?|structures?)(\s*/\s*level)?$"
                    .into(),
            ),
        }
    })
}

fn hyphenated() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d)\s*-\s*([a-z])").expect("invalid regex"))
}

pub(crate) fn area_unit(word: &str) -> Option<AreaUnit> {
    let folded: String = word
        .chars()
        .filter(|c| c.is_ascii_alphabetic() || *c == '\'' || *c == '"')
        .collect();
    let unit = match folded.as_str() {
        "ft" | "feet" | "foot" | "'" => AreaUnit::Ft,
        "yd" | "yds" | "yard" | "yards" => AreaUnit::Yd,
        "mi" | "mile" | "miles" => AreaUnit::Mi,
        "in" | "inch" | "inches" | "\"" => AreaUnit::Inch,
        "sqft" | "squarefeet" => AreaUnit::Ft2,
        "sqyd" | "squareyards" => AreaUnit::Yd2,
        "cuft" | "cubicfeet" => AreaUnit::Ft3,
        "cuyd" | "cubicyards" => AreaUnit::Yd3,
        _ => return None,
    };
    Some(unit)
}

/// Reads each captured dimension, returning the scalars and the first unit
/// any of them names. `None` when a dimension or unit is unreadable.
fn dimensions(caps: &regex::Captures<'_>, groups: &[usize]) -> Option<(Vec<Option<Scalar>>, Option<AreaUnit>)> {
    let mut unit = None;
    let mut out = Vec::with_capacity(groups.len());
    for idx in groups {
        match caps.get(*idx) {
            Some(m) => {
                let q = quantity(m.as_str())?;
                if let Some(word) = q.unit {
                    let parsed = area_unit(&word)?;
                    unit.get_or_insert(parsed);
                }
                out.push(Some(q.scalar));
            }
            None => out.push(None),
        }
    }
    Some((out, unit))
}

fn count(n: &str, per_level: bool) -> Option<Scalar> {
    let n = number(n)?;
    Some(if per_level { Scalar::per_level(n) } else { Scalar::fixed(n) })
}

fn parse_shape(text: &str) -> Option<AreaSpec> {
    let s = shapes();
    if let Some(caps) = s.cylinder.captures(text) {
        let (d, unit) = dimensions(&caps, &[1, 2])?;
        return Some(AreaSpec {
            radius: d[0].clone(),
            height: d[1].clone(),
            ..AreaSpec::shape(AreaKind::Cylinder, unit)
        });
    }
    if let Some(caps) = s.sphere.captures(text) {
        let (d, unit) = dimensions(&caps, &[1])?;
        return Some(AreaSpec {
            radius: d[0].clone(),
            ..AreaSpec::shape(AreaKind::RadiusSphere, unit)
        });
    }
    if let Some(caps) = s.circle.captures(text) {
        let (d, unit) = dimensions(&caps, &[1])?;
        return Some(AreaSpec {
            radius: d[0].clone(),
            ..AreaSpec::shape(AreaKind::RadiusCircle, unit)
        });
    }
    if let Some(caps) = s.diameter.captures(text) {
        let (d, unit) = dimensions(&caps, &[1])?;
        return Some(AreaSpec {
            diameter: d[0].clone(),
            ..AreaSpec::shape(AreaKind::RadiusCircle, unit)
        });
    }
    if let Some(caps) = s.cone.captures(text) {
        let (d, unit) = dimensions(&caps, &[1])?;
        return Some(AreaSpec {
            length: d[0].clone(),
            angle_deg: caps.get(2).and_then(|m| number(m.as_str())),
            ..AreaSpec::shape(AreaKind::Cone, unit)
        });
    }
    if let Some(caps) = s.line.captures(text) {
        let (d, unit) = dimensions(&caps, &[1, 2])?;
        return Some(AreaSpec {
            length: d[0].clone(),
            width: d[1].clone(),
            ..AreaSpec::shape(AreaKind::Line, unit)
        });
    }
    if let Some(caps) = s.wall.captures(text) {
        let (d, unit) = dimensions(&caps, &[1, 2, 3])?;
        return Some(AreaSpec {
            length: d[0].clone(),
            height: d[1].clone(),
            thickness: d[2].clone(),
            ..AreaSpec::shape(AreaKind::Wall, unit)
        });
    }
    if let Some(caps) = s.cube.captures(text) {
        let (d, unit) = dimensions(&caps, &[1])?;
        return Some(AreaSpec {
            edge: d[0].clone(),
            ..AreaSpec::shape(AreaKind::Cube, unit)
        });
    }
    if let Some(caps) = s.rect.captures(text) {
        let (d, unit) = dimensions(&caps, &[1, 2, 3])?;
        let kind = if d[2].is_some() { AreaKind::RectPrism } else { AreaKind::Rect };
        return Some(AreaSpec {
            length: d[0].clone(),
            width: d[1].clone(),
            height: d[2].clone(),
            ..AreaSpec::shape(kind, unit)
        });
    }
    if let Some(caps) = s.tiles.captures(text) {
        let tile = match caps[3].trim_end_matches('s') {
            "square" => TileUnit::Square,
            "hex" | "hexe" => TileUnit::Hex,
            "room" => TileUnit::Room,
            _ => TileUnit::Floor,
        };
        return Some(AreaSpec {
            tile_unit: Some(tile),
            tile_count: Some(count(&caps[1], caps.get(2).is_some())?),
            ..AreaSpec::shape(AreaKind::Tiles, None)
        });
    }
    if let Some(caps) = s.count.captures(text) {
        let per_level = caps.get(2).is_some() || caps.get(4).is_some();
        let (kind, subject) = match &caps[3] {
            "undead" => (AreaKind::Creatures, CountSubject::Undead),
            "ally" | "allies" => (AreaKind::Creatures, CountSubject::Ally),
            "enemy" | "enemies" => (AreaKind::Creatures, CountSubject::Enemy),
            "object" | "objects" => (AreaKind::Objects, CountSubject::Object),
            "structure" | "structures" => (AreaKind::Objects, CountSubject::Structure),
            _ => (AreaKind::Creatures, CountSubject::Creature),
        };
        return Some(AreaSpec {
            count: Some(count(&caps[1], per_level)?),
            count_subject: Some(subject),
            ..AreaSpec::shape(kind, None)
        });
    }
    let q = quantity(text)?;
    let unit = area_unit(&q.unit?)?;
    match unit {
        AreaUnit::Ft3 | AreaUnit::Yd3 => Some(AreaSpec {
            volume: Some(q.scalar),
            ..AreaSpec::shape(AreaKind::Volume, Some(unit))
        }),
        AreaUnit::Ft2 | AreaUnit::Yd2 => Some(AreaSpec {
            surface_area: Some(q.scalar),
            ..AreaSpec::shape(AreaKind::Surface, Some(unit))
        }),
        _ => None,
    }
}

/// Parses legacy area-of-effect text. Unrecognized text degrades to the
/// special variant carrying the input verbatim.
pub fn parse_area(text: &str) -> AreaSpec {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    let normalized = hyphenated().replace_all(&normalized, "${1} ${2}");
    let keyword = match &*normalized {
        "" => return AreaSpec::special(text),
        "point" => Some(AreaKind::Point),
        "region" => Some(AreaKind::Region),
        "scope" => Some(AreaKind::Scope),
        _ => None,
    };
    if let Some(kind) = keyword {
        return AreaSpec::shape(kind, None);
    }
    parse_shape(&normalized).unwrap_or_else(|| AreaSpec::special(text))
}
