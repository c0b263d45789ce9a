use crate::scalar::{format_number, Scalar, ScalarMode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Area-of-effect shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaKind {
    /// Flat circle.
    RadiusCircle,
    /// Sphere.
    RadiusSphere,
    /// Cone.
    Cone,
    /// Line.
    Line,
    /// Flat rectangle.
    Rect,
    /// Rectangular prism.
    RectPrism,
    /// Cylinder.
    Cylinder,
    /// Wall.
    Wall,
    /// Cube.
    Cube,
    /// Free volume.
    Volume,
    /// Surface area.
    Surface,
    /// Grid tiles.
    Tiles,
    /// A number of creatures.
    Creatures,
    /// A number of objects.
    Objects,
    /// A named region.
    Region,
    /// A perception-bounded scope.
    Scope,
    /// A single point.
    Point,
    /// Unparsed legacy text.
    #[default]
    Special,
}

/// Dimension unit for area measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaUnit {
    /// Feet.
    Ft,
    /// Yards.
    Yd,
    /// Miles.
    Mi,
    /// Inches (tabletop scale).
    Inch,
    /// Square feet.
    Ft2,
    /// Square yards.
    Yd2,
    /// Cubic feet.
    Ft3,
    /// Cubic yards.
    Yd3,
}

impl AreaUnit {
    /// Label used in display text.
    pub fn label(self) -> &'static str {
        match self {
            AreaUnit::Ft => "ft",
            AreaUnit::Yd => "yd",
            AreaUnit::Mi => "mi",
            AreaUnit::Inch => "inch",
            AreaUnit::Ft2 => "sq ft",
            AreaUnit::Yd2 => "sq yd",
            AreaUnit::Ft3 => "cu ft",
            AreaUnit::Yd3 => "cu yd",
        }
    }
}

/// Grid tile unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileUnit {
    /// Square grid cell.
    Square,
    /// Hex grid cell.
    Hex,
    /// Room.
    Room,
    /// Floor.
    Floor,
}

impl TileUnit {
    /// Plural label used in display text.
    pub fn plural(self) -> &'static str {
        match self {
            TileUnit::Square => "squares",
            TileUnit::Hex => "hexes",
            TileUnit::Room => "rooms",
            TileUnit::Floor => "floors",
        }
    }
}

/// What a counted area counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountSubject {
    /// Creatures of any kind.
    Creature,
    /// Undead creatures.
    Undead,
    /// Allies.
    Ally,
    /// Enemies.
    Enemy,
    /// Objects.
    Object,
    /// Structures.
    Structure,
}

/// Structured area of effect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AreaSpec {
    /// Shape.
    pub kind: AreaKind,
    /// Unit shared by every linear, square or cubic dimension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<AreaUnit>,
    /// Radius.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<Scalar>,
    /// Diameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diameter: Option<Scalar>,
    /// Length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<Scalar>,
    /// Width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<Scalar>,
    /// Height.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<Scalar>,
    /// Thickness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness: Option<Scalar>,
    /// Cube edge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge: Option<Scalar>,
    /// Cone angle in degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle_deg: Option<f64>,
    /// Surface area.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface_area: Option<Scalar>,
    /// Volume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Scalar>,
    /// Tile unit for `tiles`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_unit: Option<TileUnit>,
    /// Number of tiles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_count: Option<Scalar>,
    /// Number of creatures or objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<Scalar>,
    /// What `count` counts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count_subject: Option<CountSubject>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Original text when the area could not be parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_legacy_value: Option<String>,
}

impl AreaSpec {
    /// Fallback variant preserving `text`.
    pub fn special(text: impl Into<String>) -> Self {
        Self {
            kind: AreaKind::Special,
            raw_legacy_value: Some(text.into()),
            ..Default::default()
        }
    }

    /// A shape with no dimensions set yet.
    pub fn shape(kind: AreaKind, unit: Option<AreaUnit>) -> Self {
        Self {
            kind,
            unit,
            ..Default::default()
        }
    }

    /// Whether this is the fallback variant.
    pub fn is_special(&self) -> bool {
        self.kind == AreaKind::Special
    }

    fn dim(&self, scalar: &Option<Scalar>) -> String {
        let unit = self.unit.map(AreaUnit::label).unwrap_or("");
        scalar
            .as_ref()
            .map(|s| s.describe(unit))
            .unwrap_or_else(|| "0".into())
    }
}

fn count_text(count: &Option<Scalar>) -> String {
    match count {
        Some(s) if s.mode == ScalarMode::PerLevel => s.describe(""),
        Some(s) => format_number(s.value.unwrap_or(0.0)),
        None => "1".into(),
    }
}

impl fmt::Display for AreaSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AreaKind::Special => f.write_str(self.raw_legacy_value.as_deref().unwrap_or("Special")),
            AreaKind::Point => f.write_str("Point"),
            AreaKind::Region => f.write_str("Region"),
            AreaKind::Scope => f.write_str("Scope"),
            AreaKind::RadiusCircle if self.radius.is_none() && self.diameter.is_some() => {
                write!(f, "{} diameter", self.dim(&self.diameter))
            }
            AreaKind::RadiusCircle => write!(f, "{} radius", self.dim(&self.radius)),
            AreaKind::RadiusSphere => write!(f, "{} radius sphere", self.dim(&self.radius)),
            AreaKind::Cone => {
                write!(f, "{} cone", self.dim(&self.length))?;
                if let Some(angle) = self.angle_deg {
                    write!(f, " ({} degrees)", format_number(angle))?;
                }
                Ok(())
            }
            AreaKind::Line => {
                write!(f, "{} line", self.dim(&self.length))?;
                if self.width.is_some() {
                    write!(f, ", {} wide", self.dim(&self.width))?;
                }
                Ok(())
            }
            AreaKind::Rect => write!(f, "{} x {}", self.dim(&self.length), self.dim(&self.width)),
            AreaKind::RectPrism => write!(
                f,
                "{} x {} x {}",
                self.dim(&self.length),
                self.dim(&self.width),
                self.dim(&self.height)
            ),
            AreaKind::Cylinder => write!(
                f,
                "{} radius cylinder, {} high",
                self.dim(&self.radius),
                self.dim(&self.height)
            ),
            AreaKind::Wall => {
                write!(f, "{} wall", self.dim(&self.length))?;
                if self.height.is_some() {
                    write!(f, ", {} high", self.dim(&self.height))?;
                }
                if self.thickness.is_some() {
                    write!(f, ", {} thick", self.dim(&self.thickness))?;
                }
                Ok(())
            }
            AreaKind::Cube => write!(f, "{} cube", self.dim(&self.edge)),
            AreaKind::Volume => f.write_str(&self.dim(&self.volume)),
            AreaKind::Surface => f.write_str(&self.dim(&self.surface_area)),
            AreaKind::Tiles => {
                let unit = self.tile_unit.unwrap_or(TileUnit::Square);
                write!(f, "{} {}", count_text(&self.tile_count), unit.plural())
            }
            AreaKind::Creatures => {
                let noun = match self.count_subject {
                    Some(CountSubject::Undead) => "undead",
                    Some(CountSubject::Ally) => "allies",
                    Some(CountSubject::Enemy) => "enemies",
                    _ => "creatures",
                };
                write!(f, "{} {}", count_text(&self.count), noun)
            }
            AreaKind::Objects => {
                let noun = match self.count_subject {
                    Some(CountSubject::Structure) => "structures",
                    _ => "objects",
                };
                write!(f, "{} {}", count_text(&self.count), noun)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_display() {
        let mut spec = AreaSpec::shape(AreaKind::RadiusSphere, Some(AreaUnit::Ft));
        spec.radius = Some(Scalar::fixed(20.0));
        assert_eq!(spec.to_string(), "20 ft radius sphere");
    }

    #[test]
    fn wall_display_lists_optional_dimensions() {
        let mut spec = AreaSpec::shape(AreaKind::Wall, Some(AreaUnit::Ft));
        spec.length = Some(Scalar::per_level(10.0));
        spec.thickness = Some(Scalar::fixed(1.0));
        assert_eq!(spec.to_string(), "10 ft/level wall, 1 ft thick");
    }

    #[test]
    fn creature_count_display() {
        let mut spec = AreaSpec::shape(AreaKind::Creatures, None);
        spec.count = Some(Scalar::per_level(1.0));
        spec.count_subject = Some(CountSubject::Creature);
        assert_eq!(spec.to_string(), "1/level creatures");
    }

    #[test]
    fn serializes_only_populated_dimensions() {
        let mut spec = AreaSpec::shape(AreaKind::Cube, Some(AreaUnit::Ft));
        spec.edge = Some(Scalar::fixed(10.0));
        assert_eq!(
            serde_json::to_string(&spec).unwrap(),
            r#"{"kind":"cube","unit":"ft","edge":{"mode":"fixed","value":10.0}}"#
        );
    }
}
