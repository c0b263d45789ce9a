use serde::{Deserialize, Serialize};

/// How a scalar grows with caster level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarMode {
    /// A constant `value`.
    #[default]
    Fixed,
    /// `value + per_level * level`.
    PerLevel,
}

/// Rounding applied after capping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rounding {
    /// Keep the exact value.
    #[default]
    None,
    /// Round toward negative infinity.
    Floor,
    /// Round toward positive infinity.
    Ceil,
    /// Round half away from zero.
    Nearest,
}

impl Rounding {
    fn is_none(&self) -> bool {
        matches!(self, Rounding::None)
    }
}

/// A dimensioned quantity that is either fixed or scales per level.
///
/// Shared by range distance, durations, area dimensions, casting time and
/// damage scaling. Level bounds clamp the level fed into the formula;
/// `cap_value` clamps the result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scalar {
    /// Growth mode.
    pub mode: ScalarMode,
    /// Base value (fixed value, or the per-level base).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Increment per caster level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_level: Option<f64>,
    /// Upper bound on the evaluated result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap_value: Option<f64>,
    /// Level beyond which the value stops growing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap_level: Option<i32>,
    /// Lowest level considered by the formula.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_level: Option<i32>,
    /// Highest level considered by the formula.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_level: Option<i32>,
    /// Rounding applied to the final result.
    #[serde(default, skip_serializing_if = "Rounding::is_none")]
    pub rounding: Rounding,
}

impl Scalar {
    /// A fixed quantity.
    pub fn fixed(value: f64) -> Self {
        Self {
            mode: ScalarMode::Fixed,
            value: Some(value),
            ..Default::default()
        }
    }

    /// A purely per-level quantity with no base.
    pub fn per_level(per_level: f64) -> Self {
        Self {
            mode: ScalarMode::PerLevel,
            per_level: Some(per_level),
            ..Default::default()
        }
    }

    /// A base value plus a per-level increment.
    pub fn scaling(base: f64, per_level: f64) -> Self {
        Self {
            mode: ScalarMode::PerLevel,
            value: Some(base),
            per_level: Some(per_level),
            ..Default::default()
        }
    }

    /// Evaluates the quantity at the given caster level.
    pub fn evaluate(&self, level: i32) -> f64 {
        let raw = match self.mode {
            ScalarMode::Fixed => self.value.unwrap_or(0.0),
            ScalarMode::PerLevel => {
                let mut effective = level;
                if let Some(min) = self.min_level {
                    effective = effective.max(min);
                }
                if let Some(max) = self.max_level {
                    effective = effective.min(max);
                }
                if let Some(cap) = self.cap_level {
                    effective = effective.min(cap);
                }
                self.value.unwrap_or(0.0) + self.per_level.unwrap_or(0.0) * f64::from(effective)
            }
        };
        let capped = match self.cap_value {
            Some(cap) => raw.min(cap),
            None => raw,
        };
        match self.rounding {
            Rounding::None => capped,
            Rounding::Floor => capped.floor(),
            Rounding::Ceil => capped.ceil(),
            Rounding::Nearest => capped.round(),
        }
    }

    /// Renders the quantity as legacy-style text with `unit` attached,
    /// e.g. `10 yd`, `5 yd/level`, `10 yd + 5 yd/level`.
    pub fn describe(&self, unit: &str) -> String {
        let with_unit = |n: f64| {
            if unit.is_empty() {
                format_number(n)
            } else {
                format!("{} {}", format_number(n), unit)
            }
        };
        let mut text = match (self.mode, self.value, self.per_level) {
            (ScalarMode::Fixed, value, _) => with_unit(value.unwrap_or(0.0)),
            (ScalarMode::PerLevel, Some(base), Some(step)) if base != 0.0 => {
                format!("{} + {}/level", with_unit(base), with_unit(step))
            }
            (ScalarMode::PerLevel, _, step) => format!("{}/level", with_unit(step.unwrap_or(0.0))),
        };
        if let Some(cap) = self.cap_value {
            text.push_str(&format!(" (max {})", format_number(cap)));
        }
        text
    }
}

/// Formats a number without a trailing `.0` for integral values.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_ignores_level() {
        assert_eq!(Scalar::fixed(30.0).evaluate(12), 30.0);
    }

    #[test]
    fn per_level_adds_increment() {
        let s = Scalar::scaling(10.0, 5.0);
        assert_eq!(s.evaluate(3), 25.0);
    }

    #[test]
    fn cap_value_clamps_result() {
        let s = Scalar {
            cap_value: Some(60.0),
            ..Scalar::per_level(10.0)
        };
        assert_eq!(s.evaluate(9), 60.0);
        assert_eq!(s.evaluate(4), 40.0);
    }

    #[test]
    fn cap_level_stops_growth() {
        let s = Scalar {
            cap_level: Some(10),
            ..Scalar::per_level(1.0)
        };
        assert_eq!(s.evaluate(15), 10.0);
    }

    #[test]
    fn min_level_raises_effective_level() {
        let s = Scalar {
            min_level: Some(5),
            ..Scalar::per_level(2.0)
        };
        assert_eq!(s.evaluate(1), 10.0);
    }

    #[test]
    fn rounding_is_applied_last() {
        let s = Scalar {
            rounding: Rounding::Floor,
            ..Scalar::per_level(0.5)
        };
        assert_eq!(s.evaluate(7), 3.0);
        let s = Scalar {
            rounding: Rounding::Ceil,
            ..Scalar::per_level(0.5)
        };
        assert_eq!(s.evaluate(7), 4.0);
        let s = Scalar {
            rounding: Rounding::Nearest,
            ..Scalar::per_level(0.5)
        };
        assert_eq!(s.evaluate(7), 4.0);
    }

    #[test]
    fn describe_renders_legacy_text() {
        assert_eq!(Scalar::fixed(10.0).describe("yd"), "10 yd");
        assert_eq!(Scalar::per_level(5.0).describe("ft"), "5 ft/level");
        assert_eq!(Scalar::scaling(10.0, 5.0).describe("yd"), "10 yd + 5 yd/level");
        assert_eq!(Scalar::fixed(2.5).describe(""), "2.5");
    }

    #[test]
    fn serialization_omits_absent_fields() {
        let json = serde_json::to_string(&Scalar::fixed(3.0)).unwrap();
        assert_eq!(json, r#"{"mode":"fixed","value":3.0}"#);
    }
}
