use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Whitespace policy for a string field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMode {
    /// Short mechanical text: every whitespace run becomes one space.
    #[default]
    Structured,
    /// Prose: horizontal runs collapse, paragraph breaks survive as `\n`.
    Textual,
}

/// NFC-normalizes, trims and collapses whitespace according to `mode`.
pub fn sanitize(input: &str, mode: TextMode) -> String {
    let nfc: String = input.nfc().collect();
    match mode {
        TextMode::Structured => nfc.split_whitespace().collect::<Vec<_>>().join(" "),
        TextMode::Textual => nfc
            .replace("\r\n", "\n")
            .split(['\n', '\r'])
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Folds a value to its lookup form: lower-case alphanumerics only.
///
/// `"Rod/Staff/Wand"`, `"rod_staff_wand"` and `"ROD STAFF WAND"` all fold to
/// `"rodstaffwand"`.
pub fn fold_token(input: &str) -> String {
    input
        .nfc()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// `"Line of Sight"` -> `"line_of_sight"`.
pub fn to_snake(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_sep = false;
    for c in input.nfc() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// `"evocation / invocation"` -> `"Evocation / Invocation"`.
pub fn to_title(input: &str) -> String {
    input
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    let rest: String = chars.flat_map(char::to_lowercase).collect();
                    first.to_uppercase().collect::<String>() + &rest
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_collapses_everything() {
        assert_eq!(sanitize("  Fire \n\t Ball  ", TextMode::Structured), "Fire Ball");
    }

    #[test]
    fn textual_keeps_paragraph_breaks() {
        let input = "First  line.\r\n\n\n  Second\tparagraph.  \n";
        assert_eq!(
            sanitize(input, TextMode::Textual),
            "First line.\nSecond paragraph."
        );
    }

    #[test]
    fn sanitize_applies_nfc() {
        let decomposed = "Cafe\u{301}";
        assert_eq!(sanitize(decomposed, TextMode::Structured), "Caf\u{e9}");
    }

    #[test]
    fn fold_ignores_case_and_punctuation() {
        assert_eq!(fold_token("Rod/Staff/Wand"), "rodstaffwand");
        assert_eq!(fold_token("rod_staff_wand"), fold_token("ROD STAFF WAND"));
    }

    #[test]
    fn snake_and_title() {
        assert_eq!(to_snake("Line of Sight"), "line_of_sight");
        assert_eq!(to_snake("  Distance-LOS "), "distance_los");
        assert_eq!(to_title("eVOCATION"), "Evocation");
    }
}
