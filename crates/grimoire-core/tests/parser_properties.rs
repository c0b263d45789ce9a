use grimoire_core::{parse, FieldKind};
use proptest::prelude::*;

fn kind() -> impl Strategy<Value = FieldKind> {
    prop::sample::select(FieldKind::ALL.to_vec())
}

fn range_text() -> impl Strategy<Value = String> {
    (1u32..500, 1u32..50, prop::sample::select(vec!["ft", "yd", "yds.", "feet", "mi"])).prop_flat_map(
        |(base, step, unit)| {
            prop::sample::select(vec![
                format!("{} {}", base, unit),
                format!("{} {}/level", step, unit),
                format!("{} {} + {} {}/level", base, unit, step, unit),
                format!("{} {} (LOS)", base, unit),
            ])
        },
    )
}

fn damage_text() -> impl Strategy<Value = String> {
    (1u32..10, prop::sample::select(vec![4u32, 6, 8, 10]), 2u32..20).prop_flat_map(|(n, sides, cap)| {
        prop::sample::select(vec![
            format!("{}d{}", n, sides),
            format!("1d{}/level (max {}d{})", sides, cap, sides),
            format!("{}d{} + {}", n, sides, cap),
            format!("{}d{} fire", n, sides),
        ])
    })
}

fn duration_text() -> impl Strategy<Value = String> {
    (1u32..60, prop::sample::select(vec!["round", "turn", "hour", "day"])).prop_flat_map(|(n, unit)| {
        prop::sample::select(vec![
            format!("{} {}s", n, unit),
            format!("{} {}/level", n, unit),
            "Instantaneous".to_string(),
            "Permanent".to_string(),
        ])
    })
}

proptest! {
    #[test]
    fn parsing_never_loses_text(kind in kind(), text in "\\PC{0,60}") {
        let parsed = parse(kind, &text);
        if parsed.is_special() {
            let kept = parsed.preserved_text().unwrap_or("");
            prop_assert_eq!(kept.trim(), text.trim());
        }
    }

    #[test]
    fn special_display_reparses_to_itself(kind in kind(), text in "[a-zA-Z ,;()?]{1,40}") {
        let parsed = parse(kind, &text);
        if parsed.is_special() {
            prop_assert_eq!(parse(kind, &parsed.display()), parsed);
        }
    }

    #[test]
    fn range_display_reparses(text in range_text()) {
        let parsed = parse(FieldKind::Range, &text);
        prop_assert!(!parsed.is_special(), "{}", text);
        prop_assert_eq!(parse(FieldKind::Range, &parsed.display()), parsed);
    }

    #[test]
    fn damage_display_reparses(text in damage_text()) {
        let parsed = parse(FieldKind::Damage, &text);
        prop_assert!(!parsed.is_special(), "{}", text);
        prop_assert_eq!(parse(FieldKind::Damage, &parsed.display()), parsed);
    }

    #[test]
    fn duration_display_reparses(text in duration_text()) {
        let parsed = parse(FieldKind::Duration, &text);
        prop_assert!(!parsed.is_special(), "{}", text);
        prop_assert_eq!(parse(FieldKind::Duration, &parsed.display()), parsed);
    }

    #[test]
    fn parsing_is_deterministic(kind in kind(), text in "\\PC{0,40}") {
        prop_assert_eq!(parse(kind, &text), parse(kind, &text));
    }
}
