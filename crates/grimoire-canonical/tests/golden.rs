use grimoire_canonical::{
    spec::{CombineMode, DamagePart, DamageType, DicePool, DiceTerm, ScalingDriver, ScalingRule},
    spec::{RangeSpec, SpellDamageSpec},
    Canonicalizer, ContentHash, HygieneReport, HygieneStatus, SpellSchema,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn schema() -> SpellSchema {
    SpellSchema::builtin().unwrap()
}

fn fireball() -> Value {
    json!({
        "name": "Fireball",
        "tradition": "Arcane",
        "school": "Invocation/Evocation",
        "level": 3,
        "description": "A burst of flame.",
        "components": {"verbal": true, "somatic": true, "material": true},
        "schema_version": 2
    })
}

#[test]
fn minimal_record_serializes_to_golden_bytes() {
    let schema = schema();
    let result = Canonicalizer::new(&schema).canonicalize(&fireball()).unwrap();

    let expected = concat!(
        r#"{"components":{"material":true,"somatic":true,"verbal":true},"#,
        r#""description":"A burst of flame.","is_cantrip":false,"is_quest_spell":false,"#,
        r#""level":3,"name":"Fireball","reversible":false,"#,
        r#""school":"Invocation/Evocation","tradition":"Arcane"}"#
    );
    assert_eq!(String::from_utf8(result.bytes.clone()).unwrap(), expected);
    assert_eq!(result.hash, ContentHash::of(expected.as_bytes()));
    assert_eq!(result.report.status, HygieneStatus::Ok);
}

#[test]
fn hygiene_report_matches_expected_shape() {
    let mut report = HygieneReport::new(2);
    report.warn("SpecialFallback", "special_fallbacks");
    report.warn("SpecialFallback", "special_fallbacks");
    report.escalate(HygieneStatus::Lossy);

    let serialized = serde_json::to_value(&report).unwrap();
    let expected = json!({
        "status": "Lossy",
        "warnings": ["SpecialFallback"],
        "metrics": {"special_fallbacks": 2},
        "schema_version": 2
    });
    assert_eq!(serialized, expected);
}

#[test]
fn whitespace_and_tag_order_do_not_change_hash() {
    let schema = schema();
    let canon = Canonicalizer::new(&schema);

    let mut a = fireball();
    a["tags"] = json!(["Fire", "Damage"]);
    let mut b = fireball();
    b["description"] = json!("A burst of flame.   \n");
    b["tags"] = json!(["Damage", "Fire "]);

    let a = canon.canonicalize(&a).unwrap();
    let b = canon.canonicalize(&b).unwrap();
    assert_eq!(a.hash, b.hash);
    assert_eq!(a.spell.get("tags"), Some(&json!(["Damage", "Fire"])));
}

#[test]
fn excluded_discriminant_is_cleared_before_hashing() {
    let schema = schema();
    let canon = Canonicalizer::new(&schema);

    let mut with_sphere = fireball();
    with_sphere["sphere"] = json!("Elemental");
    let cleared = canon.canonicalize(&with_sphere).unwrap();
    let plain = canon.canonicalize(&fireball()).unwrap();

    assert_eq!(cleared.hash, plain.hash);
    assert!(cleared.spell.get("sphere").is_none());
    assert!(cleared
        .report
        .warnings
        .iter()
        .any(|w| w.code() == "ClearedExcludedDiscriminant"));
}

#[test]
fn dual_tradition_keeps_both_discriminants() {
    let schema = schema();
    let mut doc = fireball();
    doc["tradition"] = json!("Both");
    doc["sphere"] = json!("Elemental");
    let result = Canonicalizer::new(&schema).canonicalize(&doc).unwrap();
    assert_eq!(result.spell.get("sphere"), Some(&json!("Elemental")));
    assert_eq!(result.spell.get("school"), Some(&json!("Invocation/Evocation")));
}

#[test]
fn special_range_still_hashes() {
    let schema = schema();
    let mut doc = fireball();
    doc["range"] = serde_json::to_value(RangeSpec::special("Special (DM discretion)")).unwrap();

    let result = Canonicalizer::new(&schema).canonicalize(&doc).unwrap();
    assert_eq!(
        result.spell.get("range"),
        Some(&json!({"kind": "special", "raw_legacy_value": "Special (DM discretion)"}))
    );
    assert_eq!(result.hash.as_str().len(), 64);
    assert_eq!(result.report.status, HygieneStatus::Lossy);
}

#[test]
fn typed_damage_spec_canonicalizes() {
    let schema = schema();
    let part = DamagePart {
        scaling: vec![ScalingRule {
            max_steps: Some(10),
            ..ScalingRule::per_level_dice(DiceTerm::new(1, 6), ScalingDriver::CasterLevel, 1)
        }],
        ..DamagePart::new("main", DamageType::Fire, DicePool::default())
    };
    let mut doc = fireball();
    doc["damage"] =
        serde_json::to_value(SpellDamageSpec::modeled(CombineMode::Sum, vec![part])).unwrap();

    let result = Canonicalizer::new(&schema).canonicalize(&doc).unwrap();
    let damage = result.spell.get("damage").unwrap();
    assert_eq!(damage["parts"][0]["damage_type"], json!("fire"));
    assert_eq!(damage["parts"][0]["scaling"][0]["max_steps"], json!(10));
    assert!(damage["parts"][0].get("base").is_none());
    assert!(damage.get("combine_mode").is_none());
    assert!(damage["parts"][0]["scaling"][0].get("driver").is_none());
    assert!(damage["parts"][0]["scaling"][0].get("step").is_none());
}

#[test]
fn material_defaults_serialize_to_golden_bytes() {
    let schema = schema();
    let mut doc = fireball();
    doc["material_components"] = json!([
        {"name": "Sulphur"},
        {"name": "Bat guano", "quantity": 1, "is_consumed": false}
    ]);
    let result = Canonicalizer::new(&schema).canonicalize(&doc).unwrap();

    let expected = concat!(
        r#"{"components":{"material":true,"somatic":true,"verbal":true},"#,
        r#""description":"A burst of flame.","is_cantrip":false,"is_quest_spell":false,"#,
        r#""level":3,"material_components":[{"name":"Bat guano"},{"name":"Sulphur"}],"#,
        r#""name":"Fireball","reversible":false,"#,
        r#""school":"Invocation/Evocation","tradition":"Arcane"}"#
    );
    assert_eq!(String::from_utf8(result.bytes.clone()).unwrap(), expected);

    doc["material_components"][0]["is_consumed"] = json!(true);
    let consumed = Canonicalizer::new(&schema).canonicalize(&doc).unwrap();
    assert_ne!(consumed.hash, result.hash);
}

#[test]
fn part_labels_are_prose() {
    let schema = schema();
    let mut doc = fireball();
    doc["damage"] = json!({"kind": "modeled", "parts": [
        {"id": "main", "label": "  Initial   blast ", "damage_type": "fire",
         "base": {"terms": [{"count": 1, "sides": 6}]}}
    ]});
    let padded = Canonicalizer::new(&schema).canonicalize(&doc).unwrap();
    doc["damage"]["parts"][0]["label"] = json!("Initial blast");
    let clean = Canonicalizer::new(&schema).canonicalize(&doc).unwrap();
    assert_eq!(padded.bytes, clean.bytes);
}

#[test]
fn incompatible_schema_version_is_rejected() {
    let schema = schema();
    let mut doc = fireball();
    doc["schema_version"] = json!(99);
    let err = Canonicalizer::new(&schema).canonicalize(&doc).unwrap_err();
    assert!(err.to_string().contains("99"));
}

#[test]
fn older_version_is_migrated_with_note() {
    let schema = schema();
    let mut doc = fireball();
    doc.as_object_mut().unwrap().remove("schema_version");
    doc.as_object_mut().unwrap().remove("components");

    let result = Canonicalizer::new(&schema).canonicalize(&doc).unwrap();
    assert_eq!(result.report.notes, vec!["migrated_from:1".to_string()]);
    assert_eq!(
        result.spell.get("components"),
        Some(&json!({"material": false, "somatic": false, "verbal": false}))
    );
}
