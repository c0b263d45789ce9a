use grimoire_canonical::{HygieneStatus, SpellSchema};
use grimoire_core::{
    classify, parse, plan, presentation, Classification, FieldKind, ImportPolicy, Prepared,
    Presentation, Resolution, ResolutionPlan, SpellRecord,
};
use pretty_assertions::assert_eq;

fn make_schema() -> SpellSchema {
    SpellSchema::builtin().unwrap()
}

fn make_fireball(id: i64, description: &str) -> SpellRecord {
    let mut record = SpellRecord::new(id, "Fireball", 3, description);
    record.school = Some("Invocation/Evocation".into());
    record.range = Some("10 yds. + 10 yds./level".into());
    record.components = Some("V, S, M".into());
    record.damage = Some("1d6/level (max 10d6)".into());
    record.saving_throw = Some("1/2".into());
    record.metadata.source = Some("PHB".into());
    record
}

#[test]
fn keep_both_inserts_disambiguated_copy() {
    let schema = make_schema();
    let existing = Prepared::new(&schema, make_fireball(1, "A burst of flame.")).unwrap();
    let incoming = Prepared::new(&schema, make_fireball(0, "A larger burst of flame.")).unwrap();
    assert_ne!(existing.hash, incoming.hash);

    let Classification::Conflict(conflict) = classify(incoming, &[existing.clone()]) else {
        panic!("expected conflict");
    };
    let names = vec![existing.record.name.clone()];
    let plan = plan(&schema, &conflict, &Resolution::KeepBoth, |n| names.iter().any(|t| t == n)).unwrap();

    let ResolutionPlan::Insert(inserted) = plan else {
        panic!("expected insert");
    };
    assert_eq!(inserted.record.name, "Fireball (1)");
    assert_eq!(inserted.spell.get("name"), Some(&serde_json::json!("Fireball (1)")));
    assert_ne!(inserted.hash, existing.hash);
    assert_eq!(inserted.record.content_hash.as_ref(), Some(&inserted.hash));
}

#[test]
fn keep_existing_writes_nothing() {
    let schema = make_schema();
    let existing = Prepared::new(&schema, make_fireball(1, "A burst of flame.")).unwrap();
    let incoming = Prepared::new(&schema, make_fireball(0, "Other.")).unwrap();
    let Classification::Conflict(conflict) = classify(incoming, &[existing]) else {
        panic!("expected conflict");
    };
    assert!(matches!(
        plan(&schema, &conflict, &Resolution::KeepExisting, |_| false).unwrap(),
        ResolutionPlan::Skip
    ));
}

#[test]
fn replace_keeps_row_identity() {
    let schema = make_schema();
    let existing = Prepared::new(&schema, make_fireball(42, "A burst of flame.")).unwrap();
    let incoming = Prepared::new(&schema, make_fireball(0, "Hotter.")).unwrap();
    let incoming_hash = incoming.hash.clone();
    let Classification::Conflict(conflict) = classify(incoming, &[existing]) else {
        panic!("expected conflict");
    };
    let ResolutionPlan::Update(updated) = plan(&schema, &conflict, &Resolution::Replace, |_| false).unwrap() else {
        panic!("expected update");
    };
    assert_eq!(updated.record.id, 42);
    assert_eq!(updated.hash, incoming_hash);
}

#[test]
fn metadata_only_difference_is_duplicate() {
    let schema = make_schema();
    let existing = Prepared::new(&schema, make_fireball(1, "A burst of flame.")).unwrap();
    let mut other = make_fireball(2, "A burst of flame.");
    other.metadata.author = Some("Somebody Else".into());
    other.metadata.license = Some("OGL".into());
    let incoming = Prepared::new(&schema, other).unwrap();
    assert_eq!(classify(incoming, &[existing]).label(), "duplicate");
}

#[test]
fn special_legacy_range_still_hashes() {
    let schema = make_schema();
    let parsed = parse(FieldKind::Range, "Special (DM discretion)");
    assert!(parsed.is_fallback());
    assert_eq!(parsed.display(), "Special (DM discretion)");

    let mut record = make_fireball(1, "A burst of flame.");
    record.range = Some("Special (DM discretion)".into());
    let prepared = Prepared::new(&schema, record).unwrap();
    assert_eq!(prepared.fallbacks, vec![FieldKind::Range]);
    assert_eq!(prepared.hash.as_str().len(), 64);
    assert_eq!(
        prepared.spell.get("range").unwrap()["raw_legacy_value"],
        "Special (DM discretion)"
    );
}

#[test]
fn untrusted_record_is_sanitized_before_hashing() {
    let schema = make_schema();
    let policy = ImportPolicy::default();
    let mut dirty = make_fireball(0, "A <i>burst</i> of flame.");
    dirty.name = "<b>Fireball</b>".into();
    let clean = Prepared::untrusted(&schema, &policy, dirty).unwrap();
    let plain = Prepared::new(&schema, make_fireball(0, "A burst of flame.")).unwrap();
    assert_eq!(clean.hash, plain.hash);

    let mut hostile = make_fireball(0, "x");
    hostile.description = "<script>steal()</script>".into();
    assert!(Prepared::untrusted(&schema, &policy, hostile).is_err());
}

#[test]
fn many_conflicts_offer_bulk_decision() {
    let policy = ImportPolicy::default();
    assert!(matches!(presentation(12, &policy), Presentation::Bulk(_)));
    assert_eq!(presentation(3, &policy), Presentation::Individual);
}

#[test]
fn invalid_record_reports_violations() {
    let schema = make_schema();
    let mut record = make_fireball(1, "A burst of flame.");
    record.is_cantrip = true;
    let err = Prepared::new(&schema, record).unwrap_err();
    assert!(err.to_string().contains("cantrip_level_zero"), "{}", err);

    let preview = grimoire_core::preview_record(&schema, &make_fireball(1, "A burst of flame."));
    assert!(preview.content_hash.is_some());
    assert_ne!(preview.report.status, HygieneStatus::Invalid);
}
