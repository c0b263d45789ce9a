use grimoire_canonical::{Canonicalizer, SpellSchema};
use proptest::prelude::*;
use serde_json::{json, Value};

fn record(description: &str, tags: &[String]) -> Value {
    json!({
        "name": "Magic Missile",
        "tradition": "Arcane",
        "school": "Invocation/Evocation",
        "level": 1,
        "description": description,
        "tags": tags,
        "components": {"verbal": true, "somatic": true, "material": false},
        "schema_version": 2
    })
}

fn material() -> impl Strategy<Value = Value> {
    (
        prop::sample::select(vec!["Pearl", "Bat guano", "Sulphur"]),
        prop::option::of(1u32..3),
        prop::option::of(any::<bool>()),
        prop::option::of(prop::sample::select(vec!["", "  ", "crushed", " ground  fine "])),
    )
        .prop_map(|(name, quantity, consumed, description)| {
            let mut item = json!({"name": name});
            if let Some(q) = quantity {
                item["quantity"] = json!(q);
            }
            if let Some(c) = consumed {
                item["is_consumed"] = json!(c);
            }
            if let Some(d) = description {
                item["description"] = json!(d);
            }
            item
        })
}

fn damage_part() -> impl Strategy<Value = Value> {
    (
        prop::sample::select(vec!["main", "Main", "burn"]),
        1u32..4,
        prop::option::of(prop::sample::select(vec!["", "  ", "on a hit"])),
        any::<bool>(),
    )
        .prop_map(|(id, count, notes, scaled)| {
            let mut part = json!({"id": id, "damage_type": "fire",
                "base": {"terms": [{"count": count, "sides": 6}]}});
            if let Some(n) = notes {
                part["notes"] = json!(n);
            }
            if scaled {
                part["scaling"] = json!([
                    {"kind": "per_level", "driver": "caster_level", "step": 1,
                     "dice_increment": {"count": 1, "sides": 6}},
                    {"kind": "per_level", "driver": "spell_level", "step": 2, "notes": " "}
                ]);
            }
            part
        })
}

fn tag() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

fn prose() -> impl Strategy<Value = String> {
    "[A-Za-z]{1,10}( [A-Za-z]{1,10}){0,5}"
}

proptest! {
    #[test]
    fn tag_order_and_padding_never_change_hash(
        tags in prop::collection::vec(tag(), 1..6),
        seed in any::<u64>(),
    ) {
        let schema = SpellSchema::builtin().unwrap();
        let canon = Canonicalizer::new(&schema);

        let mut shuffled: Vec<String> = tags.iter().map(|t| format!(" {} ", t.to_uppercase())).collect();
        let len = shuffled.len();
        shuffled.rotate_left((seed as usize) % len);
        shuffled.push(tags[0].clone());

        let a = canon.canonicalize(&record("Darts of force.", &tags)).unwrap();
        let b = canon.canonicalize(&record("Darts of force.", &shuffled)).unwrap();
        prop_assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn metadata_never_changes_hash(
        author in "[A-Za-z ]{0,20}",
        id in any::<u32>(),
        created in "20[0-9]{2}-0[1-9]-1[0-9]T00:00:00Z",
    ) {
        let schema = SpellSchema::builtin().unwrap();
        let canon = Canonicalizer::new(&schema);
        let plain = record("Darts of force.", &[]);
        let mut tagged = plain.clone();
        tagged["author"] = json!(author);
        tagged["id"] = json!(id);
        tagged["created_at"] = json!(created);
        tagged["source_refs"] = json!([{"url": "https://example.test/mm", "label": "PHB"}]);

        prop_assert_eq!(
            canon.canonicalize(&plain).unwrap().hash,
            canon.canonicalize(&tagged).unwrap().hash
        );
    }

    #[test]
    fn canonicalizing_twice_is_stable(description in prose(), tags in prop::collection::vec(tag(), 0..4)) {
        let schema = SpellSchema::builtin().unwrap();
        let canon = Canonicalizer::new(&schema);
        let once = canon.canonicalize(&record(&description, &tags)).unwrap();
        let twice = canon.canonicalize(&once.spell.to_value()).unwrap();
        prop_assert_eq!(&once.bytes, &twice.bytes);
        prop_assert_eq!(once.hash, twice.hash);
    }

    #[test]
    fn canonicalizing_nested_lists_twice_is_stable(
        materials in prop::collection::vec(material(), 0..5),
        parts in prop::collection::vec(damage_part(), 0..4),
        combine in prop::sample::select(vec!["sum", "max", "sequence"]),
    ) {
        let schema = SpellSchema::builtin().unwrap();
        let canon = Canonicalizer::new(&schema);
        let mut doc = record("Darts of force.", &[]);
        doc["material_components"] = json!(materials);
        doc["damage"] = json!({"kind": "modeled", "combine_mode": combine, "parts": parts});
        doc["magic_resistance"] = json!({"kind": "normal", "applies_to": "whole_spell"});

        let once = canon.canonicalize(&doc).unwrap();
        let twice = canon.canonicalize(&once.spell.to_value()).unwrap();
        prop_assert_eq!(&once.bytes, &twice.bytes);
        prop_assert_eq!(once.hash, twice.hash);
    }

    #[test]
    fn distinct_descriptions_hash_differently(a in prose(), b in prose()) {
        prop_assume!(a != b);
        let schema = SpellSchema::builtin().unwrap();
        let canon = Canonicalizer::new(&schema);
        prop_assert_ne!(
            canon.canonicalize(&record(&a, &[])).unwrap().hash,
            canon.canonicalize(&record(&b, &[])).unwrap().hash
        );
    }
}
