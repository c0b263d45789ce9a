//! Integration tests for CLI commands.

use grimoire_core::SpellRecord;
use grimoire_store::{RecordStore, StoreOptions};
use serde_json::{json, Value};
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const FIREBALL_BYTES: &str = concat!(
    r#"{"components":{"material":true,"somatic":true,"verbal":true},"#,
    r#""description":"A burst of flame.","is_cantrip":false,"is_quest_spell":false,"#,
    r#""level":3,"name":"Fireball","reversible":false,"#,
    r#""school":"Invocation/Evocation","tradition":"Arcane"}"#
);

fn make_legacy(name: &str) -> SpellRecord {
    let mut record = SpellRecord::new(0, name, 3, "A burst of flame.");
    record.school = Some("Invocation/Evocation".into());
    record.range = Some("10 yds. + 10 yds./level".into());
    record.components = Some("V, S, M".into());
    record.damage = Some("1d6/level (max 10d6)".into());
    record.saving_throw = Some("1/2".into());
    record
}

fn create_test_store(dir: &TempDir) -> String {
    let path = dir.path().join("records.grj");
    let store = RecordStore::open(&path, StoreOptions { sync: false }).unwrap();
    let mut odd = make_legacy("Valley Fire");
    odd.area = Some("The whole valley, more or less".into());
    store
        .write_batch(vec![make_legacy("Fireball"), make_legacy("Lightning Bolt"), odd])
        .unwrap();
    path.to_string_lossy().to_string()
}

fn write_json(dir: &TempDir, name: &str, value: &Value) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, serde_json::to_vec(value).unwrap()).unwrap();
    path.to_string_lossy().to_string()
}

fn run_cli(args: &[&str]) -> (bool, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_grimoire"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute CLI");

    let stdout = String::from_utf8(output.stdout).unwrap();
    let stderr = String::from_utf8(output.stderr).unwrap();
    (output.status.success(), stdout, stderr)
}

fn run_json(args: &[&str]) -> Value {
    let (success, stdout, stderr) = run_cli(args);
    assert!(success, "command failed: {}", stderr);
    serde_json::from_str(&stdout).expect("Invalid JSON")
}

#[test]
fn test_parse_command() {
    let parsed = run_json(&["parse", "range", "10 yds. + 10 yds./level", "--json"]);
    assert_eq!(parsed["kind"], "range");
    assert_eq!(parsed["fallback"], false);
    assert_eq!(parsed["spec"]["kind"], "distance");
}

#[test]
fn test_parse_keeps_unparseable_text() {
    let parsed = run_json(&["parse", "area", "The whole valley, more or less", "--json"]);
    assert_eq!(parsed["fallback"], true);
    assert_eq!(parsed["spec"]["raw_legacy_value"], "The whole valley, more or less");
}

#[test]
fn test_parse_unknown_kind() {
    let (success, _, stderr) = run_cli(&["parse", "colour", "blue"]);
    assert!(!success);
    assert!(stderr.contains("Error"));
}

#[test]
fn test_canonicalize_command() {
    let dir = TempDir::new().unwrap();
    let doc = json!({
        "name": "Fireball",
        "tradition": "Arcane",
        "school": "Invocation/Evocation",
        "level": 3,
        "description": "A burst of flame.",
        "components": {"verbal": true, "somatic": true, "material": true},
        "source": "PHB",
        "schema_version": 2
    });
    let file = write_json(&dir, "fireball.json", &doc);

    let (success, stdout, _) = run_cli(&["canonicalize", &file]);
    assert!(success);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], FIREBALL_BYTES);
    assert_eq!(lines[1].len(), 64);

    let parsed = run_json(&["canonicalize", &file, "--json"]);
    assert_eq!(parsed["hash"], lines[1]);
}

#[test]
fn test_canonicalize_rejects_invalid_record() {
    let dir = TempDir::new().unwrap();
    let file = write_json(&dir, "bad.json", &json!({"name": "Nameless", "level": 3}));
    let (success, _, stderr) = run_cli(&["canonicalize", &file]);
    assert!(!success);
    assert!(stderr.contains("Canonicalization failed"));
}

#[test]
fn test_preview_record() {
    let dir = TempDir::new().unwrap();
    let file = write_json(&dir, "record.json", &serde_json::to_value(make_legacy("Fireball")).unwrap());

    let preview = run_json(&["preview", &file, "--record", "--json"]);
    assert_eq!(preview["content_hash"].as_str().unwrap().len(), 64);
    assert!(preview["display"]["range"].is_string());
    assert!(preview["display"]["damage"].is_string());
}

#[test]
fn test_backfill_then_verify() {
    let dir = TempDir::new().unwrap();
    let store = create_test_store(&dir);
    let vault = dir.path().join("vault").to_string_lossy().to_string();

    let summary = run_json(&["backfill", "--store", &store, "--vault", &vault, "--json"]);
    assert_eq!(summary["processed"], 3);
    assert_eq!(summary["updated"], 3);
    assert_eq!(summary["fallback"], 1);

    let again = run_json(&["backfill", "--store", &store, "--json"]);
    assert_eq!(again["processed"], 0);

    let report = run_json(&["verify", "--store", &store, "--vault", &vault, "--json"]);
    assert_eq!(report["total"], 3);
    assert_eq!(report["missing_hash"], 0);
    assert_eq!(report["mismatched"], 0);
    assert_eq!(report["vault"]["healthy"], 3);

    let (success, _, _) = run_cli(&["verify", "--store", &store, "--vault", &vault, "--strict"]);
    assert!(success);
}

#[test]
fn test_verify_strict_fails_on_unhashed_records() {
    let dir = TempDir::new().unwrap();
    let store = create_test_store(&dir);
    let (success, stdout, _) = run_cli(&["verify", "--store", &store, "--strict"]);
    assert!(!success);
    assert!(stdout.contains("missing_hash"));
}

#[test]
fn test_recompute_is_stable_after_backfill() {
    let dir = TempDir::new().unwrap();
    let store = create_test_store(&dir);
    run_json(&["backfill", "--store", &store, "--json"]);

    let report = run_json(&["recompute", "--store", &store, "--json"]);
    assert_eq!(report["processed"], 3);
    assert_eq!(report["changed"], json!([]));
}

#[test]
fn test_collisions_lists_duplicate_rows() {
    let dir = TempDir::new().unwrap();
    let store = create_test_store(&dir);
    {
        let opened = RecordStore::open(Path::new(&store), StoreOptions { sync: false }).unwrap();
        opened.write_batch(vec![make_legacy("Fireball")]).unwrap();
    }
    run_json(&["backfill", "--store", &store, "--json"]);

    let groups = run_json(&["collisions", "--store", &store, "--json"]);
    let groups = groups.as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["kind"], "same_content");
    assert_eq!(groups[0]["ids"], json!([1, 4]));

    let (success, stdout, _) = run_cli(&["collisions", "--store", &store, "--strict"]);
    assert!(success);
    assert!(stdout.contains("SameContent"));
}

#[test]
fn test_gc_keeps_referenced_entries() {
    let dir = TempDir::new().unwrap();
    let store = create_test_store(&dir);
    let vault = dir.path().join("vault");
    let vault_str = vault.to_string_lossy().to_string();
    run_json(&["backfill", "--store", &store, "--vault", &vault_str, "--json"]);

    let stray = vault.join("objects").join("00");
    std::fs::create_dir_all(&stray).unwrap();
    let orphan = format!("{}.json", "0".repeat(64));
    std::fs::write(stray.join(&orphan), b"{}").unwrap();

    let report = run_json(&["gc", "--store", &store, "--vault", &vault_str, "--json"]);
    assert_eq!(report["scanned"], 4);
    assert_eq!(report["kept"], 3);
    assert_eq!(report["removed"], json!(["0".repeat(64)]));
    assert!(!stray.join(&orphan).exists());
}

#[test]
fn test_import_keep_both() {
    let dir = TempDir::new().unwrap();
    let store = create_test_store(&dir);
    run_json(&["backfill", "--store", &store, "--json"]);

    let mut incoming = make_legacy("Fireball");
    incoming.description = "A larger burst of flame.".into();
    let file = write_json(&dir, "import.json", &json!([incoming, make_legacy("Magic Missile")]));

    let report = run_json(&[
        "import", &file, "--store", &store, "--on-conflict", "keep-both", "--json",
    ]);
    assert_eq!(report["inserted"], json!([4, 5]));

    let opened = RecordStore::open(Path::new(&store), StoreOptions { sync: false }).unwrap();
    assert_eq!(opened.get(5).unwrap().name, "Fireball (1)");
}

#[test]
fn test_missing_store_directory_is_created() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("nested").join("records.grj");
    let store = store.to_string_lossy().to_string();
    let groups = run_json(&["collisions", "--store", &store, "--json"]);
    assert_eq!(groups, json!([]));
}
