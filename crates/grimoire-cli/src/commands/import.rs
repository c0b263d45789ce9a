//! Import command implementation.

use grimoire_core::{BulkDecision, ImportPolicy, Presentation, SpellRecord};
use grimoire_store::stage;
use serde_json::Value;
use tracing::info;

use super::{load_schema, open_store, open_vault, read_json, CmdResult};
use crate::output;
use crate::OnConflict;

impl OnConflict {
    fn decision(self) -> BulkDecision {
        match self {
            OnConflict::KeepExisting => BulkDecision::SkipAll,
            OnConflict::Replace => BulkDecision::ReplaceAll,
            OnConflict::KeepBoth => BulkDecision::KeepAll,
        }
    }
}

pub fn run(
    schema: Option<String>,
    input: Option<String>,
    store: String,
    vault: Option<String>,
    on_conflict: OnConflict,
    json: bool,
) -> CmdResult<()> {
    let schema = load_schema(schema)?;
    let records: Vec<SpellRecord> = match read_json(input)? {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(|e| format!("Invalid record: {}", e))?,
        single @ Value::Object(_) => {
            vec![serde_json::from_value(single).map_err(|e| format!("Invalid record: {}", e))?]
        }
        _ => return Err("expected a record or an array of records".into()),
    };
    let store = open_store(&store)?;
    let vault = open_vault(vault)?;
    let policy = ImportPolicy::default();

    let session = stage(&store, &schema, &policy, records);
    if let Presentation::Bulk(_) = session.presentation(&policy) {
        info!(conflicts = session.conflicts.len(), "applying one decision to every conflict");
    }
    let resolution = on_conflict
        .decision()
        .resolution()
        .ok_or("conflicts need a decision")?;
    let report = session.commit(&store, vault.as_ref(), &schema, |_| resolution.clone())?;

    if json {
        output::print_json(&report)?;
        return Ok(());
    }

    output::print_summary(&[
        ("inserted", report.inserted.len().to_string()),
        ("updated", report.updated.len().to_string()),
        ("metadata", report.metadata.len().to_string()),
        ("skipped", report.skipped.to_string()),
        ("stale", report.stale.len().to_string()),
        ("folded", report.folded.to_string()),
        ("collisions", report.collisions.to_string()),
        ("rejected", report.rejected.len().to_string()),
    ]);
    for rejected in &report.rejected {
        println!("rejected {}: {}", rejected.name, rejected.reason);
    }
    Ok(())
}
