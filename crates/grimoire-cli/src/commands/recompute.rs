//! Recompute command implementation.

use grimoire_store::{default_workers, recompute_all};

use super::{load_schema, open_store, open_vault, CmdResult};
use crate::output;

pub fn run(
    schema: Option<String>,
    store: String,
    vault: Option<String>,
    workers: Option<usize>,
    json: bool,
) -> CmdResult<()> {
    let schema = load_schema(schema)?;
    let store = open_store(&store)?;
    let vault = open_vault(vault)?;

    let report = recompute_all(
        &store,
        vault.as_ref(),
        &schema,
        workers.unwrap_or_else(default_workers),
    )?;

    if json {
        output::print_json(&report)?;
        return Ok(());
    }

    output::print_summary(&[
        ("processed", report.processed.to_string()),
        ("changed", report.changed.len().to_string()),
        ("failed", report.failed.len().to_string()),
        ("collisions", report.collisions.to_string()),
    ]);
    if !report.changed.is_empty() {
        let columns = [("ID", 8), ("OLD", 20), ("NEW", 64)];
        output::print_table_header(&columns);
        for change in &report.changed {
            let old = change
                .old
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string);
            println!(
                "{}",
                output::format_row(&columns, &[change.id.to_string(), old, change.new.to_string()])
            );
        }
    }
    for failure in &report.failed {
        println!("record {}: {}", failure.id, failure.error);
    }
    Ok(())
}
