//! Backfill command implementation.

use grimoire_store::{backfill, default_workers, BackfillOptions};

use super::{load_schema, open_store, open_vault, CmdResult};
use crate::output;

pub fn run(
    schema: Option<String>,
    store: String,
    vault: Option<String>,
    chunk_size: usize,
    workers: Option<usize>,
    json: bool,
) -> CmdResult<()> {
    let schema = load_schema(schema)?;
    let store = open_store(&store)?;
    let vault = open_vault(vault)?;
    let options = BackfillOptions {
        chunk_size,
        workers: workers.unwrap_or_else(default_workers),
        ..BackfillOptions::default()
    };

    let summary = backfill(&store, vault.as_ref(), &schema, &options)?;

    if json {
        output::print_json(&summary)?;
    } else {
        output::print_summary(&[
            ("processed", summary.processed.to_string()),
            ("updated", summary.updated.to_string()),
            ("clean", summary.clean().to_string()),
            ("fallback", summary.fallback.to_string()),
            ("failed", summary.failed.to_string()),
            ("collisions", summary.collisions.to_string()),
            ("skipped", summary.skipped.to_string()),
        ]);
        for item in summary.items.iter().filter(|item| item.error.is_some()) {
            println!(
                "record {}: {}",
                item.id,
                item.error.as_deref().unwrap_or_default()
            );
        }
    }
    Ok(())
}
