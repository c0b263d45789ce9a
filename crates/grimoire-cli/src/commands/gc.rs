//! Vault garbage collection command implementation.

use super::{open_store, open_vault, CmdResult};
use crate::output;

pub fn run(store: String, vault: String, json: bool) -> CmdResult<()> {
    let store = open_store(&store)?;
    let vault = open_vault(Some(vault))?.ok_or("vault root is required")?;

    let report = vault.collect_garbage(&store)?;

    if json {
        output::print_json(&report)?;
    } else {
        output::print_summary(&[
            ("scanned", report.scanned.to_string()),
            ("kept", report.kept.to_string()),
            ("removed", report.removed.len().to_string()),
        ]);
        for hash in &report.removed {
            println!("removed {}", hash);
        }
    }
    Ok(())
}
