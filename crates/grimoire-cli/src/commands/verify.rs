//! Verify command implementation.

use grimoire_store::check_integrity;

use super::{load_schema, open_store, open_vault, CmdResult};
use crate::output;

pub fn run(
    schema: Option<String>,
    store: String,
    vault: Option<String>,
    strict: bool,
    json: bool,
) -> CmdResult<()> {
    let schema = load_schema(schema)?;
    let store = open_store(&store)?;
    let vault = open_vault(vault)?;

    let report = check_integrity(&store, vault.as_ref(), &schema)?;

    if json {
        output::print_json(&report)?;
    } else {
        let mut rows = vec![
            ("records", report.total.to_string()),
            ("missing_hash", report.missing_hash.to_string()),
            ("mismatched", report.mismatched.to_string()),
            ("duplicate_groups", report.duplicate_groups.to_string()),
        ];
        if let Some(vault) = &report.vault {
            rows.push(("vault_checked", vault.checked.to_string()));
            rows.push(("vault_repaired", vault.repaired().to_string()));
            rows.push(("vault_unrecoverable", vault.unrecoverable().to_string()));
        }
        output::print_summary(&rows);

        for example in &report.examples {
            let recomputed = example
                .recomputed
                .as_ref()
                .map(ToString::to_string)
                .or_else(|| example.error.clone())
                .unwrap_or_default();
            println!("record {}: stored {} recomputed {}", example.id, example.stored, recomputed);
        }
        if let Some(vault) = &report.vault {
            for issue in &vault.issues {
                let state = if issue.repaired { "repaired" } else { "unrecoverable" };
                println!("vault {} {:?} {}: {}", issue.hash, issue.kind, state, issue.detail);
            }
        }
    }

    if strict && !report.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}
