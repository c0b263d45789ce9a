//! Collisions command implementation.

use grimoire_store::{detect_collisions, CollisionKind};

use super::{open_store, CmdResult};
use crate::output;

pub fn run(store: String, strict: bool, json: bool) -> CmdResult<()> {
    let store = open_store(&store)?;
    let groups = detect_collisions(&store);

    if json {
        output::print_json(&groups)?;
    } else {
        let columns = [("HASH", 20), ("KIND", 16), ("IDS", 0)];
        output::print_table_header(&columns);
        for group in &groups {
            let ids: Vec<String> = group.ids.iter().map(ToString::to_string).collect();
            println!(
                "{}",
                output::format_row(
                    &columns,
                    &[group.hash.to_string(), format!("{:?}", group.kind), ids.join(", ")]
                )
            );
        }
    }

    if strict && groups.iter().any(|g| g.kind == CollisionKind::TrueCollision) {
        std::process::exit(1);
    }
    Ok(())
}
