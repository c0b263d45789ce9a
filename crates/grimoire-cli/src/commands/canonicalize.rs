//! Canonicalize command implementation.

use grimoire_canonical::Canonicalizer;
use serde_json::json;

use super::{load_schema, read_json, CmdResult};
use crate::output;

pub fn run(schema: Option<String>, input: Option<String>, json: bool) -> CmdResult<()> {
    let schema = load_schema(schema)?;
    let value = read_json(input)?;

    let result = Canonicalizer::new(&schema)
        .canonicalize(&value)
        .map_err(|e| format!("Canonicalization failed: {}", e))?;

    if json {
        output::print_json(&json!({
            "hash": result.hash,
            "canonical": String::from_utf8_lossy(&result.bytes),
            "report": result.report,
        }))?;
    } else {
        println!("{}", String::from_utf8_lossy(&result.bytes));
        println!("{}", result.hash);
    }
    Ok(())
}
