//! Preview command implementation.

use grimoire_core::{preview, preview_record, SpellRecord};

use super::{load_schema, read_json, CmdResult};
use crate::output;

pub fn run(schema: Option<String>, input: Option<String>, record: bool, json: bool) -> CmdResult<()> {
    let schema = load_schema(schema)?;
    let value = read_json(input)?;

    let result = if record {
        let record: SpellRecord =
            serde_json::from_value(value).map_err(|e| format!("Invalid record: {}", e))?;
        preview_record(&schema, &record)
    } else {
        preview(&schema, &value)
    };

    if json {
        output::print_json(&result)?;
        return Ok(());
    }

    let mut rows: Vec<(&str, String)> = result
        .display
        .iter()
        .map(|(kind, text)| (kind.field(), text.clone()))
        .collect();
    rows.push((
        "content_hash",
        result
            .content_hash
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string),
    ));
    rows.push(("status", format!("{:?}", result.report.status)));
    output::print_summary(&rows);
    for violation in &result.violations {
        println!("violation: {} ({})", violation.path, violation.rule);
    }
    if let Some(error) = &result.error {
        println!("error: {}", error);
    }
    Ok(())
}
