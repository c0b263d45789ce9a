//! Parse command implementation.

use grimoire_core::{parse, FieldKind};
use serde_json::json;

use super::CmdResult;
use crate::output;

pub fn run(kind: String, text: String, json: bool) -> CmdResult<()> {
    let kind: FieldKind = kind.parse()?;
    let parsed = parse(kind, &text);
    let spec = parsed.to_value()?;

    if json {
        output::print_json(&json!({
            "kind": kind,
            "spec": spec,
            "display": parsed.display(),
            "fallback": parsed.is_fallback(),
        }))?;
        return Ok(());
    }

    println!("{}", serde_json::to_string_pretty(&spec)?);
    output::print_summary(&[
        ("display", parsed.display()),
        ("fallback", parsed.is_fallback().to_string()),
    ]);
    Ok(())
}
