//! Output formatting utilities.

use serde::Serialize;

/// Prints `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints a table header for `columns` (name, width); the last column is unpadded.
pub fn print_table_header(columns: &[(&str, usize)]) {
    let cells: Vec<String> = columns.iter().map(|(name, _)| name.to_string()).collect();
    println!("{}", format_row(columns, &cells));
    let total: usize = columns.iter().map(|(name, width)| (*width).max(name.len()) + 1).sum();
    println!("{}", "-".repeat(total.max(40)));
}

/// Formats one table row; cells wider than their column are truncated.
pub fn format_row(columns: &[(&str, usize)], cells: &[String]) -> String {
    let last = columns.len().saturating_sub(1);
    columns
        .iter()
        .zip(cells)
        .enumerate()
        .map(|(i, ((_, width), cell))| {
            if i == last {
                cell.clone()
            } else {
                format!("{:<width$}", truncate(cell, *width), width = *width)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Prints `label: value` lines with aligned values.
pub fn print_summary(rows: &[(&str, String)]) {
    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    for (label, value) in rows {
        println!("{:<width$}  {}", format!("{}:", label), value, width = width + 1);
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
