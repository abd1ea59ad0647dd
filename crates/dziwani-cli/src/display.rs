//! Terminal rendering of response envelopes.
//!
//! Text items print as paragraphs, lists as a fixed-width table, and project
//! details as a vertical card grouped by section.

use dziwani_core::{ItemKind, ResponseEnvelope, ResultItem};
use serde_json::Value;

const NOT_AVAILABLE: &str = "Not available";
const MAX_CELL: usize = 32;

// ── Public API ──

pub fn print_envelope(response: &ResponseEnvelope) {
    for item in &response.results {
        match item.kind {
            ItemKind::Text => println!("{}\n", item.message),
            ItemKind::Error => eprintln!("error: {}\n", item.message),
            ItemKind::List => print_table(item),
            ItemKind::ProjectDetails => print_card(item),
        }
    }
    if let Some(understanding) = &response.metadata.understanding {
        println!("({understanding})");
    }
}

// ── Card ──

/// Print a single project as a vertical card grouped by section.
fn print_card(item: &ResultItem) {
    let sections = item.data["sections"].as_array().cloned().unwrap_or_default();
    let name = sections
        .iter()
        .flat_map(fields)
        .find(|(label, _)| label == "Project Name")
        .map(|(_, value)| value)
        .unwrap_or_default();

    println!("=== {name} ===");
    println!("{}", item.message);
    println!();

    for section in &sections {
        print_section(section);
    }
}

fn print_section(section: &Value) {
    let rows = fields(section);
    // Skip sections with nothing recorded.
    if rows.iter().all(|(_, value)| value == NOT_AVAILABLE) {
        return;
    }
    println!("{}", section["title"].as_str().unwrap_or_default());
    for (label, value) in rows {
        if value != NOT_AVAILABLE {
            println!("  {label:<30} {value}");
        }
    }
    println!();
}

fn fields(section: &Value) -> Vec<(String, String)> {
    section["fields"]
        .as_array()
        .map(|fields| {
            fields
                .iter()
                .map(|f| (cell(&f["label"]), cell(&f["value"])))
                .collect()
        })
        .unwrap_or_default()
}

// ── Table ──

fn print_table(item: &ResultItem) {
    let headers: Vec<String> = item.data["fields"]
        .as_array()
        .map(|h| h.iter().map(cell).collect())
        .unwrap_or_default();
    let rows: Vec<Vec<String>> = item.data["values"]
        .as_array()
        .map(|values| {
            values
                .iter()
                .map(|v| headers.iter().map(|h| truncate(&cell(&v[h.as_str()]))).collect())
                .collect()
        })
        .unwrap_or_default();
    if headers.is_empty() || rows.is_empty() {
        return;
    }

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    println!("{}", item.message);
    print_row(&headers, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    print_row(&rule, &widths);
    for row in &rows {
        print_row(row, &widths);
    }
    println!();
}

fn print_row(cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(c, &w)| format!("{c:<w$}"))
        .collect();
    println!("  {}", line.join("  ").trim_end());
}

// ── Helpers ──

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() > MAX_CELL {
        let short: String = text.chars().take(MAX_CELL - 3).collect();
        format!("{short}...")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn long_cells_are_truncated() {
        let long = "x".repeat(50);
        let short = truncate(&long);
        assert_eq!(short.chars().count(), MAX_CELL);
        assert!(short.ends_with("..."));
        assert_eq!(truncate("Zomba"), "Zomba");
    }

    #[test]
    fn fields_read_label_value_pairs() {
        let section = json!({
            "title": "Location",
            "fields": [
                {"label": "District", "value": "Zomba"},
                {"label": "Region", "value": NOT_AVAILABLE},
            ],
        });
        assert_eq!(
            fields(&section),
            vec![
                ("District".to_string(), "Zomba".to_string()),
                ("Region".to_string(), NOT_AVAILABLE.to_string()),
            ]
        );
        assert!(fields(&json!({})).is_empty());
    }

    #[test]
    fn cells_render_numbers_and_nulls() {
        assert_eq!(cell(&json!(3)), "3");
        assert_eq!(cell(&Value::Null), "");
        assert_eq!(cell(&json!("a")), "a");
    }
}
