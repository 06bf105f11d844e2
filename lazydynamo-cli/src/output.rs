use crate::cli::ScanFormat;
use crate::error::CliResult;
use comfy_table::{ContentArrangement, Table};
use serde_json::Value;

/// Render serialized rows (one JSON document each) in `format`
pub fn format_rows(rows: &[String], format: ScanFormat) -> CliResult<String> {
    match format {
        ScanFormat::Lines => Ok(rows.join("\n")),
        ScanFormat::Json => {
            let docs: Vec<Value> = rows.iter().map(|r| parse_row(r)).collect();
            Ok(serde_json::to_string_pretty(&docs)?)
        }
        ScanFormat::Table => Ok(format_table(rows)),
        ScanFormat::Csv => Ok(format_csv(rows)),
    }
}

/// A row that is not valid JSON is shown as a plain string
fn parse_row(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Attribute names across all rows, in first-seen order
fn columns(docs: &[Value]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for doc in docs {
        if let Value::Object(map) = doc {
            for key in map.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
    }
    columns
}

fn cell(doc: &Value, column: &str) -> String {
    match doc.get(column) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn format_table(rows: &[String]) -> String {
    let docs: Vec<Value> = rows.iter().map(|r| parse_row(r)).collect();
    let columns = columns(&docs);

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(&columns);
    for doc in &docs {
        table.add_row(columns.iter().map(|c| cell(doc, c)).collect::<Vec<_>>());
    }
    table.to_string()
}

/// Escape a value for CSV output.
fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn format_csv(rows: &[String]) -> String {
    let docs: Vec<Value> = rows.iter().map(|r| parse_row(r)).collect();
    let columns = columns(&docs);

    let mut lines = Vec::with_capacity(docs.len() + 1);
    lines.push(
        columns
            .iter()
            .map(|c| csv_escape(c))
            .collect::<Vec<_>>()
            .join(","),
    );
    for doc in &docs {
        lines.push(
            columns
                .iter()
                .map(|c| csv_escape(&cell(doc, c)))
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    lines.join("\n")
}
