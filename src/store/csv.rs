//! Minimal CSV rendering for the tabular export files
//!
//! The export format is header + rows, comma separated, with RFC 4180 style
//! quoting. Values that are not JSON strings are rendered in their JSON form.

use serde_json::Value;

/// Renders the header row from a record's field names
pub(crate) fn csv_header<'a, I>(fields: I) -> String
where
    I: Iterator<Item = &'a String>,
{
    let cells: Vec<String> = fields.map(|name| escape(name)).collect();
    cells.join(",")
}

/// Renders one data row in the record's own field order
pub(crate) fn csv_row<'a, I>(values: I) -> String
where
    I: Iterator<Item = &'a Value>,
{
    let cells: Vec<String> = values.map(render_value).collect();
    cells.join(",")
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => escape(s),
        Value::Null => String::new(),
        other => escape(&other.to_string()),
    }
}

/// Quotes a cell if it contains a separator, quote, or line break
fn escape(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') || cell.contains('\r') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
