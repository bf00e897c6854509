//! Typed literal escaping.
//!
//! Produces inlined T-SQL literals. Payload values are bound instead; see `payload`.

use chrono::NaiveDateTime;

use crate::ast::Value;

/// Render a value as a T-SQL literal.
pub fn escape(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(n) if n.is_finite() => n.to_string(),
        Value::Float(_) => "NULL".to_string(),
        Value::String(s) => quote(s),
        Value::DateTime(dt) => quote(&format_datetime(dt)),
        // A list is stored as one comma-joined text value, not a SQL list.
        Value::Array(items) if items.is_empty() => "NULL".to_string(),
        Value::Array(items) => {
            let joined: Vec<String> = items.iter().map(escape).collect();
            quote(&joined.join(","))
        }
        Value::Json(json) => quote(&json.to_string()),
        Value::Deferred(d) => escape(&d.resolve()),
    }
}

/// Wrap text in single quotes, doubling embedded quotes.
pub fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// `YYYY-MM-DD HH:MM:SS`
pub fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}
