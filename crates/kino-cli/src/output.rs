//! Output formatting for CLI

use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

/// Render a list of rows; text output is one line per row
pub fn format_rows<T: Serialize + Tabled>(title: &str, rows: &[T], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Table => {
            if rows.is_empty() {
                format!("{}: none", title)
            } else {
                format!("{}:\n{}", title, Table::new(rows))
            }
        }
        OutputFormat::Text => {
            let mut out = format!("{}:", title);
            if rows.is_empty() {
                out.push_str(" none");
            }
            for row in rows {
                let fields: Vec<String> = row.fields().into_iter().map(|f| f.into_owned()).collect();
                out.push_str("\n  ");
                out.push_str(&fields.join("  "));
            }
            out
        }
    }
}

/// Render one serializable value
pub fn format_value<T: Serialize>(data: &T, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table | OutputFormat::Text => {
            match serde_json::to_value(data).unwrap_or_default() {
                serde_json::Value::Object(map) => map
                    .iter()
                    .map(|(key, value)| match value {
                        serde_json::Value::String(s) => format!("{}: {}", key, s),
                        other => format!("{}: {}", key, other),
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
                other => other.to_string(),
            }
        }
    }
}
