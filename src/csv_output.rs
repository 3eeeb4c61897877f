//! CSV export for stored samples and query timings
//!
//! Spreadsheet-friendly flat exports of what the dashboard shows.

use crate::query_log::{classify, QueryTiming};
use crate::storage::StoredSample;

/// Escape a CSV field (handle commas, quotes, newlines)
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render stored samples as CSV, header row first
pub fn samples_to_csv(rows: &[StoredSample]) -> String {
    let mut out = String::from(
        "page_url,component,execution_time,memory_usage,query_count,query_time,timestamp\n",
    );
    for row in rows {
        out.push_str(&format!(
            "{},{},{:.6},{},{},{:.6},{:.3}\n",
            escape_field(&row.sample.page_url),
            escape_field(&row.sample.component_label),
            row.sample.execution_time,
            row.sample.memory_usage,
            row.sample.query_count,
            row.sample.query_time,
            row.timestamp,
        ));
    }
    out
}

/// Render query timings as CSV, header row first
pub fn queries_to_csv(timings: &[QueryTiming]) -> String {
    let mut out = String::from("type,duration,caller,query\n");
    for timing in timings {
        out.push_str(&format!(
            "{},{:.6},{},{}\n",
            classify(&timing.query),
            timing.duration,
            escape_field(&timing.caller),
            escape_field(&timing.query),
        ));
    }
    out
}
