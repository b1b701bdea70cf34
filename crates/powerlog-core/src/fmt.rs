//! Shared formatting helpers.
//!
//! Everything that turns a sample value into text goes through here so the
//! missing marker stays the same in every output.

use chrono::{DateTime, TimeZone};

/// Textual marker for a value that could not be obtained.
pub const MISSING: &str = "";

/// Formats an optional value, [`MISSING`] for `None`.
pub fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| v.to_string())
}

/// Formats an optional float with one decimal, [`MISSING`] for `None`.
pub fn fmt_opt_f1(value: Option<f64>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| format!("{:.1}", v))
}

/// ISO-8601 local timestamp to the second: `2025-03-14T09:26:53`.
pub fn fmt_timestamp<Tz: TimeZone>(ts: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    ts.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Format byte count as human-readable size: `"1.5 MB"`, `"12.0 KB"`, `"512 B"`.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;

    if bytes > MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes > KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format a duration in seconds for log lines: `"0.5s"`, `"2m5s"`.
pub fn format_secs(secs: f64) -> String {
    if secs < 60.0 {
        format!("{}s", secs)
    } else {
        let whole = secs as u64;
        format!("{}m{}s", whole / 60, whole % 60)
    }
}
