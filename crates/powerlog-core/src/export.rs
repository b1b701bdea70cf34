//! Extractors that turn sample logs into JSON series.
//!
//! Each extractor reads its input line by line and returns the values in
//! file order; rows without a usable value are skipped, never zero-filled.

use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

/// Error type for extraction failures.
#[derive(Debug)]
pub enum ExportError {
    /// Reading the input or writing the output failed.
    Io(io::Error),
    /// Serializing the payload failed.
    Json(serde_json::Error),
    /// The CSV header lacks a required column.
    MissingColumn(String),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Io(e) => write!(f, "I/O error: {}", e),
            ExportError::Json(e) => write!(f, "JSON error: {}", e),
            ExportError::MissingColumn(name) => write!(f, "column '{}' not found in header", name),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<io::Error> for ExportError {
    fn from(e: io::Error) -> Self {
        ExportError::Io(e)
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(e: serde_json::Error) -> Self {
        ExportError::Json(e)
    }
}

/// Current readings above this are taken to be in µA rather than mA.
pub const MICROAMP_THRESHOLD: f64 = 10_000.0;

// ── Payloads ──

#[derive(Debug, Serialize)]
pub struct GpuUtilizationSeries {
    pub gpu_utilization: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct PowerDrawSeries {
    /// Watts, rounded to three decimals.
    pub power_draw: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct MemoryUtilizationSeries {
    /// Megabytes.
    pub memory_utilization: Vec<f64>,
}

/// Writes `payload` as indented JSON, replacing `path`.
pub fn write_json<T: Serialize>(path: impl AsRef<Path>, payload: &T) -> Result<(), ExportError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, payload)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

// ── CSV input ──

/// Header-addressed reader over a sample CSV.
pub struct CsvColumns<R: BufRead> {
    lines: io::Lines<R>,
    indices: Vec<usize>,
}

impl<R: BufRead> CsvColumns<R> {
    /// Reads the header and locates `columns`.
    ///
    /// An empty input has no header and fails like a missing column.
    pub fn new(reader: R, columns: &[&str]) -> Result<Self, ExportError> {
        let mut lines = reader.lines();
        let header = match lines.next() {
            Some(line) => split_csv_line(&line?),
            None => Vec::new(),
        };

        let indices = columns
            .iter()
            .map(|&name| {
                header
                    .iter()
                    .position(|h| h.trim() == name)
                    .ok_or_else(|| ExportError::MissingColumn(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { lines, indices })
    }
}

impl<R: BufRead> Iterator for CsvColumns<R> {
    /// The requested cells of one row, trimmed; short rows yield empty cells.
    type Item = io::Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            if line.trim().is_empty() {
                continue;
            }
            let fields = split_csv_line(&line);
            let cells = self
                .indices
                .iter()
                .map(|&i| fields.get(i).map_or("", |f| f.trim()).to_string())
                .collect();
            return Some(Ok(cells));
        }
    }
}

/// Splits one CSV line, honoring double-quoted fields.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => quoted = false,
            ('"', false) if field.is_empty() => quoted = true,
            (',', false) => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

fn parse_cell(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ── Extractors ──

/// Collects every parseable `gpu_util_percent` value.
pub fn gpu_utilization(reader: impl BufRead) -> Result<Vec<f64>, ExportError> {
    let mut values = Vec::new();
    for row in CsvColumns::new(reader, &["gpu_util_percent"])? {
        if let Some(v) = parse_cell(&row?[0]) {
            values.push(v);
        }
    }
    Ok(values)
}

/// Computes power draw in watts for every row with both current and voltage.
pub fn power_draw(reader: impl BufRead) -> Result<Vec<f64>, ExportError> {
    let mut values = Vec::new();
    for row in CsvColumns::new(reader, &["battery_current_mA", "battery_voltage_mV"])? {
        let row = row?;
        if let (Some(current), Some(voltage)) = (parse_cell(&row[0]), parse_cell(&row[1])) {
            values.push(watts(current, voltage));
        }
    }
    Ok(values)
}

/// Power in W from a raw current reading and a voltage in mV.
///
/// The current unit is guessed from its magnitude: above
/// [`MICROAMP_THRESHOLD`] it is µA, otherwise mA. Sign is preserved.
pub fn watts(current: f64, voltage_mv: f64) -> f64 {
    let amps = if current > MICROAMP_THRESHOLD {
        current / 1_000_000.0
    } else {
        current / 1000.0
    };
    round3(amps * voltage_mv / 1000.0)
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Collects every `Global GPU memory: <float> MB` value from a text log.
///
/// Sizes printed in other units are skipped.
pub fn gpu_memory(reader: impl BufRead) -> Result<Vec<f64>, ExportError> {
    let mut values = Vec::new();
    for line in reader.lines() {
        if let Some(v) = global_memory_mb(&line?) {
            values.push(v);
        }
    }
    Ok(values)
}

fn global_memory_mb(line: &str) -> Option<f64> {
    const MARKER: &str = "Global GPU memory:";

    let rest = &line[line.find(MARKER)? + MARKER.len()..];
    let number = rest.trim_start();
    if number.len() == rest.len() {
        return None;
    }

    let end = number
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(number.len());
    let (digits, unit) = number.split_at(end);
    let unit_rest = unit.trim_start();
    if digits.is_empty() || unit_rest.len() == unit.len() || !unit_rest.starts_with("MB") {
        return None;
    }
    digits.parse().ok()
}
