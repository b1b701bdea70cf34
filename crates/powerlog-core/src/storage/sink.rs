//! Append-only sample logs.
//!
//! Each row is written with a single buffered write and flushed immediately,
//! so an interrupted run leaves only complete rows behind.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use super::model::{SampleSchema, TelemetrySample};

/// On-disk format of the sample log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Comma-separated with a header row; empty cells mark missing values.
    #[default]
    Csv,
    /// One JSON object per line; `null` marks missing values.
    JsonLines,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(LogFormat::Csv),
            "jsonl" | "json-lines" | "ndjson" => Ok(LogFormat::JsonLines),
            other => Err(format!("unknown log format '{}' (expected csv or jsonl)", other)),
        }
    }
}

/// Destination for sampled rows.
pub trait SampleSink {
    /// Appends one complete row.
    ///
    /// Fails with `InvalidInput` when the sample does not have the shape the
    /// log was created with.
    fn append(&mut self, sample: &TelemetrySample) -> io::Result<()>;

    /// Path of the log file.
    fn path(&self) -> &Path;

    /// Rows appended so far (header excluded).
    fn rows_written(&self) -> u64;
}

/// Creates (truncating) a log of the given format at `path`.
pub fn open_sink(
    format: LogFormat,
    path: impl AsRef<Path>,
    schema: &SampleSchema,
) -> io::Result<Box<dyn SampleSink>> {
    Ok(match format {
        LogFormat::Csv => Box::new(CsvLog::create(path, schema)?),
        LogFormat::JsonLines => Box::new(JsonLinesLog::create(path, schema)?),
    })
}

fn shape_error(expected: usize, got: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("sample has {} core columns, log expects {}", got, expected),
    )
}

/// CSV sample log.
pub struct CsvLog {
    writer: BufWriter<File>,
    path: PathBuf,
    core_count: usize,
    rows: u64,
}

impl CsvLog {
    /// Creates the file and writes the header row.
    pub fn create(path: impl AsRef<Path>, schema: &SampleSchema) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        let mut log = Self {
            writer: BufWriter::new(file),
            path,
            core_count: schema.core_count(),
            rows: 0,
        };
        log.write_line(&schema.header())?;
        debug!("CSV log created at {}", log.path.display());
        Ok(log)
    }

    fn write_line(&mut self, fields: &[String]) -> io::Result<()> {
        let line = fields
            .iter()
            .map(|f| escape_field(f))
            .collect::<Vec<_>>()
            .join(",");
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

impl SampleSink for CsvLog {
    fn append(&mut self, sample: &TelemetrySample) -> io::Result<()> {
        if sample.cpu_core_freq_khz.len() != self.core_count {
            return Err(shape_error(self.core_count, sample.cpu_core_freq_khz.len()));
        }
        self.write_line(&sample.to_row())?;
        self.rows += 1;
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn rows_written(&self) -> u64 {
        self.rows
    }
}

/// Quotes a CSV field when it contains a separator, quote or line break.
fn escape_field(field: &str) -> std::borrow::Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\"")).into()
    } else {
        field.into()
    }
}

/// JSON-lines sample log.
pub struct JsonLinesLog {
    writer: BufWriter<File>,
    path: PathBuf,
    core_count: usize,
    rows: u64,
}

impl JsonLinesLog {
    pub fn create(path: impl AsRef<Path>, schema: &SampleSchema) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        debug!("JSON-lines log created at {}", path.display());
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            core_count: schema.core_count(),
            rows: 0,
        })
    }
}

impl SampleSink for JsonLinesLog {
    fn append(&mut self, sample: &TelemetrySample) -> io::Result<()> {
        if sample.cpu_core_freq_khz.len() != self.core_count {
            return Err(shape_error(self.core_count, sample.cpu_core_freq_khz.len()));
        }
        let mut line = serde_json::to_vec(sample)?;
        line.push(b'\n');
        self.writer.write_all(&line)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn rows_written(&self) -> u64 {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::model::GpuBackend;
    use chrono::{Local, TimeZone};
    use tempfile::TempDir;

    fn sample(schema: &SampleSchema) -> TelemetrySample {
        let ts = Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        TelemetrySample {
            battery_current_ma: Some(-345),
            battery_voltage_mv: Some(4000),
            device_power_mw: Some(1380.0),
            cpu_core_freq_khz: vec![Some(1_804_800), None],
            gpu_backend: Some(GpuBackend::Kgsl),
            ..TelemetrySample::missing(schema, ts)
        }
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("csv".parse::<LogFormat>(), Ok(LogFormat::Csv));
        assert_eq!("JSONL".parse::<LogFormat>(), Ok(LogFormat::JsonLines));
        assert!("parquet".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_csv_log_writes_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        let schema = SampleSchema::new(vec![0, 1]);

        let mut log = CsvLog::create(&path, &schema).unwrap();
        log.append(&sample(&schema)).unwrap();
        log.append(&TelemetrySample::missing(&schema, Local::now()))
            .unwrap();
        assert_eq!(log.rows_written(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], schema.header().join(","));
        assert_eq!(
            lines[1],
            "2025-03-14T09:26:53,-345,4000,1380.0,,,1804800,,kgsl,,"
        );
        // Missing row: timestamp followed by ten empty cells.
        assert!(lines[2].ends_with(",,,,,,,,,,"));
        assert_eq!(lines[2].split(',').count(), 11);
        assert!(lines[2].split(',').skip(1).all(str::is_empty));
    }

    #[test]
    fn test_csv_log_rejects_wrong_shape() {
        let dir = TempDir::new().unwrap();
        let schema = SampleSchema::new(vec![0, 1]);
        let mut log = CsvLog::create(dir.path().join("log.csv"), &schema).unwrap();

        let other = SampleSchema::new(vec![0, 1, 2]);
        let err = log
            .append(&TelemetrySample::missing(&other, Local::now()))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(log.rows_written(), 0);
    }

    #[test]
    fn test_jsonl_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        let schema = SampleSchema::new(vec![0, 1]);

        let mut log = open_sink(LogFormat::JsonLines, &path, &schema).unwrap();
        log.append(&sample(&schema)).unwrap();
        assert_eq!(log.path(), path.as_path());

        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(value["battery_current_mA"], -345);
        assert!(value["battery_temp_C"].is_null());
        assert_eq!(value["cpu_core_freq_kHz"][0], 1804800);
        assert!(value["cpu_core_freq_kHz"][1].is_null());
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
