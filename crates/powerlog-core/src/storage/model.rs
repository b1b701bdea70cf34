//! Telemetry sample structures.
//!
//! A run has one [`SampleSchema`], fixed at startup from the device's core
//! count. Every [`TelemetrySample`] of the run carries exactly the fields the
//! schema describes; a value that could not be obtained is `None`, never a
//! numeric placeholder.

use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};

use crate::fmt::{fmt_opt, fmt_opt_f1, fmt_timestamp};

/// Wall-clock time of a sample, in the device host's local zone.
pub type Timestamp = DateTime<Local>;

/// GPU vendor backend a sample's GPU metrics came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuBackend {
    /// Qualcomm Adreno (KGSL busy/total counters).
    Kgsl,
    /// Arm Mali (devfreq utilization file).
    Mali,
}

impl GpuBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            GpuBackend::Kgsl => "kgsl",
            GpuBackend::Mali => "mali",
        }
    }
}

impl std::fmt::Display for GpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column layout of one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleSchema {
    cores: Vec<u32>,
}

impl SampleSchema {
    /// Columns before the per-core frequencies.
    pub const LEADING_COLUMNS: [&'static str; 6] = [
        "timestamp",
        "battery_current_mA",
        "battery_voltage_mV",
        "device_power_mW",
        "battery_temp_C",
        "cpu_total_util_percent",
    ];

    /// Columns after the per-core frequencies.
    pub const TRAILING_COLUMNS: [&'static str; 3] =
        ["gpu_backend", "gpu_util_percent", "gpu_freq_Hz"];

    pub fn new(cores: Vec<u32>) -> Self {
        Self { cores }
    }

    /// Core indices sampled for frequency, in column order.
    pub fn cores(&self) -> &[u32] {
        &self.cores
    }

    pub fn core_count(&self) -> usize {
        self.cores.len()
    }

    /// Ordered column names.
    pub fn header(&self) -> Vec<String> {
        let mut header: Vec<String> = Self::LEADING_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .collect();
        header.extend(self.cores.iter().map(|c| format!("cpu{}_freq_kHz", c)));
        header.extend(Self::TRAILING_COLUMNS.iter().map(|c| c.to_string()));
        header
    }
}

/// One sampling round.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TelemetrySample {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: Timestamp,
    #[serde(rename = "battery_current_mA")]
    pub battery_current_ma: Option<i64>,
    #[serde(rename = "battery_voltage_mV")]
    pub battery_voltage_mv: Option<u64>,
    #[serde(rename = "device_power_mW")]
    pub device_power_mw: Option<f64>,
    #[serde(rename = "battery_temp_C")]
    pub battery_temp_c: Option<f64>,
    pub cpu_total_util_percent: Option<f64>,
    /// One entry per schema core, in schema order.
    #[serde(rename = "cpu_core_freq_kHz")]
    pub cpu_core_freq_khz: Vec<Option<u64>>,
    pub gpu_backend: Option<GpuBackend>,
    pub gpu_util_percent: Option<f64>,
    #[serde(rename = "gpu_freq_Hz")]
    pub gpu_freq_hz: Option<u64>,
}

impl TelemetrySample {
    /// A sample in which every field is missing, shaped by `schema`.
    pub fn missing(schema: &SampleSchema, timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            battery_current_ma: None,
            battery_voltage_mv: None,
            device_power_mw: None,
            battery_temp_c: None,
            cpu_total_util_percent: None,
            cpu_core_freq_khz: vec![None; schema.core_count()],
            gpu_backend: None,
            gpu_util_percent: None,
            gpu_freq_hz: None,
        }
    }

    /// Number of fields that hold a value, out of [`Self::field_count`].
    pub fn present_count(&self) -> usize {
        let scalars = [
            self.battery_current_ma.is_some(),
            self.battery_voltage_mv.is_some(),
            self.device_power_mw.is_some(),
            self.battery_temp_c.is_some(),
            self.cpu_total_util_percent.is_some(),
            self.gpu_backend.is_some(),
            self.gpu_util_percent.is_some(),
            self.gpu_freq_hz.is_some(),
        ];
        scalars.iter().filter(|&&p| p).count()
            + self.cpu_core_freq_khz.iter().filter(|f| f.is_some()).count()
    }

    /// Number of value fields (timestamp excluded).
    pub fn field_count(&self) -> usize {
        8 + self.cpu_core_freq_khz.len()
    }

    /// Textual row in [`SampleSchema::header`] order.
    ///
    /// Missing values are empty strings; floats carry one decimal.
    pub fn to_row(&self) -> Vec<String> {
        let mut row = vec![
            fmt_timestamp(&self.timestamp),
            fmt_opt(self.battery_current_ma),
            fmt_opt(self.battery_voltage_mv),
            fmt_opt_f1(self.device_power_mw),
            fmt_opt_f1(self.battery_temp_c),
            fmt_opt_f1(self.cpu_total_util_percent),
        ];
        row.extend(self.cpu_core_freq_khz.iter().map(|f| fmt_opt(*f)));
        row.push(fmt_opt(self.gpu_backend));
        row.push(fmt_opt_f1(self.gpu_util_percent));
        row.push(fmt_opt(self.gpu_freq_hz));
        row
    }
}

fn serialize_timestamp<S: Serializer>(ts: &Timestamp, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&fmt_timestamp(ts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
    }

    #[test]
    fn test_header_layout() {
        let schema = SampleSchema::new(vec![0, 1]);
        assert_eq!(
            schema.header(),
            vec![
                "timestamp",
                "battery_current_mA",
                "battery_voltage_mV",
                "device_power_mW",
                "battery_temp_C",
                "cpu_total_util_percent",
                "cpu0_freq_kHz",
                "cpu1_freq_kHz",
                "gpu_backend",
                "gpu_util_percent",
                "gpu_freq_Hz",
            ]
        );
    }

    #[test]
    fn test_header_without_cores() {
        let schema = SampleSchema::new(Vec::new());
        assert_eq!(schema.header().len(), 9);
    }

    #[test]
    fn test_missing_row_is_blank_not_zero() {
        let schema = SampleSchema::new(vec![0, 1, 2, 3]);
        let sample = TelemetrySample::missing(&schema, ts());
        let row = sample.to_row();

        assert_eq!(row.len(), schema.header().len());
        assert_eq!(row[0], "2025-03-14T09:26:53");
        assert!(row[1..].iter().all(|v| v.is_empty()));
        assert_eq!(sample.present_count(), 0);
        assert_eq!(sample.field_count(), 12);
    }

    #[test]
    fn test_zero_values_are_written_as_zero() {
        let schema = SampleSchema::new(vec![0]);
        let sample = TelemetrySample {
            battery_current_ma: Some(0),
            battery_voltage_mv: Some(3900),
            device_power_mw: Some(0.0),
            battery_temp_c: Some(0.0),
            cpu_total_util_percent: Some(0.0),
            cpu_core_freq_khz: vec![Some(0)],
            gpu_backend: Some(GpuBackend::Mali),
            gpu_util_percent: Some(0.0),
            gpu_freq_hz: Some(0),
            ..TelemetrySample::missing(&schema, ts())
        };

        assert_eq!(
            sample.to_row()[1..],
            ["0", "3900", "0.0", "0.0", "0.0", "0", "mali", "0.0", "0"]
        );
        assert_eq!(sample.present_count(), sample.field_count());
    }

    #[test]
    fn test_json_uses_null_for_missing() {
        let schema = SampleSchema::new(vec![0, 1]);
        let mut sample = TelemetrySample::missing(&schema, ts());
        sample.cpu_core_freq_khz[1] = Some(1_804_800);
        sample.gpu_backend = Some(GpuBackend::Kgsl);
        sample.battery_current_ma = Some(0);

        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["timestamp"], "2025-03-14T09:26:53");
        assert_eq!(json["battery_current_mA"], 0);
        assert!(json["battery_voltage_mV"].is_null());
        assert!(json["device_power_mW"].is_null());
        assert_eq!(
            json["cpu_core_freq_kHz"],
            serde_json::json!([null, 1804800])
        );
        assert_eq!(json["gpu_backend"], "kgsl");
    }
}
