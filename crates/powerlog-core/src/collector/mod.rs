//! Telemetry collector for Android devices reachable over `adb`.
//!
//! This module turns loosely formatted, vendor-specific text produced by the
//! device shell into one fixed-shape [`TelemetrySample`](crate::storage::TelemetrySample)
//! per sampling round.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Collector                           │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌────────────────┐  │
//! │  │   battery    │  │       cpu        │  │      gpu       │  │
//! │  │ dumpsys      │  │ /proc/stat delta │  │ kgsl → mali    │  │
//! │  │ FieldRules   │  │ cpufreq probes   │  │ probes         │  │
//! │  └──────┬───────┘  └────────┬─────────┘  └───────┬────────┘  │
//! │         └───────────────────┼────────────────────┘           │
//! │                      ┌──────▼──────┐                         │
//! │                      │    Shell    │ (trait)                 │
//! │                      └──────┬──────┘                         │
//! └─────────────────────────────┼────────────────────────────────┘
//!                               │
//!               ┌───────────────┼───────────────┐
//!               │               │               │
//!        ┌──────▼──────┐ ┌──────▼──────┐ ┌──────▼──────┐
//!        │  AdbShell   │ │  MockShell  │ │  Scenarios  │
//!        │ (device)    │ │ (Testing)   │ │ (Fixtures)  │
//!        └─────────────┘ └─────────────┘ └─────────────┘
//! ```
//!
//! # Usage
//!
//! ## Production
//!
//! ```ignore
//! use powerlog_core::collector::{AdbShell, Collector};
//!
//! let shell = AdbShell::new("adb", None);
//! shell.check_device()?;
//! let mut collector = Collector::new(shell);
//! collector.prime();
//! let sample = collector.collect_sample();
//! ```
//!
//! ## Testing (with MockShell)
//!
//! ```
//! use powerlog_core::collector::{Collector, MockShell};
//!
//! let shell = MockShell::kgsl_device();
//! let mut collector = Collector::new(shell);
//! let sample = collector.collect_sample();
//! assert_eq!(sample.cpu_core_freq_khz.len(), collector.schema().core_count());
//! ```

pub mod battery;
#[allow(clippy::module_inception)]
mod collector;
pub mod cpu;
pub mod gpu;
pub mod gpu_memory;
pub mod mock;
pub mod parser;
pub mod probe;
pub mod shell;

pub use battery::BatteryReading;
pub use collector::{Collector, CollectorTiming};
pub use cpu::{CounterSnapshot, CpuUtilTracker};
pub use gpu::{GpuReading, GpuSource};
pub use gpu_memory::{GpuMemorySnapshot, ProcessGpuMemory};
pub use mock::MockShell;
pub use probe::{ProbeCandidate, ProbeResult, probe};
pub use shell::{AdbShell, DeviceError, Shell, ShellError};
