//! Sample assembler that combines the battery, CPU and GPU sources.
//!
//! The `Collector` struct runs one sampling round at a time and produces a
//! `TelemetrySample` shaped by the schema it detected at construction.

use std::time::{Duration, Instant};

use chrono::Local;
use tracing::{debug, trace};

use crate::collector::battery::BatteryReading;
use crate::collector::cpu::{CounterSnapshot, CpuUtilTracker, list_cores, read_core_freq};
use crate::collector::gpu::read_gpu;
use crate::collector::shell::Shell;
use crate::storage::model::{SampleSchema, TelemetrySample};

/// Timing information for each sampling phase.
///
/// Used for debugging; the round latency adds to the configured interval.
#[derive(Debug, Clone, Default)]
pub struct CollectorTiming {
    /// Total round time.
    pub total: Duration,
    /// Time to dump and parse battery state.
    pub battery: Duration,
    /// Time to read `/proc/stat`.
    pub cpu_util: Duration,
    /// Time to read every core frequency.
    pub cpu_freq: Duration,
    /// Time to probe the GPU backends.
    pub gpu: Duration,
}

/// Assembles telemetry samples from a device shell.
///
/// Owns the CPU counter tracker, so utilization deltas always span exactly
/// one round of this collector.
pub struct Collector<S: Shell> {
    shell: S,
    schema: SampleSchema,
    cpu_tracker: CpuUtilTracker,
    /// Timing information from the last collect_sample call.
    last_timing: Option<CollectorTiming>,
}

impl<S: Shell> Collector<S> {
    /// Creates a collector, probing the device once for its core count.
    pub fn new(shell: S) -> Self {
        let cores = list_cores(&shell);
        debug!("detected {} cpu cores", cores.len());
        Self::with_schema(shell, SampleSchema::new(cores))
    }

    /// Creates a collector with an already known schema.
    pub fn with_schema(shell: S, schema: SampleSchema) -> Self {
        Self {
            shell,
            schema,
            cpu_tracker: CpuUtilTracker::new(),
            last_timing: None,
        }
    }

    /// Returns the column layout of this run.
    pub fn schema(&self) -> &SampleSchema {
        &self.schema
    }

    pub fn shell(&self) -> &S {
        &self.shell
    }

    /// Returns timing information from the last collect_sample call.
    pub fn last_timing(&self) -> Option<&CollectorTiming> {
        self.last_timing.as_ref()
    }

    /// Takes the baseline CPU counter snapshot.
    ///
    /// Call once before the sampling loop starts so the first sample's
    /// utilization covers one interval rather than the time since boot.
    pub fn prime(&mut self) {
        if let Some(snapshot) = CounterSnapshot::read(&self.shell) {
            self.cpu_tracker.utilization(snapshot);
        } else {
            debug!("could not prime cpu counters; first utilization will be missing");
        }
    }

    /// Runs one sampling round.
    ///
    /// Never fails: every source that cannot be read leaves its fields
    /// missing. Queries run strictly one after another.
    pub fn collect_sample(&mut self) -> TelemetrySample {
        let total_start = Instant::now();
        let mut timing = CollectorTiming::default();

        let mut sample = TelemetrySample::missing(&self.schema, Local::now());

        // Battery
        let start = Instant::now();
        let battery = BatteryReading::read(&self.shell);
        sample.battery_current_ma = battery.current_ma;
        sample.battery_voltage_mv = battery.voltage_mv;
        sample.device_power_mw = battery.power_mw();
        sample.battery_temp_c = battery.temperature_c();
        timing.battery = start.elapsed();

        // CPU utilization. A failed read leaves the previous snapshot in
        // place, so the next successful read spans the gap.
        let start = Instant::now();
        sample.cpu_total_util_percent =
            CounterSnapshot::read(&self.shell).and_then(|s| self.cpu_tracker.utilization(s));
        timing.cpu_util = start.elapsed();

        // Per-core frequencies, one column per core detected at startup
        let start = Instant::now();
        for (slot, &core) in sample
            .cpu_core_freq_khz
            .iter_mut()
            .zip(self.schema.cores())
        {
            *slot = read_core_freq(&self.shell, core).value();
        }
        timing.cpu_freq = start.elapsed();

        // GPU
        let start = Instant::now();
        if let Some(gpu) = read_gpu(&self.shell).value() {
            sample.gpu_backend = Some(gpu.backend);
            sample.gpu_util_percent = gpu.util_percent;
            sample.gpu_freq_hz = gpu.freq_hz;
        }
        timing.gpu = start.elapsed();

        timing.total = total_start.elapsed();
        trace!(
            "round timing: battery={:?} cpu_util={:?} cpu_freq={:?} gpu={:?} total={:?}",
            timing.battery, timing.cpu_util, timing.cpu_freq, timing.gpu, timing.total
        );
        self.last_timing = Some(timing);

        sample
    }
}
