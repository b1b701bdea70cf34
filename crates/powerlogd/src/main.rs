//! powerlogd - Android power and performance sampler.
//!
//! Polls a device over `adb` at a fixed interval and appends one row per
//! round (battery, CPU utilization, per-core frequency, GPU) to a log file.

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use powerlog_core::collector::{AdbShell, Collector, Shell};
use powerlog_core::fmt::{fmt_opt, fmt_opt_f1, format_secs};
use powerlog_core::storage::{LogFormat, SampleSink, TelemetrySample, open_sink};
use powerlog_core::util::{parse_seconds, sleep_while_running};

/// Android power and performance sampler.
#[derive(Parser)]
#[command(name = "powerlogd", about = "Android power and performance sampler", version)]
struct Args {
    /// Output log file. Truncated on start.
    #[arg(short, long, default_value = "power_dumpsys_log.csv")]
    out: String,

    /// Sampling interval in seconds (fractions allowed).
    #[arg(short, long, default_value = "1.0", value_parser = parse_seconds)]
    interval: Duration,

    /// Stop after this many seconds. 0 runs until interrupted.
    #[arg(short, long, default_value = "0", value_parser = parse_seconds)]
    duration: Duration,

    /// Log format: csv or jsonl.
    #[arg(long, default_value = "csv")]
    format: LogFormat,

    /// Device serial, for when more than one device is attached.
    #[arg(short, long, env = "ANDROID_SERIAL")]
    serial: Option<String>,

    /// Path to the adb binary.
    #[arg(long, default_value = "adb")]
    adb: String,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["powerlogd", "powerlog_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Summarizes a sample for the debug log.
fn describe_sample(sample: &TelemetrySample) -> String {
    let cores_read = sample
        .cpu_core_freq_khz
        .iter()
        .filter(|f| f.is_some())
        .count();
    format!(
        "{}/{} fields, I={}mA V={}mV P={}mW cpu={}% cores={}/{} gpu={}",
        sample.present_count(),
        sample.field_count(),
        fmt_opt(sample.battery_current_ma),
        fmt_opt(sample.battery_voltage_mv),
        fmt_opt_f1(sample.device_power_mw),
        fmt_opt_f1(sample.cpu_total_util_percent),
        cores_read,
        sample.cpu_core_freq_khz.len(),
        sample.gpu_backend.map_or("none", |b| b.as_str()),
    )
}

/// Why the sampling loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopEnd {
    /// `running` was cleared.
    Stopped,
    /// The configured duration elapsed.
    DurationReached,
    /// The sink rejected a row.
    WriteFailed,
}

/// Samples until stopped, the deadline passes, or a write fails.
///
/// Each round runs to completion and is followed by a full `interval` of
/// sleep, so consecutive rows are `interval` plus the round latency apart.
/// A round that finishes after `running` was cleared is not written.
fn run_loop<S: Shell>(
    collector: &mut Collector<S>,
    sink: &mut dyn SampleSink,
    interval: Duration,
    deadline: Option<Duration>,
    running: &AtomicBool,
) -> LoopEnd {
    let started = Instant::now();

    while running.load(Ordering::SeqCst) {
        let sample = collector.collect_sample();

        if !running.load(Ordering::SeqCst) {
            debug!("Discarding round finished after shutdown signal");
            return LoopEnd::Stopped;
        }

        if let Err(e) = sink.append(&sample) {
            error!("Failed to write {}: {}", sink.path().display(), e);
            return LoopEnd::WriteFailed;
        }
        debug!(
            "Sample #{}: {}",
            sink.rows_written(),
            describe_sample(&sample)
        );
        if let Some(timing) = collector.last_timing() {
            debug!("Round took {:?}", timing.total);
        }

        if deadline.is_some_and(|d| started.elapsed() >= d) {
            info!("Duration reached");
            return LoopEnd::DurationReached;
        }

        sleep_while_running(interval, running);
    }

    LoopEnd::Stopped
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("powerlogd {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: interval={}, duration={}, output={}",
        format_secs(args.interval.as_secs_f64()),
        if !args.duration.is_zero() {
            format_secs(args.duration.as_secs_f64())
        } else {
            "unbounded".to_string()
        },
        args.out
    );

    let shell = AdbShell::new(&args.adb, args.serial.clone());
    if let Err(e) = shell.check_device() {
        error!("{}", e);
        return ExitCode::FAILURE;
    }
    match shell.serial() {
        Some(serial) => info!("Device {} ready", serial),
        None => info!("Device ready"),
    }

    let mut collector = Collector::new(shell);
    let schema = collector.schema().clone();
    if schema.core_count() == 0 {
        warn!("No CPU cores detected; per-core frequency columns are omitted");
    } else {
        info!("Detected {} CPU cores", schema.core_count());
    }

    let mut sink = match open_sink(args.format, &args.out, &schema) {
        Ok(sink) => sink,
        Err(e) => {
            error!("Cannot create {}: {}", args.out, e);
            return ExitCode::FAILURE;
        }
    };
    info!("Logging to {}", sink.path().display());

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    collector.prime();

    let deadline = (!args.duration.is_zero()).then_some(args.duration);
    let started = Instant::now();

    info!("Starting sampling loop");
    let end = run_loop(&mut collector, sink.as_mut(), args.interval, deadline, &running);

    info!(
        "Shutting down: {} samples in {} written to {}",
        sink.rows_written(),
        format_secs(started.elapsed().as_secs_f64().round()),
        sink.path().display()
    );

    match end {
        LoopEnd::WriteFailed => ExitCode::FAILURE,
        LoopEnd::Stopped | LoopEnd::DurationReached => ExitCode::SUCCESS,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use powerlog_core::collector::{MockShell, ShellError};
    use powerlog_core::storage::{GpuBackend, SampleSchema, Timestamp};
    use std::io;
    use std::path::{Path, PathBuf};

    /// In-memory sink that can be told to reject every row.
    #[derive(Default)]
    struct MemorySink {
        rows: Vec<TelemetrySample>,
        reject: bool,
        path: PathBuf,
    }

    impl SampleSink for MemorySink {
        fn append(&mut self, sample: &TelemetrySample) -> io::Result<()> {
            if self.reject {
                return Err(io::Error::other("no space left on device"));
            }
            self.rows.push(sample.clone());
            Ok(())
        }

        fn path(&self) -> &Path {
            &self.path
        }

        fn rows_written(&self) -> u64 {
            self.rows.len() as u64
        }
    }

    /// Clears `running` when `trigger` is run, as Ctrl-C would mid-round.
    struct StopOnCommand {
        inner: MockShell,
        running: Arc<AtomicBool>,
        trigger: &'static str,
    }

    impl Shell for StopOnCommand {
        fn run(&self, command: &str) -> Result<String, ShellError> {
            if command == self.trigger {
                self.running.store(false, Ordering::SeqCst);
            }
            self.inner.run(command)
        }
    }

    #[test]
    fn parse_args_as_durations() {
        let args = Args::try_parse_from(["powerlogd", "-i", "0.5", "-d", "30"]).unwrap();
        assert_eq!(args.interval, Duration::from_millis(500));
        assert_eq!(args.duration, Duration::from_secs(30));
    }

    #[test]
    fn args_defaults() {
        let args = Args::try_parse_from(["powerlogd"]).unwrap();
        assert_eq!(args.out, "power_dumpsys_log.csv");
        assert_eq!(args.interval, Duration::from_secs(1));
        assert_eq!(args.duration, Duration::ZERO);
        assert_eq!(args.format, LogFormat::Csv);
        assert_eq!(args.adb, "adb");
    }

    #[test]
    fn args_reject_negative_interval() {
        assert!(Args::try_parse_from(["powerlogd", "--interval", "-0.5"]).is_err());
    }

    #[test]
    fn args_reject_out_of_range_seconds() {
        assert!(Args::try_parse_from(["powerlogd", "--interval", "1e20"]).is_err());
        assert!(Args::try_parse_from(["powerlogd", "--duration", "1e20"]).is_err());
    }

    #[test]
    fn describe_sample_counts_present_fields() {
        let schema = SampleSchema::new(vec![0, 1]);
        let now = Timestamp::from(std::time::SystemTime::now());
        let mut sample = TelemetrySample::missing(&schema, now);
        sample.battery_current_ma = Some(-300);
        sample.cpu_core_freq_khz[0] = Some(1_000_000);
        sample.gpu_backend = Some(GpuBackend::Mali);

        let desc = describe_sample(&sample);
        assert!(desc.starts_with("3/10 fields"));
        assert!(desc.contains("I=-300mA"));
        assert!(desc.contains("V=mV"));
        assert!(desc.contains("cores=1/2"));
        assert!(desc.ends_with("gpu=mali"));
    }

    #[test]
    fn run_loop_period_is_interval_plus_round_latency() {
        let latency = Duration::from_millis(5);
        let mut shell = MockShell::kgsl_device();
        shell.set_latency(latency);
        let observer = shell.clone();

        let mut collector = Collector::new(shell);
        observer.clear_calls();
        let mut sink = MemorySink::default();
        let running = AtomicBool::new(true);
        let interval = Duration::from_millis(300);

        // The deadline passes during the second round.
        let end = run_loop(
            &mut collector,
            &mut sink,
            interval,
            Some(Duration::from_millis(250)),
            &running,
        );

        assert_eq!(end, LoopEnd::DurationReached);
        assert_eq!(sink.rows.len(), 2);
        let per_round = observer.calls().len() as u32 / 2;
        let min_round = latency * per_round;
        assert!(per_round > 0);

        // The interval is not shortened by the time a round takes.
        let gap = (sink.rows[1].timestamp - sink.rows[0].timestamp)
            .to_std()
            .unwrap();
        assert!(gap >= interval + min_round, "gap was {:?}", gap);
    }

    #[test]
    fn run_loop_stops_after_first_row_past_deadline() {
        let mut collector = Collector::new(MockShell::kgsl_device());
        let mut sink = MemorySink::default();
        let running = AtomicBool::new(true);

        let start = Instant::now();
        let end = run_loop(
            &mut collector,
            &mut sink,
            Duration::from_secs(10),
            Some(Duration::from_nanos(1)),
            &running,
        );

        assert_eq!(end, LoopEnd::DurationReached);
        assert_eq!(sink.rows.len(), 1);
        // No sleep after the final row.
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn run_loop_drops_round_finished_after_stop() {
        let running = Arc::new(AtomicBool::new(true));
        let inner = MockShell::kgsl_device();
        let observer = inner.clone();
        let shell = StopOnCommand {
            inner,
            running: running.clone(),
            trigger: "dumpsys battery",
        };

        let mut collector = Collector::new(shell);
        let mut sink = MemorySink::default();
        let end = run_loop(&mut collector, &mut sink, Duration::ZERO, None, &running);

        assert_eq!(end, LoopEnd::Stopped);
        assert!(sink.rows.is_empty());
        // The round itself ran to completion before being discarded.
        assert_eq!(observer.call_count("dumpsys battery"), 1);
        assert!(collector.last_timing().is_some());
    }

    #[test]
    fn run_loop_stops_on_write_failure() {
        let shell = MockShell::kgsl_device();
        let observer = shell.clone();
        let mut collector = Collector::new(shell);
        let mut sink = MemorySink {
            reject: true,
            ..MemorySink::default()
        };
        let running = AtomicBool::new(true);

        let end = run_loop(&mut collector, &mut sink, Duration::ZERO, None, &running);

        assert_eq!(end, LoopEnd::WriteFailed);
        assert_eq!(sink.rows_written(), 0);
        assert_eq!(observer.call_count("dumpsys battery"), 1);
    }

    #[test]
    fn run_loop_does_nothing_when_already_stopped() {
        let shell = MockShell::kgsl_device();
        let observer = shell.clone();
        let mut collector = Collector::new(shell);
        observer.clear_calls();
        let mut sink = MemorySink::default();
        let running = AtomicBool::new(false);

        let end = run_loop(&mut collector, &mut sink, Duration::ZERO, None, &running);

        assert_eq!(end, LoopEnd::Stopped);
        assert!(observer.calls().is_empty());
    }
}
