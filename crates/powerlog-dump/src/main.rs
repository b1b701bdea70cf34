//! powerlog-dump - inspect powerlog output and live GPU memory.
//!
//! Extractors turn a sample log into JSON series for plotting; `gpu-top`
//! prints a refreshing per-process GPU memory table from a device.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{Level, debug, error, warn};
use tracing_subscriber::EnvFilter;

use powerlog_core::collector::{AdbShell, GpuMemorySnapshot};
use powerlog_core::export::{
    self, ExportError, GpuUtilizationSeries, MemoryUtilizationSeries, PowerDrawSeries,
};
use powerlog_core::fmt::format_size;
use powerlog_core::util::{parse_seconds, sleep_while_running};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "powerlog-dump", about = "Inspect powerlog output", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Extract gpu_util_percent values from a sample CSV.
    GpuUtil {
        #[arg(short, long, default_value = "power_dumpsys_log.csv")]
        input: PathBuf,
        #[arg(short, long, default_value = "gpu_util.json")]
        output: PathBuf,
    },
    /// Compute power draw in watts from a sample CSV.
    PowerDraw {
        #[arg(short, long, default_value = "power_dumpsys_log.csv")]
        input: PathBuf,
        #[arg(short, long, default_value = "power_draw.json")]
        output: PathBuf,
    },
    /// Extract "Global GPU memory" values (MB) from a gpu-top capture.
    GpuMemory {
        #[arg(short, long, default_value = "memory.txt")]
        input: PathBuf,
        #[arg(short, long, default_value = "memory_util.json")]
        output: PathBuf,
    },
    /// Print per-process GPU memory from `dumpsys gpu` until interrupted.
    GpuTop {
        /// Refresh interval in seconds.
        #[arg(short, long, default_value = "2", value_parser = parse_seconds)]
        interval: Duration,

        /// Device serial, for when more than one device is attached.
        #[arg(short, long, env = "ANDROID_SERIAL")]
        serial: Option<String>,

        /// Path to the adb binary.
        #[arg(long, default_value = "adb")]
        adb: String,
    },
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::WARN,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["powerlog_dump", "powerlog_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Command::GpuUtil { input, output } => extract(&input, &output, |reader| {
            let values = export::gpu_utilization(reader)?;
            Ok((values.len(), GpuUtilizationSeries {
                gpu_utilization: values,
            }))
        }),
        Command::PowerDraw { input, output } => extract(&input, &output, |reader| {
            let values = export::power_draw(reader)?;
            Ok((values.len(), PowerDrawSeries { power_draw: values }))
        }),
        Command::GpuMemory { input, output } => extract(&input, &output, |reader| {
            let values = export::gpu_memory(reader)?;
            Ok((values.len(), MemoryUtilizationSeries {
                memory_utilization: values,
            }))
        }),
        Command::GpuTop {
            interval,
            serial,
            adb,
        } => return gpu_top(AdbShell::new(adb, serial), interval),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

// ── Extractors ───────────────────────────────────────────────────────────────

/// Runs one extractor over `input` and writes its payload to `output`.
fn extract<T, F>(input: &Path, output: &Path, run: F) -> Result<(), ExportError>
where
    T: serde::Serialize,
    F: FnOnce(BufReader<File>) -> Result<(usize, T), ExportError>,
{
    let file = File::open(input).map_err(|e| {
        ExportError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", input.display(), e),
        ))
    })?;
    let (count, payload) = run(BufReader::new(file))?;
    if count == 0 {
        warn!("no values found in {}", input.display());
    }
    export::write_json(output, &payload)?;
    println!("Wrote {} with {} values", output.display(), count);
    Ok(())
}

// ── gpu-top ──────────────────────────────────────────────────────────────────

const RULE_WIDTH: usize = 60;

/// Renders one `gpu-top` frame.
fn render_snapshot(snapshot: &GpuMemorySnapshot) -> String {
    let mut out = String::new();
    out.push_str(&"=".repeat(RULE_WIDTH));
    out.push('\n');
    out.push_str(&format!(
        "Global GPU memory: {}\n",
        format_size(snapshot.global_bytes)
    ));
    out.push_str(&format!("{:>6} {:>10}  Process\n", "PID", "Memory"));
    out.push_str(&"-".repeat(RULE_WIDTH));
    out.push('\n');
    for process in &snapshot.processes {
        out.push_str(&format!(
            "{:>6} {:>10}  {}\n",
            process.pid,
            format_size(process.bytes),
            process.name.as_deref().unwrap_or("?")
        ));
    }
    out
}

fn gpu_top(shell: AdbShell, interval: Duration) -> ExitCode {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || r.store(false, Ordering::SeqCst)) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    while running.load(Ordering::SeqCst) {
        let snapshot = match GpuMemorySnapshot::read(&shell) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!("dumpsys gpu failed: {}", e);
                println!("Could not read GPU snapshot. Is `dumpsys gpu` supported on this device?");
                return ExitCode::FAILURE;
            }
        };
        print!("{}", render_snapshot(&snapshot));
        sleep_while_running(interval, &running);
    }

    ExitCode::SUCCESS
}
