//! CPU utilization and per-core frequency sources.

use tracing::{debug, trace};

use crate::collector::parser::{first_uint, parse_cpu_line};
use crate::collector::probe::{ProbeCandidate, ProbeResult, probe};
use crate::collector::shell::Shell;

/// Reads the aggregate counter line of `/proc/stat`.
pub const PROC_STAT_COMMAND: &str = "cat /proc/stat | head -n 1";

/// Counts the `cpuN` directories exposed by the kernel.
pub const CORE_COUNT_COMMAND: &str = "ls -d /sys/devices/system/cpu/cpu[0-9]* 2>/dev/null | wc -l";

/// Bucket positions of idle and iowait time in a counter snapshot.
const IDLE_INDEX: usize = 3;
const IOWAIT_INDEX: usize = 4;

/// One read of the cumulative CPU time buckets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSnapshot {
    buckets: Vec<u64>,
}

impl CounterSnapshot {
    /// Wraps raw buckets. Returns `None` when idle/iowait are missing.
    pub fn new(buckets: Vec<u64>) -> Option<Self> {
        (buckets.len() > IOWAIT_INDEX).then_some(Self { buckets })
    }

    /// Reads a fresh snapshot from the device.
    pub fn read(shell: &impl Shell) -> Option<Self> {
        match shell.run(PROC_STAT_COMMAND) {
            Ok(output) => {
                let snapshot = output.lines().next().and_then(parse_cpu_line);
                if snapshot.is_none() {
                    debug!("unrecognized /proc/stat line: {:?}", output);
                }
                snapshot.and_then(Self::new)
            }
            Err(e) => {
                debug!("reading /proc/stat failed: {}", e);
                None
            }
        }
    }

    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    fn total(&self) -> u128 {
        self.buckets.iter().map(|&b| b as u128).sum()
    }

    fn idle(&self) -> u128 {
        self.buckets[IDLE_INDEX] as u128 + self.buckets[IOWAIT_INDEX] as u128
    }
}

/// Converts successive counter snapshots into a utilization percentage.
///
/// Holds exactly one previous snapshot, replaced on every call. The tracker is
/// owned by a single collector; nothing else reads or writes its slot.
#[derive(Debug, Default)]
pub struct CpuUtilTracker {
    prev: Option<CounterSnapshot>,
}

impl CpuUtilTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether a previous snapshot is held.
    pub fn is_primed(&self) -> bool {
        self.prev.is_some()
    }

    /// Records `snapshot` and returns busy time since the previous one, in
    /// percent.
    ///
    /// Returns `None` (no value yet) on the first call, when the total time
    /// did not advance (identical snapshots, counter reset), or when the
    /// snapshots come from sources with a different bucket count.
    pub fn utilization(&mut self, snapshot: CounterSnapshot) -> Option<f64> {
        let prev = self.prev.replace(snapshot);
        let (Some(prev), Some(cur)) = (prev, self.prev.as_ref()) else {
            return None;
        };

        if prev.buckets.len() != cur.buckets.len() {
            debug!(
                "counter layout changed ({} -> {} buckets), restarting delta",
                prev.buckets.len(),
                cur.buckets.len()
            );
            return None;
        }

        let delta_total = cur.total() as i128 - prev.total() as i128;
        if delta_total <= 0 {
            trace!("non-positive cpu counter delta: {}", delta_total);
            return None;
        }
        let delta_idle = cur.idle() as i128 - prev.idle() as i128;

        let busy = (delta_total - delta_idle) as f64 / delta_total as f64 * 100.0;
        Some(busy.clamp(0.0, 100.0))
    }
}

/// Counts online-or-offline cores exposed under `/sys/devices/system/cpu`.
///
/// Returns the core indices `0..n`; an empty list when the count cannot be
/// read.
pub fn list_cores(shell: &impl Shell) -> Vec<u32> {
    match shell.run(CORE_COUNT_COMMAND) {
        Ok(output) => match output.trim().parse::<u32>() {
            Ok(n) => (0..n).collect(),
            Err(_) => {
                debug!("unexpected core count output: {:?}", output);
                Vec::new()
            }
        },
        Err(e) => {
            debug!("listing cpu cores failed: {}", e);
            Vec::new()
        }
    }
}

/// A sysfs file holding one core's current frequency in kHz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreqSource {
    tag: &'static str,
    path: String,
}

impl FreqSource {
    /// Candidate files for `core`, in the order they are tried: the governor's
    /// scaling frequency first, then the driver-reported one.
    pub fn candidates(core: u32) -> [FreqSource; 2] {
        let base = format!("/sys/devices/system/cpu/cpu{}/cpufreq", core);
        [
            FreqSource {
                tag: "scaling_cur_freq",
                path: format!("{}/scaling_cur_freq", base),
            },
            FreqSource {
                tag: "cpuinfo_cur_freq",
                path: format!("{}/cpuinfo_cur_freq", base),
            },
        ]
    }

    /// Sysfs file this source reads.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Reads the frequency, or `None` when the file is missing or empty.
    pub fn read(&self, shell: &impl Shell) -> Option<u64> {
        let output = shell.run(&format!("cat {}", self.path)).ok()?;
        first_uint(&output)
    }
}

impl ProbeCandidate for FreqSource {
    fn tag(&self) -> &'static str {
        self.tag
    }
}

/// Reads the current frequency of `core` in kHz.
pub fn read_core_freq(shell: &impl Shell, core: u32) -> ProbeResult<u64> {
    let candidates = FreqSource::candidates(core);
    let result = probe(&candidates, |source| source.read(shell));
    if let ProbeResult::NotFound = result {
        let tried: Vec<&str> = candidates.iter().map(FreqSource::path).collect();
        trace!("cpu{}: no frequency source (tried {})", core, tried.join(", "));
    }
    result
}
