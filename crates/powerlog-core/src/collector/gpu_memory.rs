//! Per-process GPU memory from `dumpsys gpu`.

use std::collections::HashMap;

use tracing::debug;

use crate::collector::shell::{Shell, ShellError};

pub const DUMPSYS_GPU_COMMAND: &str = "dumpsys gpu";

/// Lists every process id with its name.
pub const PS_NAMES_COMMAND: &str = "ps -A -o pid,name";

/// GPU memory attributed to one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessGpuMemory {
    pub pid: u32,
    pub bytes: u64,
    /// Process name, `None` when the process exited before `ps` ran.
    pub name: Option<String>,
}

/// One read of the device's GPU memory accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GpuMemorySnapshot {
    /// Global total in bytes; 0 when the dump has no global line.
    pub global_bytes: u64,
    /// Processes sorted by memory, largest first.
    pub processes: Vec<ProcessGpuMemory>,
}

impl GpuMemorySnapshot {
    /// Runs `dumpsys gpu` and resolves process names.
    ///
    /// Fails when `dumpsys gpu` itself fails. A failing `ps` only leaves the
    /// names unresolved.
    pub fn read(shell: &impl Shell) -> Result<Self, ShellError> {
        let dump = shell.run(DUMPSYS_GPU_COMMAND)?;
        let (global_bytes, usage) = parse_dumpsys_gpu(&dump);

        let names = match shell.run(PS_NAMES_COMMAND) {
            Ok(output) => parse_ps_names(&output),
            Err(e) => {
                debug!("process names unavailable: {}", e);
                HashMap::new()
            }
        };

        Ok(Self::from_parts(global_bytes, usage, &names))
    }

    /// Joins per-process usage with names and sorts it.
    pub fn from_parts(
        global_bytes: u64,
        usage: Vec<(u32, u64)>,
        names: &HashMap<u32, String>,
    ) -> Self {
        let mut processes: Vec<ProcessGpuMemory> = usage
            .into_iter()
            .map(|(pid, bytes)| ProcessGpuMemory {
                pid,
                bytes,
                name: names.get(&pid).cloned(),
            })
            .collect();
        // Stable sort: equal sizes keep dump order.
        processes.sort_by(|a, b| b.bytes.cmp(&a.bytes));

        Self {
            global_bytes,
            processes,
        }
    }
}

/// Parses the global total and `(pid, bytes)` pairs from `dumpsys gpu`.
///
/// Recognizes `Global total: N` and `Proc <pid> total: N` lines anywhere in
/// the dump; everything else is ignored.
pub fn parse_dumpsys_gpu(text: &str) -> (u64, Vec<(u32, u64)>) {
    let mut global = None;
    let mut usage = Vec::new();

    for line in text.lines() {
        let mut tokens = line.split_whitespace();
        match (tokens.next(), tokens.next(), tokens.next(), tokens.next()) {
            (Some("Global"), Some("total:"), Some(n), _) if global.is_none() => {
                global = n.parse().ok();
            }
            (Some("Proc"), Some(pid), Some("total:"), Some(n)) => {
                if let (Ok(pid), Ok(bytes)) = (pid.parse(), n.parse()) {
                    usage.push((pid, bytes));
                }
            }
            _ => {}
        }
    }

    (global.unwrap_or(0), usage)
}

/// Parses `ps -A -o pid,name` output into a pid → name map.
///
/// The first line is the column header and is skipped.
pub fn parse_ps_names(text: &str) -> HashMap<u32, String> {
    text.lines()
        .skip(1)
        .filter_map(|line| {
            let (pid, name) = line.trim().split_once(char::is_whitespace)?;
            Some((pid.parse().ok()?, name.trim().to_string()))
        })
        .collect()
}
