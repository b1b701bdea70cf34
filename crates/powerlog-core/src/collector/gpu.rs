//! GPU utilization and frequency across vendor backends.
//!
//! Qualcomm Adreno devices expose busy/total cycle counters through KGSL.
//! Mali devices expose a utilization percentage under devfreq or the
//! platform device, at paths that vary per SoC and are found by shell globs.

use tracing::trace;

use crate::collector::parser::{all_uints, first_uint};
use crate::collector::probe::{ProbeCandidate, ProbeResult, probe};
use crate::collector::shell::Shell;
use crate::storage::GpuBackend;

/// Metrics read from one GPU backend.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuReading {
    pub backend: GpuBackend,
    pub util_percent: Option<f64>,
    pub freq_hz: Option<u64>,
}

/// A GPU backend layout, tried in [`GpuSource::DEFAULT`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuSource {
    /// Fixed KGSL files: `gpubusy` holds "busy total" cycle counts.
    Kgsl {
        busy_path: &'static str,
        freq_path: &'static str,
    },
    /// Glob patterns expanded by the device shell; the first existing file wins.
    Mali {
        util_globs: &'static [&'static str],
        freq_globs: &'static [&'static str],
    },
}

impl GpuSource {
    pub const DEFAULT: [GpuSource; 2] = [
        GpuSource::Kgsl {
            busy_path: "/sys/class/kgsl/kgsl-3d0/gpubusy",
            freq_path: "/sys/class/kgsl/kgsl-3d0/devfreq/cur_freq",
        },
        GpuSource::Mali {
            util_globs: &[
                "/sys/class/devfreq/*gpu*/utilization",
                "/sys/devices/platform/*/mali/utilization",
            ],
            freq_globs: &[
                "/sys/class/devfreq/*gpu*/cur_freq",
                "/sys/devices/platform/*/mali/devfreq/devfreq*/cur_freq",
            ],
        },
    ];

    pub fn backend(&self) -> GpuBackend {
        match self {
            GpuSource::Kgsl { .. } => GpuBackend::Kgsl,
            GpuSource::Mali { .. } => GpuBackend::Mali,
        }
    }

    /// Reads this backend. Returns `None` when the backend is not present.
    ///
    /// KGSL is present when its busy file exists and is non-empty; Mali is
    /// present when either its utilization or its frequency could be read.
    pub fn read(&self, shell: &impl Shell) -> Option<GpuReading> {
        match *self {
            GpuSource::Kgsl {
                busy_path,
                freq_path,
            } => {
                let busy = read_if_exists(shell, busy_path)?;
                let freq_hz = read_if_exists(shell, freq_path).and_then(|f| first_uint(&f));
                Some(GpuReading {
                    backend: GpuBackend::Kgsl,
                    util_percent: kgsl_utilization(&busy),
                    freq_hz,
                })
            }
            GpuSource::Mali {
                util_globs,
                freq_globs,
            } => {
                let util_percent = read_first_glob(shell, util_globs)
                    .and_then(|u| first_uint(&u))
                    .map(|u| u as f64);
                let freq_hz = read_first_glob(shell, freq_globs).and_then(|f| first_uint(&f));
                (util_percent.is_some() || freq_hz.is_some()).then_some(GpuReading {
                    backend: GpuBackend::Mali,
                    util_percent,
                    freq_hz,
                })
            }
        }
    }
}

impl ProbeCandidate for GpuSource {
    fn tag(&self) -> &'static str {
        self.backend().as_str()
    }
}

/// Detects the GPU backend and reads its metrics.
pub fn read_gpu(shell: &impl Shell) -> ProbeResult<GpuReading> {
    read_gpu_from(shell, &GpuSource::DEFAULT)
}

/// Like [`read_gpu`] with an explicit source order.
pub fn read_gpu_from(shell: &impl Shell, sources: &[GpuSource]) -> ProbeResult<GpuReading> {
    let result = probe(sources, |source| source.read(shell));
    if let ProbeResult::NotFound = result {
        trace!("no gpu backend found");
    }
    result
}

/// Busy percentage from a `gpubusy` line ("busy total").
///
/// Returns `None` when fewer than two counters are present or total is 0.
pub fn kgsl_utilization(gpubusy: &str) -> Option<f64> {
    match all_uints(gpubusy).as_slice() {
        [busy, total, ..] => busy_ratio(*busy, *total),
        _ => None,
    }
}

/// `busy / total` in percent, `None` for a zero denominator.
pub fn busy_ratio(busy: u64, total: u64) -> Option<f64> {
    (total > 0).then(|| busy as f64 / total as f64 * 100.0)
}

/// Shell command printing `path` when it exists and an empty line otherwise.
pub fn cat_if_exists_command(path: &str) -> String {
    format!("[ -e {path} ] && cat {path} || echo ''")
}

/// Shell command printing the first line of the first existing file among the
/// expansions of `globs`.
pub fn first_glob_command(globs: &[&str]) -> String {
    format!(
        "for f in {}; do [ -e \"$f\" ] && cat \"$f\"; done | head -n 1",
        globs.join(" ")
    )
}

fn non_empty(output: String) -> Option<String> {
    (!output.is_empty()).then_some(output)
}

fn read_if_exists(shell: &impl Shell, path: &str) -> Option<String> {
    shell
        .run(&cat_if_exists_command(path))
        .ok()
        .and_then(non_empty)
}

fn read_first_glob(shell: &impl Shell, globs: &[&str]) -> Option<String> {
    shell
        .run(&first_glob_command(globs))
        .ok()
        .and_then(non_empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockShell;

    fn kgsl_busy() -> String {
        cat_if_exists_command("/sys/class/kgsl/kgsl-3d0/gpubusy")
    }

    fn kgsl_freq() -> String {
        cat_if_exists_command("/sys/class/kgsl/kgsl-3d0/devfreq/cur_freq")
    }

    fn mali_util() -> String {
        match GpuSource::DEFAULT[1] {
            GpuSource::Mali { util_globs, .. } => first_glob_command(util_globs),
            GpuSource::Kgsl { .. } => unreachable!(),
        }
    }

    fn mali_freq() -> String {
        match GpuSource::DEFAULT[1] {
            GpuSource::Mali { freq_globs, .. } => first_glob_command(freq_globs),
            GpuSource::Kgsl { .. } => unreachable!(),
        }
    }

    #[test]
    fn test_busy_ratio() {
        assert_eq!(busy_ratio(30, 100), Some(30.0));
        assert_eq!(busy_ratio(0, 100), Some(0.0));
        assert_eq!(busy_ratio(30, 0), None);
    }

    #[test]
    fn test_kgsl_utilization() {
        assert_eq!(kgsl_utilization("      30     100"), Some(30.0));
        assert_eq!(kgsl_utilization("0 0"), None);
        assert_eq!(kgsl_utilization("42"), None);
        assert_eq!(kgsl_utilization(""), None);
    }

    #[test]
    fn test_commands() {
        assert_eq!(
            cat_if_exists_command("/a/b"),
            "[ -e /a/b ] && cat /a/b || echo ''"
        );
        assert_eq!(
            first_glob_command(&["/x/*gpu*/u", "/y/*/u"]),
            "for f in /x/*gpu*/u /y/*/u; do [ -e \"$f\" ] && cat \"$f\"; done | head -n 1"
        );
    }

    #[test]
    fn test_kgsl_device() {
        let mut shell = MockShell::new();
        shell.respond(kgsl_busy(), "  1200  4800");
        shell.respond(kgsl_freq(), "585000000");

        let result = read_gpu(&shell);
        assert_eq!(result.source(), Some("kgsl"));
        assert_eq!(
            result.value(),
            Some(GpuReading {
                backend: GpuBackend::Kgsl,
                util_percent: Some(25.0),
                freq_hz: Some(585_000_000),
            })
        );
        // Mali globs are never expanded once KGSL answered.
        assert_eq!(shell.call_count(&mali_util()), 0);
        assert_eq!(shell.call_count(&mali_freq()), 0);
    }

    #[test]
    fn test_kgsl_idle_counters_keep_backend() {
        let mut shell = MockShell::new();
        shell.respond(kgsl_busy(), "0 0");

        let reading = read_gpu(&shell).value().unwrap();
        assert_eq!(reading.backend, GpuBackend::Kgsl);
        assert_eq!(reading.util_percent, None);
        assert_eq!(reading.freq_hz, None);
    }

    #[test]
    fn test_mali_fallback() {
        let mut shell = MockShell::new();
        shell.respond(kgsl_busy(), "");
        shell.respond(mali_util(), "37");
        shell.respond(mali_freq(), "848000000");

        let result = read_gpu(&shell);
        assert_eq!(result.source(), Some("mali"));
        assert_eq!(
            result.value(),
            Some(GpuReading {
                backend: GpuBackend::Mali,
                util_percent: Some(37.0),
                freq_hz: Some(848_000_000),
            })
        );
        assert_eq!(shell.call_count(&kgsl_freq()), 0);
    }

    #[test]
    fn test_mali_freq_only() {
        let mut shell = MockShell::new();
        shell.respond(mali_freq(), "400000000");

        let reading = read_gpu(&shell).value().unwrap();
        assert_eq!(reading.backend, GpuBackend::Mali);
        assert_eq!(reading.util_percent, None);
        assert_eq!(reading.freq_hz, Some(400_000_000));
    }

    #[test]
    fn test_no_gpu() {
        let mut shell = MockShell::new();
        shell.respond(kgsl_busy(), "");
        shell.respond(mali_util(), "");
        shell.respond(mali_freq(), "");

        assert_eq!(read_gpu(&shell), ProbeResult::NotFound);
    }

    #[test]
    fn test_custom_source_order() {
        let mut shell = MockShell::new();
        shell.respond(kgsl_busy(), "10 100");
        shell.respond(mali_util(), "90");

        let reversed = [GpuSource::DEFAULT[1], GpuSource::DEFAULT[0]];
        let result = read_gpu_from(&shell, &reversed);
        assert_eq!(result.source(), Some("mali"));
        assert_eq!(shell.call_count(&kgsl_busy()), 0);
    }
}
