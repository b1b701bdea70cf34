//! Pre-built device scenarios for testing.
//!
//! These scenarios script realistic shell output for the device families the
//! collector supports.

use super::shell::MockShell;
use crate::collector::battery::DUMPSYS_BATTERY_COMMAND;
use crate::collector::cpu::{CORE_COUNT_COMMAND, PROC_STAT_COMMAND};
use crate::collector::gpu::{GpuSource, cat_if_exists_command, first_glob_command};
use crate::collector::gpu_memory::{DUMPSYS_GPU_COMMAND, PS_NAMES_COMMAND};

fn scaling_freq(core: u32) -> String {
    format!("cat /sys/devices/system/cpu/cpu{core}/cpufreq/scaling_cur_freq")
}

fn cpuinfo_freq(core: u32) -> String {
    format!("cat /sys/devices/system/cpu/cpu{core}/cpufreq/cpuinfo_cur_freq")
}

impl MockShell {
    /// A Snapdragon phone: 8 cores, Adreno GPU behind KGSL, `current now`
    /// reported by `dumpsys battery`.
    pub fn kgsl_device() -> Self {
        let mut shell = Self::new();

        shell.respond(
            DUMPSYS_BATTERY_COMMAND,
            "\
Current Battery Service state:
  AC powered: false
  USB powered: true
  Wireless powered: false
  Max charging current: 500000
  Max charging voltage: 5000000
  Charge counter: 2920000
  status: 2
  health: 2
  present: true
  level: 85
  scale: 100
  voltage: 4123
  temperature: 284
  technology: Li-ion
  current now: -512
",
        );

        shell.respond(
            PROC_STAT_COMMAND,
            "cpu  10000 500 3000 80000 1000 200 100 0 0 0",
        );
        shell.respond(CORE_COUNT_COMMAND, "8");

        let freqs = [
            1_804_800, 1_804_800, 1_804_800, 1_804_800, 2_419_200, 2_419_200, 2_419_200,
            2_419_200,
        ];
        for (core, freq) in freqs.iter().enumerate() {
            shell.respond(scaling_freq(core as u32), freq.to_string());
        }

        shell.respond(
            cat_if_exists_command("/sys/class/kgsl/kgsl-3d0/gpubusy"),
            "  1200  4800",
        );
        shell.respond(
            cat_if_exists_command("/sys/class/kgsl/kgsl-3d0/devfreq/cur_freq"),
            "585000000",
        );

        shell.respond(
            DUMPSYS_GPU_COMMAND,
            "\
GPU memory usage:
Global total: 157286400
Proc 1234 total: 83886080
Proc 987 total: 52428800
Proc 42 total: 4096
",
        );
        shell.respond(
            PS_NAMES_COMMAND,
            "\
  PID NAME
    1 init
   42 surfaceflinger
  987 com.android.systemui
 1234 com.example.game
",
        );

        shell
    }

    /// An Exynos/Tensor-style phone: 4 cores (cpu3 lacks `scaling_cur_freq`),
    /// Mali GPU under devfreq, no current line in `dumpsys battery`.
    pub fn mali_device() -> Self {
        let mut shell = Self::new();

        shell.respond(
            DUMPSYS_BATTERY_COMMAND,
            "\
Current Battery Service state:
  AC powered: false
  USB powered: false
  status: 3
  level: 62
  scale: 100
  voltage: 3987
  temperature: 312
  technology: Li-poly
",
        );

        shell.respond(PROC_STAT_COMMAND, "cpu  4705 356 584 3699 23 23 0 0 0 0");
        shell.respond(CORE_COUNT_COMMAND, "4");
        for core in 0..3 {
            shell.respond(scaling_freq(core), "1950000");
        }
        shell.respond(cpuinfo_freq(3), "2000000");

        shell.respond(
            cat_if_exists_command("/sys/class/kgsl/kgsl-3d0/gpubusy"),
            "",
        );
        if let GpuSource::Mali {
            util_globs,
            freq_globs,
        } = GpuSource::DEFAULT[1]
        {
            shell.respond(first_glob_command(util_globs), "37");
            shell.respond(first_glob_command(freq_globs), "848000000");
        }

        shell.fail(DUMPSYS_GPU_COMMAND, 255);

        shell
    }

    /// A device where the bridge answers but every query fails.
    pub fn unresponsive_device() -> Self {
        Self::new()
    }
}
