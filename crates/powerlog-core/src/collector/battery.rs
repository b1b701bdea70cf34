//! Battery state from `dumpsys battery`.

use tracing::debug;

use crate::collector::parser::{BatteryField, extract};
use crate::collector::shell::Shell;

pub const DUMPSYS_BATTERY_COMMAND: &str = "dumpsys battery";

/// Raw battery fields. Each is `None` when the dump did not carry it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatteryReading {
    /// Current in mA, sign as reported by the device.
    pub current_ma: Option<i64>,
    /// Voltage in mV.
    pub voltage_mv: Option<u64>,
    /// Temperature in tenths of a degree Celsius.
    pub temperature_dc: Option<i64>,
}

impl BatteryReading {
    /// Extracts the battery fields from a `dumpsys battery` dump.
    pub fn parse(text: &str) -> Self {
        Self {
            current_ma: extract(text, BatteryField::Current),
            voltage_mv: extract(text, BatteryField::Voltage).and_then(|v| u64::try_from(v).ok()),
            temperature_dc: extract(text, BatteryField::Temperature),
        }
    }

    /// Reads the battery state; every field is absent when the dump fails.
    pub fn read(shell: &impl Shell) -> Self {
        match shell.run(DUMPSYS_BATTERY_COMMAND) {
            Ok(text) => {
                let reading = Self::parse(&text);
                if reading.current_ma.is_none() {
                    debug!("dumpsys battery: no current reported");
                }
                if reading.voltage_mv.is_none() {
                    debug!("dumpsys battery: no voltage reported");
                }
                reading
            }
            Err(e) => {
                debug!("dumpsys battery failed: {}", e);
                Self::default()
            }
        }
    }

    /// Device power draw in mW: `|current_mA| * voltage_mV / 1000`.
    ///
    /// Absent unless both current and voltage are present.
    pub fn power_mw(&self) -> Option<f64> {
        let current = self.current_ma?;
        let voltage = self.voltage_mv?;
        Some(current.unsigned_abs() as f64 * voltage as f64 / 1000.0)
    }

    /// Temperature in degrees Celsius.
    pub fn temperature_c(&self) -> Option<f64> {
        self.temperature_dc.map(|t| t as f64 / 10.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockShell;

    #[test]
    fn test_power_from_current_and_voltage() {
        let reading = BatteryReading {
            current_ma: Some(-345),
            voltage_mv: Some(4000),
            temperature_dc: None,
        };
        assert!((reading.power_mw().unwrap() - 1380.0).abs() < 1e-9);
    }

    #[test]
    fn test_power_zero_current_is_zero_not_missing() {
        let reading = BatteryReading {
            current_ma: Some(0),
            voltage_mv: Some(4000),
            temperature_dc: None,
        };
        assert_eq!(reading.power_mw(), Some(0.0));
    }

    #[test]
    fn test_power_absent_without_either_input() {
        let no_current = BatteryReading {
            current_ma: None,
            voltage_mv: Some(4000),
            temperature_dc: Some(250),
        };
        let no_voltage = BatteryReading {
            current_ma: Some(500),
            voltage_mv: None,
            temperature_dc: Some(250),
        };
        assert_eq!(no_current.power_mw(), None);
        assert_eq!(no_voltage.power_mw(), None);
    }

    #[test]
    fn test_power_matches_formula_across_inputs() {
        for (current, voltage) in [(-1, 1), (1, 1), (-2500, 4450), (120, 3700)] {
            let text = format!("  current now: {}\n  voltage: {}\n", current, voltage);
            let reading = BatteryReading::parse(&text);
            let expected = (current as f64).abs() * voltage as f64 / 1000.0;
            assert!((reading.power_mw().unwrap() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_temperature_from_tenths() {
        let reading = BatteryReading {
            temperature_dc: Some(-52),
            ..BatteryReading::default()
        };
        assert_eq!(reading.temperature_c(), Some(-5.2));
        assert_eq!(BatteryReading::default().temperature_c(), None);
    }

    #[test]
    fn test_read_from_shell() {
        let mut shell = MockShell::new();
        shell.respond(
            DUMPSYS_BATTERY_COMMAND,
            "Current Battery Service state:\n  voltage: 4123\n  temperature: 284\n  current now: -512\n",
        );

        let reading = BatteryReading::read(&shell);
        assert_eq!(reading.current_ma, Some(-512));
        assert_eq!(reading.voltage_mv, Some(4123));
        assert_eq!(reading.temperature_dc, Some(284));
    }

    #[test]
    fn test_read_failure_is_all_absent() {
        let reading = BatteryReading::read(&MockShell::new());
        assert_eq!(reading, BatteryReading::default());
        assert_eq!(reading.power_mw(), None);
    }
}
