//! Abstraction over the device shell channel.
//!
//! The `Shell` trait lets the collector run against a real device through
//! `adb` or against a scripted in-memory implementation in tests.

use std::io;
use std::process::{Command, Output, Stdio};

/// Error returned when a single shell command cannot produce output.
#[derive(Debug)]
pub enum ShellError {
    /// The bridge binary could not be started.
    Spawn(io::Error),
    /// The command ran but exited with a non-zero status.
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl std::fmt::Display for ShellError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShellError::Spawn(e) => write!(f, "failed to start adb: {}", e),
            ShellError::NonZeroExit {
                command,
                code,
                stderr,
            } => {
                match code {
                    Some(code) => write!(f, "'{}' exited with status {}", command, code)?,
                    None => write!(f, "'{}' was terminated by a signal", command)?,
                }
                if !stderr.is_empty() {
                    write!(f, ": {}", stderr)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ShellError {}

impl From<io::Error> for ShellError {
    fn from(e: io::Error) -> Self {
        ShellError::Spawn(e)
    }
}

/// Fatal connectivity errors, checked once before sampling starts.
#[derive(Debug)]
pub enum DeviceError {
    /// `adb` itself is missing or cannot be executed.
    BridgeUnavailable(io::Error),
    /// `adb get-state` reported something other than `device`
    /// (offline, unauthorized, no device attached).
    NotReady(String),
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceError::BridgeUnavailable(e) => write!(f, "ADB not available: {}", e),
            DeviceError::NotReady(state) if state.is_empty() => {
                write!(f, "ADB device not connected/authorized")
            }
            DeviceError::NotReady(state) => {
                write!(f, "ADB device not connected/authorized ({})", state)
            }
        }
    }
}

impl std::error::Error for DeviceError {}

/// Command execution on the monitored device.
///
/// Implementations return standard output with surrounding whitespace
/// trimmed. Calls are strictly sequential: the channel is a single
/// serialized resource.
pub trait Shell: Send + Sync {
    /// Runs `command` through the device shell.
    fn run(&self, command: &str) -> Result<String, ShellError>;
}

/// Shell backed by the `adb` command line tool.
#[derive(Debug, Clone)]
pub struct AdbShell {
    adb: String,
    serial: Option<String>,
}

impl AdbShell {
    /// Creates a shell that invokes `adb` (binary name or path), optionally
    /// pinned to one device serial.
    pub fn new(adb: impl Into<String>, serial: Option<String>) -> Self {
        Self {
            adb: adb.into(),
            serial,
        }
    }

    /// Returns the device serial this shell is pinned to, if any.
    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.adb);
        if let Some(ref serial) = self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.stdin(Stdio::null());
        cmd
    }

    fn output(&self, args: &[&str]) -> io::Result<Output> {
        self.command().args(args).output()
    }

    /// Verifies that the bridge works and the device is ready for commands.
    pub fn check_device(&self) -> Result<(), DeviceError> {
        let output = self
            .output(&["get-state"])
            .map_err(DeviceError::BridgeUnavailable)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(DeviceError::NotReady(stderr));
        }

        let state = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if state == "device" {
            Ok(())
        } else {
            Err(DeviceError::NotReady(state))
        }
    }
}

impl Shell for AdbShell {
    fn run(&self, command: &str) -> Result<String, ShellError> {
        let output = self.output(&["shell", command])?;

        if !output.status.success() {
            return Err(ShellError::NonZeroExit {
                command: command.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
