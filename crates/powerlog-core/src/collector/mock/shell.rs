//! Scripted in-memory shell for testing collectors without a device.
//!
//! `MockShell` maps exact command strings to canned output and records every
//! command it receives, so tests can assert both what was sampled and which
//! sources were queried.

use crate::collector::shell::{Shell, ShellError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// In-memory device shell for testing.
///
/// Commands that were never scripted fail the same way a missing file or
/// unknown binary fails on a device: with a non-zero exit status.
/// Clones share the call log.
#[derive(Debug, Clone, Default)]
pub struct MockShell {
    responses: HashMap<String, Result<String, i32>>,
    calls: Arc<Mutex<Vec<String>>>,
    latency: Duration,
}

impl MockShell {
    /// Creates a shell on which every command fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the output of `command`.
    ///
    /// Output is trimmed the same way the real shell trims it.
    pub fn respond(&mut self, command: impl Into<String>, output: impl AsRef<str>) {
        self.responses
            .insert(command.into(), Ok(output.as_ref().trim().to_string()));
    }

    /// Scripts `command` to exit with the given non-zero status.
    pub fn fail(&mut self, command: impl Into<String>, code: i32) {
        self.responses.insert(command.into(), Err(code));
    }

    /// Makes every command take at least `latency`, like a round trip over
    /// the bridge.
    pub fn set_latency(&mut self, latency: Duration) {
        self.latency = latency;
    }

    /// Returns every command received so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns how many times `command` was run.
    pub fn call_count(&self, command: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.as_str() == command)
            .count()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Shell for MockShell {
    fn run(&self, command: &str) -> Result<String, ShellError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.to_string());

        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        match self.responses.get(command) {
            Some(Ok(output)) => Ok(output.clone()),
            Some(Err(code)) => Err(ShellError::NonZeroExit {
                command: command.to_string(),
                code: Some(*code),
                stderr: String::new(),
            }),
            None => Err(ShellError::NonZeroExit {
                command: command.to_string(),
                code: Some(1),
                stderr: "No such file or directory".to_string(),
            }),
        }
    }
}
