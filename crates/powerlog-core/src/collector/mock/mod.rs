//! Mock shell for testing without a connected device.

mod scenarios;
mod shell;

pub use shell::MockShell;
