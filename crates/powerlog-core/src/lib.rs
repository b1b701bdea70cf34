//! powerlog-core - shared library for the powerlog tools.
//!
//! Provides:
//! - `collector` - device shell access, text extraction, probing and sample assembly
//! - `storage` - the telemetry sample model and append-only sinks
//! - `export` - CSV/text log extractors producing JSON payloads
//! - `fmt` - shared formatting helpers (missing markers, sizes)
//! - `util` - argument parsing and interruptible sleep for the binaries

pub mod collector;
pub mod export;
pub mod fmt;
pub mod storage;
pub mod util;
