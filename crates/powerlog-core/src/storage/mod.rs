pub mod model;
pub mod sink;

pub use model::{GpuBackend, SampleSchema, TelemetrySample, Timestamp};
pub use sink::{CsvLog, JsonLinesLog, LogFormat, SampleSink, open_sink};
