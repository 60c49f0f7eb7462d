//! Benchmark probe that samples system resource usage by running `dstat`
//! and parsing its output into timestamped numeric samples.
pub mod buffer;
pub mod config;
pub mod extract;
pub mod launcher;
pub mod line;
pub mod probe;
pub mod report;
pub mod sample;
pub mod sink;

pub use buffer::SampleBuffer;
pub use config::{ProbeConfig, Settings};
pub use probe::{BenchmarkProbe, DStatProbe, ProbeError, ProbeState};
pub use sample::{Sample, FIELD_COUNT, METRIC_LABELS};
pub use sink::{DiagnosticSink, TracingSink};
