/// The dstat probe: launches dstat, turns its output into samples, and hands
/// them to the benchmark harness through the `BenchmarkProbe` contract.
use crate::buffer::SampleBuffer;
use crate::config::ProbeConfig;
use crate::extract::extract;
use crate::launcher::{self, LaunchedProcess};
use crate::line::{classify, LineKind, HEADER_PATTERN};
use crate::sample::{Sample, METRIC_LABELS};
use crate::sink::DiagnosticSink;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const PROBE_NAME: &str = "DStatProbe";

/// Default grace period between SIGTERM and SIGKILL.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Generic pull-based probe contract used by the benchmark harness.
#[allow(async_fn_in_trait)]
pub trait BenchmarkProbe {
    async fn start(&self, cfg: ProbeConfig) -> Result<(), ProbeError>;

    /// Stop collecting. Safe to call in any state.
    async fn stop(&self);

    /// Labels describing each point: a timestamp label, then one per value.
    fn meta_info(&self) -> Vec<String>;

    /// Everything collected since the previous call.
    fn points(&self) -> Vec<Sample>;
}

/// Probe lifecycle. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug)]
pub enum ProbeError {
    /// An operation was requested in a state that does not allow it.
    InvalidState {
        operation: &'static str,
        state: ProbeState,
    },
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeError::InvalidState { operation, state } => {
                write!(f, "cannot {} {} in state {:?}", operation, PROBE_NAME, state)
            }
        }
    }
}

impl std::error::Error for ProbeError {}

/// Per-line callback: classify, extract, append.
pub struct LineHandler {
    buffer: Arc<SampleBuffer>,
    output: Arc<dyn DiagnosticSink>,
}

impl LineHandler {
    pub fn new(buffer: Arc<SampleBuffer>, output: Arc<dyn DiagnosticSink>) -> Self {
        Self { buffer, output }
    }

    pub fn handle(&self, index: usize, text: &str) {
        match classify(index, text) {
            LineKind::Banner { matched: false } => self.output.println(&format!(
                "WARNING: dstat returned unexpected first line: '{text}'."
            )),
            LineKind::Header { matched: false } => self.output.println(&format!(
                "ERROR: Header line does not match expected header [exp={HEADER_PATTERN}, act={text}]."
            )),
            LineKind::Banner { .. } | LineKind::Header { .. } => {}
            LineKind::Data => match extract(text) {
                Ok(values) => self.buffer.append(Sample::now(values)),
                Err(e) => {
                    tracing::debug!(index, error = %e, "dropping unparseable line");
                    self.output
                        .println(&format!("ERROR: Can't parse line: '{text}'."));
                }
            },
        }
    }
}

struct Inner {
    state: ProbeState,
    process: Option<LaunchedProcess>,
    output: Option<Arc<dyn DiagnosticSink>>,
}

/// Probe that gathers statistics printed by the Linux `dstat` command.
pub struct DStatProbe {
    buffer: Arc<SampleBuffer>,
    inner: Mutex<Inner>,
    stop_timeout: Duration,
}

impl Default for DStatProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl DStatProbe {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(SampleBuffer::new()),
            inner: Mutex::new(Inner {
                state: ProbeState::Idle,
                process: None,
                output: None,
            }),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// How long `stop` waits after SIGTERM before sending SIGKILL.
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub async fn state(&self) -> ProbeState {
        self.inner.lock().await.state
    }
}

impl BenchmarkProbe for DStatProbe {
    async fn start(&self, cfg: ProbeConfig) -> Result<(), ProbeError> {
        let mut inner = self.inner.lock().await;
        if inner.state != ProbeState::Idle {
            return Err(ProbeError::InvalidState {
                operation: "start",
                state: inner.state,
            });
        }

        let path = cfg.dstat_path();
        let opts = cfg.dstat_opts();
        let handler = LineHandler::new(Arc::clone(&self.buffer), Arc::clone(cfg.output()));

        match launcher::start(&path, &opts, &HashMap::new(), move |index, text| {
            handler.handle(index, text)
        }) {
            Ok(process) => inner.process = Some(process),
            Err(e) => cfg.error().println(&format!(
                "Can not start 'dstat' process due to exception: {e}"
            )),
        }

        inner.state = ProbeState::Running;
        inner.output = Some(Arc::clone(cfg.output()));
        cfg.output().println(&format!("{PROBE_NAME} is started."));
        Ok(())
    }

    async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state != ProbeState::Running {
            return;
        }
        inner.state = ProbeState::Stopped;

        if let Some(mut process) = inner.process.take() {
            process.terminate(false);
            if !process.wait(self.stop_timeout).await {
                tracing::warn!(
                    pid = process.pid(),
                    timeout_ms = self.stop_timeout.as_millis() as u64,
                    "dstat did not exit after SIGTERM, killing"
                );
                process.terminate(true);
                if !process.wait(self.stop_timeout).await {
                    tracing::warn!(pid = process.pid(), "dstat still running after SIGKILL");
                }
            }
        }

        if let Some(output) = &inner.output {
            output.println(&format!("{PROBE_NAME} is stopped."));
        }
    }

    fn meta_info(&self) -> Vec<String> {
        METRIC_LABELS.iter().map(|l| l.to_string()).collect()
    }

    fn points(&self) -> Vec<Sample> {
        self.buffer.drain()
    }
}
