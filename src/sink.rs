/// Diagnostic sinks the probe reports through.
///
/// The host harness supplies two sinks: one for normal output (warnings about
/// unexpected lines, lifecycle notices) and one for errors (startup failure).
use tracing::Level;

pub trait DiagnosticSink: Send + Sync {
    fn println(&self, message: &str);
}

/// Sink that forwards every message as a tracing event at a fixed level.
#[derive(Debug, Clone, Copy)]
pub struct TracingSink {
    level: Level,
}

impl TracingSink {
    /// Normal-output sink (`info`).
    pub fn output() -> Self {
        Self { level: Level::INFO }
    }

    /// Error sink (`error`).
    pub fn error() -> Self {
        Self {
            level: Level::ERROR,
        }
    }
}

impl DiagnosticSink for TracingSink {
    fn println(&self, message: &str) {
        if self.level == Level::ERROR {
            tracing::error!("{message}");
        } else {
            tracing::info!("{message}");
        }
    }
}

/// Records messages in memory so tests can assert on them.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct CaptureSink {
    lines: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl CaptureSink {
    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub(crate) fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

#[cfg(test)]
impl DiagnosticSink for CaptureSink {
    fn println(&self, message: &str) {
        self.lines.lock().unwrap().push(message.to_string());
    }
}
