/// External process supervision: spawn a tool, feed its stdout to a per-line
/// callback from a background task, and terminate it on request.
///
/// The process is spawned in its own process group (via `process_group(0)`)
/// so termination reaches anything the tool forks as well.
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{ChildStderr, Command};
use tokio::task::JoinHandle;

/// Errors that can occur while launching the external process.
#[derive(Debug)]
pub enum LaunchError {
    /// Failed to spawn the subprocess.
    Spawn {
        command: String,
        source: std::io::Error,
    },
    /// The subprocess was spawned without a readable stdout.
    NoStdout,
}

impl std::fmt::Display for LaunchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchError::Spawn { command, source } => {
                write!(f, "failed to spawn '{}': {}", command, source)
            }
            LaunchError::NoStdout => write!(f, "subprocess stdout is not available"),
        }
    }
}

impl std::error::Error for LaunchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaunchError::Spawn { source, .. } => Some(source),
            LaunchError::NoStdout => None,
        }
    }
}

/// Handle to a running process and the task reading its output.
#[derive(Debug)]
pub struct LaunchedProcess {
    pid: Option<u32>,
    reader: JoinHandle<()>,
    finished: bool,
}

/// Spawn `command` with `args` and `env`, invoking `on_line(index, text)` for
/// every stdout line. `index` is zero-based and counts for the whole process
/// lifetime.
///
/// Must be called from within a tokio runtime.
pub fn start<F>(
    command: &str,
    args: &[String],
    env: &HashMap<String, String>,
    on_line: F,
) -> Result<LaunchedProcess, LaunchError>
where
    F: FnMut(usize, &str) + Send + 'static,
{
    tracing::info!(command, args = ?args, "spawning process");

    let mut child = Command::new(command)
        .args(args)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0) // New process group for clean kill
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| LaunchError::Spawn {
            command: command.to_string(),
            source: e,
        })?;

    let pid = child.id();
    tracing::info!(pid, "process started");

    let stdout = child.stdout.take().ok_or(LaunchError::NoStdout)?;
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_stderr(stderr));
    }

    let reader = tokio::spawn(async move {
        let lines = read_lines(stdout, on_line).await;
        match child.wait().await {
            Ok(status) if status.success() => {
                tracing::info!(pid, lines, "process exited");
            }
            Ok(status) => {
                tracing::warn!(pid, lines, exit_code = ?status.code(), "process exited abnormally");
            }
            Err(e) => tracing::warn!(pid, error = %e, "failed to wait for process"),
        }
    });

    Ok(LaunchedProcess {
        pid,
        reader,
        finished: false,
    })
}

/// Pump a pipe into the callback until EOF. Returns the number of lines seen.
///
/// Bytes that are not valid UTF-8 are replaced rather than ending the stream,
/// so the pipe stays drained and the tool never blocks or dies on a write.
async fn read_lines<R, F>(pipe: R, mut on_line: F) -> usize
where
    R: AsyncRead + Unpin,
    F: FnMut(usize, &str),
{
    let mut segments = BufReader::new(pipe).split(b'\n');
    let mut index = 0;
    loop {
        match segments.next_segment().await {
            Ok(Some(bytes)) => {
                let text = String::from_utf8_lossy(&bytes);
                on_line(index, text.strip_suffix('\r').unwrap_or(&text));
                index += 1;
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read process output");
                break;
            }
        }
    }
    index
}

async fn forward_stderr(stderr: ChildStderr) {
    read_lines(stderr, |_, line| {
        tracing::warn!(stderr = %line, "process wrote to stderr");
    })
    .await;
}

impl LaunchedProcess {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// True once the process output has closed and the child was reaped.
    pub fn is_finished(&self) -> bool {
        self.finished || self.reader.is_finished()
    }

    /// Signal the process group: SIGTERM, or SIGKILL when `force` is set.
    pub fn terminate(&self, force: bool) {
        if self.is_finished() {
            return;
        }
        let Some(pid) = self.pid else {
            return;
        };
        let signal = if force {
            Signal::SIGKILL
        } else {
            Signal::SIGTERM
        };
        tracing::debug!(pid, ?signal, "terminating process group");
        if let Err(e) = killpg(Pid::from_raw(pid as i32), signal) {
            tracing::debug!(pid, error = %e, "failed to signal process group");
        }
    }

    /// Wait up to `timeout` for the output reader to finish.
    ///
    /// Returns `true` if the process is gone.
    pub async fn wait(&mut self, timeout: Duration) -> bool {
        if self.finished {
            return true;
        }
        match tokio::time::timeout(timeout, &mut self.reader).await {
            Ok(result) => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "output reader task failed");
                }
                self.finished = true;
                true
            }
            Err(_) => false,
        }
    }
}
