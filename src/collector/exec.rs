//! Subprocess execution with an enforced deadline.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

/// Poll interval while waiting for a child process to exit.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Number of external commands started by this process.
static COMMANDS_EXECUTED: AtomicU64 = AtomicU64::new(0);

/// Returns the number of external commands started so far.
pub fn commands_executed() -> u64 {
    COMMANDS_EXECUTED.load(Ordering::Relaxed)
}

/// Outcome of a failed command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// The deadline elapsed; the child was killed.
    Timeout { command: String, after: Duration },
    /// The command could not be started or exited unsuccessfully.
    Failed { command: String, message: String },
}

impl std::fmt::Display for ExecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecError::Timeout { command, after } => {
                write!(f, "{} timed out after {:?}", command, after)
            }
            ExecError::Failed { command, message } => write!(f, "{} failed: {}", command, message),
        }
    }
}

impl std::error::Error for ExecError {}

/// Runs `program` and collects stdout, killing it once `timeout` elapses.
///
/// Both pipes are drained on helper threads while the child runs, so a tool
/// producing more output than the pipe buffer cannot stall against the deadline.
pub fn run_with_timeout(
    program: &Path,
    args: &[String],
    timeout: Duration,
) -> Result<String, ExecError> {
    COMMANDS_EXECUTED.fetch_add(1, Ordering::Relaxed);
    let command = display_command(program, args);
    let started = Instant::now();

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ExecError::Failed {
            command: command.clone(),
            message: e.to_string(),
        })?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                debug!(
                    command = %command,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "command timed out"
                );
                return Err(ExecError::Timeout {
                    command,
                    after: timeout,
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                return Err(ExecError::Failed {
                    command,
                    message: e.to_string(),
                });
            }
        }
    };

    let out = stdout.map(collect).unwrap_or_default();
    let err = stderr.map(collect).unwrap_or_default();
    let duration_ms = started.elapsed().as_millis() as u64;

    if !status.success() {
        debug!(command = %command, duration_ms, %status, "command failed");
        let message = match err.trim() {
            "" => status.to_string(),
            msg => msg.to_string(),
        };
        return Err(ExecError::Failed { command, message });
    }

    trace!(command = %command, duration_ms, bytes = out.len(), "command completed");
    Ok(out)
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: thread::JoinHandle<Vec<u8>>) -> String {
    let bytes = handle.join().unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn display_command(program: &Path, args: &[String]) -> String {
    let mut parts = vec![program.display().to_string()];
    parts.extend(args.iter().cloned());
    parts.join(" ")
}
