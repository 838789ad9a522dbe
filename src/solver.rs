use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use wait_timeout::ChildExt;

use crate::datastructures::Timeout;
use crate::error::SweepError;

#[cfg(test)]
mod tests;

/// Number of trailing stderr characters kept in error messages.
const STDERR_TAIL: usize = 2000;

/// Granularity at which a running solver notices cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Captured result of a solver run that exited successfully.
#[derive(Debug, Clone)]
pub struct SolverOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: ExitStatus,
    pub elapsed: Duration,
}

/// How to launch the external solver: `program [args..] <model> <data>`.
#[derive(Debug, Clone)]
pub struct SolverCommand {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Timeout,
    /// Set to stop the running solver early.
    pub cancel: Option<Arc<AtomicBool>>,
}

fn drain<R: Read + Send + 'static>(
    stream: Option<R>,
) -> Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let read = match stream {
            Some(mut stream) => stream.read_to_end(&mut buf).map(|_| ()),
            None => Ok(()),
        };
        let text =
            read.map(|()| String::from_utf8_lossy(&buf).into_owned());
        // nobody listens any more once the run gave up on this stream
        let _ = tx.send(text);
    });
    rx
}

/// Waits until `deadline` for a reader to hand over its whole stream.
fn join(
    rx: &Receiver<io::Result<String>>,
    deadline: Instant,
    limit: Duration,
    program: &str,
) -> Result<String, SweepError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(remaining) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(err)) => Err(SweepError::io(program, err)),
        Err(RecvTimeoutError::Timeout) => {
            Err(SweepError::SolverTimeout(limit))
        }
        Err(RecvTimeoutError::Disconnected) => Err(SweepError::io(
            program,
            io::Error::new(io::ErrorKind::Other, "output reader panicked"),
        )),
    }
}

#[cfg(unix)]
fn kill_group(child: &Child) {
    if let Ok(group) = libc::pid_t::try_from(child.id()) {
        // SAFETY: kill(2) only sends a signal; the negative id addresses the
        // process group created at spawn
        unsafe {
            libc::kill(-group, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_: &Child) {}

/// Kills the solver together with every process it started.
fn kill_tree(child: &mut Child) {
    kill_group(child);
    let _ = child.kill();
    let _ = child.wait();
}

fn tail(text: &str, max_chars: usize) -> String {
    let skip = text.chars().count().saturating_sub(max_chars);
    text.chars().skip(skip).collect::<String>().trim().to_string()
}

impl SolverCommand {
    pub fn new(program: impl Into<String>, timeout: Timeout) -> Self {
        Self {
            program: program.into(),
            args: vec![],
            timeout,
            cancel: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::SeqCst))
    }

    fn spawn(&self, model: &Path, data: &Path) -> Result<Child, SweepError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(model)
            .arg(data)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        command.spawn().map_err(|source| SweepError::SolverLaunch {
            program: self.program.clone(),
            source,
        })
    }

    /// Waits for the direct child until `deadline`, checking for
    /// cancellation in between.
    fn wait(
        &self,
        child: &mut Child,
        deadline: Instant,
        data: &Path,
    ) -> Result<ExitStatus, SweepError> {
        loop {
            if self.cancelled() {
                return Err(SweepError::Cancelled);
            }
            let remaining =
                deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SweepError::SolverTimeout(
                    self.timeout.as_duration(),
                ));
            }
            let waited = child
                .wait_timeout(remaining.min(POLL_INTERVAL))
                .map_err(|e| SweepError::io(data, e))?;
            if let Some(status) = waited {
                return Ok(status);
            }
        }
    }

    /// Runs the solver on `model` and `data` and captures both output
    /// streams.
    ///
    /// The solver runs in its own process group. Its exit and the end of
    /// both streams must happen within the timeout, otherwise the whole
    /// group is killed. Output is drained on separate threads so a chatty
    /// solver cannot block on a full pipe.
    pub fn run(
        &self,
        model: &Path,
        data: &Path,
    ) -> Result<SolverOutput, SweepError> {
        let start = Instant::now();
        let limit = self.timeout.as_duration();
        let deadline = start + limit;
        let mut child = self.spawn(model, data)?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let finished =
            self.wait(&mut child, deadline, data).and_then(|status| {
                let stdout = join(&stdout, deadline, limit, &self.program)?;
                let stderr = join(&stderr, deadline, limit, &self.program)?;
                Ok((status, stdout, stderr))
            });
        // leftover background processes go down with the solver
        kill_tree(&mut child);
        let (status, stdout, stderr) = match finished {
            Ok(finished) => finished,
            Err(err) => {
                warn!("Stopped solver `{}`: {err}", self.program);
                return Err(err);
            }
        };
        let elapsed = start.elapsed();
        debug!("Solver finished with {status} after {elapsed:?}");
        if !status.success() {
            return Err(SweepError::SolverExit {
                status,
                stderr: tail(&stderr, STDERR_TAIL),
            });
        }
        Ok(SolverOutput {
            stdout,
            stderr,
            status,
            elapsed,
        })
    }
}
