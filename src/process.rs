//! External command execution with a hard deadline.
//!
//! Both the analyzer and the history queries are opaque text-producing
//! processes. They are run through [`CommandRunner`] so the pipeline can be
//! driven by fake runners in tests.

use parking_lot::Mutex;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// How often a running child is polled while waiting on a deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A program and its argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured output of a finished (or killed) command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// stdout and stderr lines, in arrival order.
    pub lines: Vec<String>,
    /// Exit code, `None` when killed or terminated by a signal.
    pub status: Option<i32>,
    /// Whether the deadline expired and the process was killed.
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs a command line against a working directory.
pub trait CommandRunner: Send + Sync {
    /// Run `cmd` in `cwd`. With a `timeout`, the process is killed once the
    /// deadline passes and whatever output was captured so far is returned.
    fn run(&self, cmd: &CommandSpec, cwd: &Path, timeout: Option<Duration>)
        -> Result<CommandOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(
        &self,
        cmd: &CommandSpec,
        cwd: &Path,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput> {
        let deadline = timeout.map(|t| Instant::now() + t);

        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                program: cmd.program.clone(),
                source,
            })?;

        let lines = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = mpsc::channel();
        let mut readers = 0;
        if let Some(stdout) = child.stdout.take() {
            spawn_line_reader(stdout, Arc::clone(&lines), done_tx.clone());
            readers += 1;
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_reader(stderr, Arc::clone(&lines), done_tx.clone());
            readers += 1;
        }
        drop(done_tx);

        let (status, mut timed_out) = match deadline {
            Some(deadline) => wait_until(&mut child, deadline)?,
            None => (child.wait()?.code(), false),
        };

        // A grandchild can keep the pipes open after the child exits, so the
        // readers are only waited on until the deadline.
        if !timed_out {
            for _ in 0..readers {
                let received = match deadline {
                    Some(deadline) => done_rx
                        .recv_timeout(deadline.saturating_duration_since(Instant::now()))
                        .is_ok(),
                    None => done_rx.recv().is_ok(),
                };
                if !received {
                    timed_out = deadline.is_some_and(|d| Instant::now() >= d);
                    break;
                }
            }
        }

        let captured = std::mem::take(&mut *lines.lock());
        Ok(CommandOutput {
            lines: captured,
            status,
            timed_out,
        })
    }
}

/// Poll `child` until it exits or `deadline` passes. On expiry the child is
/// killed and reaped.
fn wait_until(child: &mut Child, deadline: Instant) -> Result<(Option<i32>, bool)> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status.code(), false));
        }
        let now = Instant::now();
        if now >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok((None, true));
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

fn spawn_line_reader<R: Read + Send + 'static>(
    input: R,
    acc: Arc<Mutex<Vec<String>>>,
    done: mpsc::Sender<()>,
) {
    thread::spawn(move || {
        let mut reader = BufReader::new(input);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']);
                    acc.lock().push(line.to_string());
                }
            }
        }
        let _ = done.send(());
    });
}
