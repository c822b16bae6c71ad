//! Bounded execution of external tools.
//!
//! Each tool runs as a direct child (no shell) with piped output. Both pipes
//! are drained on their own threads while the parent waits, so a chatty tool
//! cannot block on a full pipe. On Unix each tool leads its own process
//! group; on timeout the whole group is killed, so jobs forked by `make` or
//! by the simulation binary do not outlive the stage. Whatever was written
//! before the kill is kept.

use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use wait_timeout::ChildExt;

/// How long to wait for the output pipes to close once the child is gone.
///
/// A grandchild that inherited the pipes can keep them open after the child
/// was killed; its output is abandoned after this grace period.
const PIPE_GRACE: Duration = Duration::from_secs(2);

/// One tool invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Program to execute.
    pub program: PathBuf,
    /// Argument vector, passed verbatim.
    pub args: Vec<String>,
    /// Working directory; inherits the caller's when `None`.
    pub cwd: Option<PathBuf>,
    /// Wall-clock limit.
    pub timeout: Duration,
}

impl ProcessSpec {
    /// A spec with no arguments, running in the caller's directory.
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout,
        }
    }

    /// Sets the argument vector.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Sets the working directory.
    pub fn in_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// The invocation rendered for logs. Not shell-quoted.
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// How a tool invocation ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitClass {
    /// Exit status 0.
    Success,
    /// A non-zero exit status.
    NonZero(i32),
    /// Terminated by a signal without an exit status.
    Signaled,
    /// Killed after exceeding its time limit.
    Timeout(Duration),
    /// The program could not be started or waited on.
    SpawnError(String),
}

impl ExitClass {
    /// Whether the tool exited with status 0.
    pub fn is_success(&self) -> bool {
        matches!(self, ExitClass::Success)
    }

    fn from_status(status: ExitStatus) -> Self {
        match status.code() {
            Some(0) => ExitClass::Success,
            Some(code) => ExitClass::NonZero(code),
            None => ExitClass::Signaled,
        }
    }
}

impl fmt::Display for ExitClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitClass::Success => f.write_str("exited successfully"),
            ExitClass::NonZero(code) => write!(f, "exited with status {code}"),
            ExitClass::Signaled => f.write_str("terminated by signal"),
            ExitClass::Timeout(limit) => write!(f, "timed out after {}s", limit.as_secs_f64()),
            ExitClass::SpawnError(msg) => f.write_str(msg),
        }
    }
}

/// Exit classification plus captured output of one invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// How the process ended.
    pub class: ExitClass,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

impl ProcessOutcome {
    /// An outcome with the given class and output.
    pub fn new(class: ExitClass, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            class,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// A successful exit that printed `stdout`.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self::new(ExitClass::Success, stdout, "")
    }

    /// A program that never started.
    pub fn spawn_error(message: impl Into<String>) -> Self {
        Self::new(ExitClass::SpawnError(message.into()), "", "")
    }

    /// Standard output followed by standard error.
    pub fn combined_output(&self) -> String {
        let mut out = String::with_capacity(self.stdout.len() + self.stderr.len());
        out.push_str(&self.stdout);
        out.push_str(&self.stderr);
        out
    }

    /// Diagnostic text for a failed invocation of `spec`: the tool's stderr,
    /// or a description of how it ended when stderr is empty.
    pub fn failure_text(&self, spec: &ProcessSpec) -> String {
        if !self.stderr.trim().is_empty() {
            return self.stderr.clone();
        }
        match &self.class {
            ExitClass::SpawnError(msg) => msg.clone(),
            class => format!("{}: {class}", spec.program.display()),
        }
    }
}

/// Runs `spec` to completion or timeout.
///
/// Never fails: spawn and wait errors are reported as
/// [`ExitClass::SpawnError`].
pub fn run_process(spec: &ProcessSpec) -> ProcessOutcome {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(cwd) = &spec.cwd {
        command.current_dir(cwd);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            return ProcessOutcome::spawn_error(format!(
                "failed to start {}: {e}",
                spec.program.display()
            ))
        }
    };

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let class = match child.wait_timeout(spec.timeout) {
        Ok(Some(status)) => ExitClass::from_status(status),
        Ok(None) => {
            kill_group(&mut child);
            tracing::debug!(program = %spec.program.display(), "process group killed after timeout");
            ExitClass::Timeout(spec.timeout)
        }
        Err(e) => {
            kill_group(&mut child);
            ExitClass::SpawnError(format!(
                "failed waiting for {}: {e}",
                spec.program.display()
            ))
        }
    };

    ProcessOutcome {
        class,
        stdout: collect(&stdout),
        stderr: collect(&stderr),
    }
}

/// Kills the child's process group, then the child itself, and reaps it.
fn kill_group(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
            // SAFETY: `kill` touches no memory; the group was created for this child.
            unsafe {
                libc::kill(-pgid, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    if let Some(mut pipe) = pipe {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(buf);
        });
    }
    rx
}

fn collect(rx: &mpsc::Receiver<Vec<u8>>) -> String {
    match rx.recv_timeout(PIPE_GRACE) {
        Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
        Err(_) => String::new(),
    }
}
