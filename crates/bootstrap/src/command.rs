//! External command execution.
//!
//! Every tool the checker drives (kubectl, ansible, ssh, scp, sed) goes
//! through [`CommandRunner`] so the reconciliation logic can be exercised
//! against a scripted runner in tests.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::debug;

/// A program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// How a command finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    /// Exited with a non-zero code.
    Exited(i32),
    /// Killed by a signal.
    Signaled,
    /// The process could not be spawned.
    FailedToStart(String),
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Exited(code) => write!(f, "exit status {code}"),
            Self::Signaled => write!(f, "terminated by signal"),
            Self::FailedToStart(reason) => write!(f, "failed to start: {reason}"),
        }
    }
}

/// Result of running a command: status plus combined stdout/stderr.
///
/// The two streams are merged line by line in the order the lines arrived,
/// so the output reads the way the tool printed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: CommandStatus,
    pub output: String,
}

impl CommandOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Success,
            output: output.into(),
        }
    }

    pub fn failure(code: i32, output: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Exited(code),
            output: output.into(),
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == CommandStatus::Success
    }

    /// Short description of the failure: the trimmed output, or the exit
    /// status when the command printed nothing.
    #[must_use]
    pub fn failure_summary(&self) -> String {
        let trimmed = self.output.trim();
        if trimmed.is_empty() {
            self.status.to_string()
        } else {
            trimmed.to_string()
        }
    }
}

/// Runs external commands to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command and capture its combined output. Never fails: spawn
    /// errors are reported as [`CommandStatus::FailedToStart`].
    async fn run(&self, spec: &CommandSpec) -> CommandOutput;
}

/// Runs commands as local processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    working_dir: Option<PathBuf>,
}

impl SystemRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run commands inside the given directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> CommandOutput {
        debug!(command = %spec, "Running command");

        let mut cmd = tokio::process::Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return CommandOutput {
                    status: CommandStatus::FailedToStart(e.to_string()),
                    output: String::new(),
                }
            }
        };

        let combined = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => interleave(stdout, stderr).await,
            _ => String::new(),
        };

        let exit = match child.wait().await {
            Ok(exit) => exit,
            Err(e) => {
                return CommandOutput {
                    status: CommandStatus::FailedToStart(e.to_string()),
                    output: combined,
                }
            }
        };

        let status = if exit.success() {
            CommandStatus::Success
        } else {
            match exit.code() {
                Some(code) => CommandStatus::Exited(code),
                None => CommandStatus::Signaled,
            }
        };

        CommandOutput {
            status,
            output: combined,
        }
    }
}

/// Merge two output streams line by line as lines become available.
async fn interleave<O, E>(stdout: O, stderr: E) -> String
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut stdout = BufReader::new(stdout);
    let mut stderr = BufReader::new(stderr);
    let mut combined = Vec::new();
    let mut out_line = Vec::new();
    let mut err_line = Vec::new();
    let mut out_done = false;
    let mut err_done = false;

    // read_until keeps partially read bytes in the line buffer when the other
    // branch wins, so both buffers live across iterations.
    while !(out_done && err_done) {
        tokio::select! {
            read = stdout.read_until(b'\n', &mut out_line), if !out_done => {
                out_done = !matches!(read, Ok(n) if n > 0);
                combined.append(&mut out_line);
            }
            read = stderr.read_until(b'\n', &mut err_line), if !err_done => {
                err_done = !matches!(read, Ok(n) if n > 0);
                combined.append(&mut err_line);
            }
        }
    }

    String::from_utf8_lossy(&combined).into_owned()
}
