//! # External Tools
//!
//! Process boundary for `kubectl` and the Azure CLI.
//!
//! Every shell-out goes through the [`CommandRunner`] trait. The production
//! [`SystemRunner`] spawns real processes; tests substitute a scripted runner
//! that records invocations and replays canned output.
//!
//! ## Redaction
//!
//! Invocations built with [`Invocation::sensitive`] carry secret material
//! (for example `--from-literal=AZURE_STORAGE_KEY=...`). Their rendered
//! command line masks literal values, their stdin is never logged, and a
//! failure never echoes their stdout.

pub mod az;
pub mod kubectl;

pub use az::Az;
pub use kubectl::{Kubectl, ServiceRef, ServiceRefError};

use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{debug, error};

/// Placeholder substituted for secret values in rendered command lines
pub const REDACTED: &str = "<redacted>";

/// A single external command: program, arguments and optional stdin payload
#[derive(Clone)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    stdin: Option<String>,
    sensitive: bool,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            sensitive: false,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Feed `input` to the process on stdin
    #[must_use]
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Mark this invocation as carrying secret material
    #[must_use]
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn stdin_data(&self) -> Option<&str> {
        self.stdin.as_deref()
    }

    pub fn is_sensitive(&self) -> bool {
        self.sensitive
    }

    /// Command line safe to print in logs and errors
    pub fn render(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        for arg in &self.args {
            if self.sensitive {
                parts.push(redact_arg(arg));
            } else {
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("command", &self.render())
            .field("has_stdin", &self.stdin.is_some())
            .field("sensitive", &self.sensitive)
            .finish()
    }
}

/// Mask the value half of `--from-literal=KEY=value` arguments
fn redact_arg(arg: &str) -> String {
    match arg.strip_prefix("--from-literal=") {
        Some(rest) => match rest.split_once('=') {
            Some((key, _)) => format!("--from-literal={key}={REDACTED}"),
            None => format!("--from-literal={REDACTED}"),
        },
        None => arg.to_string(),
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Errors raised at the process boundary
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{program} is not installed or not on PATH")]
    NotFound { program: String },

    #[error("Failed to execute {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while running {command}: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", describe_failure(command, *code, stderr, stdout.as_deref()))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
        /// Omitted for sensitive invocations
        stdout: Option<String>,
    },

    #[error("Unexpected output from {command}: {source}")]
    InvalidOutput {
        command: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CommandError {
    /// Build a [`CommandError::Failed`] from a non-zero exit
    pub fn failed(invocation: &Invocation, output: &CommandOutput) -> Self {
        let stdout = output.stdout.trim();
        CommandError::Failed {
            command: invocation.render(),
            code: output.code,
            stderr: output.stderr.trim().to_string(),
            stdout: if invocation.is_sensitive() || stdout.is_empty() {
                None
            } else {
                Some(stdout.to_string())
            },
        }
    }

    /// Captured stderr of a failed command, if any
    pub fn stderr(&self) -> Option<&str> {
        match self {
            CommandError::Failed { stderr, .. } if !stderr.is_empty() => Some(stderr),
            _ => None,
        }
    }
}

fn describe_failure(command: &str, code: Option<i32>, stderr: &str, stdout: Option<&str>) -> String {
    let status = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
    let mut message = format!("Command `{command}` exited with status {status}.");
    if !stderr.is_empty() {
        message.push_str(&format!(" stderr: {stderr}"));
    }
    if let Some(stdout) = stdout {
        message.push_str(&format!(" stdout: {stdout}"));
    }
    message
}

/// Seam between the toolkit and the processes it spawns
pub trait CommandRunner: fmt::Debug {
    /// Run the invocation to completion, whatever its exit status
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError>;

    /// Run the invocation and turn a non-zero exit into [`CommandError::Failed`]
    fn run_checked(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        let output = self.run(invocation)?;
        if output.success() {
            Ok(output)
        } else {
            let err = CommandError::failed(invocation, &output);
            debug!("{}", err);
            Err(err)
        }
    }
}

/// Runs commands as child processes of `iamctl`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        let command_line = invocation.render();
        let program = which::which(invocation.program()).map_err(|e| {
            debug!("Unable to locate {}: {}", invocation.program(), e);
            CommandError::NotFound {
                program: invocation.program().to_string(),
            }
        })?;

        debug!("Running {}", command_line);

        let mut cmd = Command::new(&program);
        cmd.args(invocation.arguments())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if invocation.stdin_data().is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = cmd.spawn().map_err(|source| CommandError::Spawn {
            command: command_line.clone(),
            source,
        })?;

        if let Some(input) = invocation.stdin_data() {
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(input.as_bytes())
                    .map_err(|source| CommandError::Io {
                        command: command_line.clone(),
                        source,
                    })?;
                // stdin drops here so the child sees EOF
            }
        }

        let output = child.wait_with_output().map_err(|source| {
            error!("Failed to wait for {}: {}", command_line, source);
            CommandError::Io {
                command: command_line.clone(),
                source,
            }
        })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
