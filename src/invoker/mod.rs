//! Build invokers.
//!
//! A [`BuildInvoker`] owns the connection to one build tool for the
//! lifetime of a scenario execution: `probe` confirms the build
//! environment, `run` submits one invocation and measures its wall-clock
//! time, `shutdown` releases the tool (stopping the Gradle daemon where
//! one was started). Variants: Gradle with a warm daemon, Gradle
//! `--no-daemon`, Buck, and Maven.

pub mod buck;
pub mod gradle;
pub mod maven;

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_util::sync::CancellationToken;

use crate::error::BuildError;
use crate::observability::RunLog;
use crate::schedule::Invocation;

pub use buck::BuckInvoker;
pub use gradle::GradleInvoker;
pub use maven::MavenInvoker;

/// Keep captured stdout bounded; chatty build tools can emit gigabytes.
const MAX_CAPTURED_BYTES: usize = 16 * 1024 * 1024;

/// Build environment reported by the probe.
#[derive(Debug, Clone, Default)]
pub struct BuildEnvironment {
    /// The Gradle version the build tool advertised, when one was parsed.
    pub gradle_version: Option<String>,
}

/// The three-operation build tool contract.
#[async_trait]
pub trait BuildInvoker: Send {
    /// Runs the untimed probe and reports the build environment.
    ///
    /// Buck and Maven have no probe phase; the default is a no-op.
    async fn probe(&mut self) -> Result<BuildEnvironment, BuildError> {
        Ok(BuildEnvironment::default())
    }

    /// Submits one invocation and returns its wall-clock duration.
    async fn run(&mut self, invocation: &Invocation) -> Result<Duration, BuildError>;

    /// Releases the build tool.
    async fn shutdown(&mut self) -> Result<(), BuildError>;
}

/// One concrete command line to hand to the build tool.
#[derive(Debug, Clone)]
pub(crate) struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl CommandLine {
    /// Shell-style rendering for error messages and the run log.
    pub fn display(&self) -> String {
        let mut out = quote_part(&self.program.to_string_lossy());
        for arg in &self.args {
            out.push(' ');
            out.push_str(&quote_part(arg));
        }
        out
    }
}

fn quote_part(part: &str) -> String {
    if part.contains(' ') || part.contains('\t') {
        format!("\"{}\"", part.replace('"', "\\\""))
    } else {
        part.to_string()
    }
}

/// Captured result of a command invocation.
#[derive(Debug)]
pub(crate) struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
}

/// Runs a command, streaming its output into the run log line by line.
///
/// Stdout is additionally captured (bounded) for callers that parse it.
/// Cancellation kills the child and reports [`BuildError::Cancelled`].
pub(crate) async fn run_logged(
    command: &CommandLine,
    log: &RunLog,
    cancel: &CancellationToken,
) -> Result<CommandOutput, BuildError> {
    let mut child = tokio::process::Command::new(&command.program)
        .args(&command.args)
        .current_dir(&command.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| BuildError::Spawn {
            command: command.display(),
            source,
        })?;

    let stdout_task = child
        .stdout
        .take()
        .map(|reader| tokio::spawn(pump(reader, log.clone(), true)));
    let stderr_task = child
        .stderr
        .take()
        .map(|reader| tokio::spawn(pump(reader, log.clone(), false)));

    let status = tokio::select! {
        status = child.wait() => status?,
        () = cancel.cancelled() => {
            let _ = child.kill().await;
            return Err(BuildError::Cancelled);
        }
    };

    let stdout = match stdout_task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    };
    if let Some(task) = stderr_task {
        let _ = task.await;
    }

    Ok(CommandOutput { status, stdout })
}

/// Forwards one child stream into the run log, optionally capturing it.
async fn pump<R>(reader: R, log: RunLog, capture: bool) -> String
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(reader).lines();
    let mut captured = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        log.detail(&line);
        if capture && captured.len() < MAX_CAPTURED_BYTES {
            captured.push_str(&line);
            captured.push('\n');
        }
    }
    captured
}
