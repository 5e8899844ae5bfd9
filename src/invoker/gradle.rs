//! Gradle invokers.
//!
//! Both execution modes submit builds through the Gradle command line
//! against an isolated user home, so the operator's caches and init
//! scripts never leak into measurements.
//!
//! - Tool-API mode keeps one warm daemon per (version, system properties,
//!   gradle args, user home): every invocation passes `--daemon` so the
//!   daemon is reused, and `shutdown()` stops it with `--stop`.
//! - No-daemon mode passes `--no-daemon`, so each invocation runs in a
//!   fresh build process that is drained before the next starts.
//!
//! The probe always runs `help` with `--daemon`, untimed, and parses the
//! advertised version from the build-environment output.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::schema::RunUsing;
use crate::error::BuildError;
use crate::invoker::{run_logged, BuildEnvironment, BuildInvoker, CommandLine};
use crate::observability::RunLog;
use crate::schedule::Invocation;

/// Gradle build invoker, owned by one scenario execution.
#[derive(Debug)]
pub struct GradleInvoker {
    project_dir: PathBuf,
    user_home: PathBuf,
    version: String,
    daemon: bool,
    dry_run: bool,
    system_properties: BTreeMap<String, String>,
    gradle_args: Vec<String>,
    profiler_args: Vec<String>,
    executable: PathBuf,
    log: RunLog,
    cancel: CancellationToken,
}

impl GradleInvoker {
    /// Creates an invoker for one (scenario, version) execution.
    ///
    /// `user_home` must be absolute; builds run with the project directory
    /// as working directory.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project_dir: PathBuf,
        user_home: PathBuf,
        version: String,
        run_using: RunUsing,
        dry_run: bool,
        system_properties: BTreeMap<String, String>,
        gradle_args: Vec<String>,
        profiler_args: Vec<String>,
        log: RunLog,
        cancel: CancellationToken,
    ) -> Self {
        let executable = resolve_executable(&project_dir, &user_home, &version);
        debug!(executable = %executable.display(), %version, "resolved Gradle executable");
        Self {
            project_dir,
            user_home,
            version,
            daemon: run_using == RunUsing::ToolApi,
            dry_run,
            system_properties,
            gradle_args,
            profiler_args,
            executable,
            log,
            cancel,
        }
    }

    /// The Gradle version this invoker targets.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Tasks first, then flags, so the command line reads like a user's.
    fn arguments(&self, tasks: &[String], daemon: bool, dry_run: bool) -> Vec<String> {
        let mut args: Vec<String> = tasks.to_vec();
        args.push(if daemon { "--daemon" } else { "--no-daemon" }.to_string());
        args.push(format!("--gradle-user-home={}", self.user_home.display()));
        if dry_run {
            args.push("-m".to_string());
        }
        for (key, value) in &self.system_properties {
            args.push(format!("-D{key}={value}"));
        }
        args.extend(self.gradle_args.iter().cloned());
        args.extend(self.profiler_args.iter().cloned());
        args
    }

    fn command(&self, args: Vec<String>) -> CommandLine {
        CommandLine {
            program: self.executable.clone(),
            args,
            cwd: self.project_dir.clone(),
        }
    }
}

#[async_trait]
impl BuildInvoker for GradleInvoker {
    async fn probe(&mut self) -> Result<BuildEnvironment, BuildError> {
        // The probe warms (or starts) a daemon even for no-daemon
        // scenarios, and is never timed or dry-run.
        let args = self.arguments(&["help".to_string()], true, false);
        let output = run_logged(&self.command(args), &self.log, &self.cancel).await?;
        if !output.status.success() {
            return Err(BuildError::Failed {
                status: output.status,
            });
        }

        let advertised = parse_advertised_version(&output.stdout);
        match &advertised {
            Some(version) if version != &self.version => {
                warn!(requested = %self.version, %version, "build advertised a different Gradle version");
            }
            Some(_) => {}
            None => debug!("probe output did not advertise a Gradle version"),
        }
        Ok(BuildEnvironment {
            gradle_version: advertised,
        })
    }

    async fn run(&mut self, invocation: &Invocation) -> Result<Duration, BuildError> {
        let args = self.arguments(&invocation.tasks, self.daemon, self.dry_run);
        let command = self.command(args);
        let start = Instant::now();
        let output = run_logged(&command, &self.log, &self.cancel).await?;
        let elapsed = start.elapsed();
        if output.status.success() {
            Ok(elapsed)
        } else {
            Err(BuildError::Failed {
                status: output.status,
            })
        }
    }

    async fn shutdown(&mut self) -> Result<(), BuildError> {
        if !self.daemon {
            return Ok(());
        }
        // Best effort: a daemon that refuses to stop should not turn a
        // finished scenario into a failure.
        let args = vec![
            "--stop".to_string(),
            format!("--gradle-user-home={}", self.user_home.display()),
        ];
        match run_logged(&self.command(args), &self.log, &self.cancel).await {
            Ok(output) if output.status.success() => {}
            Ok(output) => {
                self.log
                    .detail(&format!("Could not stop daemon: {}", output.status));
            }
            Err(err) => warn!(%err, "failed to stop the Gradle daemon"),
        }
        Ok(())
    }
}

/// Resolves the Gradle executable for a requested version.
///
/// Pre-provisioned distributions under the isolated user home win, then
/// the project wrapper, then `gradle` on the PATH.
fn resolve_executable(project_dir: &Path, user_home: &Path, version: &str) -> PathBuf {
    let launcher = if cfg!(windows) { "gradle.bat" } else { "gradle" };
    let distribution = user_home
        .join("distributions")
        .join(format!("gradle-{version}"))
        .join("bin")
        .join(launcher);
    if distribution.exists() {
        return distribution;
    }

    let wrapper = project_dir.join(if cfg!(windows) { "gradlew.bat" } else { "gradlew" });
    if wrapper.exists() {
        return wrapper;
    }

    PathBuf::from(launcher)
}

/// Extracts the advertised version from probe output, e.g.
/// `Welcome to Gradle 3.1.` or a `Gradle 3.1` banner line.
fn parse_advertised_version(output: &str) -> Option<String> {
    for line in output.lines() {
        let Some(index) = line.find("Gradle ") else {
            continue;
        };
        let Some(token) = line[index + "Gradle ".len()..].split_whitespace().next() else {
            continue;
        };
        let token = token.trim_end_matches(['.', '!']);
        if token.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            return Some(token.to_string());
        }
    }
    None
}
