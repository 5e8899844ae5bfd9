//! Profiler control plane.
//!
//! Each profiler implements the same four-operation capability set:
//! per-invocation adjustment (init scripts and JVM arguments that must be
//! in place from daemon startup), recording control around each measured
//! build, and a finalize step that collects artifacts into the output
//! directory. Profilers compose: the orchestrator holds them in an ordered
//! collection, attaches in order and detaches in reverse order, and their
//! artifacts coexist.

pub mod agents;
pub mod build_scan;
pub mod chrome_trace;
pub mod jfr;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::cli::Settings;
use crate::config::schema::RunUsing;
use crate::error::{Error, ProfilerError, Result};
use crate::observability::RunLog;

/// The profiler selected with `--profile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ProfilerKind {
    /// Java Flight Recorder via the daemon's diagnostic commands.
    Jfr,
    /// Honest Profiler agent.
    Hp,
    /// YourKit agent.
    Yourkit,
    /// JProfiler agent.
    Jprofiler,
    /// Gradle build scans via an injected init script.
    Buildscan,
    /// Chrome trace events via an injected init script.
    ChromeTrace,
}

/// Everything a profiler needs to know about the current execution.
#[derive(Debug, Clone)]
pub struct ProfilerContext {
    /// Scenario being executed.
    pub scenario_name: String,
    /// The project under build.
    pub project_dir: PathBuf,
    /// Where this execution's artifacts belong.
    pub output_dir: PathBuf,
    /// The isolated Gradle user home (init scripts are generated here).
    pub gradle_user_home: PathBuf,
    /// File the generated init script publishes the daemon PID to.
    pub pid_file: PathBuf,
    /// The run log.
    pub log: RunLog,
    /// Cancellation for control subprocesses.
    pub cancel: CancellationToken,
}

/// The four-operation profiler capability set.
#[async_trait]
pub trait Profiler: Send {
    /// Profiler name as given on the command line.
    fn name(&self) -> &'static str;

    /// Checks the profiler against the scenario's daemon mode.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the combination is unsupported.
    fn validate(&self, _scenario: &str, _run_using: RunUsing) -> Result<()> {
        Ok(())
    }

    /// Arguments added to every build invocation of the execution.
    ///
    /// Called once per execution; may generate init scripts on disk.
    fn invocation_args(
        &mut self,
        _ctx: &ProfilerContext,
    ) -> std::result::Result<Vec<String>, ProfilerError> {
        Ok(Vec::new())
    }

    /// Starts recording before a measured build.
    async fn before_measured(
        &mut self,
        _ctx: &ProfilerContext,
    ) -> std::result::Result<(), ProfilerError> {
        Ok(())
    }

    /// Stops recording after a measured build.
    async fn after_measured(
        &mut self,
        _ctx: &ProfilerContext,
    ) -> std::result::Result<(), ProfilerError> {
        Ok(())
    }

    /// Collects artifacts into the output directory.
    async fn finalize(&mut self, _ctx: &ProfilerContext) -> std::result::Result<(), ProfilerError> {
        Ok(())
    }
}

/// Builds the profiler for one `--profile` flag.
#[must_use]
pub fn create(kind: ProfilerKind, settings: &Settings) -> Box<dyn Profiler> {
    match kind {
        ProfilerKind::Jfr => Box::new(jfr::JfrProfiler::default()),
        ProfilerKind::Hp => Box::new(agents::HonestProfiler),
        ProfilerKind::Yourkit => Box::new(agents::YourKit {
            sampling: settings.yourkit_sampling,
            memory: settings.yourkit_memory,
        }),
        ProfilerKind::Jprofiler => Box::new(agents::JProfiler {
            home: settings.jprofiler_home.clone(),
            config: settings.jprofiler_config.clone(),
            session_id: settings.jprofiler_session_id.clone(),
        }),
        ProfilerKind::Buildscan => Box::new(build_scan::BuildScanProfiler {
            plugin_version: settings.buildscan_version.clone(),
        }),
        ProfilerKind::ChromeTrace => Box::new(chrome_trace::ChromeTraceProfiler),
    }
}

/// Rejects profiling a scenario that does not build with Gradle.
///
/// # Errors
///
/// Returns the fatal configuration error mandated for buck scenarios.
pub fn reject_non_gradle(scenario: &str) -> Error {
    Error::Config(format!(
        "Can only profile scenario '{scenario}' when building using Gradle."
    ))
}

/// Writes a generated init script under the isolated user home.
pub(crate) fn write_init_script(
    gradle_user_home: &Path,
    file_name: &str,
    contents: &str,
) -> std::result::Result<PathBuf, ProfilerError> {
    let dir = gradle_user_home.join("init-scripts");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(file_name);
    std::fs::write(&path, contents)?;
    Ok(path)
}

/// Moves an artifact into the output directory, copying across devices.
pub(crate) fn move_artifact(from: &Path, to: &Path) -> std::result::Result<(), ProfilerError> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if std::fs::rename(from, to).is_err() {
        std::fs::copy(from, to)?;
        std::fs::remove_file(from)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_gradle_rejection_message_is_exact() {
        let err = reject_non_gradle("buck-all");
        assert_eq!(
            err.to_string(),
            "Can only profile scenario 'buck-all' when building using Gradle."
        );
    }

    #[test]
    fn move_artifact_replaces_rename_with_copy_when_needed() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("profile.jfr");
        let to = dir.path().join("out").join("profile.jfr");
        std::fs::write(&from, b"recording").unwrap();

        move_artifact(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"recording");
    }

    #[test]
    fn init_scripts_land_under_the_user_home() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_init_script(dir.path(), "x.gradle", "// generated").unwrap();
        assert!(path.starts_with(dir.path().join("init-scripts")));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "// generated");
    }
}
