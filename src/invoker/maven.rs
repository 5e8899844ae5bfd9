//! Maven build invoker.
//!
//! Builds through `$MAVEN_HOME/bin/mvn` with the scenario's targets as
//! arguments. Maven scenarios have no probe and no initial clean build.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::schema::MavenOptions;
use crate::error::BuildError;
use crate::invoker::{run_logged, BuildInvoker, CommandLine};
use crate::observability::RunLog;
use crate::schedule::Invocation;

/// Maven build invoker, owned by one scenario execution.
#[derive(Debug)]
pub struct MavenInvoker {
    project_dir: PathBuf,
    mvn: PathBuf,
    targets: Vec<String>,
    log: RunLog,
    cancel: CancellationToken,
}

impl MavenInvoker {
    /// Locates `mvn` under `$MAVEN_HOME` and prepares the invoker.
    ///
    /// # Errors
    ///
    /// Fails when `MAVEN_HOME` is unset or does not contain `bin/mvn`.
    pub fn create(
        project_dir: PathBuf,
        options: &MavenOptions,
        log: RunLog,
        cancel: CancellationToken,
    ) -> Result<Self, BuildError> {
        let Some(maven_home) = std::env::var_os("MAVEN_HOME") else {
            return Err(BuildError::ToolNotFound {
                path: PathBuf::from("$MAVEN_HOME/bin/mvn"),
            });
        };
        let mvn = PathBuf::from(maven_home)
            .join("bin")
            .join(if cfg!(windows) { "mvn.cmd" } else { "mvn" });
        if !mvn.exists() {
            return Err(BuildError::ToolNotFound { path: mvn });
        }
        Ok(Self {
            project_dir,
            mvn,
            targets: options.targets.clone(),
            log,
            cancel,
        })
    }
}

#[async_trait]
impl BuildInvoker for MavenInvoker {
    async fn run(&mut self, _invocation: &Invocation) -> Result<Duration, BuildError> {
        let command = CommandLine {
            program: self.mvn.clone(),
            args: self.targets.clone(),
            cwd: self.project_dir.clone(),
        };

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
        Ok(())
    }
}
