//! Buck build invoker.
//!
//! Builds through the project's `buckw` wrapper. Targets come either
//! literally from the scenario or from a `buckw targets` query when the
//! scenario gives a target type (`all` queries every target). Buck
//! scenarios have no probe and no initial clean build.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::schema::BuckOptions;
use crate::error::BuildError;
use crate::invoker::{run_logged, BuildInvoker, CommandLine};
use crate::observability::RunLog;
use crate::schedule::Invocation;

/// Buck build invoker, owned by one scenario execution.
#[derive(Debug)]
pub struct BuckInvoker {
    project_dir: PathBuf,
    buckw: PathBuf,
    targets: Vec<String>,
    log: RunLog,
    cancel: CancellationToken,
}

impl BuckInvoker {
    /// Resolves the target list and prepares the invoker.
    ///
    /// # Errors
    ///
    /// Fails when `buckw` is missing from the project directory or the
    /// target query fails.
    pub async fn create(
        project_dir: PathBuf,
        options: &BuckOptions,
        log: RunLog,
        cancel: CancellationToken,
    ) -> Result<Self, BuildError> {
        let buckw = project_dir.join("buckw");
        if !buckw.exists() {
            return Err(BuildError::ToolNotFound { path: buckw });
        }

        let targets = match &options.target_type {
            Some(target_type) => {
                let mut args = vec!["targets".to_string()];
                if target_type != "all" {
                    args.push("--type".to_string());
                    args.push(target_type.clone());
                }
                let command = CommandLine {
                    program: buckw.clone(),
                    args,
                    cwd: project_dir.clone(),
                };
                let output = run_logged(&command, &log, &cancel).await?;
                if !output.status.success() {
                    return Err(BuildError::Failed {
                        status: output.status,
                    });
                }
                output
                    .stdout
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            None => options.targets.clone(),
        };

        log.output(&format!("* Buck targets: [{}]", targets.join(", ")));
        Ok(Self {
            project_dir,
            buckw,
            targets,
            log,
            cancel,
        })
    }

    /// The resolved target list.
    #[must_use]
    pub fn targets(&self) -> &[String] {
        &self.targets
    }
}

#[async_trait]
impl BuildInvoker for BuckInvoker {
    async fn run(&mut self, _invocation: &Invocation) -> Result<Duration, BuildError> {
        let mut args = vec!["build".to_string()];
        args.extend(self.targets.iter().cloned());
        let command = CommandLine {
            program: self.buckw.clone(),
            args,
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
