//! Java Flight Recorder profiler.
//!
//! JFR records inside the daemon JVM, so it requires tool-api mode. The
//! daemon PID is published through a generated init script, and recording
//! is controlled with the JDK's `jcmd` diagnostic command. The finished
//! recording is moved to `profile.jfr` in the output directory.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::config::schema::RunUsing;
use crate::error::{Error, ProfilerError, Result};
use crate::profiler::{move_artifact, write_init_script, Profiler, ProfilerContext};

/// System property carrying the pid file path into the init script.
pub const PID_FILE_PROPERTY: &str = "buildbench.pid.file";

const PID_SCRIPT: &str = r"import java.lang.management.ManagementFactory

def pidFile = new File(System.getProperty('buildbench.pid.file'))
pidFile.parentFile?.mkdirs()
pidFile.text = ManagementFactory.runtimeMXBean.name.tokenize('@')[0]
";

/// JFR profiler state for one execution.
#[derive(Debug, Default)]
pub struct JfrProfiler {
    recording: Option<String>,
}

#[async_trait]
impl Profiler for JfrProfiler {
    fn name(&self) -> &'static str {
        "jfr"
    }

    fn validate(&self, scenario: &str, run_using: RunUsing) -> Result<()> {
        if run_using == RunUsing::NoDaemon {
            return Err(Error::Config(format!(
                "Profiler jfr requires the Gradle daemon. Scenario '{scenario}' runs with no-daemon."
            )));
        }
        Ok(())
    }

    fn invocation_args(
        &mut self,
        ctx: &ProfilerContext,
    ) -> std::result::Result<Vec<String>, ProfilerError> {
        let script = write_init_script(&ctx.gradle_user_home, "capture-pid.gradle", PID_SCRIPT)?;
        Ok(vec![
            format!("--init-script={}", script.display()),
            format!("-D{PID_FILE_PROPERTY}={}", ctx.pid_file.display()),
        ])
    }

    async fn before_measured(
        &mut self,
        ctx: &ProfilerContext,
    ) -> std::result::Result<(), ProfilerError> {
        let pid = read_pid(ctx)?;
        let name = format!("buildbench-{}", ctx.scenario_name);
        jcmd(ctx, &pid, &["JFR.start".to_string(), format!("name={name}")]).await?;
        ctx.log
            .output(&format!("Starting recording for daemon with pid {pid}"));
        self.recording = Some(name);
        Ok(())
    }

    async fn after_measured(
        &mut self,
        ctx: &ProfilerContext,
    ) -> std::result::Result<(), ProfilerError> {
        let Some(name) = self.recording.take() else {
            return Ok(());
        };
        let pid = read_pid(ctx)?;
        let staging = ctx.project_dir.join("profile.jfr");
        jcmd(
            ctx,
            &pid,
            &[
                "JFR.stop".to_string(),
                format!("name={name}"),
                format!("filename={}", staging.display()),
            ],
        )
        .await?;
        move_artifact(&staging, &ctx.output_dir.join("profile.jfr"))?;
        Ok(())
    }
}

fn read_pid(ctx: &ProfilerContext) -> std::result::Result<String, ProfilerError> {
    let raw = std::fs::read_to_string(&ctx.pid_file).map_err(|err| {
        ProfilerError::Control(format!(
            "daemon pid file {} was not written: {err}",
            ctx.pid_file.display()
        ))
    })?;
    let pid = raw.trim();
    if pid.is_empty() {
        return Err(ProfilerError::Control(format!(
            "daemon pid file {} is empty",
            ctx.pid_file.display()
        )));
    }
    Ok(pid.to_string())
}

/// Runs one `jcmd <pid> <command…>` against the daemon JVM.
async fn jcmd(
    ctx: &ProfilerContext,
    pid: &str,
    args: &[String],
) -> std::result::Result<(), ProfilerError> {
    let program = std::env::var_os("JAVA_HOME").map_or_else(
        || PathBuf::from("jcmd"),
        |home| PathBuf::from(home).join("bin").join("jcmd"),
    );
    debug!(program = %program.display(), pid, ?args, "running jcmd");

    let command = crate::invoker::CommandLine {
        program,
        args: std::iter::once(pid.to_string()).chain(args.iter().cloned()).collect(),
        cwd: ctx.project_dir.clone(),
    };
    let output = crate::invoker::run_logged(&command, &ctx.log, &ctx.cancel)
        .await
        .map_err(|err| ProfilerError::Control(err.to_string()))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(ProfilerError::Control(format!(
            "jcmd {pid} {} reported {}",
            args.join(" "),
            output.status
        )))
    }
}
