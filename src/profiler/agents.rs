//! JVM-agent profilers: YourKit, Honest Profiler, JProfiler.
//!
//! All three inject an agent through the daemon JVM arguments, so the
//! agent is present from daemon startup and snapshots are dumped when the
//! measured series ends (the agents are configured to write on exit; the
//! daemon exits at invoker shutdown).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use crate::error::ProfilerError;
use crate::profiler::{Profiler, ProfilerContext};

/// Builds the `-Dorg.gradle.jvmargs=-agentpath:…` argument shared by all
/// agent profilers.
fn agent_argument(library: &Path, options: &[String]) -> String {
    format!(
        "-Dorg.gradle.jvmargs=-agentpath:{}={}",
        library.display(),
        options.join(",")
    )
}

fn env_dir(name: &'static str) -> Result<PathBuf, ProfilerError> {
    std::env::var_os(name)
        .map(PathBuf::from)
        .ok_or(ProfilerError::MissingEnv(name))
}

// ============================================================================
// YourKit
// ============================================================================

/// YourKit agent profiler.
#[derive(Debug)]
pub struct YourKit {
    /// Sample instead of tracing instrumentation.
    pub sampling: bool,
    /// Record memory allocations.
    pub memory: bool,
}

impl YourKit {
    fn agent_library(home: &Path) -> PathBuf {
        if cfg!(target_os = "macos") {
            home.join("bin").join("mac").join("libyjpagent.dylib")
        } else if cfg!(windows) {
            home.join("bin").join("win64").join("yjpagent.dll")
        } else {
            home.join("bin")
                .join("linux-x86-64")
                .join("libyjpagent.so")
        }
    }

    fn options(&self, ctx: &ProfilerContext) -> Vec<String> {
        let mut options = vec![
            format!("dir={}", ctx.output_dir.display()),
            "onexit=snapshot".to_string(),
        ];
        if self.sampling {
            options.push("sampling".to_string());
        } else {
            options.push("tracing".to_string());
        }
        if self.memory {
            options.push("alloceach=10".to_string());
        }
        options
    }
}

#[async_trait]
impl Profiler for YourKit {
    fn name(&self) -> &'static str {
        "yourkit"
    }

    fn invocation_args(
        &mut self,
        ctx: &ProfilerContext,
    ) -> Result<Vec<String>, ProfilerError> {
        let home = env_dir("YOURKIT_HOME")?;
        let library = Self::agent_library(&home);
        Ok(vec![agent_argument(&library, &self.options(ctx))])
    }
}

// ============================================================================
// Honest Profiler
// ============================================================================

/// Honest Profiler agent profiler.
#[derive(Debug)]
pub struct HonestProfiler;

impl HonestProfiler {
    fn raw_log(ctx: &ProfilerContext) -> PathBuf {
        ctx.output_dir.join("honest-profiler.hpl")
    }
}

#[async_trait]
impl Profiler for HonestProfiler {
    fn name(&self) -> &'static str {
        "hp"
    }

    fn invocation_args(
        &mut self,
        ctx: &ProfilerContext,
    ) -> Result<Vec<String>, ProfilerError> {
        let home = env_dir("HP_HOME_DIR")?;
        let library = home.join("liblagent.so");
        let options = vec![
            "interval=7".to_string(),
            format!("logPath={}", Self::raw_log(ctx).display()),
            "start=1".to_string(),
        ];
        Ok(vec![agent_argument(&library, &options)])
    }

    async fn finalize(&mut self, ctx: &ProfilerContext) -> Result<(), ProfilerError> {
        let home = env_dir("HP_HOME_DIR")?;
        let raw = Self::raw_log(ctx);
        let folded = ctx.output_dir.join("honest-profiler-stacks.txt");

        let sanitizer = home.join("bin").join("sanitizer");
        if sanitizer.exists() {
            let command = crate::invoker::CommandLine {
                program: sanitizer,
                args: vec![raw.display().to_string(), folded.display().to_string()],
                cwd: ctx.output_dir.clone(),
            };
            let output = crate::invoker::run_logged(&command, &ctx.log, &ctx.cancel)
                .await
                .map_err(|err| ProfilerError::Control(err.to_string()))?;
            if !output.status.success() {
                return Err(ProfilerError::Control(format!(
                    "honest-profiler sanitizer reported {}",
                    output.status
                )));
            }
        } else {
            warn!(path = %sanitizer.display(), "honest-profiler sanitizer not found, keeping the raw log");
        }

        if let Ok(fg_home) = std::env::var("FG_HOME_DIR") {
            let command = crate::invoker::CommandLine {
                program: PathBuf::from(fg_home).join("flamegraph.pl"),
                args: vec![folded.display().to_string()],
                cwd: ctx.output_dir.clone(),
            };
            let output = crate::invoker::run_logged(&command, &ctx.log, &ctx.cancel)
                .await
                .map_err(|err| ProfilerError::Control(err.to_string()))?;
            if output.status.success() {
                std::fs::write(ctx.output_dir.join("honest-profiler-flames.svg"), output.stdout)?;
            } else {
                warn!("flame graph generation reported {}", output.status);
            }
        }
        Ok(())
    }
}

// ============================================================================
// JProfiler
// ============================================================================

/// JProfiler agent profiler in offline mode.
#[derive(Debug)]
pub struct JProfiler {
    /// Installation directory; `$JPROFILER_HOME` when not given.
    pub home: Option<PathBuf>,
    /// Offline-mode config file.
    pub config: Option<PathBuf>,
    /// Session id to record with.
    pub session_id: Option<String>,
}

impl JProfiler {
    fn agent_library(home: &Path) -> PathBuf {
        if cfg!(target_os = "macos") {
            home.join("bin").join("macos").join("libjprofilerti.jnilib")
        } else if cfg!(windows) {
            home.join("bin").join("windows-x64").join("jprofilerti.dll")
        } else {
            home.join("bin")
                .join("linux-x64")
                .join("libjprofilerti.so")
        }
    }
}

#[async_trait]
impl Profiler for JProfiler {
    fn name(&self) -> &'static str {
        "jprofiler"
    }

    fn invocation_args(
        &mut self,
        _ctx: &ProfilerContext,
    ) -> Result<Vec<String>, ProfilerError> {
        let home = match &self.home {
            Some(home) => home.clone(),
            None => env_dir("JPROFILER_HOME")?,
        };
        let library = Self::agent_library(&home);
        let mut options = vec![
            "offline".to_string(),
            format!("id={}", self.session_id.as_deref().unwrap_or("1")),
        ];
        if let Some(config) = &self.config {
            options.push(format!("config={}", config.display()));
        }
        Ok(vec![agent_argument(&library, &options)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    fn ctx(dir: &Path) -> ProfilerContext {
        ProfilerContext {
            scenario_name: "default".to_string(),
            project_dir: dir.to_path_buf(),
            output_dir: dir.join("out"),
            gradle_user_home: dir.join("user-home"),
            pid_file: dir.join("out").join("daemon.pid"),
            log: crate::observability::RunLog::create(&dir.join("profile.log")).unwrap(),
            cancel: CancellationToken::new(),
        }
    }

    #[test]
    fn yourkit_options_reflect_the_tuning_flags() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path());

        let sampled = YourKit {
            sampling: true,
            memory: false,
        };
        let options = sampled.options(&ctx);
        assert!(options.contains(&"sampling".to_string()));
        assert!(options.contains(&"onexit=snapshot".to_string()));

        let memory = YourKit {
            sampling: false,
            memory: true,
        };
        let options = memory.options(&ctx);
        assert!(options.contains(&"tracing".to_string()));
        assert!(options.contains(&"alloceach=10".to_string()));
    }

    #[test]
    fn agent_argument_goes_through_the_daemon_jvm_args() {
        let arg = agent_argument(
            Path::new("/opt/yourkit/libyjpagent.so"),
            &["dir=/out".to_string(), "sampling".to_string()],
        );
        assert_eq!(
            arg,
            "-Dorg.gradle.jvmargs=-agentpath:/opt/yourkit/libyjpagent.so=dir=/out,sampling"
        );
    }

    #[test]
    fn jprofiler_prefers_the_explicit_home() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path());
        let mut profiler = JProfiler {
            home: Some(PathBuf::from("/opt/jprofiler")),
            config: Some(PathBuf::from("/cfg/config.xml")),
            session_id: Some("42".to_string()),
        };
        let args = profiler.invocation_args(&ctx).unwrap();
        assert_eq!(args.len(), 1);
        assert!(args[0].contains("/opt/jprofiler"));
        assert!(args[0].contains("offline,id=42,config=/cfg/config.xml"));
    }
}
