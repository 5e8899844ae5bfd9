//! CLI argument definitions.
//!
//! All Clap derive structs for buildbench command-line parsing, plus the
//! post-parse validation that turns the raw arguments into [`Settings`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::config::schema::RunUsing;
use crate::error::{Error, Result};
use crate::profiler::ProfilerKind;

/// Benchmark and profile build tool invocations of a project.
///
/// Positional arguments name the scenarios to run when a scenario file is
/// given, and the Gradle tasks of an implicit `default` scenario otherwise.
#[derive(Parser, Debug)]
#[command(name = "buildbench", author, version, about)]
pub struct Cli {
    /// The project directory to build.
    #[arg(long, value_name = "DIR")]
    pub project_dir: Option<PathBuf>,

    /// Directory for the benchmark CSV, profiles and the run log.
    #[arg(long, value_name = "DIR", default_value = "profile-out")]
    pub output_dir: PathBuf,

    /// Gradle version(s) to use when scenarios don't specify their own.
    #[arg(long = "gradle-version", value_name = "VERSION")]
    pub gradle_versions: Vec<String>,

    /// Scenario definition file.
    #[arg(long, visible_alias = "config-file", value_name = "FILE")]
    pub scenario_file: Option<PathBuf>,

    /// Benchmark the build: full warm-up/measured schedule plus CSV output.
    #[arg(long)]
    pub benchmark: bool,

    /// Profile the build with the given profiler. May be repeated.
    #[arg(long = "profile", value_name = "PROFILER")]
    pub profilers: Vec<ProfilerKind>,

    /// Run builds with `--no-daemon` instead of reusing a warm daemon.
    #[arg(long)]
    pub no_daemon: bool,

    /// Number of warm-up builds (profile mode only).
    #[arg(long, value_name = "N")]
    pub warmups: Option<usize>,

    /// Number of measured builds (profile mode only).
    #[arg(long, value_name = "N")]
    pub iterations: Option<usize>,

    /// Pass `-m` to Gradle and collapse the schedule to one build each.
    #[arg(long)]
    pub dry_run: bool,

    /// Run scenarios that declare a `buck` block using Buck.
    #[arg(long)]
    pub buck: bool,

    /// Run scenarios that declare a `maven` block using Maven.
    #[arg(long)]
    pub maven: bool,

    /// Version of the build-scan plugin applied by the buildscan profiler.
    #[arg(long, value_name = "VERSION", default_value = "1.6")]
    pub buildscan_version: String,

    /// Isolated Gradle user home used for every build.
    #[arg(long, value_name = "DIR", default_value = "gradle-user-home")]
    pub gradle_user_home: PathBuf,

    /// Use sampling instead of tracing instrumentation with YourKit.
    #[arg(long)]
    pub yourkit_sampling: bool,

    /// Record memory allocations with YourKit.
    #[arg(long)]
    pub yourkit_memory: bool,

    /// JProfiler installation directory (defaults to $JPROFILER_HOME).
    #[arg(long, value_name = "DIR")]
    pub jprofiler_home: Option<PathBuf>,

    /// JProfiler offline-mode config file.
    #[arg(long, value_name = "FILE")]
    pub jprofiler_config: Option<PathBuf>,

    /// JProfiler session id to record with.
    #[arg(long, value_name = "ID")]
    pub jprofiler_session_id: Option<String>,

    /// System property applied to every scenario, `-Dkey=value`.
    #[arg(short = 'D', value_name = "KEY=VALUE", value_parser = parse_system_property)]
    pub system_properties: Vec<(String, String)>,

    /// Increase diagnostic verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Scenario names to run, or tasks when no scenario file is given.
    pub targets: Vec<String>,
}

/// Validated settings for one buildbench run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub project_dir: PathBuf,
    pub output_dir: PathBuf,
    pub gradle_versions: Vec<String>,
    pub scenario_file: Option<PathBuf>,
    pub benchmark: bool,
    pub profilers: Vec<ProfilerKind>,
    pub default_run_using: RunUsing,
    pub warmups: Option<usize>,
    pub iterations: Option<usize>,
    pub dry_run: bool,
    pub buck: bool,
    pub maven: bool,
    pub buildscan_version: String,
    pub gradle_user_home: PathBuf,
    pub yourkit_sampling: bool,
    pub yourkit_memory: bool,
    pub jprofiler_home: Option<PathBuf>,
    pub jprofiler_config: Option<PathBuf>,
    pub jprofiler_session_id: Option<String>,
    pub system_properties: BTreeMap<String, String>,
    pub targets: Vec<String>,
}

impl Settings {
    /// Whether any profiler was requested.
    #[must_use]
    pub fn profiling(&self) -> bool {
        !self.profilers.is_empty()
    }
}

impl Cli {
    /// Validates the parsed arguments and resolves them into [`Settings`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error when neither `--profile` nor
    /// `--benchmark` was requested, or when no project directory is given.
    pub fn into_settings(self) -> Result<Settings> {
        if !self.benchmark && self.profilers.is_empty() {
            return Err(Error::Config(
                "Neither --profile or --benchmark specified.".to_string(),
            ));
        }
        let Some(project_dir) = self.project_dir else {
            return Err(Error::Config("No project directory specified.".to_string()));
        };

        let default_run_using = if self.no_daemon {
            RunUsing::NoDaemon
        } else {
            RunUsing::ToolApi
        };

        Ok(Settings {
            project_dir,
            output_dir: self.output_dir,
            gradle_versions: self.gradle_versions,
            scenario_file: self.scenario_file,
            benchmark: self.benchmark,
            profilers: self.profilers,
            default_run_using,
            warmups: self.warmups,
            iterations: self.iterations,
            dry_run: self.dry_run,
            buck: self.buck,
            maven: self.maven,
            buildscan_version: self.buildscan_version,
            gradle_user_home: self.gradle_user_home,
            yourkit_sampling: self.yourkit_sampling,
            yourkit_memory: self.yourkit_memory,
            jprofiler_home: self.jprofiler_home,
            jprofiler_config: self.jprofiler_config,
            jprofiler_session_id: self.jprofiler_session_id,
            system_properties: self.system_properties.into_iter().collect(),
            targets: self.targets,
        })
    }
}

/// Parses a `-D` argument of the form `key=value`.
fn parse_system_property(raw: &str) -> std::result::Result<(String, String), String> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(format!("expected KEY=VALUE, got '{raw}'"));
    };
    if key.is_empty() {
        return Err(format!("empty system property name in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
