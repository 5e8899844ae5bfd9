//! Top-level run loop.
//!
//! Expands scenarios into executions, then drives each one strictly in
//! sequence: acquire the mutator, acquire the invoker, probe (Gradle),
//! run the schedule while feeding timings to the aggregator, then release
//! profilers, invoker, and mutator in that order. A failed execution is
//! remembered and the remaining executions still run; the first failure
//! surfaces at exit after the CSV has been written.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cli::Settings;
use crate::config::schema::Scenario;
use crate::config::{self, loader};
use crate::error::{BuildError, Error, Result};
use crate::invoker::{BuckInvoker, BuildInvoker, GradleInvoker, MavenInvoker};
use crate::mutator::Mutator;
use crate::observability::RunLog;
use crate::profiler::{self, Profiler, ProfilerContext};
use crate::report::BenchmarkResults;
use crate::schedule::{self, Phase, PlanOptions, Schedule, ToolKind};

/// Marker written to console and log when a build invocation fails.
const BUILD_FAILED_MARKER: &str = "ERROR: failed to run build. See log file for details.";

/// The build tool driving one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionTool {
    /// Gradle against one specific version.
    Gradle {
        /// The requested version.
        version: String,
    },
    /// Buck via the project wrapper.
    Buck,
    /// Maven via `$MAVEN_HOME`.
    Maven,
}

impl ExecutionTool {
    const fn kind(&self) -> ToolKind {
        match self {
            Self::Gradle { .. } => ToolKind::Gradle,
            Self::Buck => ToolKind::Buck,
            Self::Maven => ToolKind::Maven,
        }
    }

    fn label(&self) -> String {
        match self {
            Self::Gradle { version } => format!("Gradle {version}"),
            Self::Buck => "Buck".to_string(),
            Self::Maven => "Maven".to_string(),
        }
    }
}

/// One (scenario, tool, version) tuple, producing one result column.
#[derive(Debug, Clone)]
pub struct ScenarioExecution {
    /// The scenario being run.
    pub scenario: Scenario,
    /// The build tool variant driving it.
    pub tool: ExecutionTool,
    /// 1-based position in the flat execution sequence.
    pub number: usize,
    /// Total number of executions.
    pub total: usize,
}

/// Runs the whole benchmark/profile session.
///
/// # Errors
///
/// Configuration errors fail before any build runs. Scenario failures are
/// surfaced after every execution had its chance and the CSV was written.
pub async fn run(settings: Settings) -> Result<()> {
    let settings = absolutize(settings)?;
    std::fs::create_dir_all(&settings.output_dir)?;
    std::fs::create_dir_all(&settings.gradle_user_home)?;

    let log = RunLog::create(&settings.output_dir.join("profile.log"))?;
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let scenarios = config::load_scenarios(&settings)?;
    let executions = expand_executions(scenarios, &settings)?;
    let options = PlanOptions {
        benchmark: settings.benchmark,
        profiling: settings.profiling(),
        warmups: settings.warmups,
        iterations: settings.iterations,
        dry_run: settings.dry_run,
    };

    // Register every column up front so an aborted run still writes the
    // full table with blank cells.
    let mut results = BenchmarkResults::new();
    let mut planned = Vec::with_capacity(executions.len());
    for execution in executions {
        let schedule = schedule::plan(&execution.scenario, execution.tool.kind(), &options);
        let version = match &execution.tool {
            ExecutionTool::Gradle { version } => Some(version.as_str()),
            _ => None,
        };
        let tasks = if execution.tool.kind() == ToolKind::Gradle {
            execution.scenario.tasks.clone()
        } else {
            Vec::new()
        };
        let column = results.add_column(&execution.scenario.name, version, tasks, &schedule);
        planned.push((execution, schedule, column));
    }

    let layout = OutputLayout::of(planned.iter().map(|(execution, _, _)| execution));
    let mut first_failure: Option<Error> = None;
    for (execution, schedule, column) in &planned {
        if cancel.is_cancelled() {
            first_failure.get_or_insert(Error::Cancelled);
            break;
        }
        log.output(&format!(
            "* Running scenario '{}' using {} (scenario {}/{})",
            execution.scenario.name,
            execution.tool.label(),
            execution.number,
            execution.total
        ));

        let execution_dir = layout.dir_for(&settings.output_dir, execution);
        if let Err(err) = std::fs::create_dir_all(&execution_dir) {
            first_failure.get_or_insert(Error::Io(err));
            break;
        }

        match run_execution(
            &settings,
            execution,
            schedule,
            *column,
            &mut results,
            &execution_dir,
            &log,
            &cancel,
        )
        .await
        {
            Ok(()) => {}
            Err(Error::Cancelled) => {
                first_failure.get_or_insert(Error::Cancelled);
                break;
            }
            Err(Error::Io(err)) => {
                // Internal I/O is fatal: stop, but still write the CSV.
                first_failure.get_or_insert(Error::Io(err));
                break;
            }
            Err(cause) => {
                let failure = Error::ScenarioFailed {
                    name: execution.scenario.name.clone(),
                    cause: Box::new(cause),
                };
                if first_failure.is_none() {
                    first_failure = Some(failure);
                } else {
                    warn!(%failure, "additional scenario failure");
                }
            }
        }
    }

    if settings.benchmark {
        results.write_csv(&settings.output_dir.join("benchmark.csv"))?;
        results.write_json(&settings.output_dir.join("benchmark.json"))?;
    }

    match first_failure {
        Some(failure) => Err(failure),
        None => Ok(()),
    }
}

/// Expands scenarios into the flat, numbered execution sequence.
///
/// # Errors
///
/// Fails on unusable scenario/tool/profiler combinations before any build
/// runs.
pub fn expand_executions(
    scenarios: Vec<Scenario>,
    settings: &Settings,
) -> Result<Vec<ScenarioExecution>> {
    let mut executions = Vec::new();
    for scenario in scenarios {
        if settings.buck {
            if scenario.buck.is_none() {
                debug!(scenario = %scenario.name, "skipped: no buck block");
                continue;
            }
            executions.push((scenario, ExecutionTool::Buck));
        } else if settings.maven {
            if scenario.maven.is_none() {
                debug!(scenario = %scenario.name, "skipped: no maven block");
                continue;
            }
            executions.push((scenario, ExecutionTool::Maven));
        } else {
            if scenario.tasks.is_empty() {
                return Err(Error::Config(format!(
                    "Scenario '{}' does not define any Gradle tasks.",
                    scenario.name
                )));
            }
            let versions = if scenario.versions.is_empty() {
                loader::default_versions(&scenario.name, settings)?
            } else {
                scenario.versions.clone()
            };
            for version in versions {
                executions.push((
                    scenario.clone(),
                    ExecutionTool::Gradle { version },
                ));
            }
        }
    }

    if settings.profiling() {
        for (scenario, tool) in &executions {
            if tool.kind() != ToolKind::Gradle {
                return Err(profiler::reject_non_gradle(&scenario.name));
            }
            for kind in &settings.profilers {
                profiler::create(*kind, settings).validate(&scenario.name, scenario.run_using)?;
            }
        }
    }

    if executions
        .iter()
        .any(|(_, tool)| *tool == ExecutionTool::Maven)
        && std::env::var_os("MAVEN_HOME").is_none()
    {
        return Err(Error::Config(
            "MAVEN_HOME must be set to run Maven builds.".to_string(),
        ));
    }

    let total = executions.len();
    Ok(executions
        .into_iter()
        .enumerate()
        .map(|(index, (scenario, tool))| ScenarioExecution {
            scenario,
            tool,
            number: index + 1,
            total,
        })
        .collect())
}

#[allow(clippy::too_many_arguments)]
async fn run_execution(
    settings: &Settings,
    execution: &ScenarioExecution,
    schedule: &Schedule,
    column: usize,
    results: &mut BenchmarkResults,
    execution_dir: &Path,
    log: &RunLog,
    cancel: &CancellationToken,
) -> Result<()> {
    let scenario = &execution.scenario;

    let mut mutator = match &scenario.mutator {
        Some(spec) => Some(Mutator::acquire(&settings.project_dir, spec)?),
        None => None,
    };

    let ctx = ProfilerContext {
        scenario_name: scenario.name.clone(),
        project_dir: settings.project_dir.clone(),
        output_dir: execution_dir.to_path_buf(),
        gradle_user_home: settings.gradle_user_home.clone(),
        pid_file: execution_dir.join("daemon.pid"),
        log: log.clone(),
        cancel: cancel.clone(),
    };
    let mut profilers: Vec<Box<dyn Profiler>> =
        if execution.tool.kind() == ToolKind::Gradle && settings.profiling() {
            settings
                .profilers
                .iter()
                .map(|kind| profiler::create(*kind, settings))
                .collect()
        } else {
            Vec::new()
        };
    let mut profiler_args = Vec::new();
    for profiler in &mut profilers {
        profiler_args.extend(profiler.invocation_args(&ctx)?);
    }

    let mut invoker: Box<dyn BuildInvoker> = match &execution.tool {
        ExecutionTool::Gradle { version } => Box::new(GradleInvoker::new(
            settings.project_dir.clone(),
            settings.gradle_user_home.clone(),
            version.clone(),
            scenario.run_using,
            settings.dry_run,
            scenario.system_properties.clone(),
            scenario.gradle_args.clone(),
            profiler_args,
            log.clone(),
            cancel.clone(),
        )),
        ExecutionTool::Buck => {
            let options = scenario.buck.clone().unwrap_or_default();
            Box::new(
                BuckInvoker::create(
                    settings.project_dir.clone(),
                    &options,
                    log.clone(),
                    cancel.clone(),
                )
                .await?,
            )
        }
        ExecutionTool::Maven => {
            let options = scenario.maven.clone().unwrap_or_default();
            Box::new(MavenInvoker::create(
                settings.project_dir.clone(),
                &options,
                log.clone(),
                cancel.clone(),
            )?)
        }
    };

    let series = drive_series(
        schedule,
        column,
        results,
        invoker.as_mut(),
        &mut mutator,
        &mut profilers,
        &ctx,
        log,
        cancel,
    )
    .await;
    let mut failure = series.err();

    for profiler in profilers.iter_mut().rev() {
        if let Err(err) = profiler.finalize(&ctx).await {
            if failure.is_none() {
                failure = Some(err.into());
            } else {
                warn!(%err, profiler = profiler.name(), "profiler finalization failed");
            }
        }
    }
    if let Err(err) = invoker.shutdown().await {
        log.detail(&format!("Could not shut down the build tool: {err}"));
    }
    if let Some(mutator) = mutator.as_mut() {
        mutator.revert()?;
    }

    match failure {
        Some(failure) => Err(failure),
        None => Ok(()),
    }
}

#[allow(clippy::too_many_arguments)]
async fn drive_series(
    schedule: &Schedule,
    column: usize,
    results: &mut BenchmarkResults,
    invoker: &mut dyn BuildInvoker,
    mutator: &mut Option<Mutator>,
    profilers: &mut [Box<dyn Profiler>],
    ctx: &ProfilerContext,
    log: &RunLog,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut first_build_failure: Option<Error> = None;

    for invocation in &schedule.invocations {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        // The mutated file must be fully written before the build starts.
        if invocation.mutated {
            if let Some(mutator) = mutator.as_mut() {
                mutator.apply(invocation.mutation)?;
            }
        }

        match invocation.phase {
            Phase::Probe => {
                log.output("* Inspecting the build environment");
                match invoker.probe().await {
                    Ok(environment) => {
                        if let Some(version) = environment.gradle_version {
                            log.detail(&format!("Build environment: Gradle {version}"));
                        }
                    }
                    // Without a working daemon the whole execution is lost.
                    Err(err) => {
                        log.output(BUILD_FAILED_MARKER);
                        return Err(err.into());
                    }
                }
                continue;
            }
            Phase::InitialClean => log.output("* Running initial clean build"),
            Phase::WarmUp => log.output(&format!("* Running warm-up build {}", invocation.iteration)),
            Phase::Measured => log.output(&format!("* Running build {}", invocation.iteration)),
        }

        if invocation.profiled {
            for profiler in profilers.iter_mut() {
                profiler.before_measured(ctx).await?;
            }
        }

        let outcome = invoker.run(invocation).await;

        if invocation.profiled {
            for profiler in profilers.iter_mut().rev() {
                profiler.after_measured(ctx).await?;
            }
        }

        match outcome {
            Ok(duration) => {
                if invocation.timed {
                    results.record(column, invocation, duration);
                }
                log.output(&format!("Execution time {}", human_duration(duration)));
            }
            Err(BuildError::Cancelled) => return Err(Error::Cancelled),
            Err(err) if err.is_environment() => {
                // Environment failures poison the remaining invocations.
                log.output(BUILD_FAILED_MARKER);
                return Err(err.into());
            }
            Err(err) => {
                // Build failure: the cell stays empty, the series goes on.
                log.output(BUILD_FAILED_MARKER);
                first_build_failure.get_or_insert(err.into());
            }
        }
    }

    match first_build_failure {
        Some(failure) => Err(failure),
        None => Ok(()),
    }
}

fn human_duration(duration: Duration) -> String {
    let truncated = Duration::from_millis(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX));
    humantime::format_duration(truncated).to_string()
}

/// Output directory layout: artifacts nest by scenario and by version
/// exactly when the run spans more than one of either.
#[derive(Debug, Clone, Copy)]
struct OutputLayout {
    multi_scenario: bool,
    multi_version: bool,
}

impl OutputLayout {
    fn of<'a>(executions: impl Iterator<Item = &'a ScenarioExecution> + Clone) -> Self {
        let mut names: Vec<&str> = executions
            .clone()
            .map(|execution| execution.scenario.name.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        let multi_scenario = names.len() > 1;

        let multi_version = names.iter().any(|name| {
            executions
                .clone()
                .filter(|execution| execution.scenario.name == *name)
                .count()
                > 1
        });

        Self {
            multi_scenario,
            multi_version,
        }
    }

    fn dir_for(self, base: &Path, execution: &ScenarioExecution) -> PathBuf {
        let mut dir = base.to_path_buf();
        if self.multi_scenario {
            dir = dir.join(&execution.scenario.name);
        }
        if self.multi_version {
            if let ExecutionTool::Gradle { version } = &execution.tool {
                dir = dir.join(version);
            }
        }
        dir
    }
}

fn absolutize(mut settings: Settings) -> Result<Settings> {
    let cwd = std::env::current_dir()?;
    for path in [
        &mut settings.project_dir,
        &mut settings.output_dir,
        &mut settings.gradle_user_home,
    ] {
        if path.is_relative() {
            *path = cwd.join(&*path);
        }
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RunUsing;
    use clap::Parser;

    fn settings(args: &[&str]) -> Settings {
        crate::cli::Cli::try_parse_from(
            ["buildbench", "--project-dir", "p"]
                .into_iter()
                .chain(args.iter().copied()),
        )
        .unwrap()
        .into_settings()
        .unwrap()
    }

    fn gradle_scenario(name: &str, versions: &[&str]) -> Scenario {
        let mut scenario = Scenario::named(name);
        scenario.tasks = vec!["assemble".to_string()];
        scenario.versions = versions.iter().map(ToString::to_string).collect();
        scenario
    }

    #[test]
    fn executions_get_a_flat_numbered_sequence() {
        let settings = settings(&["--benchmark"]);
        let executions = expand_executions(
            vec![
                gradle_scenario("a", &["3.0", "3.1"]),
                gradle_scenario("b", &["3.1"]),
            ],
            &settings,
        )
        .unwrap();

        assert_eq!(executions.len(), 3);
        assert_eq!(executions[0].number, 1);
        assert_eq!(executions[2].number, 3);
        assert!(executions.iter().all(|execution| execution.total == 3));
        assert_eq!(
            executions[1].tool,
            ExecutionTool::Gradle {
                version: "3.1".to_string()
            }
        );
    }

    #[test]
    fn gradle_scenarios_without_tasks_are_rejected() {
        let settings = settings(&["--benchmark", "--gradle-version", "3.1"]);
        let err =
            expand_executions(vec![Scenario::named("empty")], &settings).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Scenario 'empty' does not define any Gradle tasks."
        );
    }

    #[test]
    fn buck_mode_silently_skips_scenarios_without_a_buck_block() {
        let settings = settings(&["--benchmark", "--buck"]);
        let mut with_buck = gradle_scenario("both", &[]);
        with_buck.buck = Some(crate::config::schema::BuckOptions {
            targets: vec!["//app:app".to_string()],
            target_type: None,
        });
        let executions = expand_executions(
            vec![with_buck, gradle_scenario("gradle-only", &["3.1"])],
            &settings,
        )
        .unwrap();

        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].scenario.name, "both");
        assert_eq!(executions[0].tool, ExecutionTool::Buck);
    }

    #[test]
    fn profiling_a_buck_scenario_is_a_configuration_error() {
        let settings = settings(&["--profile", "jfr", "--buck"]);
        let mut scenario = Scenario::named("buck-all");
        scenario.buck = Some(crate::config::schema::BuckOptions {
            targets: Vec::new(),
            target_type: Some("all".to_string()),
        });
        let err = expand_executions(vec![scenario], &settings).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Can only profile scenario 'buck-all' when building using Gradle."
        );
    }

    #[test]
    fn profiling_jfr_with_no_daemon_is_rejected_up_front() {
        let settings = settings(&["--profile", "jfr", "--no-daemon", "--gradle-version", "3.1"]);
        let mut scenario = gradle_scenario("assemble", &["3.1"]);
        scenario.run_using = RunUsing::NoDaemon;
        let err = expand_executions(vec![scenario], &settings).unwrap_err();
        assert!(err.to_string().contains("requires the Gradle daemon"));
    }

    #[test]
    fn output_layout_nests_by_scenario_and_version() {
        let settings = settings(&["--benchmark"]);
        let single = expand_executions(vec![gradle_scenario("a", &["3.1"])], &settings).unwrap();
        let layout = OutputLayout::of(single.iter());
        assert_eq!(
            layout.dir_for(Path::new("/out"), &single[0]),
            PathBuf::from("/out")
        );

        let multi_version =
            expand_executions(vec![gradle_scenario("a", &["3.0", "3.1"])], &settings).unwrap();
        let layout = OutputLayout::of(multi_version.iter());
        assert_eq!(
            layout.dir_for(Path::new("/out"), &multi_version[0]),
            PathBuf::from("/out/3.0")
        );

        let multi_both = expand_executions(
            vec![
                gradle_scenario("a", &["3.0", "3.1"]),
                gradle_scenario("b", &["3.1"]),
            ],
            &settings,
        )
        .unwrap();
        let layout = OutputLayout::of(multi_both.iter());
        assert_eq!(
            layout.dir_for(Path::new("/out"), &multi_both[0]),
            PathBuf::from("/out/a/3.0")
        );
        assert_eq!(
            layout.dir_for(Path::new("/out"), &multi_both[2]),
            PathBuf::from("/out/b/3.1")
        );
    }

    #[test]
    fn multi_scenario_single_version_nests_by_scenario_only() {
        let settings = settings(&["--benchmark"]);
        let executions = expand_executions(
            vec![
                gradle_scenario("a", &["3.1"]),
                gradle_scenario("b", &["3.1"]),
            ],
            &settings,
        )
        .unwrap();
        let layout = OutputLayout::of(executions.iter());
        assert_eq!(
            layout.dir_for(Path::new("/out"), &executions[0]),
            PathBuf::from("/out/a")
        );
    }
}
