//! Invocation schedule.
//!
//! Expands a scenario into the ordered list of build invocations to run:
//! an untimed probe, an initial clean build, warm-up builds, and measured
//! builds, depending on the build tool and the requested mode.

use crate::config::schema::{RunUsing, Scenario};

/// Warm-up builds per benchmarked scenario with a warm daemon.
pub const DEFAULT_BENCHMARK_WARMUPS: usize = 6;
/// Warm-up builds per benchmarked scenario without daemon reuse.
pub const NO_DAEMON_BENCHMARK_WARMUPS: usize = 1;
/// Measured builds per benchmarked scenario.
pub const DEFAULT_BENCHMARK_ITERATIONS: usize = 10;
/// Warm-up builds when profiling without benchmarking.
pub const DEFAULT_PROFILE_WARMUPS: usize = 2;
/// Measured builds when profiling without benchmarking.
pub const DEFAULT_PROFILE_ITERATIONS: usize = 1;

/// Which build tool drives a scenario execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Gradle, against one specific version.
    Gradle,
    /// Buck via the project's `buckw` wrapper.
    Buck,
    /// Maven via `$MAVEN_HOME/bin/mvn`.
    Maven,
}

/// The schedule phase an invocation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Untimed `help` build confirming the build environment.
    Probe,
    /// The first full build, prefixed with the cleanup tasks.
    InitialClean,
    /// Timed build excluded from summary statistics.
    WarmUp,
    /// Timed build counted in summary statistics, profiled on request.
    Measured,
}

/// One build request.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Schedule phase.
    pub phase: Phase,
    /// Display label (`initial clean build`, `warm-up build N`, `build N`).
    pub label: String,
    /// 1-based position within the phase (warm-up and measured only).
    pub iteration: usize,
    /// Tasks actually submitted.
    pub tasks: Vec<String>,
    /// Whether the elapsed time is recorded.
    pub timed: bool,
    /// Whether profilers record during this invocation.
    pub profiled: bool,
    /// Whether the source mutation is applied before this invocation.
    pub mutated: bool,
    /// Mutation counter, unique across the warm-up + measured series.
    pub mutation: usize,
}

/// The full invocation list of one scenario execution.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Invocations in execution order.
    pub invocations: Vec<Invocation>,
    /// Number of warm-up builds.
    pub warmups: usize,
    /// Number of measured builds.
    pub iterations: usize,
    /// Whether the schedule starts with an initial clean build.
    pub has_initial: bool,
}

/// Mode-dependent inputs to schedule planning.
#[derive(Debug, Clone, Copy)]
pub struct PlanOptions {
    /// Benchmarking requested (`--benchmark`).
    pub benchmark: bool,
    /// Profiling requested (one or more `--profile`).
    pub profiling: bool,
    /// `--warmups` override (profile mode only).
    pub warmups: Option<usize>,
    /// `--iterations` override (profile mode only).
    pub iterations: Option<usize>,
    /// `--dry-run`: one warm-up, one measured build.
    pub dry_run: bool,
}

/// Plans the invocation list for one scenario execution.
#[must_use]
pub fn plan(scenario: &Scenario, tool: ToolKind, options: &PlanOptions) -> Schedule {
    let (warmups, iterations) = widths(scenario, options);
    let gradle = tool == ToolKind::Gradle;
    let has_initial = gradle && options.benchmark;
    let mutated = scenario.mutator.is_some();

    let mut invocations = Vec::with_capacity(2 + warmups + iterations);
    if gradle {
        invocations.push(Invocation {
            phase: Phase::Probe,
            label: "probe".to_string(),
            iteration: 0,
            tasks: vec!["help".to_string()],
            timed: false,
            profiled: false,
            mutated: false,
            mutation: 0,
        });
    }
    if has_initial {
        invocations.push(Invocation {
            phase: Phase::InitialClean,
            label: "initial clean build".to_string(),
            iteration: 0,
            tasks: scenario.initial_tasks(),
            timed: true,
            profiled: false,
            mutated: false,
            mutation: 0,
        });
    }
    for n in 1..=warmups {
        invocations.push(Invocation {
            phase: Phase::WarmUp,
            label: format!("warm-up build {n}"),
            iteration: n,
            tasks: scenario.tasks.clone(),
            timed: true,
            profiled: false,
            mutated,
            mutation: n,
        });
    }
    for n in 1..=iterations {
        invocations.push(Invocation {
            phase: Phase::Measured,
            label: format!("build {n}"),
            iteration: n,
            tasks: scenario.tasks.clone(),
            timed: true,
            profiled: options.profiling,
            mutated,
            mutation: warmups + n,
        });
    }

    Schedule {
        invocations,
        warmups,
        iterations,
        has_initial,
    }
}

fn widths(scenario: &Scenario, options: &PlanOptions) -> (usize, usize) {
    if options.dry_run {
        return (1, 1);
    }
    if options.benchmark {
        let warmups = if scenario.run_using == RunUsing::NoDaemon {
            NO_DAEMON_BENCHMARK_WARMUPS
        } else {
            DEFAULT_BENCHMARK_WARMUPS
        };
        (warmups, DEFAULT_BENCHMARK_ITERATIONS)
    } else {
        (
            options.warmups.unwrap_or(DEFAULT_PROFILE_WARMUPS),
            options.iterations.unwrap_or(DEFAULT_PROFILE_ITERATIONS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> Scenario {
        let mut scenario = Scenario::named("assemble");
        scenario.tasks = vec!["assemble".to_string()];
        scenario
    }

    const BENCHMARK: PlanOptions = PlanOptions {
        benchmark: true,
        profiling: false,
        warmups: None,
        iterations: None,
        dry_run: false,
    };

    const PROFILE: PlanOptions = PlanOptions {
        benchmark: false,
        profiling: true,
        warmups: None,
        iterations: None,
        dry_run: false,
    };

    #[test]
    fn benchmark_schedule_with_daemon() {
        let schedule = plan(&scenario(), ToolKind::Gradle, &BENCHMARK);
        assert_eq!(schedule.warmups, 6);
        assert_eq!(schedule.iterations, 10);
        assert!(schedule.has_initial);
        // probe + initial + 6 + 10
        assert_eq!(schedule.invocations.len(), 18);
        assert_eq!(schedule.invocations[0].tasks, vec!["help"]);
        assert_eq!(schedule.invocations[1].tasks, vec!["clean", "assemble"]);
        assert_eq!(schedule.invocations[1].label, "initial clean build");
        assert_eq!(schedule.invocations[17].label, "build 10");
    }

    #[test]
    fn benchmark_schedule_without_daemon() {
        let mut scenario = scenario();
        scenario.run_using = crate::config::schema::RunUsing::NoDaemon;
        let schedule = plan(&scenario, ToolKind::Gradle, &BENCHMARK);
        assert_eq!(schedule.warmups, 1);
        assert_eq!(schedule.invocations.len(), 13);
    }

    #[test]
    fn profile_schedule_skips_the_initial_clean_build() {
        let schedule = plan(&scenario(), ToolKind::Gradle, &PROFILE);
        assert_eq!(schedule.warmups, 2);
        assert_eq!(schedule.iterations, 1);
        assert!(!schedule.has_initial);
        // probe + 2 + 1
        assert_eq!(schedule.invocations.len(), 4);
        assert!(schedule.invocations.last().unwrap().profiled);
        assert!(!schedule.invocations[1].profiled);
    }

    #[test]
    fn profile_widths_are_overridable() {
        let options = PlanOptions {
            warmups: Some(4),
            iterations: Some(3),
            ..PROFILE
        };
        let schedule = plan(&scenario(), ToolKind::Gradle, &options);
        assert_eq!(schedule.warmups, 4);
        assert_eq!(schedule.iterations, 3);
    }

    #[test]
    fn dry_run_collapses_to_one_of_each() {
        let options = PlanOptions {
            dry_run: true,
            ..BENCHMARK
        };
        let schedule = plan(&scenario(), ToolKind::Gradle, &options);
        assert_eq!(schedule.warmups, 1);
        assert_eq!(schedule.iterations, 1);
        assert!(schedule.has_initial);
    }

    #[test]
    fn buck_schedule_has_no_probe_or_initial() {
        let schedule = plan(&scenario(), ToolKind::Buck, &BENCHMARK);
        assert!(!schedule.has_initial);
        assert_eq!(schedule.invocations.len(), 16);
        assert_eq!(schedule.invocations[0].label, "warm-up build 1");
    }

    #[test]
    fn labels_are_sequential_and_contiguous() {
        let schedule = plan(&scenario(), ToolKind::Gradle, &BENCHMARK);
        let measured: Vec<&str> = schedule
            .invocations
            .iter()
            .filter(|invocation| invocation.phase == Phase::Measured)
            .map(|invocation| invocation.label.as_str())
            .collect();
        let expected: Vec<String> = (1..=10).map(|n| format!("build {n}")).collect();
        assert_eq!(measured, expected);
    }

    #[test]
    fn mutation_counters_are_unique_across_the_series() {
        let mut scenario = scenario();
        scenario.mutator = Some(crate::config::schema::MutatorSpec {
            kind: crate::config::schema::MutatorKind::AbiJava,
            target: "src/A.java".into(),
        });
        let schedule = plan(&scenario, ToolKind::Gradle, &BENCHMARK);
        let counters: Vec<usize> = schedule
            .invocations
            .iter()
            .filter(|invocation| invocation.mutated)
            .map(|invocation| invocation.mutation)
            .collect();
        let expected: Vec<usize> = (1..=16).collect();
        assert_eq!(counters, expected);
    }
}
