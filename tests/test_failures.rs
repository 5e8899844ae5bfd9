//! Failure semantics: empty cells, NaN statistics, mutator restoration,
//! and non-zero exits surfaced after the remaining scenarios ran.

#![cfg(unix)]

mod common;

use common::{count_lines_with, BenchProject};

#[test]
fn build_failures_leave_cells_empty_and_statistics_nan() {
    let project = BenchProject::new();
    project.install_gradle("3.1");
    let count_file = project.root().join("invocations");

    // probe + initial + 3 warm-ups succeed, everything after fails
    let output = project
        .command()
        .args(["--benchmark", "--gradle-version", "3.1", "assemble"])
        .env("BB_COUNT_FILE", &count_file)
        .env("BB_FAIL_AFTER", "5")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Scenario 'default' failed"));

    let log = project.log_contents();
    // warm-up 4..6 plus builds 1..10
    assert_eq!(
        count_lines_with(&log, "ERROR: failed to run build. See log file for details."),
        13
    );
    // The remaining invocations still ran after the first failure.
    assert_eq!(count_lines_with(&log, "* Running build"), 10);

    let csv = project.csv_contents();
    for row in ["warm-up build 4", "warm-up build 5", "warm-up build 6"] {
        assert!(
            csv.lines().any(|line| line == format!("{row},")),
            "expected empty {row} cell in:\n{csv}"
        );
    }
    for n in 1..=10 {
        assert!(
            csv.lines().any(|line| line == format!("build {n},")),
            "expected empty build {n} cell in:\n{csv}"
        );
    }
    for row in ["warm-up build 1", "warm-up build 2", "warm-up build 3"] {
        let line = csv.lines().find(|line| line.starts_with(row)).unwrap();
        assert_ne!(line, format!("{row},"), "expected a timing for {row}");
    }
    assert!(csv.contains("mean,NaN\n"));
    assert!(csv.contains("median,NaN\n"));
    assert!(csv.contains("stddev,NaN\n"));
}

#[test]
fn mutated_sources_are_restored_even_when_the_build_fails() {
    let project = BenchProject::new();
    project.install_gradle("3.1");
    let scenario_file = project.write_scenario_file(
        "assemble:\n  versions: \"3.1\"\n  tasks: assemble\n  apply-android-resource-change-to: src/main/res/values/strings.xml\n",
    );

    let target = project.project_dir().join("src/main/res/values/strings.xml");
    let original = std::fs::read(&target).unwrap();

    let count_file = project.root().join("invocations");
    let output = project
        .command()
        .args([
            "--benchmark",
            "--scenario-file",
            scenario_file.to_str().unwrap(),
        ])
        .env("BB_COUNT_FILE", &count_file)
        .env("BB_FAIL_AFTER", "3")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert_eq!(std::fs::read(&target).unwrap(), original);
}

#[test]
fn an_unstartable_build_tool_empties_the_whole_execution() {
    let project = BenchProject::new();
    // No distribution, no wrapper, and no usable PATH: spawning fails.
    let output = project
        .command()
        .args(["--benchmark", "--gradle-version", "3.1", "assemble"])
        .env("PATH", "/nonexistent")
        .output()
        .unwrap();
    assert!(!output.status.success());

    let csv = project.csv_contents();
    assert_eq!(csv.lines().count(), 22);
    assert!(csv.contains("mean,NaN\n"));
    assert!(
        csv.lines().any(|line| line == "build 1,"),
        "expected empty cells in:\n{csv}"
    );
}

#[test]
fn a_failing_scenario_does_not_stop_the_remaining_ones() {
    let project = BenchProject::new();
    project.install_gradle("3.1");
    let scenario_file = project.write_scenario_file(
        "broken:\n  versions: \"3.1\"\n  tasks: assemble\nworking:\n  versions: \"3.1\"\n  tasks: assemble\n",
    );

    let count_file = project.root().join("invocations");
    // Builds start failing during the first execution (scenario 'broken');
    // the first failure must be the one surfaced at exit.
    let output = project
        .command()
        .args([
            "--benchmark",
            "--scenario-file",
            scenario_file.to_str().unwrap(),
            "broken",
            "working",
        ])
        .env("BB_COUNT_FILE", &count_file)
        .env("BB_FAIL_AFTER", "8")
        .output()
        .unwrap();

    // 'broken' failed, so the run exits non-zero and names it.
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Scenario 'broken' failed"), "{stdout}");

    // Both executions ran to the end of their schedules.
    let log = project.log_contents();
    assert!(log.contains("* Running scenario 'broken' using Gradle 3.1 (scenario 1/2)"));
    assert!(log.contains("* Running scenario 'working' using Gradle 3.1 (scenario 2/2)"));
    assert_eq!(count_lines_with(&log, "* Running build"), 20);
}
