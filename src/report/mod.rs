//! Results aggregation and reporting.
//!
//! Timings accumulate into a table with one column per scenario execution
//! and one row per invocation label, followed by summary statistics over
//! the measured builds only. The table is written as `benchmark.csv` plus
//! a structured `benchmark.json`. Cells are registered up front with the
//! schedule, so a run that aborts still writes the full structure with the
//! unfilled cells blank.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::error::Result;
use crate::schedule::{Invocation, Phase, Schedule};

/// One column of the benchmark table.
#[derive(Debug)]
struct ScenarioColumn {
    name: String,
    version: Option<String>,
    tasks: Vec<String>,
    /// `Some` when the schedule includes an initial clean build.
    initial: Option<Option<Duration>>,
    warmups: Vec<Option<Duration>>,
    measured: Vec<Option<Duration>>,
}

impl ScenarioColumn {
    fn title(&self, single: bool) -> String {
        match (&self.version, single) {
            (Some(version), true) => version.clone(),
            (Some(version), false) => format!("{} {}", self.name, version),
            (None, _) => self.name.clone(),
        }
    }

    fn stats(&self) -> (f64, f64, f64) {
        let mut values: Vec<f64> = self
            .measured
            .iter()
            .flatten()
            .map(|duration| millis(*duration) as f64)
            .collect();
        if values.is_empty() {
            return (f64::NAN, f64::NAN, f64::NAN);
        }
        values.sort_by(f64::total_cmp);

        let count = values.len() as f64;
        let mean = values.iter().sum::<f64>() / count;
        let median = if values.len() % 2 == 0 {
            f64::midpoint(values[values.len() / 2 - 1], values[values.len() / 2])
        } else {
            values[values.len() / 2]
        };
        let variance = values
            .iter()
            .map(|value| (value - mean).powi(2))
            .sum::<f64>()
            / count;
        (mean, median, variance.sqrt())
    }
}

/// The row/column benchmark table.
#[derive(Debug, Default)]
pub struct BenchmarkResults {
    columns: Vec<ScenarioColumn>,
}

impl BenchmarkResults {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a column for one scenario execution, pre-sizing every
    /// cell from its schedule. Returns the column handle.
    pub fn add_column(
        &mut self,
        name: &str,
        version: Option<&str>,
        tasks: Vec<String>,
        schedule: &Schedule,
    ) -> usize {
        self.columns.push(ScenarioColumn {
            name: name.to_string(),
            version: version.map(str::to_string),
            tasks,
            initial: schedule.has_initial.then_some(None),
            warmups: vec![None; schedule.warmups],
            measured: vec![None; schedule.iterations],
        });
        self.columns.len() - 1
    }

    /// Records the timing of one completed invocation.
    pub fn record(&mut self, column: usize, invocation: &Invocation, duration: Duration) {
        let Some(column) = self.columns.get_mut(column) else {
            return;
        };
        match invocation.phase {
            Phase::InitialClean => {
                if let Some(cell) = column.initial.as_mut() {
                    *cell = Some(duration);
                }
            }
            Phase::WarmUp => {
                if let Some(cell) = column.warmups.get_mut(invocation.iteration - 1) {
                    *cell = Some(duration);
                }
            }
            Phase::Measured => {
                if let Some(cell) = column.measured.get_mut(invocation.iteration - 1) {
                    *cell = Some(duration);
                }
            }
            Phase::Probe => {}
        }
    }

    /// Renders the CSV: header, `tasks` row, per-invocation rows, then
    /// `mean`/`median`/`stddev` over the measured rows.
    #[must_use]
    pub fn to_csv(&self) -> String {
        let single = self.columns.len() == 1;
        let mut out = String::new();

        push_row(
            &mut out,
            "build",
            self.columns.iter().map(|column| column.title(single)),
        );
        push_row(
            &mut out,
            "tasks",
            self.columns.iter().map(|column| column.tasks.join(" ")),
        );

        if self.columns.iter().any(|column| column.initial.is_some()) {
            push_row(
                &mut out,
                "initial clean build",
                self.columns
                    .iter()
                    .map(|column| cell(column.initial.flatten())),
            );
        }

        let max_warmups = self
            .columns
            .iter()
            .map(|column| column.warmups.len())
            .max()
            .unwrap_or(0);
        for n in 1..=max_warmups {
            push_row(
                &mut out,
                &format!("warm-up build {n}"),
                self.columns
                    .iter()
                    .map(|column| cell(column.warmups.get(n - 1).copied().flatten())),
            );
        }

        let max_measured = self
            .columns
            .iter()
            .map(|column| column.measured.len())
            .max()
            .unwrap_or(0);
        for n in 1..=max_measured {
            push_row(
                &mut out,
                &format!("build {n}"),
                self.columns
                    .iter()
                    .map(|column| cell(column.measured.get(n - 1).copied().flatten())),
            );
        }

        let stats: Vec<(f64, f64, f64)> =
            self.columns.iter().map(ScenarioColumn::stats).collect();
        push_row(&mut out, "mean", stats.iter().map(|s| format!("{:.2}", s.0)));
        push_row(&mut out, "median", stats.iter().map(|s| format!("{:.2}", s.1)));
        push_row(&mut out, "stddev", stats.iter().map(|s| format!("{:.2}", s.2)));

        out
    }

    /// Writes `benchmark.csv`.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors; the caller treats those as fatal.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_csv())?;
        Ok(())
    }

    /// Writes the structured `benchmark.json` companion.
    ///
    /// # Errors
    ///
    /// Fails on I/O or serialization errors.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let report = JsonReport {
            written_at: Utc::now().to_rfc3339(),
            scenarios: self
                .columns
                .iter()
                .map(|column| {
                    let (mean, median, stddev) = column.stats();
                    JsonScenario {
                        name: column.name.clone(),
                        version: column.version.clone(),
                        tasks: column.tasks.clone(),
                        initial_clean_build_ms: column.initial.flatten().map(millis),
                        warm_up_builds_ms: column
                            .warmups
                            .iter()
                            .map(|cell| cell.map(millis))
                            .collect(),
                        builds_ms: column
                            .measured
                            .iter()
                            .map(|cell| cell.map(millis))
                            .collect(),
                        mean_ms: finite(mean),
                        median_ms: finite(median),
                        stddev_ms: finite(stddev),
                    }
                })
                .collect(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct JsonReport {
    written_at: String,
    scenarios: Vec<JsonScenario>,
}

#[derive(Debug, Serialize)]
struct JsonScenario {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    tasks: Vec<String>,
    initial_clean_build_ms: Option<u64>,
    warm_up_builds_ms: Vec<Option<u64>>,
    builds_ms: Vec<Option<u64>>,
    mean_ms: Option<f64>,
    median_ms: Option<f64>,
    stddev_ms: Option<f64>,
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn cell(value: Option<Duration>) -> String {
    value.map_or_else(String::new, |duration| millis(duration).to_string())
}

/// `NaN` is not representable in JSON; absent cells drop the statistic.
fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn push_row<I>(out: &mut String, label: &str, cells: I)
where
    I: Iterator<Item = String>,
{
    out.push_str(&escape(label));
    for value in cells {
        out.push(',');
        out.push_str(&escape(&value));
    }
    out.push('\n');
}

fn escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
