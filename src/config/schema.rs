//! Scenario schema types.
//!
//! Scenarios are immutable once loaded; the loader in
//! [`crate::config::loader`] builds them from the scenario file or from the
//! command line.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// How Gradle builds are submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunUsing {
    /// Reuse one long-lived daemon for the whole scenario execution.
    #[default]
    ToolApi,
    /// Start a fresh `--no-daemon` process for every invocation.
    NoDaemon,
}

impl RunUsing {
    /// Parses the scenario-file spelling of the mode.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "tool-api" => Some(Self::ToolApi),
            "no-daemon" => Some(Self::NoDaemon),
            _ => None,
        }
    }
}

/// The kind of source change applied between invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutatorKind {
    /// Add a new public method to a Java source file.
    AbiJava,
    /// Add a statement to an existing method body.
    NonAbiJava,
    /// Add a new `<string>` entry to an Android resource file.
    AndroidResource,
    /// Change the text of an existing `<string>` entry.
    AndroidResourceValue,
}

impl MutatorKind {
    /// The scenario-file key selecting this kind.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::AbiJava => "apply-abi-change-to",
            Self::NonAbiJava => "apply-non-abi-change-to",
            Self::AndroidResource => "apply-android-resource-change-to",
            Self::AndroidResourceValue => "apply-android-resource-value-change-to",
        }
    }

    /// All kinds in scenario-file key order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::AbiJava,
            Self::NonAbiJava,
            Self::AndroidResource,
            Self::AndroidResourceValue,
        ]
    }
}

/// A source mutation target.
#[derive(Debug, Clone)]
pub struct MutatorSpec {
    /// What kind of edit to apply.
    pub kind: MutatorKind,
    /// File to edit, relative to the project directory.
    pub target: PathBuf,
}

/// Buck-specific scenario options.
#[derive(Debug, Clone, Default)]
pub struct BuckOptions {
    /// Literal target paths to build.
    pub targets: Vec<String>,
    /// Target type to query with `buckw targets --type`; `"all"` queries
    /// every target.
    pub target_type: Option<String>,
}

/// Maven-specific scenario options.
#[derive(Debug, Clone, Default)]
pub struct MavenOptions {
    /// Arguments passed to `mvn`.
    pub targets: Vec<String>,
}

/// A named, reproducible build to benchmark or profile.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Scenario name (the top-level key in the scenario file).
    pub name: String,
    /// Gradle versions to run against, in order.
    pub versions: Vec<String>,
    /// Tasks to run.
    pub tasks: Vec<String>,
    /// Tasks prepended for the initial clean build only.
    pub cleanup_tasks: Vec<String>,
    /// Daemon reuse mode.
    pub run_using: RunUsing,
    /// System properties passed as `-Dkey=value`.
    pub system_properties: BTreeMap<String, String>,
    /// Extra Gradle command-line arguments.
    pub gradle_args: Vec<String>,
    /// Optional source mutation applied before each build.
    pub mutator: Option<MutatorSpec>,
    /// Buck options, when the scenario can run under Buck.
    pub buck: Option<BuckOptions>,
    /// Maven options, when the scenario can run under Maven.
    pub maven: Option<MavenOptions>,
}

impl Scenario {
    /// A scenario with the given name and every option defaulted.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            versions: Vec::new(),
            tasks: Vec::new(),
            cleanup_tasks: vec!["clean".to_string()],
            run_using: RunUsing::default(),
            system_properties: BTreeMap::new(),
            gradle_args: Vec::new(),
            mutator: None,
            buck: None,
            maven: None,
        }
    }

    /// Task list of the initial clean build: cleanup tasks then tasks.
    #[must_use]
    pub fn initial_tasks(&self) -> Vec<String> {
        let mut tasks = self.cleanup_tasks.clone();
        tasks.extend(self.tasks.iter().cloned());
        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_using_parses_both_spellings() {
        assert_eq!(RunUsing::parse("tool-api"), Some(RunUsing::ToolApi));
        assert_eq!(RunUsing::parse("no-daemon"), Some(RunUsing::NoDaemon));
        assert_eq!(RunUsing::parse("daemon"), None);
    }

    #[test]
    fn initial_tasks_prepend_cleanup() {
        let mut scenario = Scenario::named("assemble");
        scenario.tasks = vec!["assemble".to_string()];
        assert_eq!(scenario.initial_tasks(), vec!["clean", "assemble"]);
    }

    #[test]
    fn cleanup_defaults_to_clean() {
        let scenario = Scenario::named("x");
        assert_eq!(scenario.cleanup_tasks, vec!["clean"]);
    }
}
