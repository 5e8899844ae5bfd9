//! Error types for buildbench.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Top-level error type for buildbench operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Fatal configuration problem, reported before any build runs.
    ///
    /// The message is printed verbatim as a single line on stdout.
    #[error("{0}")]
    Config(String),

    /// A scenario failed. Remaining scenarios still run; the first failure
    /// is surfaced once the whole run has completed.
    #[error("Scenario '{name}' failed")]
    ScenarioFailed {
        /// Name of the failed scenario.
        name: String,
        /// The first failure observed while running it.
        #[source]
        cause: Box<Error>,
    },

    /// A build invocation failed.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// A profiler could not be attached or controlled.
    #[error(transparent)]
    Profiler(#[from] ProfilerError),

    /// The run was interrupted before completing.
    #[error("Build cancelled.")]
    Cancelled,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Scenario file parsing error.
    #[error("scenario file is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Result serialization error.
    #[error("failed to write benchmark results: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for buildbench operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single build invocation or of the build tool process.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The build tool ran but reported a failure.
    #[error("build completed with {status}")]
    Failed {
        /// Exit status reported by the build tool.
        status: ExitStatus,
    },

    /// The build tool process could not be started at all.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        /// The command line that failed to launch.
        command: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// A required build tool executable is missing.
    #[error("cannot find build tool executable `{}`", path.display())]
    ToolNotFound {
        /// Path that was probed.
        path: PathBuf,
    },

    /// The invocation was cancelled before completing.
    #[error("build was cancelled")]
    Cancelled,

    /// I/O error while driving the build.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// Whether the failure poisons the whole scenario execution rather
    /// than just the current invocation.
    #[must_use]
    pub const fn is_environment(&self) -> bool {
        matches!(
            self,
            Self::Spawn { .. } | Self::ToolNotFound { .. } | Self::Io(_)
        )
    }
}

/// Failure while attaching, driving, or collecting a profiler.
#[derive(Debug, Error)]
pub enum ProfilerError {
    /// A required environment variable is missing.
    #[error("environment variable {0} must be set")]
    MissingEnv(&'static str),

    /// A profiler control command failed.
    #[error("profiler command failed: {0}")]
    Control(String),

    /// I/O error while preparing or collecting artifacts.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_displays_message_verbatim() {
        let err = Error::Config("No project directory specified.".to_string());
        assert_eq!(err.to_string(), "No project directory specified.");
    }

    #[test]
    fn scenario_failed_chains_cause() {
        use std::error::Error as _;

        let cause = Error::Build(BuildError::Cancelled);
        let err = Error::ScenarioFailed {
            name: "assemble".to_string(),
            cause: Box::new(cause),
        };
        assert_eq!(err.to_string(), "Scenario 'assemble' failed");
        assert!(err.source().is_some());
    }

    #[test]
    fn environment_failures_are_classified() {
        let spawn = BuildError::Spawn {
            command: "gradle help".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "x"),
        };
        assert!(spawn.is_environment());

        let missing = BuildError::ToolNotFound {
            path: PathBuf::from("/p/buckw"),
        };
        assert!(missing.is_environment());
    }
}
