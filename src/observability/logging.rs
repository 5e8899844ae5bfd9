//! Diagnostic logging.
//!
//! buildbench keeps two output streams apart: the run log
//! ([`crate::observability::RunLog`]) carries the operator-facing record
//! of every build, while `tracing` diagnostics go to stderr and are
//! filtered by the `-v` count or the `BUILDBENCH_LOG_LEVEL` environment
//! variable.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Rendering of diagnostic output on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Compact human-readable lines, colored on a terminal.
    #[default]
    Human,
    /// One JSON object per line.
    Json,
}

/// Default filter directive for a `-v` count.
fn directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Installs the global tracing subscriber.
///
/// A `BUILDBENCH_LOG_LEVEL` directive takes precedence over the `-v`
/// count when set. Event targets are only shown from `-vv` up.
/// Installation is best-effort (`try_init`), so a second call, as
/// happens across tests, is a no-op instead of a panic.
pub fn init_logging(format: LogFormat, verbosity: u8) {
    let filter = EnvFilter::try_from_env("BUILDBENCH_LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(directive(verbosity)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .with_writer(std::io::stderr);

    let _ = match format {
        LogFormat::Human => builder
            .with_ansi(std::io::stderr().is_terminal())
            .try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
