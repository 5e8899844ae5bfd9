//! buildbench - build benchmarking and profiling harness

use std::error::Error as _;

use clap::Parser;

use buildbench::cli::Cli;
use buildbench::observability::logging::{init_logging, LogFormat};
use buildbench::{orchestrator, Error};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(LogFormat::Human, cli.verbose);

    let settings = match cli.into_settings() {
        Ok(settings) => settings,
        Err(err) => exit_with(&err),
    };
    if let Err(err) = orchestrator::run(settings).await {
        exit_with(&err);
    }
}

/// Prints the failure as a single message (with its cause chain) on
/// stdout and exits non-zero.
fn exit_with(err: &Error) -> ! {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(&format!("\n  caused by: {cause}"));
        source = cause.source();
    }
    println!("{message}");
    std::process::exit(1)
}
