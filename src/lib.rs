//! buildbench - build benchmarking and profiling harness
//!
//! Drives Gradle, Buck, or Maven builds of a target project through
//! configurable scenarios, measures wall-clock times, optionally attaches
//! profilers, mutates sources between builds, and aggregates the results
//! into a benchmark report.

pub mod cli;
pub mod config;
pub mod error;
pub mod invoker;
pub mod mutator;
pub mod observability;
pub mod orchestrator;
pub mod profiler;
pub mod report;
pub mod schedule;

pub use error::{Error, Result};
