//! Scenario configuration: schema types and the scenario-file loader.

pub mod loader;
pub mod schema;

pub use loader::load_scenarios;
pub use schema::{BuckOptions, MavenOptions, MutatorKind, MutatorSpec, RunUsing, Scenario};
