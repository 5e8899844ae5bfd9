//! Scenario file loader.
//!
//! The scenario file is YAML: top-level keys are scenario names, each value
//! a mapping of scenario options. Loading works on `serde_yaml::Value`
//! first so unknown keys fail loudly with their location, then builds the
//! typed [`Scenario`] values.

use std::path::Path;

use serde_yaml::Value;
use tracing::debug;

use crate::cli::Settings;
use crate::config::schema::{BuckOptions, MavenOptions, MutatorKind, MutatorSpec, RunUsing, Scenario};
use crate::error::{Error, Result};

/// Keys recognized at scenario scope.
const SCENARIO_KEYS: &[&str] = &[
    "versions",
    "tasks",
    "cleanup-tasks",
    "run-using",
    "system-properties",
    "gradle-args",
    "apply-abi-change-to",
    "apply-non-abi-change-to",
    "apply-android-resource-change-to",
    "apply-android-resource-value-change-to",
    "buck",
    "maven",
];

/// Loads the scenarios selected for this run, in execution order.
///
/// With a scenario file, positional targets name scenarios and fix their
/// order; without targets every scenario runs in alphabetic order. Without
/// a scenario file the positional targets become the task list of an
/// implicit scenario named `default`.
///
/// # Errors
///
/// Fails on unreadable or malformed files, unrecognized keys, and unknown
/// requested scenario names.
pub fn load_scenarios(settings: &Settings) -> Result<Vec<Scenario>> {
    match &settings.scenario_file {
        Some(path) => load_from_file(path, settings),
        None => {
            let mut scenario = Scenario::named("default");
            scenario.tasks = settings.targets.clone();
            scenario.run_using = settings.default_run_using;
            scenario.system_properties = settings.system_properties.clone();
            Ok(vec![scenario])
        }
    }
}

/// Default Gradle versions for a scenario that doesn't declare its own:
/// the version pinned by the project's wrapper properties when present,
/// else the `--gradle-version` values.
///
/// # Errors
///
/// Fails when no version can be determined at all.
pub fn default_versions(scenario_name: &str, settings: &Settings) -> Result<Vec<String>> {
    if let Some(version) = wrapper_version(&settings.project_dir) {
        debug!(%version, "using Gradle version from the project wrapper");
        return Ok(vec![version]);
    }
    if !settings.gradle_versions.is_empty() {
        return Ok(settings.gradle_versions.clone());
    }
    Err(Error::Config(format!(
        "No Gradle version specified for scenario '{scenario_name}'."
    )))
}

/// Reads the Gradle version pinned by the project's wrapper properties.
#[must_use]
pub fn wrapper_version(project_dir: &Path) -> Option<String> {
    let properties = project_dir
        .join("gradle")
        .join("wrapper")
        .join("gradle-wrapper.properties");
    let contents = std::fs::read_to_string(properties).ok()?;
    let url = contents
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("distributionUrl="))?;
    let file_name = url.rsplit('/').next()?;
    let stem = file_name.strip_suffix(".zip")?;
    let versioned = stem.strip_prefix("gradle-")?;
    let version = versioned
        .strip_suffix("-bin")
        .or_else(|| versioned.strip_suffix("-all"))
        .unwrap_or(versioned);
    Some(version.to_string())
}

fn load_from_file(path: &Path, settings: &Settings) -> Result<Vec<Scenario>> {
    let text = std::fs::read_to_string(path).map_err(|err| {
        Error::Config(format!(
            "Could not read scenario file {}: {err}",
            path.display()
        ))
    })?;
    let root: Value = serde_yaml::from_str(&text)?;
    let Value::Mapping(map) = root else {
        return Err(Error::Config(format!(
            "Scenario file {} must define a mapping of scenario names.",
            path.display()
        )));
    };

    let mut all = Vec::new();
    for (key, value) in &map {
        let name = key.as_str().ok_or_else(|| {
            Error::Config(format!(
                "Scenario names in scenario file {} must be strings.",
                path.display()
            ))
        })?;
        all.push(parse_scenario(name, value, path, settings)?);
    }

    select(all, &settings.targets)
}

/// Applies the CLI scenario selection and ordering rules.
fn select(mut all: Vec<Scenario>, requested: &[String]) -> Result<Vec<Scenario>> {
    if requested.is_empty() {
        all.sort_by(|a, b| a.name.cmp(&b.name));
        return Ok(all);
    }

    let mut selected = Vec::with_capacity(requested.len());
    for name in requested {
        match all.iter().find(|scenario| &scenario.name == name) {
            Some(scenario) => selected.push(scenario.clone()),
            None => {
                let mut available: Vec<&str> =
                    all.iter().map(|scenario| scenario.name.as_str()).collect();
                available.sort_unstable();
                return Err(Error::Config(format!(
                    "Unknown scenario '{name}' requested. Available scenarios are: {}",
                    available.join(", ")
                )));
            }
        }
    }
    Ok(selected)
}

fn parse_scenario(name: &str, value: &Value, path: &Path, settings: &Settings) -> Result<Scenario> {
    let Value::Mapping(map) = value else {
        return Err(Error::Config(format!(
            "Scenario '{name}' in scenario file {} must be a mapping.",
            path.display()
        )));
    };

    let mut scenario = Scenario::named(name);
    scenario.run_using = settings.default_run_using;
    scenario.system_properties = settings.system_properties.clone();
    let mut cleanup_given = false;

    for (key, entry) in map {
        let key = scalar_key(key, name, path)?;
        if !SCENARIO_KEYS.contains(&key.as_str()) {
            return Err(unrecognized(name, &key, path));
        }
        match key.as_str() {
            "versions" => scenario.versions = string_or_list(entry, name, &key, path)?,
            "tasks" => scenario.tasks = string_or_list(entry, name, &key, path)?,
            "cleanup-tasks" => {
                scenario.cleanup_tasks = string_or_list(entry, name, &key, path)?;
                cleanup_given = true;
            }
            "run-using" => {
                let raw = scalar_string(entry, name, &key, path)?;
                scenario.run_using = RunUsing::parse(&raw).ok_or_else(|| {
                    Error::Config(format!(
                        "Unrecognized value '{raw}' for '{name}.run-using' defined in scenario file {}",
                        path.display()
                    ))
                })?;
            }
            "system-properties" => {
                let Value::Mapping(properties) = entry else {
                    return Err(Error::Config(format!(
                        "Value for '{name}.system-properties' defined in scenario file {} must be a mapping.",
                        path.display()
                    )));
                };
                for (property, property_value) in properties {
                    let property = scalar_key(property, name, path)?;
                    let property_value = scalar_string(property_value, name, &key, path)?;
                    scenario.system_properties.insert(property, property_value);
                }
            }
            "gradle-args" => {
                scenario.gradle_args = match entry {
                    Value::String(raw) => shlex::split(raw).ok_or_else(|| {
                        Error::Config(format!(
                            "Unable to parse '{name}.gradle-args' defined in scenario file {}",
                            path.display()
                        ))
                    })?,
                    other => string_or_list(other, name, &key, path)?,
                };
            }
            "buck" => scenario.buck = Some(parse_buck(name, entry, path)?),
            "maven" => scenario.maven = Some(parse_maven(name, entry, path)?),
            mutator_key => {
                let Some(kind) = MutatorKind::all()
                    .iter()
                    .copied()
                    .find(|kind| kind.key() == mutator_key)
                else {
                    return Err(unrecognized(name, &key, path));
                };
                if scenario.mutator.is_some() {
                    return Err(Error::Config(format!(
                        "Scenario '{name}' defines more than one source change to apply."
                    )));
                }
                let target = scalar_string(entry, name, &key, path)?;
                scenario.mutator = Some(MutatorSpec {
                    kind,
                    target: target.into(),
                });
            }
        }
    }

    if !cleanup_given {
        scenario.cleanup_tasks = vec!["clean".to_string()];
    }
    Ok(scenario)
}

fn parse_buck(name: &str, value: &Value, path: &Path) -> Result<BuckOptions> {
    let Value::Mapping(map) = value else {
        return Err(Error::Config(format!(
            "Value for '{name}.buck' defined in scenario file {} must be a mapping.",
            path.display()
        )));
    };
    let mut options = BuckOptions::default();
    for (key, entry) in map {
        let key = scalar_key(key, name, path)?;
        match key.as_str() {
            "targets" => options.targets = string_or_list(entry, name, &key, path)?,
            "type" => options.target_type = Some(scalar_string(entry, name, &key, path)?),
            other => return Err(unrecognized(name, &format!("buck.{other}"), path)),
        }
    }
    Ok(options)
}

fn parse_maven(name: &str, value: &Value, path: &Path) -> Result<MavenOptions> {
    let Value::Mapping(map) = value else {
        return Err(Error::Config(format!(
            "Value for '{name}.maven' defined in scenario file {} must be a mapping.",
            path.display()
        )));
    };
    let mut options = MavenOptions::default();
    for (key, entry) in map {
        let key = scalar_key(key, name, path)?;
        match key.as_str() {
            "targets" => options.targets = string_or_list(entry, name, &key, path)?,
            other => return Err(unrecognized(name, &format!("maven.{other}"), path)),
        }
    }
    Ok(options)
}

fn unrecognized(scenario: &str, key: &str, path: &Path) -> Error {
    Error::Config(format!(
        "Unrecognized key '{scenario}.{key}' defined in scenario file {}",
        path.display()
    ))
}

fn scalar_key(key: &Value, scenario: &str, path: &Path) -> Result<String> {
    key.as_str().map(str::to_string).ok_or_else(|| {
        Error::Config(format!(
            "Keys of scenario '{scenario}' in scenario file {} must be strings.",
            path.display()
        ))
    })
}

/// Accepts a scalar or a list of scalars, always yielding a list.
fn string_or_list(value: &Value, scenario: &str, key: &str, path: &Path) -> Result<Vec<String>> {
    match value {
        Value::Sequence(items) => items
            .iter()
            .map(|item| scalar_string(item, scenario, key, path))
            .collect(),
        other => Ok(vec![scalar_string(other, scenario, key, path)?]),
    }
}

fn scalar_string(value: &Value, scenario: &str, key: &str, path: &Path) -> Result<String> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        _ => Err(Error::Config(format!(
            "Value for '{scenario}.{key}' defined in scenario file {} must be a string or list of strings.",
            path.display()
        ))),
    }
}
