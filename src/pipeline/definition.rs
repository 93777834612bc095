use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use log::debug;
use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::error::{LocalCiError, Result};

/// Stage assigned to jobs that do not declare one.
pub const DEFAULT_STAGE: &str = "test";

/// Top-level keys of `.gitlab-ci.yml` that configure the pipeline rather than
/// declare a job.
pub const RESERVED_KEYS: [&str; 9] = [
    "stages",
    "variables",
    "image",
    "services",
    "before_script",
    "after_script",
    "default",
    "include",
    "workflow",
];

/// A runnable job from the pipeline definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSpec {
    /// Job name as declared in the definition
    pub name: String,
    /// Stage this job belongs to
    pub stage: String,
    /// Commands from `script`, in declaration order
    pub script: Vec<String>,
}

/// Parsed pipeline definition.
///
/// Holds the declared stage order and every runnable job, keyed by name in
/// the order the jobs appear in the file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineDefinition {
    stages: Vec<String>,
    jobs: IndexMap<String, JobSpec>,
}

impl PipelineDefinition {
    /// Loads and validates a pipeline definition file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the file does not exist (`NotFound`)
    /// - the content is not valid YAML (`Parse`)
    /// - the document has no array-valued `stages` field (`Schema`)
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LocalCiError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content, path)
    }

    /// Parses a definition from YAML text. `path` is only used in error messages.
    pub fn from_yaml_str(content: &str, path: &Path) -> Result<Self> {
        let document: Value =
            serde_yaml::from_str(content).map_err(|source| LocalCiError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let schema_error = |reason: &str| LocalCiError::Schema {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let Value::Mapping(root) = document else {
            return Err(schema_error("`stages` is not defined (or is not an array)"));
        };

        let Some(Value::Sequence(stage_values)) = root.get("stages") else {
            return Err(schema_error("`stages` is not defined (or is not an array)"));
        };

        let stages = stage_values
            .iter()
            .map(|value| {
                scalar_to_string(value)
                    .ok_or_else(|| schema_error("`stages` entries must be plain names"))
            })
            .collect::<Result<Vec<_>>>()?;

        let jobs = collect_jobs(&root);

        debug!(
            "Loaded {} stages and {} runnable jobs from {}",
            stages.len(),
            jobs.len(),
            path.display()
        );

        Ok(Self { stages, jobs })
    }

    /// Declared stage names, in order.
    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    /// Runnable jobs in declaration order.
    pub fn jobs(&self) -> impl Iterator<Item = &JobSpec> {
        self.jobs.values()
    }

    pub fn job(&self, name: &str) -> Option<&JobSpec> {
        self.jobs.get(name)
    }

    /// Jobs assigned to `stage`, in declaration order.
    pub fn jobs_in_stage(&self, stage: &str) -> Vec<&JobSpec> {
        self.jobs.values().filter(|job| job.stage == stage).collect()
    }

    pub fn is_reserved_key(key: &str) -> bool {
        RESERVED_KEYS.contains(&key)
    }
}

fn collect_jobs(root: &Mapping) -> IndexMap<String, JobSpec> {
    let mut jobs = IndexMap::new();

    for (key, value) in root {
        let Some(name) = scalar_to_string(key) else {
            continue;
        };
        if PipelineDefinition::is_reserved_key(&name) {
            continue;
        }

        let Value::Mapping(body) = value else {
            continue;
        };
        let Some(script) = body.get("script").filter(|s| is_truthy(s)) else {
            debug!("Ignoring `{name}`: no script");
            continue;
        };

        let stage = body
            .get("stage")
            .filter(|s| is_truthy(s))
            .and_then(scalar_to_string)
            .unwrap_or_else(|| DEFAULT_STAGE.to_string());

        let job = JobSpec {
            name: name.clone(),
            stage,
            script: normalize_script(script),
        };
        jobs.insert(name, job);
    }

    jobs
}

/// Normalizes `script` into a list of commands.
///
/// A single scalar becomes a one-element list, nested lists are flattened
/// one level and empty entries are dropped.
fn normalize_script(script: &Value) -> Vec<String> {
    match script {
        Value::Sequence(items) => items
            .iter()
            .flat_map(|item| match item {
                Value::Sequence(nested) => nested.iter().collect::<Vec<_>>(),
                other => vec![other],
            })
            .filter(|item| is_truthy(item))
            .filter_map(scalar_to_string)
            .collect(),
        other => scalar_to_string(other).into_iter().collect(),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Tagged(tagged) => is_truthy(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => true,
    }
}
