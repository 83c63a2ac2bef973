//! Orchestrator configuration (TOML).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::plan::StepPlan;
use crate::io::paths::is_plain_name;

/// Top-level configuration file.
///
/// Missing sections fall back to defaults so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub defaults: DefaultsConfig,
    pub tasks: BTreeMap<String, TaskConfig>,
    pub orchestrations: BTreeMap<String, OrchestrationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing level when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Wall-clock limit for a task's build command, in seconds.
    pub task_timeout_secs: u64,

    /// Captured stdout/stderr beyond this many bytes per stream is dropped.
    pub output_limit_bytes: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            task_timeout_secs: 30 * 60,
            output_limit_bytes: 100_000,
        }
    }
}

/// A buildable, documentable unit of work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct TaskConfig {
    pub description: String,
    pub repo: String,
    /// Absolute directory the command runs in.
    pub working_dir: String,
    pub command: Vec<String>,
    /// Declared outputs; relative entries resolve against `working_dir`.
    pub outputs: Vec<String>,
    pub documents: Vec<String>,
    /// Initial status recorded by `plan create` (defaults to `planned`).
    pub status: String,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct OrchestrationConfig {
    pub description: String,
    /// Sequential shorthand: one group per agent.
    pub agents: Vec<String>,
    /// Explicit groups; takes precedence over `agents`.
    pub steps: Vec<Vec<String>>,
}

impl OrchestrationConfig {
    pub fn plan(&self) -> StepPlan {
        StepPlan::from_parts(&self.steps, &self.agents)
    }
}

const LOG_LEVELS: [&str; 6] = ["off", "trace", "debug", "info", "warn", "error"];

impl Config {
    pub fn validate(&self) -> Result<()> {
        let level = self.logging.level.to_ascii_lowercase();
        if !level.is_empty() && !LOG_LEVELS.contains(&level.as_str()) {
            return Err(anyhow!("unknown log level: {}", self.logging.level));
        }
        if self.defaults.task_timeout_secs == 0 {
            return Err(anyhow!("defaults.task_timeout_secs must be > 0"));
        }
        if self.defaults.output_limit_bytes == 0 {
            return Err(anyhow!("defaults.output_limit_bytes must be > 0"));
        }
        for (name, orchestration) in &self.orchestrations {
            if !is_plain_name(name) {
                return Err(anyhow!(
                    "orchestration name {name} must be a single path component"
                ));
            }
            if orchestration.agents.is_empty() && orchestration.steps.is_empty() {
                return Err(anyhow!("orchestration {name} has no agents"));
            }
        }
        Ok(())
    }

    /// Look up and validate a task by name.
    pub fn task(&self, name: &str) -> Result<&TaskConfig> {
        let task = self
            .tasks
            .get(name)
            .ok_or_else(|| anyhow!("unknown task: {name}"))?;
        validate_task(name, task)?;
        Ok(task)
    }

    pub fn task_timeout_secs(&self, task: &TaskConfig) -> u64 {
        task.timeout_secs
            .filter(|secs| *secs > 0)
            .unwrap_or(self.defaults.task_timeout_secs)
    }
}

/// Check the fields every task-flow operation relies on.
pub fn validate_task(name: &str, task: &TaskConfig) -> Result<()> {
    if name.is_empty() {
        return Err(anyhow!("task name is required"));
    }
    if !is_plain_name(name) {
        return Err(anyhow!("task name {name} must be a single path component"));
    }
    if task.working_dir.is_empty() {
        return Err(anyhow!("task {name} has empty working_dir"));
    }
    if !Path::new(&task.working_dir).is_absolute() {
        return Err(anyhow!("task {name} working_dir must be absolute"));
    }
    if task.command.is_empty() || task.command[0].trim().is_empty() {
        return Err(anyhow!("task {name} has empty command"));
    }
    Ok(())
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `Config::default()`.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = Config::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    debug!(
        tasks = cfg.tasks.len(),
        orchestrations = cfg.orchestrations.len(),
        "config loaded"
    );
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[logging]
level = "debug"

[tasks.site]
description = "Static site"
working_dir = "/srv/site"
command = ["make", "all"]
outputs = ["public/index.html", "/var/www/feed.xml"]
timeout_secs = 60

[orchestrations.release]
description = "Full release"
steps = [["Planner"], ["Builder", "Doc"], ["Reviewer"]]

[orchestrations.quick]
agents = ["Planner", "Builder"]
"#;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn load_parses_tasks_and_orchestrations() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, SAMPLE).expect("write config");

        let cfg = load_config(&path).expect("load");
        let task = cfg.task("site").expect("site task");
        assert_eq!(task.command, vec!["make", "all"]);
        assert_eq!(cfg.task_timeout_secs(task), 60);
        assert_eq!(cfg.defaults, DefaultsConfig::default());

        let release = cfg.orchestrations["release"].plan();
        assert_eq!(release.groups().len(), 3);
        assert_eq!(release.groups()[1].members(), ["Builder", "Doc"]);
        assert_eq!(cfg.orchestrations["quick"].plan().agent_count(), 2);
    }

    #[test]
    fn validate_rejects_empty_orchestration() {
        let mut cfg = Config::default();
        cfg.orchestrations
            .insert("empty".to_string(), OrchestrationConfig::default());
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("orchestration empty has no agents"));
    }

    #[test]
    fn validate_rejects_unknown_log_level() {
        let mut cfg = Config::default();
        cfg.logging.level = "loud".to_string();
        assert!(cfg.validate().is_err());

        cfg.logging.level = "warning".to_string();
        assert!(cfg.validate().is_err());

        cfg.logging.level = "off".to_string();
        cfg.validate().expect("off is a valid level");
    }

    #[test]
    fn validate_rejects_path_like_orchestration_names() {
        let mut cfg = Config::default();
        cfg.orchestrations.insert(
            "../escape".to_string(),
            OrchestrationConfig {
                agents: vec!["Planner".to_string()],
                ..OrchestrationConfig::default()
            },
        );
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("single path component"));
    }

    #[test]
    fn task_validation_requires_absolute_dir_and_command() {
        let mut task = TaskConfig {
            working_dir: "relative/dir".to_string(),
            command: vec!["make".to_string()],
            ..TaskConfig::default()
        };
        let err = validate_task("site", &task).unwrap_err();
        assert!(err.to_string().contains("must be absolute"));

        task.working_dir = "/srv/site".to_string();
        task.command = vec![" ".to_string()];
        let err = validate_task("site", &task).unwrap_err();
        assert!(err.to_string().contains("empty command"));

        task.command = vec!["make".to_string()];
        validate_task("site", &task).expect("valid task");
        assert!(validate_task("", &task).is_err());
        for name in ["/tmp/site", "../site", "nested/site"] {
            let err = validate_task(name, &task).unwrap_err();
            assert!(err.to_string().contains("single path component"), "{name}");
        }
    }

    #[test]
    fn unknown_task_is_an_error() {
        let err = Config::default().task("nope").unwrap_err();
        assert_eq!(err.to_string(), "unknown task: nope");
    }
}
