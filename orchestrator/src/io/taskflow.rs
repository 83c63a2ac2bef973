//! Task-flow operations: plan, build, and document configured tasks.
//!
//! The [`TaskFlow`] trait is the seam the built-in agents call through. Tests
//! substitute recording fakes; [`LocalTaskFlow`] runs real commands and keeps
//! task state under the state directory.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use tracing::{error, info, instrument};

use crate::io::config::{Config, TaskConfig};
use crate::io::process::run_command_with_timeout;
use crate::io::task_store::{TaskRecord, TaskRunEntry, task_run_path, write_task, write_task_run};

pub const ACTION_PLAN: &str = "plan.create";
pub const ACTION_BUILD: &str = "build.run";
pub const ACTION_DOC: &str = "doc.generate";

/// Operations the agents delegate to. Implementations must be shareable
/// across the worker threads of a parallel group.
pub trait TaskFlow: Send + Sync {
    /// Record the task as planned.
    fn plan_create(&self, task: &str) -> Result<()>;
    /// Run the task's command.
    fn build_run(&self, task: &str) -> Result<()>;
    /// Write the task's documentation.
    fn doc_generate(&self, task: &str) -> Result<()>;
    /// Validated configuration for `task`.
    fn task_config(&self, task: &str) -> Result<TaskConfig>;
}

/// Conventional documentation path for a task.
pub fn task_doc_path(working_dir: &Path, task: &str) -> PathBuf {
    working_dir.join("docs").join("tasks").join(format!("{task}.md"))
}

/// Declared outputs with relative entries resolved against the working directory.
pub fn resolved_outputs(task: &TaskConfig) -> Vec<PathBuf> {
    let base = Path::new(&task.working_dir);
    task.outputs
        .iter()
        .map(|output| {
            let path = Path::new(output);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                base.join(path)
            }
        })
        .collect()
}

/// Task flow backed by the local filesystem and real child processes.
#[derive(Debug, Clone)]
pub struct LocalTaskFlow {
    config: Arc<Config>,
    state_dir: PathBuf,
}

impl LocalTaskFlow {
    pub fn new(config: Arc<Config>, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            state_dir: state_dir.into(),
        }
    }

    fn update_state(&self, name: &str, task: &TaskConfig, status: &str) -> Result<()> {
        write_task(
            &self.state_dir,
            &TaskRecord::from_config(name, task, status, Utc::now()),
        )
    }
}

impl TaskFlow for LocalTaskFlow {
    #[instrument(skip(self))]
    fn plan_create(&self, name: &str) -> Result<()> {
        let task = self.config.task(name)?;
        let status = if task.status.is_empty() {
            "planned"
        } else {
            task.status.as_str()
        };

        let now = Utc::now();
        write_task(&self.state_dir, &TaskRecord::from_config(name, task, status, now))?;
        write_task_run(
            &self.state_dir,
            &TaskRunEntry {
                task_name: name,
                action: ACTION_PLAN,
                start: now,
                end: now,
                status,
                exit_code: 0,
                message: "created",
            },
        )
        .inspect_err(|err| error!(task = name, err = %err, "failed to write plan run"))?;

        info!(task = name, status, "task planned");
        Ok(())
    }

    #[instrument(skip(self))]
    fn build_run(&self, name: &str) -> Result<()> {
        let task = self.config.task(name)?;
        let start = Utc::now();
        self.update_state(name, task, "in_progress")?;

        info!(task = name, command = %task.command.join(" "), "task build starting");
        let timeout = Duration::from_secs(self.config.task_timeout_secs(task));
        let run = run_command_with_timeout(
            &task.command,
            Path::new(&task.working_dir),
            timeout,
            self.config.defaults.output_limit_bytes,
        );
        let end = Utc::now();

        let (exit_code, failure) = match &run {
            Ok(output) if output.success() => (0, None),
            Ok(output) if output.timed_out => (
                output.exit_code(),
                Some(format!("command timed out after {}s", timeout.as_secs())),
            ),
            Ok(output) => (
                output.exit_code(),
                Some(format!("command exited with status {}", output.exit_code())),
            ),
            Err(err) => (1, Some(format!("{err:#}"))),
        };

        if let Ok(output) = &run {
            let log_path = task_run_path(&self.state_dir, name, "build", start, "log");
            if let Some(parent) = log_path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            fs::write(&log_path, output.render_log())
                .with_context(|| format!("write build log {}", log_path.display()))?;
        }

        let (status, message) = match &failure {
            None => ("done", "completed"),
            Some(message) => {
                error!(task = name, err = %message, "task build failed");
                ("in_progress", message.as_str())
            }
        };

        self.update_state(name, task, status)?;
        write_task_run(
            &self.state_dir,
            &TaskRunEntry {
                task_name: name,
                action: ACTION_BUILD,
                start,
                end,
                status,
                exit_code,
                message,
            },
        )
        .inspect_err(|err| error!(task = name, err = %err, "failed to write build run"))?;

        info!(task = name, exit_code, status, "task build finished");
        match failure {
            Some(message) => Err(anyhow!("build {name}: {message}")),
            None => Ok(()),
        }
    }

    #[instrument(skip(self))]
    fn doc_generate(&self, name: &str) -> Result<()> {
        let task = self.config.task(name)?;
        let start = Utc::now();
        let status = "done";
        let base_dir = Path::new(&task.working_dir);

        self.update_state(name, task, status)?;
        append_task_summary(base_dir, name, task, status)
            .inspect_err(|err| error!(task = name, err = %err, "failed to update README"))?;

        let doc_path = task_doc_path(base_dir, name);
        write_task_doc(&doc_path, name, task, status)
            .inspect_err(|err| error!(task = name, err = %err, "failed to write task doc"))?;

        write_task_run(
            &self.state_dir,
            &TaskRunEntry {
                task_name: name,
                action: ACTION_DOC,
                start,
                end: Utc::now(),
                status,
                exit_code: 0,
                message: "documented",
            },
        )
        .inspect_err(|err| error!(task = name, err = %err, "failed to write doc run"))?;

        info!(task = name, doc = %doc_path.display(), "task documented");
        Ok(())
    }

    fn task_config(&self, name: &str) -> Result<TaskConfig> {
        self.config.task(name).cloned()
    }
}

fn append_task_summary(base_dir: &Path, name: &str, task: &TaskConfig, status: &str) -> Result<()> {
    let readme_path = base_dir.join("README.md");
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&readme_path)
        .with_context(|| format!("open {}", readme_path.display()))?;
    writeln!(file, "\n{}", render_task_summary(name, task, status))
        .with_context(|| format!("append {}", readme_path.display()))
}

fn write_task_doc(path: &Path, name: &str, task: &TaskConfig, status: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create docs dir {}", parent.display()))?;
    }
    fs::write(path, render_task_doc(name, task, status))
        .with_context(|| format!("write task doc {}", path.display()))
}

fn joined_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

fn render_task_summary(name: &str, task: &TaskConfig, status: &str) -> String {
    format!(
        "## Task Summary: {name}\n\n\
         - Purpose: {}\n- Command: {}\n- Outputs: {}\n- Status: {status}\n",
        task.description,
        task.command.join(" "),
        joined_or_none(&task.outputs),
    )
}

fn render_task_doc(name: &str, task: &TaskConfig, status: &str) -> String {
    format!(
        "# Task: {name}\n\n\
         ## Purpose\n{}\n\n\
         ## Commands Run\n{}\n\n\
         ## Outputs Produced\n{}\n\n\
         ## Documents\n{}\n\n\
         ## Status\n{status}\n",
        task.description,
        task.command.join(" "),
        joined_or_none(&task.outputs),
        joined_or_none(&task.documents),
    )
}
