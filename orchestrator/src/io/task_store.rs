//! Task state and task run records under the state directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::{elapsed_ms, file_timestamp, rfc3339};
use crate::io::config::TaskConfig;
use crate::io::record_store::write_json_atomic;

/// Latest known state of a task (`<state>/tasks/<name>.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub name: String,
    pub description: String,
    pub repo: String,
    pub status: String,
    pub last_run: String,
    pub outputs: Vec<String>,
    pub documents: Vec<String>,
}

impl TaskRecord {
    pub fn from_config(
        name: &str,
        task: &TaskConfig,
        status: &str,
        last_run: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: task.description.clone(),
            repo: task.repo.clone(),
            status: status.to_string(),
            last_run: rfc3339(last_run),
            outputs: task.outputs.clone(),
            documents: task.documents.clone(),
        }
    }
}

/// One task-flow action (`<state>/runs/<name>/<stamp>-<action>.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRunRecord {
    pub task_name: String,
    pub action: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_ms: u64,
    pub status: String,
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Fields for a task run record before it is written.
#[derive(Debug, Clone)]
pub struct TaskRunEntry<'a> {
    pub task_name: &'a str,
    pub action: &'a str,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: &'a str,
    pub exit_code: i32,
    pub message: &'a str,
}

pub fn task_record_path(state_dir: &Path, name: &str) -> PathBuf {
    state_dir.join("tasks").join(format!("{name}.json"))
}

pub fn task_runs_dir(state_dir: &Path, name: &str) -> PathBuf {
    state_dir.join("runs").join(name)
}

/// `<state>/runs/<name>/<stamp>-<action>.<ext>`; dots in the action become dashes.
pub fn task_run_path(
    state_dir: &Path,
    name: &str,
    action: &str,
    start: DateTime<Utc>,
    ext: &str,
) -> PathBuf {
    let action = action.replace('.', "-");
    task_runs_dir(state_dir, name).join(format!("{}-{action}.{ext}", file_timestamp(start)))
}

pub fn write_task(state_dir: &Path, record: &TaskRecord) -> Result<()> {
    let path = task_record_path(state_dir, &record.name);
    debug!(path = %path.display(), status = %record.status, "writing task state");
    write_json_atomic(&path, record).context("write task")
}

pub fn read_task(state_dir: &Path, name: &str) -> Result<TaskRecord> {
    let path = task_record_path(state_dir, name);
    let contents =
        fs::read_to_string(&path).with_context(|| format!("read task {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse task {}", path.display()))
}

/// Status from the persisted task record, else the configured one, else `planned`.
pub fn resolve_task_status(state_dir: &Path, name: &str, task: &TaskConfig) -> String {
    if let Ok(record) = read_task(state_dir, name)
        && !record.status.is_empty()
    {
        return record.status;
    }
    if !task.status.is_empty() {
        return task.status.clone();
    }
    "planned".to_string()
}

pub fn write_task_run(state_dir: &Path, entry: &TaskRunEntry<'_>) -> Result<PathBuf> {
    let path = task_run_path(state_dir, entry.task_name, entry.action, entry.start, "json");
    let record = TaskRunRecord {
        task_name: entry.task_name.to_string(),
        action: entry.action.to_string(),
        start_time: rfc3339(entry.start),
        end_time: rfc3339(entry.end),
        duration_ms: elapsed_ms(entry.start, entry.end),
        status: entry.status.to_string(),
        exit_code: entry.exit_code,
        message: (!entry.message.is_empty()).then(|| entry.message.to_string()),
    };
    write_json_atomic(&path, &record).context("write task run")?;
    Ok(path)
}

pub fn read_task_run(path: &Path) -> Result<TaskRunRecord> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read task run {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse task run {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, secs)
            .single()
            .expect("date")
    }

    fn task() -> TaskConfig {
        TaskConfig {
            description: "Static site".to_string(),
            repo: "external".to_string(),
            working_dir: "/srv/site".to_string(),
            command: vec!["make".to_string()],
            outputs: vec!["public/index.html".to_string()],
            ..TaskConfig::default()
        }
    }

    #[test]
    fn task_record_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let record = TaskRecord::from_config("site", &task(), "in_progress", at(5));
        write_task(temp.path(), &record).expect("write");

        let loaded = read_task(temp.path(), "site").expect("read");
        assert_eq!(loaded, record);
        assert_eq!(loaded.last_run, "2025-01-02T03:04:05Z");
    }

    #[test]
    fn status_resolution_prefers_persisted_record() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut cfg = task();
        assert_eq!(resolve_task_status(temp.path(), "site", &cfg), "planned");

        cfg.status = "blocked".to_string();
        assert_eq!(resolve_task_status(temp.path(), "site", &cfg), "blocked");

        write_task(temp.path(), &TaskRecord::from_config("site", &cfg, "done", at(0)))
            .expect("write");
        assert_eq!(resolve_task_status(temp.path(), "site", &cfg), "done");
    }

    /// Actions sharing a start second land in distinct files.
    #[test]
    fn run_records_are_keyed_by_action() {
        let temp = tempfile::tempdir().expect("tempdir");
        let plan = write_task_run(
            temp.path(),
            &TaskRunEntry {
                task_name: "site",
                action: "plan.create",
                start: at(1),
                end: at(1),
                status: "planned",
                exit_code: 0,
                message: "created",
            },
        )
        .expect("plan run");
        let build = write_task_run(
            temp.path(),
            &TaskRunEntry {
                task_name: "site",
                action: "build.run",
                start: at(1),
                end: at(3),
                status: "done",
                exit_code: 0,
                message: "",
            },
        )
        .expect("build run");

        assert_ne!(plan, build);
        assert!(plan.ends_with("runs/site/20250102T030401Z-plan-create.json"));
        let loaded = read_task_run(&build).expect("read build run");
        assert_eq!(loaded.duration_ms, 2000);
        assert_eq!(loaded.message, None);
    }
}
