//! Persistence for orchestration run records.
//!
//! Layout: `<state>/orchestrations/<name>/<YYYYMMDDThhmmssZ>.json`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::core::types::{OrchestrationRunRecord, file_timestamp};

pub fn orchestration_dir(state_dir: &Path, orchestration: &str) -> PathBuf {
    state_dir.join("orchestrations").join(orchestration)
}

/// Path of the record for a run that started at `start`.
pub fn run_record_path(state_dir: &Path, orchestration: &str, start: DateTime<Utc>) -> PathBuf {
    orchestration_dir(state_dir, orchestration).join(format!("{}.json", file_timestamp(start)))
}

pub fn write_orchestration_run(path: &Path, record: &OrchestrationRunRecord) -> Result<()> {
    debug!(
        path = %path.display(),
        orchestration = %record.orchestration,
        status = %record.status,
        "writing orchestration run"
    );
    write_json_atomic(path, record).context("write orchestration run")
}

pub fn read_orchestration_run(path: &Path) -> Result<OrchestrationRunRecord> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read orchestration run {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("parse orchestration run {}", path.display()))
}

/// Persisted run records for one orchestration, oldest first.
pub fn list_orchestration_runs(state_dir: &Path, orchestration: &str) -> Result<Vec<PathBuf>> {
    let dir = orchestration_dir(state_dir, orchestration);
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    for entry in fs::read_dir(&dir).with_context(|| format!("read dir {}", dir.display()))? {
        let path = entry
            .with_context(|| format!("read dir entry in {}", dir.display()))?
            .path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Pretty JSON with trailing newline, written via temp file + rename.
///
/// Temp names are unique per call so concurrent writers of one path never
/// clobber each other's temp file; the last rename wins.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value).context("serialize json")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp_path = path.with_extension(format!("json.{}.{seq}.tmp", std::process::id()));
    fs::write(&tmp_path, buf).with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AgentRunRecord, RunStatus};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn sample_record() -> OrchestrationRunRecord {
        OrchestrationRunRecord {
            orchestration: "release".to_string(),
            agents: vec![
                AgentRunRecord {
                    name: "Planner".to_string(),
                    start_time: "2025-03-09T14:05:07Z".to_string(),
                    end_time: "2025-03-09T14:05:07Z".to_string(),
                    duration_ms: 3,
                    status: RunStatus::Success,
                    message: Some("completed".to_string()),
                },
                AgentRunRecord {
                    name: "Ghost".to_string(),
                    start_time: "2025-03-09T14:05:08Z".to_string(),
                    end_time: "2025-03-09T14:05:08Z".to_string(),
                    duration_ms: 0,
                    status: RunStatus::Failed,
                    message: Some("agent not registered: Ghost".to_string()),
                },
            ],
            start_time: "2025-03-09T14:05:07Z".to_string(),
            end_time: "2025-03-09T14:05:08Z".to_string(),
            duration_ms: 1004,
            status: RunStatus::Failed,
            context: Some(BTreeMap::from([(
                "plan.goal".to_string(),
                "ship".to_string(),
            )])),
        }
    }

    #[test]
    fn record_path_uses_compact_utc_stamp() {
        let start = Utc
            .with_ymd_and_hms(2025, 3, 9, 14, 5, 7)
            .single()
            .expect("date");
        let path = run_record_path(Path::new("/state"), "release", start);
        assert_eq!(
            path,
            PathBuf::from("/state/orchestrations/release/20250309T140507Z.json")
        );
    }

    /// Verifies write → read preserves all fields.
    #[test]
    fn orchestration_run_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("orchestrations/release/20250309T140507Z.json");
        let record = sample_record();

        write_orchestration_run(&path, &record).expect("write");
        let loaded = read_orchestration_run(&path).expect("read");
        assert_eq!(loaded, record);

        let raw = fs::read_to_string(&path).expect("raw");
        assert!(raw.ends_with("}\n"));
        assert!(raw.contains("\n  \"orchestration\": \"release\""));
        let leftovers = fs::read_dir(path.parent().expect("parent"))
            .expect("read dir")
            .count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn list_runs_sorted_and_filtered() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(
            list_orchestration_runs(temp.path(), "release")
                .expect("list empty")
                .is_empty()
        );

        let dir = orchestration_dir(temp.path(), "release");
        for name in ["20250310T000000Z.json", "20250309T000000Z.json"] {
            write_orchestration_run(&dir.join(name), &sample_record()).expect("write");
        }
        fs::write(dir.join("notes.txt"), "ignore").expect("write notes");

        let runs = list_orchestration_runs(temp.path(), "release").expect("list");
        let names: Vec<_> = runs
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, vec!["20250309T000000Z.json", "20250310T000000Z.json"]);
    }

    #[test]
    fn read_reports_parse_errors_with_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("broken.json");
        fs::write(&path, "{not json").expect("write");
        let err = read_orchestration_run(&path).unwrap_err();
        assert!(err.to_string().contains("parse orchestration run"));
    }
}
