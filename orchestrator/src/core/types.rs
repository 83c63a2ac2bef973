//! Run-record shapes shared by the engine and the record store.
//!
//! Field names are part of the persisted JSON contract; renaming a field is a
//! breaking change for every record already on disk.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single agent or of a whole orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_failed(self) -> bool {
        self == RunStatus::Failed
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one agent invocation attempt.
///
/// Unregistered names also produce a record (zero duration, `failed`) so the
/// persisted run shows exactly which slot stopped the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRunRecord {
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_ms: u64,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AgentRunRecord {
    /// Record for an agent that ran between `start` and `end`.
    pub fn finished(
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: RunStatus,
        message: String,
    ) -> Self {
        Self {
            name: name.to_string(),
            start_time: rfc3339(start),
            end_time: rfc3339(end),
            duration_ms: elapsed_ms(start, end),
            status,
            message: Some(message),
        }
    }

    /// Synthetic failed record for a slot that never ran.
    pub fn not_run(name: &str, at: DateTime<Utc>, message: String) -> Self {
        Self {
            name: name.to_string(),
            start_time: rfc3339(at),
            end_time: rfc3339(at),
            duration_ms: 0,
            status: RunStatus::Failed,
            message: Some(message),
        }
    }
}

/// Persisted summary of one `OrchestrationEngine::run` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationRunRecord {
    pub orchestration: String,
    pub agents: Vec<AgentRunRecord>,
    pub start_time: String,
    pub end_time: String,
    pub duration_ms: u64,
    pub status: RunStatus,
    /// String-valued context entries at the end of the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, String>>,
}

impl OrchestrationRunRecord {
    pub fn failed_agents(&self) -> impl Iterator<Item = &AgentRunRecord> {
        self.agents.iter().filter(|agent| agent.status.is_failed())
    }
}

/// RFC 3339 with second precision and a `Z` suffix.
pub fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Compact UTC stamp used in record file names (`YYYYMMDDThhmmssZ`).
pub fn file_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Milliseconds between two instants, clamped at zero for clock skew.
pub fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    u64::try_from((end - start).num_milliseconds()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: u32, millis: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, secs)
            .single()
            .expect("valid date")
            + chrono::Duration::milliseconds(i64::from(millis))
    }

    #[test]
    fn timestamps_use_utc_formats() {
        let start = at(7, 0);
        assert_eq!(rfc3339(start), "2025-03-09T14:05:07Z");
        assert_eq!(file_timestamp(start), "20250309T140507Z");
    }

    #[test]
    fn elapsed_is_clamped_for_backwards_clocks() {
        assert_eq!(elapsed_ms(at(1, 250), at(2, 0)), 750);
        assert_eq!(elapsed_ms(at(2, 0), at(1, 0)), 0);
    }

    #[test]
    fn not_run_record_has_zero_duration() {
        let record =
            AgentRunRecord::not_run("Ghost", at(0, 0), "agent not registered: Ghost".into());
        assert_eq!(record.duration_ms, 0);
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.start_time, record.end_time);
    }

    /// Optional fields stay out of the JSON when unset.
    #[test]
    fn record_json_omits_empty_optionals() {
        let record = OrchestrationRunRecord {
            orchestration: "release".to_string(),
            agents: vec![AgentRunRecord {
                name: "Planner".to_string(),
                start_time: "2025-03-09T14:05:00Z".to_string(),
                end_time: "2025-03-09T14:05:00Z".to_string(),
                duration_ms: 0,
                status: RunStatus::Success,
                message: None,
            }],
            start_time: "2025-03-09T14:05:00Z".to_string(),
            end_time: "2025-03-09T14:05:01Z".to_string(),
            duration_ms: 1000,
            status: RunStatus::Success,
            context: None,
        };
        let json = serde_json::to_value(&record).expect("serialize");
        assert!(json.get("context").is_none());
        assert!(json["agents"][0].get("message").is_none());
        assert_eq!(json["status"], "success");
    }
}
