//! Orchestration engine: runs a step plan against a registry and persists the outcome.
//!
//! Groups execute strictly in plan order. A singleton group runs on the
//! calling thread; larger groups fan out to one scoped worker per member and
//! join before the next group starts. The first failing group stops the run,
//! and the run record is written exactly once either way.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::thread;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use crate::agents::Agent;
use crate::agents::registry::Registry;
use crate::core::context::SharedContext;
use crate::core::plan::StepPlan;
use crate::core::types::{AgentRunRecord, OrchestrationRunRecord, RunStatus, elapsed_ms, rfc3339};
use crate::error::OrchestrationError;
use crate::io::paths::is_plain_name;
use crate::io::record_store::{run_record_path, write_orchestration_run};

/// Source of "now" for run and agent timestamps.
pub type Clock = fn() -> DateTime<Utc>;

const COMPLETED: &str = "completed";
const PANICKED: &str = "agent panicked";

/// Everything one `execute` call produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub record: OrchestrationRunRecord,
    /// Where the record was (or would have been) written.
    pub path: PathBuf,
    /// Execution and/or persistence failure.
    pub error: Option<OrchestrationError>,
}

impl RunOutcome {
    pub fn into_result(self) -> Result<OrchestrationRunRecord, OrchestrationError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.record),
        }
    }
}

/// Records and the group error (if any) for one executed group.
struct GroupOutcome {
    records: Vec<AgentRunRecord>,
    error: Option<OrchestrationError>,
}

pub struct OrchestrationEngine<'a> {
    registry: &'a Registry,
    clock: Clock,
}

impl<'a> OrchestrationEngine<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            clock: Utc::now,
        }
    }

    /// Replace the wall clock, e.g. with a fixed instant in tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Run `plan` and return the record on success.
    ///
    /// On failure the record is still persisted; use [`Self::execute`] to get
    /// at it alongside the error.
    pub fn run(
        &self,
        name: &str,
        plan: &StepPlan,
        state_dir: &Path,
        ctx: &SharedContext,
    ) -> Result<OrchestrationRunRecord, OrchestrationError> {
        self.execute(name, plan, state_dir, ctx)?.into_result()
    }

    /// Run `plan`, persist the run record, and report both.
    ///
    /// Only configuration errors are returned as `Err`; nothing runs and
    /// nothing is written in that case.
    #[instrument(skip_all, fields(orchestration = name))]
    pub fn execute(
        &self,
        name: &str,
        plan: &StepPlan,
        state_dir: &Path,
        ctx: &SharedContext,
    ) -> Result<RunOutcome, OrchestrationError> {
        if name.is_empty() {
            return Err(OrchestrationError::Configuration(
                "orchestration name is required",
            ));
        }
        if !is_plain_name(name) {
            return Err(OrchestrationError::Configuration(
                "orchestration name must be a single path component",
            ));
        }
        if plan.is_empty() {
            return Err(OrchestrationError::Configuration("step plan is empty"));
        }
        if state_dir.as_os_str().is_empty() {
            return Err(OrchestrationError::Configuration(
                "state directory is required",
            ));
        }

        let run_start = (self.clock)();
        info!(groups = plan.groups().len(), "orchestration started");

        let mut agents = Vec::with_capacity(plan.agent_count());
        let mut execution_error = None;
        for (index, group) in plan.groups().iter().enumerate() {
            let outcome = match group.members() {
                [] => {
                    debug!(group = index, "skipping empty group");
                    continue;
                }
                [single] => self.run_inline(single, ctx),
                members => self.run_parallel(members, ctx),
            };
            agents.extend(outcome.records);
            if let Some(err) = outcome.error {
                warn!(group = index, error = %err, "group failed, skipping remaining groups");
                execution_error = Some(err);
                break;
            }
        }

        let run_end = (self.clock)();
        let status = if agents.iter().any(|record| record.status.is_failed()) {
            RunStatus::Failed
        } else {
            RunStatus::Success
        };
        let snapshot = ctx.snapshot_strings();
        let record = OrchestrationRunRecord {
            orchestration: name.to_string(),
            agents,
            start_time: rfc3339(run_start),
            end_time: rfc3339(run_end),
            duration_ms: elapsed_ms(run_start, run_end),
            status,
            context: (!snapshot.is_empty()).then_some(snapshot),
        };

        let path = run_record_path(state_dir, name, run_start);
        let persistence_error = match write_orchestration_run(&path, &record) {
            Ok(()) => {
                info!(path = %path.display(), %status, "orchestration run recorded");
                None
            }
            Err(err) => {
                error!(
                    path = %path.display(),
                    error = %format!("{err:#}"),
                    "failed to persist orchestration run"
                );
                Some(OrchestrationError::Persistence(err))
            }
        };

        Ok(RunOutcome {
            record,
            path,
            error: OrchestrationError::join(execution_error, persistence_error),
        })
    }

    fn run_inline(&self, name: &str, ctx: &SharedContext) -> GroupOutcome {
        let Some(agent) = self.registry.instantiate(name) else {
            let (record, err) = self.not_registered(name);
            return GroupOutcome {
                records: vec![record],
                error: Some(err),
            };
        };
        let (record, error) = invoke(agent.as_ref(), name, ctx, self.clock);
        GroupOutcome {
            records: vec![record],
            error,
        }
    }

    /// One scoped worker per registered member; slots keep declaration order.
    ///
    /// When several members fail, whichever error reaches the lock first is
    /// the group error.
    fn run_parallel(&self, members: &[String], ctx: &SharedContext) -> GroupOutcome {
        let first_error: Mutex<Option<OrchestrationError>> = Mutex::new(None);
        let mut slots: Vec<Option<AgentRunRecord>> = vec![None; members.len()];
        debug!(members = members.len(), "starting parallel group");

        thread::scope(|scope| {
            let mut workers = Vec::with_capacity(members.len());
            for (index, name) in members.iter().enumerate() {
                let Some(agent) = self.registry.instantiate(name) else {
                    let (record, err) = self.not_registered(name);
                    slots[index] = Some(record);
                    note_error(&first_error, err);
                    continue;
                };
                let first_error = &first_error;
                let clock = self.clock;
                let handle = scope.spawn(move || {
                    let (record, err) = invoke(agent.as_ref(), name, ctx, clock);
                    if let Some(err) = err {
                        note_error(first_error, err);
                    }
                    record
                });
                workers.push((index, name, handle));
            }

            for (index, name, handle) in workers {
                let record = handle.join().unwrap_or_else(|_| {
                    let now = (self.clock)();
                    note_error(&first_error, panicked(name));
                    let message = PANICKED.to_string();
                    AgentRunRecord::finished(name, now, now, RunStatus::Failed, message)
                });
                slots[index] = Some(record);
            }
        });

        GroupOutcome {
            records: slots.into_iter().flatten().collect(),
            error: first_error
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner),
        }
    }

    fn not_registered(&self, name: &str) -> (AgentRunRecord, OrchestrationError) {
        let err = OrchestrationError::AgentNotRegistered(name.to_string());
        warn!(agent = name, "agent not registered");
        let record = AgentRunRecord::not_run(name, (self.clock)(), err.to_string());
        (record, err)
    }
}

/// Execute one agent, timing it and converting a panic into a failure.
fn invoke(
    agent: &dyn Agent,
    name: &str,
    ctx: &SharedContext,
    clock: Clock,
) -> (AgentRunRecord, Option<OrchestrationError>) {
    debug!(agent = name, "agent started");
    let start = clock();
    let result = panic::catch_unwind(AssertUnwindSafe(|| agent.execute(ctx)));
    let end = clock();

    let (status, message, error) = match result {
        Ok(Ok(())) => (RunStatus::Success, COMPLETED.to_string(), None),
        Ok(Err(err)) => (
            RunStatus::Failed,
            format!("{err:#}"),
            Some(OrchestrationError::AgentExecution {
                agent: name.to_string(),
                error: err,
            }),
        ),
        Err(_) => (RunStatus::Failed, PANICKED.to_string(), Some(panicked(name))),
    };

    let record = AgentRunRecord::finished(name, start, end, status, message);
    info!(
        agent = name,
        duration_ms = record.duration_ms,
        %status,
        "agent finished"
    );
    (record, error)
}

fn panicked(name: &str) -> OrchestrationError {
    OrchestrationError::AgentExecution {
        agent: name.to_string(),
        error: anyhow!(PANICKED),
    }
}

/// Keep the first error reported for a group; later ones are dropped.
fn note_error(slot: &Mutex<Option<OrchestrationError>>, err: OrchestrationError) {
    let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if guard.is_none() {
        *guard = Some(err);
    }
}
