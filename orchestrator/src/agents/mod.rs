//! Agents: named, stateless units of work run against the shared context.
//!
//! Every agent implements [`Agent`]. The built-in set is the closed
//! [`BuiltinKind`] enum; tests and embedders may register their own
//! implementations next to it.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;

use crate::core::context::SharedContext;
use crate::io::filesystem::{Filesystem, LocalFilesystem};
use crate::io::taskflow::TaskFlow;

pub mod builder;
pub mod doc;
pub mod planner;
pub mod registry;
pub mod reviewer;

pub const KEY_GOAL: &str = "goal";
pub const KEY_TASK_NAME: &str = "task.name";
pub const KEY_PLAN_GOAL: &str = "plan.goal";
pub const KEY_PLAN_TASKS: &str = "plan.tasks";
pub const KEY_BUILD_OUTPUTS: &str = "build.outputs";
pub const KEY_REVIEW_STATUS: &str = "review.status";
pub const KEY_REVIEW_REPORT: &str = "review.report";
pub const KEY_DOC_PATHS: &str = "doc.paths";

/// Capability interface shared by every agent.
///
/// Implementations are constructed fresh per registry lookup and must not
/// carry state between runs. `Send` lets the engine move an instance onto a
/// worker thread for parallel groups.
pub trait Agent: Send {
    fn name(&self) -> &str;

    /// Human-readable capability strings, in display order.
    fn capabilities(&self) -> Vec<String>;

    fn execute(&self, ctx: &SharedContext) -> Result<()>;
}

/// Collaborators the built-in agents delegate to.
#[derive(Clone)]
pub struct AgentServices {
    pub task_flow: Arc<dyn TaskFlow>,
    pub filesystem: Arc<dyn Filesystem>,
}

impl AgentServices {
    pub fn new(task_flow: Arc<dyn TaskFlow>, filesystem: Arc<dyn Filesystem>) -> Self {
        Self {
            task_flow,
            filesystem,
        }
    }

    /// Services backed by `task_flow` and the local filesystem.
    pub fn local(task_flow: Arc<dyn TaskFlow>) -> Self {
        Self::new(task_flow, Arc::new(LocalFilesystem))
    }
}

impl fmt::Debug for AgentServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentServices").finish_non_exhaustive()
    }
}

/// The built-in agent variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinKind {
    Planner,
    Builder,
    Reviewer,
    Doc,
}

impl BuiltinKind {
    pub const ALL: [BuiltinKind; 4] = [
        BuiltinKind::Planner,
        BuiltinKind::Builder,
        BuiltinKind::Reviewer,
        BuiltinKind::Doc,
    ];

    /// Registry name.
    pub fn name(self) -> &'static str {
        match self {
            BuiltinKind::Planner => "Planner",
            BuiltinKind::Builder => "Builder",
            BuiltinKind::Reviewer => "Reviewer",
            BuiltinKind::Doc => "Doc",
        }
    }

    pub fn capability(self) -> &'static str {
        match self {
            BuiltinKind::Planner => "Create a structured task plan from a goal",
            BuiltinKind::Builder => "Execute planned tasks to produce outputs",
            BuiltinKind::Reviewer => "Review outputs for quality and correctness",
            BuiltinKind::Doc => "Document results and outcomes",
        }
    }
}

/// A built-in agent bound to its collaborators.
#[derive(Debug, Clone)]
pub struct BuiltinAgent {
    kind: BuiltinKind,
    services: AgentServices,
}

impl BuiltinAgent {
    pub fn new(kind: BuiltinKind, services: AgentServices) -> Self {
        Self { kind, services }
    }

    pub fn kind(&self) -> BuiltinKind {
        self.kind
    }
}

impl Agent for BuiltinAgent {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn capabilities(&self) -> Vec<String> {
        vec![self.kind.capability().to_string()]
    }

    fn execute(&self, ctx: &SharedContext) -> Result<()> {
        match self.kind {
            BuiltinKind::Planner => planner::run(&self.services, ctx),
            BuiltinKind::Builder => builder::run(&self.services, ctx),
            BuiltinKind::Reviewer => reviewer::run(&self.services, ctx),
            BuiltinKind::Doc => doc::run(&self.services, ctx),
        }
    }
}

/// Task names to act on: `plan.tasks` if present, else a lone `task.name`.
pub(crate) fn planned_tasks(ctx: &SharedContext) -> Vec<String> {
    if let Some(tasks) = ctx.get_list(KEY_PLAN_TASKS) {
        return tasks;
    }
    match ctx.get_text(KEY_TASK_NAME) {
        Some(name) if !name.is_empty() => vec![name],
        _ => Vec::new(),
    }
}
