//! Builder: runs every planned task and publishes their outputs.

use anyhow::{Context, Result};
use tracing::debug;

use super::{AgentServices, KEY_BUILD_OUTPUTS, planned_tasks};
use crate::core::context::SharedContext;
use crate::io::taskflow::resolved_outputs;

pub(super) fn run(services: &AgentServices, ctx: &SharedContext) -> Result<()> {
    let tasks = planned_tasks(ctx);
    if tasks.is_empty() {
        debug!("no planned tasks to build");
        return Ok(());
    }

    let mut outputs = Vec::new();
    for task in &tasks {
        services
            .task_flow
            .build_run(task)
            .with_context(|| format!("build task {task}"))?;
        let config = services
            .task_flow
            .task_config(task)
            .with_context(|| format!("load task {task}"))?;
        outputs.extend(
            resolved_outputs(&config)
                .into_iter()
                .map(|path| path.display().to_string()),
        );
    }

    if !outputs.is_empty() {
        ctx.set(KEY_BUILD_OUTPUTS, outputs);
    }
    Ok(())
}
