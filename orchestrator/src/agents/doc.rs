//! Doc: generates documentation for every planned task.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use super::{AgentServices, KEY_DOC_PATHS, planned_tasks};
use crate::core::context::SharedContext;
use crate::io::taskflow::task_doc_path;

pub(super) fn run(services: &AgentServices, ctx: &SharedContext) -> Result<()> {
    let tasks = planned_tasks(ctx);
    if tasks.is_empty() {
        debug!("no planned tasks to document");
        return Ok(());
    }

    let mut paths = Vec::with_capacity(tasks.len());
    for task in &tasks {
        services
            .task_flow
            .doc_generate(task)
            .with_context(|| format!("document task {task}"))?;
        let config = services
            .task_flow
            .task_config(task)
            .with_context(|| format!("load task {task}"))?;
        paths.push(
            task_doc_path(Path::new(&config.working_dir), task)
                .display()
                .to_string(),
        );
    }

    if !paths.is_empty() {
        ctx.set(KEY_DOC_PATHS, paths);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::KEY_PLAN_TASKS;
    use crate::test_support::{FakeTaskFlow, services_with, task_config};
    use std::sync::Arc;

    #[test]
    fn publishes_conventional_doc_paths() {
        let flow = Arc::new(
            FakeTaskFlow::default().with_task("site", task_config("/srv/site", &[])),
        );
        let ctx = SharedContext::new();
        ctx.set(KEY_PLAN_TASKS, vec!["site".to_string()]);

        run(&services_with(flow.clone()), &ctx).expect("doc");
        assert_eq!(
            ctx.get_list(KEY_DOC_PATHS),
            Some(vec!["/srv/site/docs/tasks/site.md".to_string()])
        );
        assert_eq!(flow.calls(), vec!["doc_generate:site", "task_config:site"]);
    }

    #[test]
    fn no_tasks_means_no_side_effects() {
        let flow = Arc::new(FakeTaskFlow::default());
        let ctx = SharedContext::new();
        run(&services_with(flow.clone()), &ctx).expect("doc");
        assert!(flow.calls().is_empty());
        assert!(ctx.is_empty());
    }

    #[test]
    fn fails_on_first_doc_error() {
        let flow = Arc::new(
            FakeTaskFlow::default()
                .with_task("site", task_config("/srv/site", &[]))
                .failing("doc_generate:site"),
        );
        let ctx = SharedContext::new();
        ctx.set(KEY_PLAN_TASKS, vec!["site".to_string(), "api".to_string()]);

        let err = run(&services_with(flow.clone()), &ctx).unwrap_err();
        assert!(err.to_string().contains("document task site"));
        assert_eq!(flow.calls(), vec!["doc_generate:site"]);
        assert!(ctx.get(KEY_DOC_PATHS).is_none());
    }
}
