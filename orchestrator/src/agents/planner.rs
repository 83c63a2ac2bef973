//! Planner: turns the goal and target task into a task plan.

use anyhow::{Context, Result};
use tracing::debug;

use super::{AgentServices, KEY_GOAL, KEY_PLAN_GOAL, KEY_PLAN_TASKS, KEY_TASK_NAME};
use crate::core::context::SharedContext;

pub(super) fn run(services: &AgentServices, ctx: &SharedContext) -> Result<()> {
    if let Some(goal) = ctx.get_text(KEY_GOAL) {
        ctx.set(KEY_PLAN_GOAL, goal);
    }

    let task = match ctx.get_text(KEY_TASK_NAME) {
        Some(task) if !task.is_empty() => task,
        _ => {
            debug!("no target task, publishing empty plan");
            ctx.set(KEY_PLAN_TASKS, Vec::<String>::new());
            return Ok(());
        }
    };

    ctx.set(KEY_PLAN_TASKS, vec![task.clone()]);
    services
        .task_flow
        .plan_create(&task)
        .with_context(|| format!("plan task {task}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeTaskFlow, services_with};
    use std::sync::Arc;

    #[test]
    fn without_task_publishes_empty_plan() {
        let flow = Arc::new(FakeTaskFlow::default());
        let ctx = SharedContext::new();
        ctx.set(KEY_GOAL, "ship the site");

        run(&services_with(flow.clone()), &ctx).expect("plan");
        assert_eq!(ctx.get_text(KEY_PLAN_GOAL).as_deref(), Some("ship the site"));
        assert_eq!(ctx.get_list(KEY_PLAN_TASKS), Some(Vec::new()));
        assert!(flow.calls().is_empty());
    }

    #[test]
    fn with_task_plans_it() {
        let flow = Arc::new(FakeTaskFlow::default());
        let ctx = SharedContext::new();
        ctx.set(KEY_TASK_NAME, "site");

        run(&services_with(flow.clone()), &ctx).expect("plan");
        assert_eq!(ctx.get_list(KEY_PLAN_TASKS), Some(vec!["site".to_string()]));
        assert_eq!(ctx.get_text(KEY_PLAN_GOAL), None);
        assert_eq!(flow.calls(), vec!["plan_create:site"]);
    }

    #[test]
    fn surfaces_plan_failure() {
        let flow = Arc::new(FakeTaskFlow::default().failing("plan_create:site"));
        let ctx = SharedContext::new();
        ctx.set(KEY_TASK_NAME, "site");

        let err = run(&services_with(flow), &ctx).unwrap_err();
        assert!(format!("{err:#}").contains("plan task site"));
        assert_eq!(ctx.get_list(KEY_PLAN_TASKS), Some(vec!["site".to_string()]));
    }
}
