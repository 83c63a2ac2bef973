//! Reviewer: checks that every published build output exists.

use std::path::Path;

use anyhow::Result;
use tracing::{debug, warn};

use super::{AgentServices, KEY_BUILD_OUTPUTS, KEY_REVIEW_REPORT, KEY_REVIEW_STATUS};
use crate::core::context::SharedContext;
use crate::error::AgentError;

pub(super) fn run(services: &AgentServices, ctx: &SharedContext) -> Result<()> {
    let outputs = ctx.get_list(KEY_BUILD_OUTPUTS).unwrap_or_default();
    if outputs.is_empty() {
        debug!("no build outputs to review");
        ctx.set(KEY_REVIEW_STATUS, "skipped");
        ctx.set(KEY_REVIEW_REPORT, "no outputs to review");
        return Ok(());
    }

    let missing: Vec<String> = outputs
        .into_iter()
        .filter(|output| !services.filesystem.exists(Path::new(output)))
        .collect();

    if missing.is_empty() {
        ctx.set(KEY_REVIEW_STATUS, "passed");
        ctx.set(KEY_REVIEW_REPORT, "all outputs present");
        return Ok(());
    }

    let err = AgentError::MissingOutputs(missing);
    warn!(report = %err, "review failed");
    ctx.set(KEY_REVIEW_STATUS, "failed");
    ctx.set(KEY_REVIEW_REPORT, err.to_string());
    Err(err.into())
}
