//! Stable exit codes for orchestrator CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid invocation, configuration, or unknown orchestration/task.
pub const INVALID: i32 = 1;
/// An orchestration or task operation ran and failed.
pub const FAILED: i32 = 2;
