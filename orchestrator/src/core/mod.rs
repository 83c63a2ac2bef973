//! Deterministic, in-memory building blocks of an orchestration run.
//!
//! Nothing in here touches the filesystem or spawns processes: record shapes,
//! step plans, and the shared context are plain data plus locking.

pub mod context;
pub mod plan;
pub mod types;
