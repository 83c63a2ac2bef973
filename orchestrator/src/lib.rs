//! Agent orchestration engine.
//!
//! Runs named, stateless agents according to a step plan: groups execute in
//! order, members of one group execute concurrently behind a join barrier, and
//! every run leaves a JSON record under the state directory.
//!
//! - **[`core`]**: Pure, in-memory logic (run records, step plans, shared context).
//! - **[`io`]**: Side-effecting adapters (config, record and task stores, child processes).
//! - **[`agents`]**: The [`agents::Agent`] interface, the registry, and the built-in agents.
//! - **[`engine`]**: Coordinates the above for a single orchestration run.

pub mod agents;
pub mod core;
pub mod engine;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
