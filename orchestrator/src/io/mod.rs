//! I/O adapters used by the engine, the agents, and the CLI.

pub mod config;
pub mod filesystem;
pub mod paths;
pub mod process;
pub mod record_store;
pub mod task_store;
pub mod taskflow;
