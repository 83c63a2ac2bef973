//! Agent orchestration CLI.
//!
//! Lists the built-in agents and configured orchestrations, runs an
//! orchestration through the engine, and exposes the task-flow operations the
//! agents delegate to.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use orchestrator::agents::registry::{AgentInfo, Registry};
use orchestrator::agents::{AgentServices, KEY_GOAL, KEY_TASK_NAME};
use orchestrator::core::context::SharedContext;
use orchestrator::core::types::OrchestrationRunRecord;
use orchestrator::engine::OrchestrationEngine;
use orchestrator::exit_codes;
use orchestrator::io::config::{Config, OrchestrationConfig, TaskConfig, load_config};
use orchestrator::io::paths::{default_config_path, default_state_dir};
use orchestrator::io::record_store::{list_orchestration_runs, read_orchestration_run};
use orchestrator::io::task_store::{read_task, resolve_task_status};
use orchestrator::io::taskflow::{LocalTaskFlow, TaskFlow, task_doc_path};
use orchestrator::logging;

#[derive(Parser)]
#[command(
    name = "orchestrator",
    version,
    about = "Run agent orchestrations over configured tasks"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory for task state and run records.
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered agents and their capabilities.
    Agents,
    /// List, run, and inspect orchestrations.
    Orchestration {
        #[command(subcommand)]
        command: OrchestrationCommand,
    },
    /// Operate on a single configured task.
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },
}

#[derive(Subcommand)]
enum OrchestrationCommand {
    List,
    /// Run the named orchestration once.
    Run {
        name: String,
        /// High-level goal published to the agents.
        #[arg(long)]
        goal: Option<String>,
        /// Task to act on (defaults to the task named like the orchestration).
        #[arg(long)]
        task: Option<String>,
    },
    /// Show persisted runs, oldest first.
    History { name: String },
}

#[derive(Subcommand)]
enum TaskCommand {
    List,
    Plan { name: String },
    Build { name: String },
    Doc { name: String },
    Status { name: String },
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                exit_codes::INVALID
            } else {
                exit_codes::OK
            };
            let _ = err.print();
            return exit_code(code);
        }
    };

    let mut stdout = io::stdout().lock();
    match run(cli, &mut stdout) {
        Ok(code) => exit_code(code),
        Err(err) => {
            eprintln!("{err:#}");
            exit_code(exit_codes::INVALID)
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

/// Dispatch a parsed command.
///
/// `Err` means the request itself was unusable; operations that ran and
/// failed report on stderr and return [`exit_codes::FAILED`].
fn run(cli: Cli, out: &mut impl Write) -> Result<i32> {
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = load_config(&config_path)?;
    logging::init(&config.logging.level);
    let state_dir = cli.state_dir.unwrap_or_else(default_state_dir);
    let config = Arc::new(config);

    match cli.command {
        Command::Agents => {
            let registry = builtin_registry(&config, &state_dir)?;
            write_agents(out, &registry.list())?;
            Ok(exit_codes::OK)
        }
        Command::Orchestration { command } => match command {
            OrchestrationCommand::List => {
                write_orchestrations(out, &config.orchestrations)?;
                Ok(exit_codes::OK)
            }
            OrchestrationCommand::Run { name, goal, task } => {
                cmd_orchestration_run(out, &config, &state_dir, &name, goal, task)
            }
            OrchestrationCommand::History { name } => {
                cmd_orchestration_history(out, &config, &state_dir, &name)
            }
        },
        Command::Task { command } => cmd_task(out, &config, &state_dir, command),
    }
}

fn builtin_registry(config: &Arc<Config>, state_dir: &Path) -> Result<Registry> {
    let flow = LocalTaskFlow::new(Arc::clone(config), state_dir);
    Registry::with_builtins(AgentServices::local(Arc::new(flow)))
        .context("register built-in agents")
}

fn cmd_orchestration_run(
    out: &mut impl Write,
    config: &Arc<Config>,
    state_dir: &Path,
    name: &str,
    goal: Option<String>,
    task: Option<String>,
) -> Result<i32> {
    let orchestration = config
        .orchestrations
        .get(name)
        .with_context(|| format!("unknown orchestration: {name}"))?;
    let plan = orchestration.plan();
    if plan.is_empty() {
        bail!("orchestration {name} has no agents");
    }

    let ctx = seed_context(config, name, goal, task);
    let registry = builtin_registry(config, state_dir)?;
    let outcome = OrchestrationEngine::new(&registry).execute(name, &plan, state_dir, &ctx)?;

    writeln!(
        out,
        "orchestration={name} status={} agents={}",
        outcome.record.status,
        outcome.record.agents.len()
    )?;
    match outcome.error {
        Some(err) => {
            write_failures(&mut io::stderr().lock(), &outcome.record)?;
            eprintln!("{err}");
            Ok(exit_codes::FAILED)
        }
        None => Ok(exit_codes::OK),
    }
}

/// Initial context: the goal plus the target task, defaulting to the task
/// named like the orchestration.
fn seed_context(
    config: &Config,
    orchestration: &str,
    goal: Option<String>,
    task: Option<String>,
) -> SharedContext {
    let ctx = SharedContext::new();
    if let Some(goal) = goal.filter(|goal| !goal.is_empty()) {
        ctx.set(KEY_GOAL, goal);
    }
    let task = task
        .filter(|task| !task.is_empty())
        .or_else(|| {
            config
                .tasks
                .contains_key(orchestration)
                .then(|| orchestration.to_string())
        });
    if let Some(task) = task {
        ctx.set(KEY_TASK_NAME, task);
    }
    ctx
}

fn cmd_orchestration_history(
    out: &mut impl Write,
    config: &Config,
    state_dir: &Path,
    name: &str,
) -> Result<i32> {
    if !config.orchestrations.contains_key(name) {
        bail!("unknown orchestration: {name}");
    }
    let mut records = Vec::new();
    for path in list_orchestration_runs(state_dir, name)? {
        records.push(read_orchestration_run(&path)?);
    }
    write_history(out, name, &records)?;
    Ok(exit_codes::OK)
}

fn cmd_task(
    out: &mut impl Write,
    config: &Arc<Config>,
    state_dir: &Path,
    command: TaskCommand,
) -> Result<i32> {
    let flow = LocalTaskFlow::new(Arc::clone(config), state_dir);
    match command {
        TaskCommand::List => {
            write_tasks(out, &config.tasks, |name, task| {
                resolve_task_status(state_dir, name, task)
            })?;
            Ok(exit_codes::OK)
        }
        TaskCommand::Plan { name } => {
            config.task(&name)?;
            task_operation(out, flow.plan_create(&name), || {
                format!("task={name} status={}", current_status(config, state_dir, &name))
            })
        }
        TaskCommand::Build { name } => {
            config.task(&name)?;
            let result = flow.build_run(&name);
            let status = current_status(config, state_dir, &name);
            writeln!(out, "task={name} status={status}")?;
            report(result)
        }
        TaskCommand::Doc { name } => {
            let task = config.task(&name)?;
            let doc = task_doc_path(Path::new(&task.working_dir), &name);
            task_operation(out, flow.doc_generate(&name), || {
                format!(
                    "task={name} status={} doc={}",
                    current_status(config, state_dir, &name),
                    doc.display()
                )
            })
        }
        TaskCommand::Status { name } => {
            config.task(&name)?;
            let record = read_task(state_dir, &name)
                .with_context(|| format!("task not initialized: {name}"))?;
            writeln!(out, "{name} status={} last_run={}", record.status, record.last_run)?;
            Ok(exit_codes::OK)
        }
    }
}

fn current_status(config: &Config, state_dir: &Path, name: &str) -> String {
    match config.tasks.get(name) {
        Some(task) => resolve_task_status(state_dir, name, task),
        None => String::new(),
    }
}

/// Print `summary` on success, then map the result to an exit code.
fn task_operation(
    out: &mut impl Write,
    result: Result<()>,
    summary: impl FnOnce() -> String,
) -> Result<i32> {
    if result.is_ok() {
        writeln!(out, "{}", summary())?;
    }
    report(result)
}

fn report(result: Result<()>) -> Result<i32> {
    match result {
        Ok(()) => Ok(exit_codes::OK),
        Err(err) => {
            eprintln!("{err:#}");
            Ok(exit_codes::FAILED)
        }
    }
}

fn write_agents(out: &mut impl Write, agents: &[AgentInfo]) -> io::Result<()> {
    if agents.is_empty() {
        return writeln!(out, "no agents registered");
    }
    writeln!(out, "available agents:")?;
    for agent in agents {
        writeln!(out, "- {}: {}", agent.name, agent.capabilities.join("; "))?;
    }
    Ok(())
}

fn write_orchestrations(
    out: &mut impl Write,
    orchestrations: &BTreeMap<String, OrchestrationConfig>,
) -> io::Result<()> {
    if orchestrations.is_empty() {
        return writeln!(out, "no orchestrations configured");
    }
    writeln!(out, "available orchestrations:")?;
    for (name, orchestration) in orchestrations {
        let description = if orchestration.description.is_empty() {
            "(no description)"
        } else {
            orchestration.description.as_str()
        };
        writeln!(out, "- {name}: {description}")?;
    }
    Ok(())
}

fn write_failures(out: &mut impl Write, record: &OrchestrationRunRecord) -> io::Result<()> {
    for agent in record.failed_agents() {
        writeln!(
            out,
            "failed agent={} message={}",
            agent.name,
            agent.message.as_deref().unwrap_or("")
        )?;
    }
    Ok(())
}

fn write_history(
    out: &mut impl Write,
    name: &str,
    records: &[OrchestrationRunRecord],
) -> io::Result<()> {
    if records.is_empty() {
        return writeln!(out, "no runs recorded for {name}");
    }
    for record in records {
        writeln!(
            out,
            "{} status={} duration_ms={} agents={}",
            record.start_time,
            record.status,
            record.duration_ms,
            record.agents.len()
        )?;
    }
    Ok(())
}

fn write_tasks(
    out: &mut impl Write,
    tasks: &BTreeMap<String, TaskConfig>,
    status: impl Fn(&str, &TaskConfig) -> String,
) -> io::Result<()> {
    if tasks.is_empty() {
        return writeln!(out, "no tasks configured");
    }
    for (name, task) in tasks {
        let line = if task.description.is_empty() {
            name.clone()
        } else {
            format!("{name} - {}", task.description)
        };
        writeln!(out, "{line} [{}]", status(name, task))?;
    }
    Ok(())
}
