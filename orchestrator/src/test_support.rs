//! Test doubles for agents, task flows, and the filesystem.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};

use crate::agents::registry::Registry;
use crate::agents::{Agent, AgentServices};
use crate::core::context::SharedContext;
use crate::error::RegistryError;
use crate::io::config::TaskConfig;
use crate::io::filesystem::Filesystem;
use crate::io::taskflow::TaskFlow;

/// Scriptable agent. Clones share one invocation counter.
#[derive(Debug, Clone)]
pub struct StubAgent {
    name: String,
    capabilities: Vec<String>,
    writes: Vec<(String, String)>,
    observe: Option<(String, Arc<Mutex<Vec<Option<String>>>>)>,
    fail: Option<String>,
    panic: bool,
    delay: Option<Duration>,
    invocations: Arc<AtomicUsize>,
}

impl StubAgent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            capabilities: Vec::new(),
            writes: Vec::new(),
            observe: None,
            fail: None,
            panic: false,
            delay: None,
            invocations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_capabilities(mut self, capabilities: &[&str]) -> Self {
        self.capabilities = capabilities.iter().map(|cap| cap.to_string()).collect();
        self
    }

    /// Set `key` to `value` on every run, before any failure.
    pub fn writing(mut self, key: &str, value: &str) -> Self {
        self.writes.push((key.to_string(), value.to_string()));
        self
    }

    /// Record the text value of `key` seen at the start of every run.
    pub fn observing(mut self, key: &str, sink: Arc<Mutex<Vec<Option<String>>>>) -> Self {
        self.observe = Some((key.to_string(), sink));
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.fail = Some(message.to_string());
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic = true;
        self
    }

    pub fn sleeping(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared handle on the number of `execute` calls.
    pub fn invocations(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.invocations)
    }

    /// Constructor returning a fresh clone per call.
    pub fn constructor(self) -> impl Fn() -> Box<dyn Agent> + Send + Sync + 'static {
        move || Box::new(self.clone()) as Box<dyn Agent>
    }

    /// Register under the stub's own name.
    pub fn register(self, registry: &Registry) -> Result<(), RegistryError> {
        let name = self.name.clone();
        registry.register(&name, self.constructor())
    }
}

impl Agent for StubAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Vec<String> {
        self.capabilities.clone()
    }

    fn execute(&self, ctx: &SharedContext) -> Result<()> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if let Some((key, sink)) = &self.observe {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(ctx.get_text(key));
        }
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        for (key, value) in &self.writes {
            ctx.set(key.as_str(), value.as_str());
        }
        if self.panic {
            panic!("stub agent {} panicked", self.name);
        }
        match &self.fail {
            Some(message) => bail!("{message}"),
            None => Ok(()),
        }
    }
}

/// Task flow that records calls as `"<operation>:<task>"`.
#[derive(Debug, Default)]
pub struct FakeTaskFlow {
    tasks: HashMap<String, TaskConfig>,
    failures: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeTaskFlow {
    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.tasks.insert(name.to_string(), task);
        self
    }

    /// Make the call recorded as `call` (e.g. `"build_run:site"`) fail.
    pub fn failing(mut self, call: &str) -> Self {
        self.failures.insert(call.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, operation: &str, task: &str) -> Result<()> {
        let call = format!("{operation}:{task}");
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call.clone());
        if self.failures.contains(&call) {
            bail!("{call} failed");
        }
        Ok(())
    }
}

impl TaskFlow for FakeTaskFlow {
    fn plan_create(&self, task: &str) -> Result<()> {
        self.record("plan_create", task)
    }

    fn build_run(&self, task: &str) -> Result<()> {
        self.record("build_run", task)
    }

    fn doc_generate(&self, task: &str) -> Result<()> {
        self.record("doc_generate", task)
    }

    fn task_config(&self, task: &str) -> Result<TaskConfig> {
        self.record("task_config", task)?;
        self.tasks
            .get(task)
            .cloned()
            .ok_or_else(|| anyhow!("unknown task: {task}"))
    }
}

/// Filesystem where exactly the given paths exist.
#[derive(Debug, Default)]
pub struct FakeFilesystem {
    existing: HashSet<PathBuf>,
}

impl FakeFilesystem {
    pub fn with_paths(paths: &[&str]) -> Self {
        Self {
            existing: paths.iter().map(PathBuf::from).collect(),
        }
    }
}

impl Filesystem for FakeFilesystem {
    fn exists(&self, path: &Path) -> bool {
        self.existing.contains(path)
    }
}

/// Services over `flow` and an empty fake filesystem.
pub fn services_with(flow: Arc<FakeTaskFlow>) -> AgentServices {
    AgentServices::new(flow, Arc::new(FakeFilesystem::default()))
}

/// Minimal valid task rooted at `working_dir`.
pub fn task_config(working_dir: &str, outputs: &[&str]) -> TaskConfig {
    TaskConfig {
        working_dir: working_dir.to_string(),
        command: vec!["true".to_string()],
        outputs: outputs.iter().map(|output| output.to_string()).collect(),
        ..TaskConfig::default()
    }
}
