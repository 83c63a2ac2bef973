//! Name → constructor registry for agents.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::{Agent, AgentServices, BuiltinAgent, BuiltinKind};
use crate::error::RegistryError;

/// Builds a fresh agent instance. Must be cheap and free of side effects:
/// `Registry::list` calls it once per entry just to read capabilities.
pub type Constructor = Arc<dyn Fn() -> Box<dyn Agent> + Send + Sync>;

/// Listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInfo {
    pub name: String,
    pub capabilities: Vec<String>,
}

/// Thread-safe agent registry: many readers, one writer.
#[derive(Default)]
pub struct Registry {
    entries: RwLock<HashMap<String, Constructor>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the four built-in agents.
    pub fn with_builtins(services: AgentServices) -> Result<Self, RegistryError> {
        let registry = Self::new();
        register_builtins(&registry, services)?;
        Ok(registry)
    }

    pub fn register<F>(&self, name: &str, ctor: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Box<dyn Agent> + Send + Sync + 'static,
    {
        if name.is_empty() {
            return Err(RegistryError::InvalidName);
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        entries.insert(name.to_string(), Arc::new(ctor));
        debug!(agent = name, "agent registered");
        Ok(())
    }

    /// Construct a fresh instance of `name`, or `None` if it is not registered.
    ///
    /// The constructor runs outside the lock.
    pub fn instantiate(&self, name: &str) -> Option<Box<dyn Agent>> {
        let ctor = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            entries.get(name).cloned()
        }?;
        Some(ctor())
    }

    pub fn contains(&self, name: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(name)
    }

    /// Registered agents sorted by name, with capabilities from a throwaway instance.
    pub fn list(&self) -> Vec<AgentInfo> {
        let mut snapshot: Vec<(String, Constructor)> = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            entries
                .iter()
                .map(|(name, ctor)| (name.clone(), Arc::clone(ctor)))
                .collect()
        };
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
            .into_iter()
            .map(|(name, ctor)| AgentInfo {
                capabilities: ctor().capabilities(),
                name,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Register the built-in agents under their canonical names.
///
/// Called once by the owning process; nothing is registered implicitly.
pub fn register_builtins(
    registry: &Registry,
    services: AgentServices,
) -> Result<(), RegistryError> {
    for kind in BuiltinKind::ALL {
        let services = services.clone();
        registry.register(kind.name(), move || {
            Box::new(BuiltinAgent::new(kind, services.clone())) as Box<dyn Agent>
        })?;
    }
    Ok(())
}
