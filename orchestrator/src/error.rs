//! Error taxonomy surfaced by the registry, agents, and engine.

use thiserror::Error;

/// Registration failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("agent name is required")]
    InvalidName,

    #[error("agent {0} already registered")]
    DuplicateName(String),
}

/// Failures raised by the built-in agents themselves.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("missing outputs: {}", .0.join(", "))]
    MissingOutputs(Vec<String>),
}

/// Errors returned by `OrchestrationEngine::run`.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// The request itself was unusable; nothing ran and nothing was written.
    #[error("{0}")]
    Configuration(&'static str),

    #[error("agent not registered: {0}")]
    AgentNotRegistered(String),

    #[error("agent {agent} failed: {error:#}")]
    AgentExecution { agent: String, error: anyhow::Error },

    #[error("persist orchestration run: {0:#}")]
    Persistence(anyhow::Error),

    /// Execution failed and the run record could not be written either.
    #[error("{execution}\n{persistence}")]
    Joined {
        execution: Box<OrchestrationError>,
        persistence: Box<OrchestrationError>,
    },
}

impl OrchestrationError {
    /// Combine an execution outcome with a persistence outcome without masking either.
    pub fn join(
        execution: Option<OrchestrationError>,
        persistence: Option<OrchestrationError>,
    ) -> Option<OrchestrationError> {
        match (execution, persistence) {
            (Some(execution), Some(persistence)) => Some(OrchestrationError::Joined {
                execution: Box::new(execution),
                persistence: Box::new(persistence),
            }),
            (Some(err), None) | (None, Some(err)) => Some(err),
            (None, None) => None,
        }
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, OrchestrationError::Persistence(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn missing_outputs_message_is_comma_joined() {
        let err = AgentError::MissingOutputs(vec!["/a".to_string(), "/b".to_string()]);
        assert_eq!(err.to_string(), "missing outputs: /a, /b");
    }

    #[test]
    fn join_keeps_both_messages() {
        let joined = OrchestrationError::join(
            Some(OrchestrationError::AgentNotRegistered("Ghost".to_string())),
            Some(OrchestrationError::Persistence(anyhow!("disk full"))),
        )
        .expect("joined error");

        let text = joined.to_string();
        assert!(text.contains("agent not registered: Ghost"));
        assert!(text.contains("disk full"));
        assert!(matches!(joined, OrchestrationError::Joined { .. }));
    }

    #[test]
    fn join_passes_single_errors_through() {
        let only = OrchestrationError::join(
            None,
            Some(OrchestrationError::Persistence(anyhow!("read-only"))),
        )
        .expect("persistence error");
        assert!(only.is_persistence());
        assert!(OrchestrationError::join(None, None).is_none());
    }
}
