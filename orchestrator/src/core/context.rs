//! Shared key/value context threaded through every agent of one run.
//!
//! One reader/writer lock guards the whole map. Groups are small, so per-key
//! locking would buy nothing.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

/// Value stored under a context key.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    Text(String),
    List(Vec<String>),
    Structured(serde_json::Value),
}

impl ContextValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContextValue::Text(text) => Some(text),
            ContextValue::List(_) | ContextValue::Structured(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            ContextValue::List(items) => Some(items),
            ContextValue::Text(_) | ContextValue::Structured(_) => None,
        }
    }

    pub fn as_structured(&self) -> Option<&serde_json::Value> {
        match self {
            ContextValue::Structured(value) => Some(value),
            ContextValue::Text(_) | ContextValue::List(_) => None,
        }
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Text(value)
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Text(value.to_string())
    }
}

impl From<Vec<String>> for ContextValue {
    fn from(value: Vec<String>) -> Self {
        ContextValue::List(value)
    }
}

impl From<serde_json::Value> for ContextValue {
    fn from(value: serde_json::Value) -> Self {
        ContextValue::Structured(value)
    }
}

/// Concurrency-safe context for one orchestration run.
///
/// Backing storage is allocated on the first `set`.
#[derive(Debug, Default)]
pub struct SharedContext {
    entries: RwLock<Option<HashMap<String, ContextValue>>>,
}

impl SharedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<ContextValue>) {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        guard
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<ContextValue> {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().and_then(|map| map.get(key).cloned())
    }

    /// Text value under `key`; `None` when absent or not text.
    pub fn get_text(&self, key: &str) -> Option<String> {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .and_then(|map| map.get(key))
            .and_then(ContextValue::as_text)
            .map(str::to_string)
    }

    /// List value under `key`; `None` when absent or not a list.
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .and_then(|map| map.get(key))
            .and_then(ContextValue::as_list)
            .map(<[String]>::to_vec)
    }

    /// Copy of the text-valued entries; other kinds are skipped.
    pub fn snapshot_strings(&self) -> BTreeMap<String, String> {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let Some(map) = guard.as_ref() else {
            return BTreeMap::new();
        };
        map.iter()
            .filter_map(|(key, value)| value.as_text().map(|text| (key.clone(), text.to_string())))
            .collect()
    }

    pub fn len(&self) -> usize {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
