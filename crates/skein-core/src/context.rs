use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A batch of key/value writes produced by one node execution.
///
/// Patches are the only way node output reaches the shared context: the
/// executor applies a patch atomically after a successful node run, so a
/// failed attempt can never leave half-written state behind.
pub type ContextPatch = HashMap<String, serde_json::Value>;

/// Run-scoped shared key/value space passed between nodes.
///
/// Keys are strings, values are JSON. Writes append or overwrite; nothing is
/// ever implicitly deleted. The revision counter increments once per applied
/// patch, which gives callers a cheap way to assert that a failed node
/// attempt mutated nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Context {
    data: HashMap<String, serde_json::Value>,
    revision: u64,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context from initial data (revision 0).
    pub fn from_map(data: HashMap<String, serde_json::Value>) -> Self {
        Self { data, revision: 0 }
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Get a value as a string, if it's a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Set a single value. Does not bump the revision; single writes outside
    /// a patch are reserved for run setup.
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// Whether every key in `keys` is present.
    pub fn contains_all(&self, keys: &[String]) -> bool {
        keys.iter().all(|k| self.data.contains_key(k))
    }

    /// Keys from `keys` that are absent, in declaration order.
    pub fn missing_keys(&self, keys: &[String]) -> Vec<String> {
        keys.iter()
            .filter(|k| !self.data.contains_key(*k))
            .cloned()
            .collect()
    }

    /// Apply a patch atomically: every entry lands, revision bumps once.
    /// Empty patches are a no-op.
    pub fn apply(&mut self, patch: &ContextPatch) {
        if patch.is_empty() {
            return;
        }
        for (k, v) in patch {
            self.data.insert(k.clone(), v.clone());
        }
        self.revision += 1;
    }

    /// A read-only projection of the context restricted to `keys`. This is
    /// what a node's step executor gets to see.
    pub fn view(&self, keys: &[String]) -> HashMap<String, serde_json::Value> {
        keys.iter()
            .filter_map(|k| self.data.get(k).map(|v| (k.clone(), v.clone())))
            .collect()
    }

    /// The underlying data map.
    pub fn data(&self) -> &HashMap<String, serde_json::Value> {
        &self.data
    }

    /// Number of patches applied so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}
