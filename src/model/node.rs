//! Node in the host property graph.

use serde::{Deserialize, Serialize};
use super::{PropertyMap, Value};

/// Host-assigned node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node in the host graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Wire identifier this node was imported with, if any. Re-exports that
    /// opt into wire IDs reuse it so round-tripped documents stay stable.
    pub wire_id: Option<u64>,
    pub properties: PropertyMap,
}

impl Node {
    /// The `name` attribute, when it is a string.
    pub fn name(&self) -> Option<&str> {
        self.properties.get("name").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}
