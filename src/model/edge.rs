//! Edge in the host property graph.

use serde::{Deserialize, Serialize};
use super::{NodeId, PropertyMap};

/// Host-assigned edge identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directed edge in the host graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    /// Wire identifier this edge was imported with, if any.
    pub wire_id: Option<u64>,
    pub src: NodeId,
    pub dst: NodeId,
    pub interaction: Option<String>,
    pub properties: PropertyMap,
}

impl Edge {
    /// True when both endpoints are in `nodes`.
    pub fn is_within(&self, nodes: &[NodeId]) -> bool {
        nodes.contains(&self.src) && nodes.contains(&self.dst)
    }

    /// True when exactly one endpoint is in `nodes`.
    pub fn crosses(&self, nodes: &[NodeId]) -> bool {
        nodes.contains(&self.src) != nodes.contains(&self.dst)
    }
}
