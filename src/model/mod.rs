//! # Host Graph Model
//!
//! Plain DTOs for the graph the codec moves across a process boundary.
//! These types cross every boundary: graph model ↔ writer ↔ reader ↔ builder.
//!
//! Design rule: no wire types here. The aspect layer translates between
//! these and the exchange format; this module is pure data.

pub mod node;
pub mod edge;
pub mod value;
pub mod property_map;

use serde::{Deserialize, Serialize};

pub use node::{Node, NodeId};
pub use edge::{Edge, EdgeId};
pub use value::Value;
pub use property_map::PropertyMap;

/// Host identifier of one subnetwork under the shared root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkId(pub u64);

impl std::fmt::Display for NetworkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a network-level attribute or declaration lives.
///
/// `Collection` is the shared root that all subnetworks hang off;
/// `Subgraph` is one of those subnetworks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Collection,
    Subgraph(NetworkId),
}

/// Position of a node in a network view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }
}

/// A group (compound) node and its membership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// The node that stands in for the members while collapsed.
    pub node: NodeId,
    pub name: Option<String>,
    pub members: Vec<NodeId>,
    /// Edges with both endpoints among the members.
    pub internal_edges: Vec<EdgeId>,
    /// Edges with exactly one endpoint among the members.
    pub external_edges: Vec<EdgeId>,
    pub collapsed: bool,
}
