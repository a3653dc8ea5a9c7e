//! # Graph Model Trait
//!
//! The contract between the codec and the host graph. Export pulls
//! everything it writes through this trait; import pushes everything it
//! reads back through it.
//!
//! ## Shape of the host graph
//!
//! A root *collection* owns every node and edge. Subnetworks
//! ([`NetworkId`]) each see a subset. Node and edge attributes live either
//! in the shared root table ([`Scope::Collection`]) or in a subnetwork's
//! local table ([`Scope::Subgraph`]); network attributes likewise.
//!
//! ## Implementations
//!
//! | Model | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryGraph` | `memory` | In-memory, for tests and embedding |

pub mod memory;

use crate::aspect::OpaqueElement;
use crate::model::*;
use crate::schema::{AttributeDeclarations, OwnerKind};
use crate::types::AttributeType;
use crate::Result;

pub use memory::MemoryGraph;

// ============================================================================
// GraphModel Trait
// ============================================================================

/// The host graph as the codec sees it.
///
/// Methods take `&self`; implementations use interior mutability. Lookups
/// of unknown IDs fail with `Error::NotFound`.
pub trait GraphModel: Send + Sync {
    // ========================================================================
    // Networks
    // ========================================================================

    /// Every subnetwork, in creation order.
    fn networks(&self) -> Vec<NetworkId>;

    /// Create an empty subnetwork under the root.
    fn create_network(&self) -> NetworkId;

    // ========================================================================
    // Nodes and edges
    // ========================================================================

    fn node(&self, id: NodeId) -> Result<Node>;

    fn edge(&self, id: EdgeId) -> Result<Edge>;

    /// Nodes currently visible in `net`.
    ///
    /// Members of a collapsed group are hidden and the group node shown in
    /// their place; an expanded group shows its members and hides the group
    /// node.
    fn nodes(&self, net: NetworkId) -> Result<Vec<Node>>;

    /// Edges currently visible in `net`: both endpoints visible.
    fn edges(&self, net: NetworkId) -> Result<Vec<Edge>>;

    /// Create a node in the root with shared attributes `props`.
    fn create_node(&self, props: PropertyMap) -> Result<NodeId>;

    /// Create an edge in the root. Both endpoints must exist.
    fn create_edge(
        &self,
        src: NodeId,
        dst: NodeId,
        interaction: Option<&str>,
        props: PropertyMap,
    ) -> Result<EdgeId>;

    /// Make an existing node part of `net`.
    fn add_node(&self, net: NetworkId, node: NodeId) -> Result<()>;

    /// Make an existing edge part of `net`. Its endpoints are added too.
    fn add_edge(&self, net: NetworkId, edge: EdgeId) -> Result<()>;

    /// Remember the wire ID a node was imported with.
    fn set_node_wire_id(&self, node: NodeId, wire: u64) -> Result<()>;

    fn set_edge_wire_id(&self, edge: EdgeId, wire: u64) -> Result<()>;

    // ========================================================================
    // Attributes
    // ========================================================================

    fn node_attributes(&self, scope: Scope, node: NodeId) -> Result<PropertyMap>;

    /// Set a node attribute. An undeclared name is declared with the type of
    /// `value`; a declared one must match its declaration.
    fn set_node_attribute(&self, scope: Scope, node: NodeId, name: &str, value: Value) -> Result<()>;

    fn edge_attributes(&self, scope: Scope, edge: EdgeId) -> Result<PropertyMap>;

    fn set_edge_attribute(&self, scope: Scope, edge: EdgeId, name: &str, value: Value) -> Result<()>;

    fn network_attributes(&self, scope: Scope) -> Result<PropertyMap>;

    fn set_network_attribute(&self, scope: Scope, name: &str, value: Value) -> Result<()>;

    /// Snapshot of the column declarations of all three tables.
    fn declarations(&self) -> AttributeDeclarations;

    /// Declare a column. Redeclaring with the same type is a no-op.
    fn declare(&self, owner: OwnerKind, name: &str, ty: AttributeType) -> Result<()>;

    // ========================================================================
    // Layout
    // ========================================================================

    fn position(&self, net: NetworkId, node: NodeId) -> Option<Position>;

    fn set_position(&self, net: NetworkId, node: NodeId, position: Position) -> Result<()>;

    // ========================================================================
    // Groups
    // ========================================================================

    /// Groups of `net`, with membership as recorded at creation.
    fn groups(&self, net: NetworkId) -> Result<Vec<Group>>;

    /// Create an expanded group over `members`.
    ///
    /// With `node == None` a fresh group node is created. Internal and
    /// external edges are taken from the edges of `net` at this moment.
    fn create_group(
        &self,
        net: NetworkId,
        node: Option<NodeId>,
        name: Option<&str>,
        members: &[NodeId],
    ) -> Result<NodeId>;

    fn expand_group(&self, net: NetworkId, group: NodeId) -> Result<()>;

    fn collapse_group(&self, net: NetworkId, group: NodeId) -> Result<()>;

    // ========================================================================
    // Opaque aspects
    // ========================================================================

    /// Elements of aspects the codec does not interpret, as kept by an
    /// earlier import. Returned in the order they were added.
    fn opaque_elements(&self) -> Vec<OpaqueElement>;

    fn add_opaque_element(&self, element: OpaqueElement);

    // ========================================================================
    // Provided
    // ========================================================================

    /// Node attributes as one subnetwork sees them: shared values overlaid
    /// with that subnetwork's local values.
    fn effective_node_attributes(&self, net: NetworkId, node: NodeId) -> Result<PropertyMap> {
        let mut props = self.node_attributes(Scope::Collection, node)?;
        props.extend(self.node_attributes(Scope::Subgraph(net), node)?);
        Ok(props)
    }

    fn effective_edge_attributes(&self, net: NetworkId, edge: EdgeId) -> Result<PropertyMap> {
        let mut props = self.edge_attributes(Scope::Collection, edge)?;
        props.extend(self.edge_attributes(Scope::Subgraph(net), edge)?);
        Ok(props)
    }

    /// Groups of `net` that are currently collapsed.
    fn collapsed_groups(&self, net: NetworkId) -> Result<Vec<NodeId>> {
        Ok(self
            .groups(net)?
            .into_iter()
            .filter(|g| g.collapsed)
            .map(|g| g.node)
            .collect())
    }
}
