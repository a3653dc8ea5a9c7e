//! In-memory graph model.
//!
//! This is the reference implementation of `GraphModel`.
//! It keeps ordered maps protected by `parking_lot::RwLock`.
//!
//! ## Limitations
//!
//! - **Per-collection locks**: multi-step mutations such as `create_group`
//!   are not atomic. Safe for single-threaded or read-heavy use.
//! - **Flat groups**: nested groups are not tracked; each group only hides
//!   or shows its own members.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;

use super::GraphModel;
use crate::aspect::OpaqueElement;
use crate::model::*;
use crate::schema::{AttributeDeclarations, OwnerKind};
use crate::types::{self, AttributeType};
use crate::{Error, Result};

// ============================================================================
// MemoryGraph
// ============================================================================

/// In-memory host graph with subnetworks, local tables and groups.
#[derive(Clone)]
pub struct MemoryGraph {
    inner: Arc<GraphInner>,
}

struct GraphInner {
    nodes: RwLock<BTreeMap<NodeId, Node>>,
    edges: RwLock<BTreeMap<EdgeId, Edge>>,
    networks: RwLock<BTreeMap<NetworkId, NetworkState>>,
    root_attributes: RwLock<PropertyMap>,
    declarations: RwLock<AttributeDeclarations>,
    opaque: RwLock<Vec<OpaqueElement>>,
    next_node_id: AtomicU64,
    next_edge_id: AtomicU64,
    next_network_id: AtomicU64,
}

#[derive(Default)]
struct NetworkState {
    nodes: BTreeSet<NodeId>,
    edges: BTreeSet<EdgeId>,
    attributes: PropertyMap,
    local_nodes: HashMap<NodeId, PropertyMap>,
    local_edges: HashMap<EdgeId, PropertyMap>,
    positions: HashMap<NodeId, Position>,
    groups: Vec<Group>,
}

impl NetworkState {
    /// Nodes a group currently keeps out of view.
    fn hidden(&self) -> BTreeSet<NodeId> {
        let mut hidden = BTreeSet::new();
        for group in &self.groups {
            if group.collapsed {
                hidden.extend(group.members.iter().copied());
            } else {
                hidden.insert(group.node);
            }
        }
        hidden
    }

    fn group_mut(&mut self, node: NodeId) -> Result<&mut Group> {
        self.groups
            .iter_mut()
            .find(|g| g.node == node)
            .ok_or_else(|| Error::NotFound(format!("Group {node}")))
    }
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GraphInner {
                nodes: RwLock::new(BTreeMap::new()),
                edges: RwLock::new(BTreeMap::new()),
                networks: RwLock::new(BTreeMap::new()),
                root_attributes: RwLock::new(PropertyMap::new()),
                declarations: RwLock::new(AttributeDeclarations::new()),
                opaque: RwLock::new(Vec::new()),
                next_node_id: AtomicU64::new(1),
                next_edge_id: AtomicU64::new(1),
                next_network_id: AtomicU64::new(1),
            }),
        }
    }

    /// Declare `name` from `value` if it is new, otherwise check `value`
    /// against the existing declaration.
    ///
    /// Lists must hold scalars of a single kind.
    fn admit(&self, owner: OwnerKind, name: &str, value: &Value) -> Result<()> {
        let inferred = value.attribute_type();
        if !inferred.admits(value) {
            return Err(Error::TypeError(format!(
                "{} column '{name}' cannot hold {}",
                owner.table_name(),
                types::describe(value)
            )));
        }
        let mut decls = self.inner.declarations.write();
        match decls.get(owner, name) {
            Some(decl) if decl.single_valued == value.is_list() || !decl.ty.admits(value) => {
                Err(Error::TypeError(format!(
                    "{} column '{name}' is {} but value is {}",
                    owner.table_name(),
                    decl.ty,
                    types::describe(value)
                )))
            }
            Some(_) => Ok(()),
            None => {
                decls.declare_type(owner, name, inferred);
                Ok(())
            }
        }
    }

    fn admit_all(&self, owner: OwnerKind, props: &PropertyMap) -> Result<()> {
        props.iter().try_for_each(|(name, value)| self.admit(owner, name, value))
    }

    fn with_network<T>(&self, net: NetworkId, f: impl FnOnce(&NetworkState) -> T) -> Result<T> {
        let networks = self.inner.networks.read();
        let state = networks.get(&net).ok_or_else(|| Error::NotFound(format!("Network {net}")))?;
        Ok(f(state))
    }

    fn with_network_mut<T>(&self, net: NetworkId, f: impl FnOnce(&mut NetworkState) -> Result<T>) -> Result<T> {
        let mut networks = self.inner.networks.write();
        let state = networks.get_mut(&net).ok_or_else(|| Error::NotFound(format!("Network {net}")))?;
        f(state)
    }

    fn require_node(&self, id: NodeId) -> Result<()> {
        if self.inner.nodes.read().contains_key(&id) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("Node {id}")))
        }
    }

    fn require_edge(&self, id: EdgeId) -> Result<()> {
        if self.inner.edges.read().contains_key(&id) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("Edge {id}")))
        }
    }
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// GraphModel impl
// ============================================================================

impl GraphModel for MemoryGraph {
    fn networks(&self) -> Vec<NetworkId> {
        self.inner.networks.read().keys().copied().collect()
    }

    fn create_network(&self) -> NetworkId {
        let id = NetworkId(self.inner.next_network_id.fetch_add(1, Ordering::Relaxed));
        self.inner.networks.write().insert(id, NetworkState::default());
        id
    }

    // ========================================================================
    // Nodes and edges
    // ========================================================================

    fn node(&self, id: NodeId) -> Result<Node> {
        self.inner.nodes.read().get(&id).cloned().ok_or_else(|| Error::NotFound(format!("Node {id}")))
    }

    fn edge(&self, id: EdgeId) -> Result<Edge> {
        self.inner.edges.read().get(&id).cloned().ok_or_else(|| Error::NotFound(format!("Edge {id}")))
    }

    fn nodes(&self, net: NetworkId) -> Result<Vec<Node>> {
        let visible: Vec<NodeId> = self.with_network(net, |state| {
            let hidden = state.hidden();
            state.nodes.iter().filter(|id| !hidden.contains(id)).copied().collect()
        })?;
        let nodes = self.inner.nodes.read();
        Ok(visible.iter().filter_map(|id| nodes.get(id).cloned()).collect())
    }

    fn edges(&self, net: NetworkId) -> Result<Vec<Edge>> {
        let (ids, hidden) = self.with_network(net, |state| (state.edges.clone(), state.hidden()))?;
        let edges = self.inner.edges.read();
        Ok(ids
            .iter()
            .filter_map(|id| edges.get(id))
            .filter(|e| !hidden.contains(&e.src) && !hidden.contains(&e.dst))
            .cloned()
            .collect())
    }

    fn create_node(&self, props: PropertyMap) -> Result<NodeId> {
        self.admit_all(OwnerKind::Node, &props)?;
        let id = NodeId(self.inner.next_node_id.fetch_add(1, Ordering::Relaxed));
        self.inner.nodes.write().insert(id, Node { id, wire_id: None, properties: props });
        Ok(id)
    }

    fn create_edge(
        &self,
        src: NodeId,
        dst: NodeId,
        interaction: Option<&str>,
        props: PropertyMap,
    ) -> Result<EdgeId> {
        {
            let nodes = self.inner.nodes.read();
            if !nodes.contains_key(&src) {
                return Err(Error::NotFound(format!("Source node {src}")));
            }
            if !nodes.contains_key(&dst) {
                return Err(Error::NotFound(format!("Target node {dst}")));
            }
        }
        self.admit_all(OwnerKind::Edge, &props)?;

        let id = EdgeId(self.inner.next_edge_id.fetch_add(1, Ordering::Relaxed));
        let edge = Edge {
            id,
            wire_id: None,
            src,
            dst,
            interaction: interaction.map(str::to_string),
            properties: props,
        };
        self.inner.edges.write().insert(id, edge);
        Ok(id)
    }

    fn add_node(&self, net: NetworkId, node: NodeId) -> Result<()> {
        self.require_node(node)?;
        self.with_network_mut(net, |state| {
            state.nodes.insert(node);
            Ok(())
        })
    }

    fn add_edge(&self, net: NetworkId, edge: EdgeId) -> Result<()> {
        let e = self.edge(edge)?;
        self.with_network_mut(net, |state| {
            state.nodes.insert(e.src);
            state.nodes.insert(e.dst);
            state.edges.insert(edge);
            Ok(())
        })
    }

    fn set_node_wire_id(&self, node: NodeId, wire: u64) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let n = nodes.get_mut(&node).ok_or_else(|| Error::NotFound(format!("Node {node}")))?;
        n.wire_id = Some(wire);
        Ok(())
    }

    fn set_edge_wire_id(&self, edge: EdgeId, wire: u64) -> Result<()> {
        let mut edges = self.inner.edges.write();
        let e = edges.get_mut(&edge).ok_or_else(|| Error::NotFound(format!("Edge {edge}")))?;
        e.wire_id = Some(wire);
        Ok(())
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    fn node_attributes(&self, scope: Scope, node: NodeId) -> Result<PropertyMap> {
        match scope {
            Scope::Collection => Ok(self.node(node)?.properties),
            Scope::Subgraph(net) => {
                self.require_node(node)?;
                self.with_network(net, |state| state.local_nodes.get(&node).cloned().unwrap_or_default())
            }
        }
    }

    fn set_node_attribute(&self, scope: Scope, node: NodeId, name: &str, value: Value) -> Result<()> {
        self.require_node(node)?;
        self.admit(OwnerKind::Node, name, &value)?;
        match scope {
            Scope::Collection => {
                let mut nodes = self.inner.nodes.write();
                let n = nodes.get_mut(&node).ok_or_else(|| Error::NotFound(format!("Node {node}")))?;
                n.properties.insert(name.to_string(), value);
                Ok(())
            }
            Scope::Subgraph(net) => self.with_network_mut(net, |state| {
                state.local_nodes.entry(node).or_default().insert(name.to_string(), value);
                Ok(())
            }),
        }
    }

    fn edge_attributes(&self, scope: Scope, edge: EdgeId) -> Result<PropertyMap> {
        match scope {
            Scope::Collection => Ok(self.edge(edge)?.properties),
            Scope::Subgraph(net) => {
                self.require_edge(edge)?;
                self.with_network(net, |state| state.local_edges.get(&edge).cloned().unwrap_or_default())
            }
        }
    }

    fn set_edge_attribute(&self, scope: Scope, edge: EdgeId, name: &str, value: Value) -> Result<()> {
        self.require_edge(edge)?;
        self.admit(OwnerKind::Edge, name, &value)?;
        match scope {
            Scope::Collection => {
                let mut edges = self.inner.edges.write();
                let e = edges.get_mut(&edge).ok_or_else(|| Error::NotFound(format!("Edge {edge}")))?;
                e.properties.insert(name.to_string(), value);
                Ok(())
            }
            Scope::Subgraph(net) => self.with_network_mut(net, |state| {
                state.local_edges.entry(edge).or_default().insert(name.to_string(), value);
                Ok(())
            }),
        }
    }

    fn network_attributes(&self, scope: Scope) -> Result<PropertyMap> {
        match scope {
            Scope::Collection => Ok(self.inner.root_attributes.read().clone()),
            Scope::Subgraph(net) => self.with_network(net, |state| state.attributes.clone()),
        }
    }

    fn set_network_attribute(&self, scope: Scope, name: &str, value: Value) -> Result<()> {
        self.admit(OwnerKind::Network, name, &value)?;
        match scope {
            Scope::Collection => {
                self.inner.root_attributes.write().insert(name.to_string(), value);
                Ok(())
            }
            Scope::Subgraph(net) => self.with_network_mut(net, |state| {
                state.attributes.insert(name.to_string(), value);
                Ok(())
            }),
        }
    }

    fn declarations(&self) -> AttributeDeclarations {
        self.inner.declarations.read().clone()
    }

    fn declare(&self, owner: OwnerKind, name: &str, ty: AttributeType) -> Result<()> {
        let mut decls = self.inner.declarations.write();
        match decls.get(owner, name) {
            Some(decl) if decl.ty != ty => Err(Error::TypeError(format!(
                "{} column '{name}' already declared {}, not {ty}",
                owner.table_name(),
                decl.ty
            ))),
            Some(_) => Ok(()),
            None => {
                decls.declare_type(owner, name, ty);
                Ok(())
            }
        }
    }

    // ========================================================================
    // Layout
    // ========================================================================

    fn position(&self, net: NetworkId, node: NodeId) -> Option<Position> {
        self.with_network(net, |state| state.positions.get(&node).copied()).ok().flatten()
    }

    fn set_position(&self, net: NetworkId, node: NodeId, position: Position) -> Result<()> {
        self.require_node(node)?;
        self.with_network_mut(net, |state| {
            state.positions.insert(node, position);
            Ok(())
        })
    }

    // ========================================================================
    // Groups
    // ========================================================================

    fn groups(&self, net: NetworkId) -> Result<Vec<Group>> {
        self.with_network(net, |state| state.groups.clone())
    }

    fn create_group(
        &self,
        net: NetworkId,
        node: Option<NodeId>,
        name: Option<&str>,
        members: &[NodeId],
    ) -> Result<NodeId> {
        let (net_nodes, net_edges) = self.with_network(net, |state| (state.nodes.clone(), state.edges.clone()))?;
        if let Some(missing) = members.iter().find(|m| !net_nodes.contains(m)) {
            return Err(Error::NotFound(format!("Node {missing} in network {net}")));
        }

        let group_node = match node {
            Some(existing) => {
                self.require_node(existing)?;
                existing
            }
            None => {
                let mut props = PropertyMap::new();
                if let Some(name) = name {
                    props.insert("name".into(), Value::from(name));
                }
                self.create_node(props)?
            }
        };

        let (internal_edges, external_edges) = {
            let edges = self.inner.edges.read();
            let in_net: Vec<&Edge> = net_edges.iter().filter_map(|id| edges.get(id)).collect();
            (
                in_net.iter().filter(|e| e.is_within(members)).map(|e| e.id).collect(),
                in_net.iter().filter(|e| e.crosses(members)).map(|e| e.id).collect(),
            )
        };

        self.with_network_mut(net, |state| {
            if state.groups.iter().any(|g| g.node == group_node) {
                return Err(Error::ValidationError(format!("node {group_node} is already a group")));
            }
            state.nodes.insert(group_node);
            state.groups.push(Group {
                node: group_node,
                name: name.map(str::to_string),
                members: members.to_vec(),
                internal_edges,
                external_edges,
                collapsed: false,
            });
            Ok(())
        })?;
        Ok(group_node)
    }

    fn expand_group(&self, net: NetworkId, group: NodeId) -> Result<()> {
        self.with_network_mut(net, |state| {
            state.group_mut(group)?.collapsed = false;
            Ok(())
        })
    }

    fn collapse_group(&self, net: NetworkId, group: NodeId) -> Result<()> {
        self.with_network_mut(net, |state| {
            state.group_mut(group)?.collapsed = true;
            Ok(())
        })
    }

    // ========================================================================
    // Opaque aspects
    // ========================================================================

    fn opaque_elements(&self) -> Vec<OpaqueElement> {
        self.inner.opaque.read().clone()
    }

    fn add_opaque_element(&self, element: OpaqueElement) {
        self.inner.opaque.write().push(element);
    }
}
