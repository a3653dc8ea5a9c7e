//! Network import: fold a document back into a host graph and style.
//!
//! ```text
//! bytes → CxReader → GraphBuilder::build() → GraphModel + StyleEngine
//! ```
//!
//! The whole document is read before the graph is touched, so a broken
//! envelope leaves the model unchanged. Element-level problems (a bad
//! attribute value, an unknown visual property, an edge to a missing node)
//! are skipped and reported as warnings.

use std::collections::BTreeMap;
use std::io::BufRead;

use serde::Deserialize;

use crate::aspect::*;
use crate::correlation::{unique_style_name, IdCorrelation, WireIdMapping, CX_ID_MAPPING};
use crate::graph::GraphModel;
use crate::model::*;
use crate::reader::CxReader;
use crate::schema::{AttributeDeclarations, OwnerKind, Record, Slot};
use crate::style::{Bypass, MappingFunction, StyleEngine, TargetKind};
use crate::{Error, Result};

/// Base name of the style created for an import when the document names
/// neither the network nor a style.
pub const DEFAULT_STYLE_NAME: &str = "cx-import";

// ============================================================================
// Configuration
// ============================================================================

/// Import settings. Loadable from JSON; unset fields take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Reject attributes with no column declaration.
    pub strict_attributes: bool,
    /// Aspects decoded into the graph. `None` decodes every known aspect.
    /// Known aspects left out are read as opaque and only counted.
    pub aspects: Option<Vec<AspectKind>>,
    /// Base name for the created style. Defaults to the network name.
    pub style_name: Option<String>,
}

impl ImportConfig {
    pub fn with_strict_attributes(mut self, strict: bool) -> Self {
        self.strict_attributes = strict;
        self
    }

    pub fn with_aspects(mut self, aspects: impl IntoIterator<Item = AspectKind>) -> Self {
        self.aspects = Some(aspects.into_iter().collect());
        self
    }

    pub fn with_style_name(mut self, name: impl Into<String>) -> Self {
        self.style_name = Some(name.into());
        self
    }

    /// The registry this configuration reads with.
    pub fn registry(&self) -> AspectRegistry {
        match &self.aspects {
            None => AspectRegistry::standard(),
            Some(kinds) => {
                let mut registry = AspectRegistry::new();
                for kind in kinds {
                    registry.register(kind.clone());
                }
                registry
            }
        }
    }
}

/// What an import created.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportStats {
    pub networks: Vec<NetworkId>,
    pub nodes: usize,
    pub edges: usize,
    pub attributes: usize,
    pub groups: usize,
    pub positions: usize,
    /// Name of the style created for the document's visual properties.
    pub style: Option<String>,
    /// Opaque elements read, by aspect name. Those of aspects with no
    /// known kind are stored on the model.
    pub opaque: BTreeMap<String, usize>,
    pub warnings: Vec<String>,
}

/// Read a document from `source` into `model` and `styles`.
pub fn import_network<R: BufRead>(
    model: &dyn GraphModel,
    styles: &dyn StyleEngine,
    source: R,
    config: ImportConfig,
) -> Result<ImportStats> {
    let reader = CxReader::new(source, config.registry())?;
    GraphBuilder::new(model, styles, config).build(reader)
}

// ============================================================================
// GraphBuilder
// ============================================================================

#[derive(Default)]
struct Elements {
    nodes: Vec<NodeElement>,
    edges: Vec<EdgeElement>,
    node_attributes: Vec<AttributeElement>,
    edge_attributes: Vec<AttributeElement>,
    network_attributes: Vec<NetworkAttributeElement>,
    layout: Vec<LayoutElement>,
    visual_properties: Vec<VisualPropertiesElement>,
    subnetworks: Vec<SubNetworkElement>,
    relations: Vec<NetworkRelationElement>,
    groups: Vec<GroupElement>,
    columns: Vec<TableColumnElement>,
    opaque: Vec<OpaqueElement>,
    id_mapping: WireIdMapping,
}

/// Builds host graph state from a document's elements.
pub struct GraphBuilder<'a> {
    model: &'a dyn GraphModel,
    styles: &'a dyn StyleEngine,
    config: ImportConfig,
    node_ids: IdCorrelation<NodeId>,
    edge_ids: IdCorrelation<EdgeId>,
    net_ids: IdCorrelation<NetworkId>,
    default_net: Option<NetworkId>,
    /// Whether the document declared its subnetworks.
    scoped: bool,
    stats: ImportStats,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(model: &'a dyn GraphModel, styles: &'a dyn StyleEngine, config: ImportConfig) -> Self {
        Self {
            model,
            styles,
            config,
            node_ids: IdCorrelation::new(),
            edge_ids: IdCorrelation::new(),
            net_ids: IdCorrelation::new(),
            default_net: None,
            scoped: false,
            stats: ImportStats::default(),
        }
    }

    /// Drain `reader`, then apply what it held.
    ///
    /// A `ProtocolError` aborts before the model is modified. Elements that
    /// failed to decode are reported as warnings.
    pub fn build<R: BufRead>(mut self, mut reader: CxReader<R>) -> Result<ImportStats> {
        let mut elements = Elements::default();
        for item in reader.by_ref() {
            match item {
                Ok(element) => self.collect(&mut elements, element),
                Err(e @ Error::ProtocolError { .. }) => return Err(e),
                Err(e) => self.warn(format!("element skipped: {e}")),
            }
        }
        if let Some(status) = reader.status().filter(|s| !s.success) {
            self.warn(format!(
                "document reports a failed export: {}",
                status.message.as_deref().unwrap_or("no message")
            ));
        }
        tracing::info!(
            nodes = elements.nodes.len(),
            edges = elements.edges.len(),
            "document read, applying"
        );

        self.apply_subnetworks(&elements.subnetworks, &elements.relations);
        self.apply_nodes(&elements.nodes, &elements.subnetworks, &elements.id_mapping);
        self.apply_edges(&elements.edges, &elements.subnetworks, &elements.id_mapping);
        self.apply_columns(&elements.columns);
        self.apply_attributes(&elements);
        self.apply_groups(&elements.groups);
        self.apply_layout(&elements.layout);
        self.apply_visual_properties(&elements.visual_properties, &elements.network_attributes);
        for element in elements.opaque {
            self.model.add_opaque_element(element);
        }

        tracing::info!(
            nodes = self.stats.nodes,
            edges = self.stats.edges,
            warnings = self.stats.warnings.len(),
            "import finished"
        );
        Ok(self.stats)
    }

    fn warn(&mut self, message: String) {
        tracing::warn!("{message}");
        self.stats.warnings.push(message);
    }

    fn collect(&mut self, into: &mut Elements, element: AspectElement) {
        match element {
            AspectElement::Node(e) => into.nodes.push(e),
            AspectElement::Edge(e) => into.edges.push(e),
            AspectElement::NodeAttribute(e) => into.node_attributes.push(e),
            AspectElement::EdgeAttribute(e) => into.edge_attributes.push(e),
            AspectElement::NetworkAttribute(e) => into.network_attributes.push(e),
            AspectElement::CartesianLayout(e) => into.layout.push(e),
            AspectElement::VisualProperties(e) => into.visual_properties.push(e),
            AspectElement::SubNetwork(e) => into.subnetworks.push(e),
            AspectElement::NetworkRelation(e) => into.relations.push(e),
            AspectElement::Group(e) => into.groups.push(e),
            AspectElement::TableColumn(e) => into.columns.push(e),
            AspectElement::Opaque(o) => {
                *self.stats.opaque.entry(o.aspect.clone()).or_default() += 1;
                if o.aspect == CX_ID_MAPPING {
                    match WireIdMapping::from_opaque(&o) {
                        Ok(mapping) => into.id_mapping.merge(mapping),
                        Err(e) => self.warn(format!("{CX_ID_MAPPING} ignored: {e}")),
                    }
                } else if AspectKind::from_name(&o.aspect).is_opaque() {
                    into.opaque.push(o);
                }
            }
        }
    }

    // ========================================================================
    // Structure
    // ========================================================================

    /// The subnetwork a wire reference points to. Unscoped elements, and
    /// every element of a document without subnetworks, go to the first one.
    fn network_for(&self, wire: Option<u64>) -> Option<NetworkId> {
        match wire {
            Some(wire) if self.scoped => self.net_ids.host_of(wire),
            _ => self.default_net,
        }
    }

    fn apply_subnetworks(&mut self, subnetworks: &[SubNetworkElement], relations: &[NetworkRelationElement]) {
        for element in subnetworks {
            let net = self.model.create_network();
            if !self.net_ids.record(net, element.id) {
                self.warn(format!("subnetwork {} appears twice", element.id));
            }
            self.stats.networks.push(net);
        }
        if self.stats.networks.is_empty() {
            self.stats.networks.push(self.model.create_network());
        }
        self.default_net = self.stats.networks.first().copied();
        self.scoped = !subnetworks.is_empty();

        for relation in relations {
            let (Some(net), Some(name)) = (self.net_ids.host_of(relation.child), &relation.name) else { continue };
            if relation.relation == RelationType::Subnetwork {
                if let Err(e) = self.model.set_network_attribute(Scope::Subgraph(net), "name", Value::from(name.as_str())) {
                    self.warn(format!("subnetwork {} name: {e}", relation.child));
                }
            }
        }
    }

    fn apply_nodes(&mut self, nodes: &[NodeElement], subnetworks: &[SubNetworkElement], mapping: &WireIdMapping) {
        for element in nodes {
            if self.node_ids.host_of(element.id).is_some() {
                self.warn(format!("node {} appears twice", element.id));
                continue;
            }
            let mut props = PropertyMap::new();
            if let Some(name) = &element.name {
                props.insert("name".into(), Value::from(name.as_str()));
            }
            if let Some(represents) = &element.represents {
                props.insert("represents".into(), Value::from(represents.as_str()));
            }
            let id = match self.model.create_node(props) {
                Ok(id) => id,
                Err(e) => {
                    self.warn(format!("node {} skipped: {e}", element.id));
                    continue;
                }
            };
            self.node_ids.record(id, element.id);
            let wire = mapping.nodes.get(&element.id).copied().unwrap_or(element.id);
            if let Err(e) = self.model.set_node_wire_id(id, wire) {
                self.warn(format!("node {}: {e}", element.id));
            }
            self.stats.nodes += 1;
        }

        if subnetworks.is_empty() {
            if let Some(net) = self.default_net {
                for element in nodes {
                    if let Some(host) = self.node_ids.host_of(element.id) {
                        self.add_node_to(net, host, element.id);
                    }
                }
            }
            return;
        }
        for subnetwork in subnetworks {
            let Some(net) = self.net_ids.host_of(subnetwork.id) else { continue };
            for wire in &subnetwork.nodes {
                match self.node_ids.host_of(*wire) {
                    Some(host) => self.add_node_to(net, host, *wire),
                    None => self.warn(format!("subnetwork {} lists unknown node {wire}", subnetwork.id)),
                }
            }
        }
    }

    fn add_node_to(&mut self, net: NetworkId, node: NodeId, wire: u64) {
        if let Err(e) = self.model.add_node(net, node) {
            self.warn(format!("node {wire} not added to network: {e}"));
        }
    }

    fn apply_edges(&mut self, edges: &[EdgeElement], subnetworks: &[SubNetworkElement], mapping: &WireIdMapping) {
        for element in edges {
            if self.edge_ids.host_of(element.id).is_some() {
                self.warn(format!("edge {} appears twice", element.id));
                continue;
            }
            let (Some(src), Some(dst)) = (self.node_ids.host_of(element.source), self.node_ids.host_of(element.target))
            else {
                self.warn(format!("edge {} references a missing node", element.id));
                continue;
            };
            let id = match self.model.create_edge(src, dst, element.interaction.as_deref(), PropertyMap::new()) {
                Ok(id) => id,
                Err(e) => {
                    self.warn(format!("edge {} skipped: {e}", element.id));
                    continue;
                }
            };
            self.edge_ids.record(id, element.id);
            let wire = mapping.edges.get(&element.id).copied().unwrap_or(element.id);
            if let Err(e) = self.model.set_edge_wire_id(id, wire) {
                self.warn(format!("edge {}: {e}", element.id));
            }
            self.stats.edges += 1;
        }

        if subnetworks.is_empty() {
            if let Some(net) = self.default_net {
                for element in edges {
                    if let Some(host) = self.edge_ids.host_of(element.id) {
                        self.add_edge_to(net, host, element.id);
                    }
                }
            }
            return;
        }
        for subnetwork in subnetworks {
            let Some(net) = self.net_ids.host_of(subnetwork.id) else { continue };
            for wire in &subnetwork.edges {
                match self.edge_ids.host_of(*wire) {
                    Some(host) => self.add_edge_to(net, host, *wire),
                    None => self.warn(format!("subnetwork {} lists unknown edge {wire}", subnetwork.id)),
                }
            }
        }
    }

    fn add_edge_to(&mut self, net: NetworkId, edge: EdgeId, wire: u64) {
        if let Err(e) = self.model.add_edge(net, edge) {
            self.warn(format!("edge {wire} not added to network: {e}"));
        }
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    fn apply_columns(&mut self, columns: &[TableColumnElement]) {
        for column in columns {
            let Some(owner) = OwnerKind::from_table_name(&column.applies_to) else {
                self.warn(format!("column '{}' applies to unknown table '{}'", column.name, column.applies_to));
                continue;
            };
            if let Err(e) = self.model.declare(owner, &column.name, column.ty) {
                self.warn(format!("column '{}': {e}", column.name));
            }
        }
    }

    /// Check one attribute against the declarations read so far.
    fn admissible(&mut self, decls: &AttributeDeclarations, owner: OwnerKind, name: &str, value: &Value) -> bool {
        let record: Record = [(name.to_string(), Slot::Set(value.clone()))].into_iter().collect();
        match decls.validate(owner, &record, self.config.strict_attributes) {
            Ok(()) => true,
            Err(e) => {
                self.warn(format!("{} attribute '{name}' skipped: {e}", owner.table_name()));
                false
            }
        }
    }

    fn scope_for(&mut self, subnet: Option<u64>) -> Option<Scope> {
        match subnet {
            None => Some(Scope::Collection),
            Some(wire) => match self.net_ids.host_of(wire) {
                Some(net) => Some(Scope::Subgraph(net)),
                None => {
                    self.warn(format!("attribute scoped to unknown subnetwork {wire}"));
                    None
                }
            },
        }
    }

    fn apply_attributes(&mut self, elements: &Elements) {
        let decls = self.model.declarations();

        for attr in &elements.network_attributes {
            if !self.admissible(&decls, OwnerKind::Network, &attr.name, &attr.value) {
                continue;
            }
            let Some(scope) = self.scope_for(attr.subnet) else { continue };
            match self.model.set_network_attribute(scope, &attr.name, attr.value.clone()) {
                Ok(()) => self.stats.attributes += 1,
                Err(e) => self.warn(format!("network attribute '{}': {e}", attr.name)),
            }
        }

        for attr in &elements.node_attributes {
            if !self.admissible(&decls, OwnerKind::Node, &attr.name, &attr.value) {
                continue;
            }
            let Some(node) = self.node_ids.host_of(attr.owner) else {
                self.warn(format!("attribute '{}' of unknown node {}", attr.name, attr.owner));
                continue;
            };
            let Some(scope) = self.scope_for(attr.subnet) else { continue };
            match self.model.set_node_attribute(scope, node, &attr.name, attr.value.clone()) {
                Ok(()) => self.stats.attributes += 1,
                Err(e) => self.warn(format!("node attribute '{}': {e}", attr.name)),
            }
        }

        for attr in &elements.edge_attributes {
            if !self.admissible(&decls, OwnerKind::Edge, &attr.name, &attr.value) {
                continue;
            }
            let Some(edge) = self.edge_ids.host_of(attr.owner) else {
                self.warn(format!("attribute '{}' of unknown edge {}", attr.name, attr.owner));
                continue;
            };
            let Some(scope) = self.scope_for(attr.subnet) else { continue };
            match self.model.set_edge_attribute(scope, edge, &attr.name, attr.value.clone()) {
                Ok(()) => self.stats.attributes += 1,
                Err(e) => self.warn(format!("edge attribute '{}': {e}", attr.name)),
            }
        }
    }

    // ========================================================================
    // Groups and layout
    // ========================================================================

    fn apply_groups(&mut self, groups: &[GroupElement]) {
        for element in groups {
            let Some(net) = self.network_for(element.view) else {
                self.warn(format!("group {} in unknown network", element.id));
                continue;
            };
            let members: Vec<NodeId> = element.nodes.iter().filter_map(|w| self.node_ids.host_of(*w)).collect();
            if members.len() != element.nodes.len() {
                self.warn(format!("group {} lists nodes that were not imported", element.id));
            }
            let existing = self.node_ids.host_of(element.id);
            let node = match self.model.create_group(net, existing, element.name.as_deref(), &members) {
                Ok(node) => node,
                Err(e) => {
                    self.warn(format!("group {}: {e}", element.id));
                    continue;
                }
            };
            if existing.is_none() && self.node_ids.record(node, element.id) {
                if let Err(e) = self.model.set_node_wire_id(node, element.id) {
                    self.warn(format!("group {}: {e}", element.id));
                }
            }
            if element.collapsed {
                if let Err(e) = self.model.collapse_group(net, node) {
                    self.warn(format!("group {}: {e}", element.id));
                }
            }
            self.stats.groups += 1;
        }
    }

    fn apply_layout(&mut self, layout: &[LayoutElement]) {
        for element in layout {
            let (Some(net), Some(node)) = (self.network_for(element.view), self.node_ids.host_of(element.node)) else {
                self.warn(format!("position of unknown node {}", element.node));
                continue;
            };
            let position = Position { x: element.x, y: element.y, z: element.z };
            match self.model.set_position(net, node, position) {
                Ok(()) => self.stats.positions += 1,
                Err(e) => self.warn(format!("position of node {}: {e}", element.node)),
            }
        }
    }

    // ========================================================================
    // Visual properties
    // ========================================================================

    fn apply_visual_properties(
        &mut self,
        elements: &[VisualPropertiesElement],
        network_attributes: &[NetworkAttributeElement],
    ) {
        if elements.is_empty() {
            return;
        }
        let base = self
            .config
            .style_name
            .clone()
            .or_else(|| {
                network_attributes
                    .iter()
                    .find(|a| a.name == "name" && a.subnet.is_none())
                    .and_then(|a| a.value.as_str().map(str::to_string))
            })
            .unwrap_or_else(|| DEFAULT_STYLE_NAME.to_string());
        let name = unique_style_name(&base, &self.styles.style_names());
        if let Err(e) = self.styles.create_style(&name) {
            self.warn(format!("visual properties skipped, style '{name}' not created: {e}"));
            return;
        }
        tracing::debug!(style = %name, "style created");
        self.stats.style = Some(name);

        for element in elements {
            let target = match element.properties_of {
                PropertiesOf::Network => TargetKind::Network,
                PropertiesOf::NodesDefault | PropertiesOf::Nodes => TargetKind::Node,
                PropertiesOf::EdgesDefault | PropertiesOf::Edges => TargetKind::Edge,
            };
            match element.properties_of {
                PropertiesOf::Nodes | PropertiesOf::Edges => self.apply_bypasses(element, target),
                _ => self.apply_defaults(element, target),
            }
        }
    }

    fn apply_defaults(&mut self, element: &VisualPropertiesElement, target: TargetKind) {
        for (name, value) in &element.properties {
            match self.styles.lookup_property(target, name) {
                Some(property) => self.styles.set_default_value(&property, value.clone()),
                None => self.warn(format!("unknown visual property {name}")),
            }
        }
        for (name, definition) in &element.mappings {
            let Some(property) = self.styles.lookup_property(target, name) else {
                self.warn(format!("mapping for unknown visual property {name}"));
                continue;
            };
            match MappingFunction::from_definition(definition) {
                Ok(mapping) => self.styles.add_mapping(&property, mapping),
                Err(e) => self.warn(format!("mapping for {name} dropped: {e}")),
            }
        }
        for (name, value) in &element.dependencies {
            match value.parse::<bool>() {
                Ok(enabled) => self.styles.set_dependency(name, enabled),
                Err(_) => self.warn(format!("dependency {name} has non-boolean value '{value}'")),
            }
        }
    }

    fn apply_bypasses(&mut self, element: &VisualPropertiesElement, target: TargetKind) {
        let host = element.applies_to.and_then(|wire| match target {
            TargetKind::Node => self.node_ids.host_of(wire).map(|n| n.0),
            _ => self.edge_ids.host_of(wire).map(|e| e.0),
        });
        let Some(host) = host else {
            self.warn(format!("bypass for unknown element {:?}", element.applies_to));
            return;
        };
        for (name, value) in &element.properties {
            match self.styles.lookup_property(target, name) {
                Some(property) => self.styles.set_bypass(Bypass { element: host, property, value: value.clone() }),
                None => self.warn(format!("unknown visual property {name}")),
            }
        }
    }
}
