//! Network export: serialize a host graph and its style as one document.
//!
//! ```text
//! GraphModel + StyleEngine → export_network() → CxWriter → bytes
//! ```
//!
//! Single mode writes one network with no subnetwork scoping on its
//! attributes. Collection mode writes every subnetwork under the root,
//! marks subnetwork-local attributes with their subnetwork and adds the
//! network relations.

use std::collections::BTreeMap;
use std::io::Write;

use serde::Deserialize;

use crate::aspect::*;
use crate::correlation::{IdCorrelation, WireIdMapping, CX_ID_MAPPING};
use crate::graph::GraphModel;
use crate::group::{ExpandedGroups, GroupSnapshot};
use crate::model::*;
use crate::schema::OwnerKind;
use crate::style::{StyleEngine, TargetKind};
use crate::types;
use crate::writer::{check_aspect_set, AspectRequest, CancelFlag, CxWriter, WriterOptions};
use crate::{Error, Result};

/// Columns left out of every export unless configured otherwise.
pub const DEFAULT_IGNORED_COLUMNS: [&str; 2] = ["SUID", "selected"];

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportMode {
    /// One network; attributes carry no subnetwork.
    #[default]
    Single,
    /// Every subnetwork of the root.
    Collection,
}

/// Export settings. Loadable from JSON; unset fields take their defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub mode: ExportMode,
    /// Network written in single mode. Defaults to the first network.
    pub network: Option<NetworkId>,
    /// Aspects to write. Opaque kinds are accepted and ignored; stored
    /// opaque aspects are written back only when every known kind is listed.
    pub aspects: Vec<AspectKind>,
    /// Reuse imported wire IDs and mint fresh ones above them, instead of
    /// writing host IDs.
    pub use_wire_ids: bool,
    pub ignored_columns: Vec<String>,
    /// When set, only these node columns are written as attributes.
    pub node_columns: Option<Vec<String>>,
    pub edge_columns: Option<Vec<String>>,
    pub network_columns: Option<Vec<String>>,
    pub consistency_group: Option<u64>,
    #[serde(skip)]
    pub cancel: CancelFlag,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            mode: ExportMode::Single,
            network: None,
            aspects: AspectKind::KNOWN.to_vec(),
            use_wire_ids: false,
            ignored_columns: DEFAULT_IGNORED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            node_columns: None,
            edge_columns: None,
            network_columns: None,
            consistency_group: None,
            cancel: CancelFlag::new(),
        }
    }
}

impl ExportConfig {
    pub fn with_mode(mut self, mode: ExportMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_network(mut self, network: NetworkId) -> Self {
        self.network = Some(network);
        self
    }

    pub fn with_aspects(mut self, aspects: impl IntoIterator<Item = AspectKind>) -> Self {
        self.aspects = aspects.into_iter().collect();
        self
    }

    pub fn with_wire_ids(mut self, use_wire_ids: bool) -> Self {
        self.use_wire_ids = use_wire_ids;
        self
    }

    pub fn with_ignored_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.ignored_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict the node attributes written to `columns`. An empty list
    /// clears the filter.
    pub fn with_node_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.node_columns = non_empty_columns(columns);
        self
    }

    pub fn with_edge_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.edge_columns = non_empty_columns(columns);
        self
    }

    pub fn with_network_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.network_columns = non_empty_columns(columns);
        self
    }

    pub fn with_consistency_group(mut self, group: u64) -> Self {
        self.consistency_group = Some(group);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Opaque aspects kept from an import are written back only when every
    /// known aspect is selected.
    pub fn writes_opaque(&self) -> bool {
        AspectKind::KNOWN.iter().all(|k| self.aspects.contains(k))
    }

    fn column_filter(&self, owner: OwnerKind) -> Option<&[String]> {
        let filter = match owner {
            OwnerKind::Network => &self.network_columns,
            OwnerKind::Node => &self.node_columns,
            OwnerKind::Edge => &self.edge_columns,
        };
        filter.as_deref().filter(|columns| !columns.is_empty())
    }
}

fn non_empty_columns<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Option<Vec<String>> {
    let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
    (!columns.is_empty()).then_some(columns)
}

/// What an export wrote.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportStats {
    /// Elements written, by aspect name. Aspects with none are absent.
    pub elements_per_aspect: BTreeMap<String, usize>,
    /// Groups that had to be expanded for the export.
    pub groups_expanded: usize,
    pub warnings: Vec<String>,
}

// ============================================================================
// export_network
// ============================================================================

/// Export the graph and its current style to `out`.
///
/// Fails with `StructuralError` before writing anything if the configured
/// aspects cannot appear together. Once the document has been started it
/// is always closed, with a failure status if a fragment could not be
/// written or the export was cancelled. Collapsed groups are expanded for
/// the duration of the call and collapsed again afterwards.
pub fn export_network<W: Write>(
    model: &dyn GraphModel,
    styles: &dyn StyleEngine,
    out: W,
    config: &ExportConfig,
) -> Result<ExportStats> {
    check_aspect_set(&config.aspects)?;

    let networks = match config.mode {
        ExportMode::Single => {
            let net = match config.network {
                Some(net) => net,
                None => model
                    .networks()
                    .first()
                    .copied()
                    .ok_or_else(|| Error::NotFound("no network to export".into()))?,
            };
            vec![net]
        }
        ExportMode::Collection => model.networks(),
    };
    tracing::info!(mode = ?config.mode, networks = networks.len(), "export started");

    let guard = ExpandedGroups::new(model, &networks)?;
    let mut session = Session::new(model, styles, config, guard.snapshot(), &networks)?;

    let mut kinds: Vec<AspectKind> =
        AspectKind::KNOWN.iter().filter(|k| config.aspects.contains(k)).cloned().collect();
    let writes_elements = config.aspects.contains(&AspectKind::Nodes) || config.aspects.contains(&AspectKind::Edges);
    if config.mode == ExportMode::Collection && !config.use_wire_ids && writes_elements {
        kinds.push(AspectKind::Opaque(CX_ID_MAPPING.to_string()));
    }
    kinds.extend(session.opaque_kinds());

    let mut fragments: Vec<(AspectKind, Vec<AspectElement>)> = Vec::new();
    for kind in &kinds {
        let elements = session.materialize(kind)?;
        if !elements.is_empty() {
            fragments.push((kind.clone(), elements));
        }
    }

    let requests: Vec<AspectRequest> = fragments
        .iter()
        .map(|(kind, elements)| AspectRequest::with_count(kind.clone(), elements.len() as u64))
        .collect();
    let options = WriterOptions { consistency_group: config.consistency_group, cancel: config.cancel.clone() };
    let mut writer = CxWriter::begin(out, AspectRegistry::standard(), &requests, options)?;

    let mut stats = ExportStats { groups_expanded: guard.snapshot().len(), ..ExportStats::default() };
    for (kind, elements) in &fragments {
        match writer.write_fragment(kind, elements) {
            Ok(written) => {
                stats.elements_per_aspect.insert(kind.name().to_string(), written);
            }
            Err(e) => {
                let message = e.to_string();
                if let Err(close) = writer.end(false, Some(&message)) {
                    tracing::warn!(error = %close, "failed to close document after error");
                }
                return Err(e);
            }
        }
    }
    writer.end(true, None)?;

    stats.warnings = session.warnings;
    tracing::info!(aspects = stats.elements_per_aspect.len(), warnings = stats.warnings.len(), "export finished");
    Ok(stats)
}

// ============================================================================
// Session
// ============================================================================

/// One network as it is visible while its groups are expanded.
struct View {
    net: NetworkId,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

struct Session<'a> {
    model: &'a dyn GraphModel,
    styles: &'a dyn StyleEngine,
    config: &'a ExportConfig,
    snapshot: &'a GroupSnapshot,
    views: Vec<View>,
    node_ids: Option<IdCorrelation<NodeId>>,
    edge_ids: Option<IdCorrelation<EdgeId>>,
    net_ids: Option<IdCorrelation<NetworkId>>,
    /// Opaque elements to write back; empty unless `writes_opaque`.
    opaque: Vec<OpaqueElement>,
    warnings: Vec<String>,
}

impl<'a> Session<'a> {
    fn new(
        model: &'a dyn GraphModel,
        styles: &'a dyn StyleEngine,
        config: &'a ExportConfig,
        snapshot: &'a GroupSnapshot,
        networks: &[NetworkId],
    ) -> Result<Self> {
        let views = networks
            .iter()
            .map(|&net| Ok(View { net, nodes: model.nodes(net)?, edges: model.edges(net)? }))
            .collect::<Result<Vec<_>>>()?;
        let opaque = if config.writes_opaque() {
            model
                .opaque_elements()
                .into_iter()
                .filter(|o| o.aspect != CX_ID_MAPPING && AspectKind::from_name(&o.aspect).is_opaque())
                .collect()
        } else {
            Vec::new()
        };
        Ok(Self {
            model,
            styles,
            config,
            snapshot,
            views,
            node_ids: None,
            edge_ids: None,
            net_ids: None,
            opaque,
            warnings: Vec::new(),
        })
    }

    fn warn(&mut self, message: String) {
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    fn is_ignored(&self, column: &str) -> bool {
        self.config.ignored_columns.iter().any(|c| c == column)
    }

    /// Opaque aspects to write, in the order they were first stored.
    fn opaque_kinds(&self) -> Vec<AspectKind> {
        let mut kinds: Vec<AspectKind> = Vec::new();
        for element in &self.opaque {
            let kind = AspectKind::Opaque(element.aspect.clone());
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        kinds
    }

    // ========================================================================
    // ID resolution
    // ========================================================================

    fn node_wire(&mut self, id: NodeId) -> u64 {
        if !self.config.use_wire_ids {
            return id.0;
        }
        let views = &self.views;
        let table = self.node_ids.get_or_insert_with(|| {
            IdCorrelation::from_pairs(
                views.iter().flat_map(|v| v.nodes.iter()).filter_map(|n| Some((n.id, n.wire_id?))),
            )
        });
        if table.wire_of(&id).is_none() {
            if let Some(wire) = self.model.node(id).ok().and_then(|n| n.wire_id) {
                table.record(id, wire);
            }
        }
        table.resolve(id, id.0, true)
    }

    fn edge_wire(&mut self, id: EdgeId) -> u64 {
        if !self.config.use_wire_ids {
            return id.0;
        }
        let views = &self.views;
        let table = self.edge_ids.get_or_insert_with(|| {
            IdCorrelation::from_pairs(
                views.iter().flat_map(|v| v.edges.iter()).filter_map(|e| Some((e.id, e.wire_id?))),
            )
        });
        table.resolve(id, id.0, true)
    }

    fn net_wire(&mut self, net: NetworkId) -> u64 {
        let use_wire_ids = self.config.use_wire_ids;
        self.net_ids.get_or_insert_with(IdCorrelation::new).resolve(net, net.0, use_wire_ids)
    }

    /// The `s` of subnetwork-local elements: set in collection mode only.
    fn subnet(&mut self, net: NetworkId) -> Option<u64> {
        match self.config.mode {
            ExportMode::Single => None,
            ExportMode::Collection => Some(self.net_wire(net)),
        }
    }

    // ========================================================================
    // Aspects
    // ========================================================================

    fn materialize(&mut self, kind: &AspectKind) -> Result<Vec<AspectElement>> {
        let elements = match kind {
            AspectKind::NetworkAttributes => self.network_attributes()?,
            AspectKind::Nodes => self.nodes(),
            AspectKind::Edges => self.edges(),
            AspectKind::NodeAttributes => self.node_attributes()?,
            AspectKind::EdgeAttributes => self.edge_attributes()?,
            AspectKind::TableColumns => self.table_columns(),
            AspectKind::SubNetworks => self.subnetworks(),
            AspectKind::NetworkRelations => self.network_relations()?,
            AspectKind::Groups => self.groups()?,
            AspectKind::CartesianLayout => self.layout(),
            AspectKind::VisualProperties => self.visual_properties(),
            AspectKind::Opaque(name) if name == CX_ID_MAPPING => self.id_mapping()?,
            AspectKind::Opaque(name) => self
                .opaque
                .iter()
                .filter(|o| o.aspect == *name)
                .cloned()
                .map(AspectElement::Opaque)
                .collect(),
        };
        tracing::debug!(aspect = %kind, count = elements.len(), "aspect materialized");
        Ok(elements)
    }

    /// Attribute values worth writing: not ignored, inside the column filter
    /// and not an empty list. A value that is not a well-formed attribute
    /// (a list mixing kinds) is skipped with a warning.
    fn writable(&mut self, owner: OwnerKind, props: PropertyMap) -> Vec<(String, Value)> {
        let mut out = Vec::with_capacity(props.len());
        for (name, value) in props {
            if self.is_ignored(&name) || matches!(&value, Value::List(items) if items.is_empty()) {
                continue;
            }
            if let Some(columns) = self.config.column_filter(owner) {
                if !columns.contains(&name) {
                    continue;
                }
            }
            if !value.attribute_type().admits(&value) {
                self.warn(format!(
                    "{} attribute '{name}' skipped: holds {}",
                    owner.table_name(),
                    types::describe(&value)
                ));
                continue;
            }
            out.push((name, value));
        }
        out
    }

    /// Original wire IDs of the exported nodes and edges, keyed by the
    /// `@id` this export writes for them.
    fn id_mapping(&mut self) -> Result<Vec<AspectElement>> {
        let mut mapping = WireIdMapping::default();
        for node in self.distinct_nodes() {
            if let Some(wire) = node.wire_id {
                mapping.nodes.insert(self.node_wire(node.id), wire);
            }
        }
        for edge in self.distinct_edges() {
            if let Some(wire) = edge.wire_id {
                mapping.edges.insert(self.edge_wire(edge.id), wire);
            }
        }
        if mapping.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![AspectElement::Opaque(mapping.to_opaque()?)])
    }

    fn network_attributes(&mut self) -> Result<Vec<AspectElement>> {
        let mut out = Vec::new();
        match self.config.mode {
            ExportMode::Single => {
                let net = self.views[0].net;
                let mut props = self.model.network_attributes(Scope::Collection)?;
                props.extend(self.model.network_attributes(Scope::Subgraph(net))?);
                out.extend(
                    self.writable(OwnerKind::Network, props)
                        .into_iter()
                        .map(|(name, value)| AspectElement::NetworkAttribute(NetworkAttributeElement::new(name, value))),
                );
            }
            ExportMode::Collection => {
                let shared = self.model.network_attributes(Scope::Collection)?;
                out.extend(
                    self.writable(OwnerKind::Network, shared)
                        .into_iter()
                        .map(|(name, value)| AspectElement::NetworkAttribute(NetworkAttributeElement::new(name, value))),
                );
                let nets: Vec<NetworkId> = self.views.iter().map(|v| v.net).collect();
                for net in nets {
                    let local = self.model.network_attributes(Scope::Subgraph(net))?;
                    let subnet = self.subnet(net);
                    let scoped = self.writable(OwnerKind::Network, local);
                    out.extend(scoped.into_iter().map(|(name, value)| {
                        AspectElement::NetworkAttribute(NetworkAttributeElement {
                            subnet,
                            ..NetworkAttributeElement::new(name, value)
                        })
                    }));
                }
            }
        }
        Ok(out)
    }

    /// Every visible node once, in host ID order.
    fn distinct_nodes(&self) -> Vec<Node> {
        let mut seen: BTreeMap<NodeId, Node> = BTreeMap::new();
        for view in &self.views {
            for node in &view.nodes {
                seen.entry(node.id).or_insert_with(|| node.clone());
            }
        }
        seen.into_values().collect()
    }

    fn distinct_edges(&self) -> Vec<Edge> {
        let mut seen: BTreeMap<EdgeId, Edge> = BTreeMap::new();
        for view in &self.views {
            for edge in &view.edges {
                seen.entry(edge.id).or_insert_with(|| edge.clone());
            }
        }
        seen.into_values().collect()
    }

    fn nodes(&mut self) -> Vec<AspectElement> {
        self.distinct_nodes()
            .into_iter()
            .map(|node| {
                AspectElement::Node(NodeElement {
                    id: self.node_wire(node.id),
                    name: node.name().map(str::to_string),
                    represents: node.get(REPRESENTS).and_then(Value::as_str).map(str::to_string),
                })
            })
            .collect()
    }

    fn edges(&mut self) -> Vec<AspectElement> {
        self.distinct_edges()
            .into_iter()
            .map(|edge| {
                AspectElement::Edge(EdgeElement {
                    id: self.edge_wire(edge.id),
                    source: self.node_wire(edge.src),
                    target: self.node_wire(edge.dst),
                    interaction: edge.interaction.clone(),
                })
            })
            .collect()
    }

    fn node_attributes(&mut self) -> Result<Vec<AspectElement>> {
        let mut out = Vec::new();
        match self.config.mode {
            ExportMode::Single => {
                let net = self.views[0].net;
                for node in self.distinct_nodes() {
                    let props = strip_node_header(self.model.effective_node_attributes(net, node.id)?);
                    let owner = self.node_wire(node.id);
                    let values = self.writable(OwnerKind::Node, props);
                    out.extend(values.into_iter().map(|(name, value)| {
                        AspectElement::NodeAttribute(AttributeElement::new(owner, name, value))
                    }));
                }
            }
            ExportMode::Collection => {
                for node in self.distinct_nodes() {
                    let owner = self.node_wire(node.id);
                    let shared = self.writable(OwnerKind::Node, strip_node_header(node.properties));
                    out.extend(shared.into_iter().map(|(name, value)| {
                        AspectElement::NodeAttribute(AttributeElement::new(owner, name, value))
                    }));
                }
                let scoped: Vec<(NetworkId, Vec<NodeId>)> =
                    self.views.iter().map(|v| (v.net, v.nodes.iter().map(|n| n.id).collect())).collect();
                for (net, nodes) in scoped {
                    let subnet = self.subnet(net);
                    for node in nodes {
                        let local = self.model.node_attributes(Scope::Subgraph(net), node)?;
                        let owner = self.node_wire(node);
                        let values = self.writable(OwnerKind::Node, local);
                        out.extend(values.into_iter().map(|(name, value)| {
                            AspectElement::NodeAttribute(AttributeElement { subnet, ..AttributeElement::new(owner, name, value) })
                        }));
                    }
                }
            }
        }
        Ok(out)
    }

    fn edge_attributes(&mut self) -> Result<Vec<AspectElement>> {
        let mut out = Vec::new();
        match self.config.mode {
            ExportMode::Single => {
                let net = self.views[0].net;
                for edge in self.distinct_edges() {
                    let props = self.model.effective_edge_attributes(net, edge.id)?;
                    let owner = self.edge_wire(edge.id);
                    let values = self.writable(OwnerKind::Edge, props);
                    out.extend(values.into_iter().map(|(name, value)| {
                        AspectElement::EdgeAttribute(AttributeElement::new(owner, name, value))
                    }));
                }
            }
            ExportMode::Collection => {
                for edge in self.distinct_edges() {
                    let owner = self.edge_wire(edge.id);
                    let shared = self.writable(OwnerKind::Edge, edge.properties);
                    out.extend(shared.into_iter().map(|(name, value)| {
                        AspectElement::EdgeAttribute(AttributeElement::new(owner, name, value))
                    }));
                }
                let scoped: Vec<(NetworkId, Vec<EdgeId>)> =
                    self.views.iter().map(|v| (v.net, v.edges.iter().map(|e| e.id).collect())).collect();
                for (net, edges) in scoped {
                    let subnet = self.subnet(net);
                    for edge in edges {
                        let local = self.model.edge_attributes(Scope::Subgraph(net), edge)?;
                        let owner = self.edge_wire(edge);
                        let values = self.writable(OwnerKind::Edge, local);
                        out.extend(values.into_iter().map(|(name, value)| {
                            AspectElement::EdgeAttribute(AttributeElement { subnet, ..AttributeElement::new(owner, name, value) })
                        }));
                    }
                }
            }
        }
        Ok(out)
    }

    fn table_columns(&mut self) -> Vec<AspectElement> {
        let decls = self.model.declarations();
        [OwnerKind::Network, OwnerKind::Node, OwnerKind::Edge]
            .into_iter()
            .flat_map(|owner| {
                decls
                    .iter(owner)
                    .filter(|(name, _)| !self.is_ignored(name))
                    .map(|(name, decl)| {
                        AspectElement::TableColumn(TableColumnElement {
                            applies_to: owner.table_name().to_string(),
                            name: name.to_string(),
                            ty: decl.ty,
                            subnet: None,
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn subnetworks(&mut self) -> Vec<AspectElement> {
        let members: Vec<(NetworkId, Vec<NodeId>, Vec<EdgeId>)> = self
            .views
            .iter()
            .map(|v| (v.net, v.nodes.iter().map(|n| n.id).collect(), v.edges.iter().map(|e| e.id).collect()))
            .collect();
        members
            .into_iter()
            .map(|(net, nodes, edges)| {
                AspectElement::SubNetwork(SubNetworkElement {
                    id: self.net_wire(net),
                    nodes: nodes.into_iter().map(|n| self.node_wire(n)).collect(),
                    edges: edges.into_iter().map(|e| self.edge_wire(e)).collect(),
                })
            })
            .collect()
    }

    fn network_relations(&mut self) -> Result<Vec<AspectElement>> {
        if self.config.mode == ExportMode::Single {
            return Ok(Vec::new());
        }
        let nets: Vec<NetworkId> = self.views.iter().map(|v| v.net).collect();
        let mut out = Vec::new();
        for net in nets {
            let name = self
                .model
                .network_attributes(Scope::Subgraph(net))?
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string);
            out.push(AspectElement::NetworkRelation(NetworkRelationElement {
                parent: None,
                child: self.net_wire(net),
                relation: RelationType::Subnetwork,
                name,
            }));
        }
        Ok(out)
    }

    fn groups(&mut self) -> Result<Vec<AspectElement>> {
        let nets: Vec<NetworkId> = self.views.iter().map(|v| v.net).collect();
        let mut out = Vec::new();
        for net in nets {
            for group in self.model.groups(net)? {
                let view = self.net_wire(net);
                out.push(AspectElement::Group(GroupElement {
                    id: self.node_wire(group.node),
                    name: group.name.clone(),
                    nodes: group.members.iter().map(|n| self.node_wire(*n)).collect(),
                    internal_edges: group.internal_edges.iter().map(|e| self.edge_wire(*e)).collect(),
                    external_edges: group.external_edges.iter().map(|e| self.edge_wire(*e)).collect(),
                    collapsed: group.collapsed || self.snapshot.was_collapsed(net, group.node),
                    view: Some(view),
                }));
            }
        }
        Ok(out)
    }

    fn layout(&mut self) -> Vec<AspectElement> {
        let placed: Vec<(NetworkId, NodeId, Position)> = self
            .views
            .iter()
            .flat_map(|v| {
                v.nodes
                    .iter()
                    .filter_map(|n| Some((v.net, n.id, self.model.position(v.net, n.id)?)))
                    .collect::<Vec<_>>()
            })
            .collect();
        placed
            .into_iter()
            .map(|(net, node, pos)| {
                AspectElement::CartesianLayout(LayoutElement {
                    node: self.node_wire(node),
                    x: pos.x,
                    y: pos.y,
                    z: pos.z,
                    view: Some(self.net_wire(net)),
                })
            })
            .collect()
    }

    fn visual_properties(&mut self) -> Vec<AspectElement> {
        let defaults = self.styles.defaults();
        let mappings = self.styles.mappings();
        let dependencies: BTreeMap<String, String> =
            self.styles.dependencies().into_iter().map(|(k, v)| (k, v.to_string())).collect();

        let mut shared = Vec::new();
        for (target, properties_of) in [
            (TargetKind::Network, PropertiesOf::Network),
            (TargetKind::Node, PropertiesOf::NodesDefault),
            (TargetKind::Edge, PropertiesOf::EdgesDefault),
        ] {
            let mut element = VisualPropertiesElement::new(properties_of);
            element.properties = defaults
                .iter()
                .filter(|(p, _)| p.target == target)
                .map(|(p, v)| (p.name.clone(), v.clone()))
                .collect();
            element.mappings = mappings
                .iter()
                .filter(|(p, _)| p.target == target)
                .map(|(p, m)| (p.name.clone(), m.to_definition()))
                .collect();
            if target == TargetKind::Node {
                element.dependencies = dependencies.clone();
            }
            if !element.properties.is_empty() || !element.mappings.is_empty() || !element.dependencies.is_empty() {
                shared.push(element);
            }
        }

        let node_bypasses = self.styles.bypasses(TargetKind::Node);
        let edge_bypasses = self.styles.bypasses(TargetKind::Edge);
        let nets: Vec<(NetworkId, Vec<NodeId>, Vec<EdgeId>)> = self
            .views
            .iter()
            .map(|v| (v.net, v.nodes.iter().map(|n| n.id).collect(), v.edges.iter().map(|e| e.id).collect()))
            .collect();

        let mut out = Vec::new();
        let mut placed = Vec::new();
        for (net, nodes, edges) in nets {
            let view = Some(self.net_wire(net));
            for element in &shared {
                out.push(AspectElement::VisualProperties(VisualPropertiesElement { view, ..element.clone() }));
            }

            let mut per_node: BTreeMap<NodeId, BTreeMap<String, String>> = BTreeMap::new();
            for b in &node_bypasses {
                if nodes.contains(&NodeId(b.element)) {
                    per_node.entry(NodeId(b.element)).or_default().insert(b.property.name.clone(), b.value.clone());
                    placed.push((TargetKind::Node, b.element));
                }
            }
            for (node, properties) in per_node {
                let mut element = VisualPropertiesElement::new(PropertiesOf::Nodes);
                element.applies_to = Some(self.node_wire(node));
                element.view = view;
                element.properties = properties;
                out.push(AspectElement::VisualProperties(element));
            }

            let mut per_edge: BTreeMap<EdgeId, BTreeMap<String, String>> = BTreeMap::new();
            for b in &edge_bypasses {
                if edges.contains(&EdgeId(b.element)) {
                    per_edge.entry(EdgeId(b.element)).or_default().insert(b.property.name.clone(), b.value.clone());
                    placed.push((TargetKind::Edge, b.element));
                }
            }
            for (edge, properties) in per_edge {
                let mut element = VisualPropertiesElement::new(PropertiesOf::Edges);
                element.applies_to = Some(self.edge_wire(edge));
                element.view = view;
                element.properties = properties;
                out.push(AspectElement::VisualProperties(element));
            }
        }

        for b in node_bypasses.iter().chain(&edge_bypasses) {
            if !placed.contains(&(b.property.target, b.element)) {
                self.warn(format!(
                    "bypass {} on {:?} {} is outside the exported networks",
                    b.property.name, b.property.target, b.element
                ));
            }
        }
        out
    }
}

const REPRESENTS: &str = "represents";

/// Remove the attributes the node element itself carries (`n`, `r`).
fn strip_node_header(mut props: PropertyMap) -> PropertyMap {
    for key in ["name", REPRESENTS] {
        if matches!(props.get(key), Some(Value::String(_))) {
            props.remove(key);
        }
    }
    props
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraph;
    use crate::style::MemoryStyles;
    use pretty_assertions::assert_eq;

    fn small() -> (MemoryGraph, NetworkId) {
        let g = MemoryGraph::new();
        let net = g.create_network();
        let mut props = PropertyMap::new();
        props.insert("name".into(), Value::from("a"));
        props.insert("SUID".into(), Value::Long(52));
        props.insert("score".into(), Value::Double(0.5));
        let a = g.create_node(props).unwrap();
        g.add_node(net, a).unwrap();
        (g, net)
    }

    fn doc(buf: &[u8]) -> serde_json::Value {
        serde_json::from_slice(buf).unwrap()
    }

    #[test]
    fn test_config_from_json() {
        let config: ExportConfig =
            serde_json::from_str(r#"{"mode":"collection","aspects":["nodes","edges"],"use_wire_ids":true}"#).unwrap();
        assert_eq!(config.mode, ExportMode::Collection);
        assert_eq!(config.aspects, vec![AspectKind::Nodes, AspectKind::Edges]);
        assert!(config.use_wire_ids);
        assert_eq!(config.ignored_columns, vec!["SUID".to_string(), "selected".to_string()]);
    }

    #[test]
    fn test_strip_node_header() {
        let mut props = PropertyMap::new();
        props.insert("name".into(), Value::from("a"));
        props.insert("represents".into(), Value::Integer(3));
        let stripped = strip_node_header(props);
        assert!(!stripped.contains_key("name"));
        assert!(stripped.contains_key("represents"));
    }

    #[test]
    fn test_ignored_columns_and_name_header() {
        let (g, _) = small();
        let mut buf = Vec::new();
        let stats = export_network(&g, &MemoryStyles::new(), &mut buf, &ExportConfig::default()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(!text.contains("SUID"));
        assert!(text.contains(r#""n":"a""#));
        assert_eq!(stats.elements_per_aspect["nodeAttributes"], 1);
        assert!(!stats.elements_per_aspect.contains_key("edges"));
    }

    #[test]
    fn test_structural_error_writes_nothing() {
        let (g, _) = small();
        let mut buf = Vec::new();
        let config = ExportConfig::default().with_aspects([AspectKind::Nodes, AspectKind::CartesianLayout]);
        let result = export_network(&g, &MemoryStyles::new(), &mut buf, &config);
        assert!(matches!(result, Err(Error::StructuralError(_))));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_cancelled_export_closes_with_failure() {
        let (g, _) = small();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut buf = Vec::new();
        let config = ExportConfig::default().with_cancel(cancel);
        let result = export_network(&g, &MemoryStyles::new(), &mut buf, &config);
        assert!(matches!(result, Err(Error::Cancelled)));
        let last = doc(&buf).as_array().unwrap().last().unwrap().clone();
        assert_eq!(last["status"][0]["success"], serde_json::json!(false));
    }

    #[test]
    fn test_wire_ids_reused_and_minted() {
        let (g, net) = small();
        let first = g.nodes(net).unwrap()[0].id;
        g.set_node_wire_id(first, 700).unwrap();
        let second = g.create_node(PropertyMap::new()).unwrap();
        g.add_node(net, second).unwrap();

        let mut buf = Vec::new();
        let config = ExportConfig::default().with_aspects([AspectKind::Nodes]).with_wire_ids(true);
        export_network(&g, &MemoryStyles::new(), &mut buf, &config).unwrap();
        let nodes: Vec<serde_json::Value> = doc(&buf)
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|e| e.get("nodes").cloned())
            .collect();
        assert_eq!(nodes[0][0]["@id"], serde_json::json!(700));
        assert_eq!(nodes[0][1]["@id"], serde_json::json!(701));
    }

    #[test]
    fn test_mixed_list_skipped_with_warning() {
        let (g, net) = small();
        let styles = MemoryStyles::new();
        let config = ExportConfig::default();
        let snapshot = GroupSnapshot::default();
        let mut session = Session::new(&g, &styles, &config, &snapshot, &[net]).unwrap();

        let mut props = PropertyMap::new();
        props.insert("mixed".into(), Value::List(vec![Value::Integer(1), Value::from("two")]));
        props.insert("score".into(), Value::Double(0.5));
        let kept = session.writable(OwnerKind::Node, props);

        assert_eq!(kept, vec![("score".to_string(), Value::Double(0.5))]);
        assert_eq!(session.warnings.len(), 1);
        assert!(session.warnings[0].contains("'mixed'"));
        assert!(session.warnings[0].contains("mixed list of integer, string"));
    }

    #[test]
    fn test_column_filter_limits_attributes() {
        let (g, net) = small();
        let node = g.nodes(net).unwrap()[0].id;
        g.set_node_attribute(Scope::Collection, node, "rank", Value::Integer(2)).unwrap();

        let mut buf = Vec::new();
        let config = ExportConfig::default().with_node_columns(["rank"]);
        let stats = export_network(&g, &MemoryStyles::new(), &mut buf, &config).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains(r#""n":"rank""#));
        assert!(!text.contains(r#""n":"score""#));
        assert_eq!(stats.elements_per_aspect["nodeAttributes"], 1);
    }

    #[test]
    fn test_empty_column_filter_is_unset() {
        let config = ExportConfig::default().with_edge_columns(Vec::<String>::new());
        assert_eq!(config.edge_columns, None);
        assert_eq!(config.column_filter(OwnerKind::Edge), None);
    }

    #[test]
    fn test_writes_opaque_needs_every_known_aspect() {
        assert!(ExportConfig::default().writes_opaque());
        assert!(!ExportConfig::default().with_aspects([AspectKind::Nodes]).writes_opaque());
    }
}
