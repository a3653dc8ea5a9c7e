//! # Aspects
//!
//! An aspect is a named, independently-typed partition of the exchanged
//! graph: nodes, edges, one of the attribute tables, layout, styling, and so
//! on. Every wire element belongs to exactly one aspect.
//!
//! The set of aspects this crate understands is closed ([`AspectKind`]);
//! anything else is [`AspectKind::Opaque`] and is carried verbatim.
//!
//! | Aspect | Wire name | Payload |
//! |--------|-----------|---------|
//! | Nodes | `nodes` | [`NodeElement`] |
//! | Edges | `edges` | [`EdgeElement`] |
//! | Node attributes | `nodeAttributes` | [`AttributeElement`] |
//! | Edge attributes | `edgeAttributes` | [`AttributeElement`] |
//! | Network attributes | `networkAttributes` | [`NetworkAttributeElement`] |
//! | Layout | `cartesianLayout` | [`LayoutElement`] |
//! | Visual properties | `cyVisualProperties` | [`VisualPropertiesElement`] |
//! | Subnetworks | `cySubNetworks` | [`SubNetworkElement`] |
//! | Network relations | `cyNetworkRelations` | [`NetworkRelationElement`] |
//! | Groups | `cyGroups` | [`GroupElement`] |
//! | Table columns | `cyTableColumn` | [`TableColumnElement`] |

pub mod element;
pub mod registry;

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use element::{
    AspectElement, AttributeElement, EdgeElement, GroupElement, LayoutElement,
    MappingDefinition, NetworkAttributeElement, NetworkRelationElement, NodeElement,
    OpaqueElement, PropertiesOf, RelationType, SubNetworkElement, TableColumnElement,
    VisualPropertiesElement,
};
pub use registry::AspectRegistry;

/// Every aspect kind, keyed by its wire name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AspectKind {
    Nodes,
    Edges,
    NodeAttributes,
    EdgeAttributes,
    NetworkAttributes,
    CartesianLayout,
    VisualProperties,
    SubNetworks,
    NetworkRelations,
    Groups,
    TableColumns,
    /// An aspect this crate has no decoder for.
    Opaque(String),
}

impl AspectKind {
    /// All kinds with a built-in codec, in the order an export writes them.
    pub const KNOWN: [AspectKind; 11] = [
        AspectKind::NetworkAttributes,
        AspectKind::Nodes,
        AspectKind::Edges,
        AspectKind::NodeAttributes,
        AspectKind::EdgeAttributes,
        AspectKind::TableColumns,
        AspectKind::SubNetworks,
        AspectKind::NetworkRelations,
        AspectKind::Groups,
        AspectKind::CartesianLayout,
        AspectKind::VisualProperties,
    ];

    pub fn from_name(name: &str) -> Self {
        match name {
            "nodes" => AspectKind::Nodes,
            "edges" => AspectKind::Edges,
            "nodeAttributes" => AspectKind::NodeAttributes,
            "edgeAttributes" => AspectKind::EdgeAttributes,
            "networkAttributes" => AspectKind::NetworkAttributes,
            "cartesianLayout" => AspectKind::CartesianLayout,
            "cyVisualProperties" => AspectKind::VisualProperties,
            "cySubNetworks" => AspectKind::SubNetworks,
            "cyNetworkRelations" => AspectKind::NetworkRelations,
            "cyGroups" => AspectKind::Groups,
            "cyTableColumn" => AspectKind::TableColumns,
            other => AspectKind::Opaque(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AspectKind::Nodes => "nodes",
            AspectKind::Edges => "edges",
            AspectKind::NodeAttributes => "nodeAttributes",
            AspectKind::EdgeAttributes => "edgeAttributes",
            AspectKind::NetworkAttributes => "networkAttributes",
            AspectKind::CartesianLayout => "cartesianLayout",
            AspectKind::VisualProperties => "cyVisualProperties",
            AspectKind::SubNetworks => "cySubNetworks",
            AspectKind::NetworkRelations => "cyNetworkRelations",
            AspectKind::Groups => "cyGroups",
            AspectKind::TableColumns => "cyTableColumn",
            AspectKind::Opaque(name) => name,
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, AspectKind::Opaque(_))
    }

    /// Aspects that only make sense anchored to an identified subnetwork.
    pub fn requires_subnetworks(&self) -> bool {
        matches!(self, AspectKind::VisualProperties | AspectKind::CartesianLayout)
    }
}

impl fmt::Display for AspectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for AspectKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for AspectKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(AspectKind::from_name(&String::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for kind in AspectKind::KNOWN {
            assert_eq!(AspectKind::from_name(kind.name()), kind);
        }
    }

    #[test]
    fn test_unknown_is_opaque() {
        let kind = AspectKind::from_name("ndexStatus");
        assert_eq!(kind, AspectKind::Opaque("ndexStatus".into()));
        assert_eq!(kind.name(), "ndexStatus");
    }
}
