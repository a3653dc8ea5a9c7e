//! Typed aspect elements and their wire shapes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::model::Value;
use crate::types::{self, AttributeType};
use crate::{Error, Result};

use super::AspectKind;

// ============================================================================
// AspectElement
// ============================================================================

/// One element of one aspect.
#[derive(Debug, Clone, PartialEq)]
pub enum AspectElement {
    Node(NodeElement),
    Edge(EdgeElement),
    NodeAttribute(AttributeElement),
    EdgeAttribute(AttributeElement),
    NetworkAttribute(NetworkAttributeElement),
    CartesianLayout(LayoutElement),
    VisualProperties(VisualPropertiesElement),
    SubNetwork(SubNetworkElement),
    NetworkRelation(NetworkRelationElement),
    Group(GroupElement),
    TableColumn(TableColumnElement),
    Opaque(OpaqueElement),
}

impl AspectElement {
    pub fn kind(&self) -> AspectKind {
        match self {
            AspectElement::Node(_) => AspectKind::Nodes,
            AspectElement::Edge(_) => AspectKind::Edges,
            AspectElement::NodeAttribute(_) => AspectKind::NodeAttributes,
            AspectElement::EdgeAttribute(_) => AspectKind::EdgeAttributes,
            AspectElement::NetworkAttribute(_) => AspectKind::NetworkAttributes,
            AspectElement::CartesianLayout(_) => AspectKind::CartesianLayout,
            AspectElement::VisualProperties(_) => AspectKind::VisualProperties,
            AspectElement::SubNetwork(_) => AspectKind::SubNetworks,
            AspectElement::NetworkRelation(_) => AspectKind::NetworkRelations,
            AspectElement::Group(_) => AspectKind::Groups,
            AspectElement::TableColumn(_) => AspectKind::TableColumns,
            AspectElement::Opaque(o) => AspectKind::Opaque(o.aspect.clone()),
        }
    }

    /// The element's own wire ID, for id-counter bookkeeping.
    pub fn id(&self) -> Option<u64> {
        match self {
            AspectElement::Node(n) => Some(n.id),
            AspectElement::Edge(e) => Some(e.id),
            AspectElement::SubNetwork(s) => Some(s.id),
            AspectElement::Group(g) => Some(g.id),
            AspectElement::Opaque(o) => o.id(),
            _ => None,
        }
    }

    /// The subnetwork this element is scoped to, if any.
    pub fn subnet(&self) -> Option<u64> {
        match self {
            AspectElement::NodeAttribute(a) | AspectElement::EdgeAttribute(a) => a.subnet,
            AspectElement::NetworkAttribute(a) => a.subnet,
            AspectElement::CartesianLayout(l) => l.view,
            AspectElement::VisualProperties(v) => v.view,
            AspectElement::Group(g) => g.view,
            AspectElement::TableColumn(c) => c.subnet,
            _ => None,
        }
    }
}

// ============================================================================
// Graph structure
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeElement {
    #[serde(rename = "@id")]
    pub id: u64,
    #[serde(rename = "n", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "r", default, skip_serializing_if = "Option::is_none")]
    pub represents: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeElement {
    #[serde(rename = "@id")]
    pub id: u64,
    #[serde(rename = "s")]
    pub source: u64,
    #[serde(rename = "t")]
    pub target: u64,
    #[serde(rename = "i", default, skip_serializing_if = "Option::is_none")]
    pub interaction: Option<String>,
}

// ============================================================================
// Attributes
// ============================================================================

/// A node or edge attribute value, already coerced to its declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeElement {
    /// Wire ID of the owning node or edge.
    pub owner: u64,
    pub name: String,
    pub value: Value,
    pub ty: AttributeType,
    pub subnet: Option<u64>,
}

impl AttributeElement {
    pub fn new(owner: u64, name: impl Into<String>, value: Value) -> Self {
        let ty = value.attribute_type();
        Self { owner, name: name.into(), value, ty, subnet: None }
    }
}

/// A network-level attribute. Without a subnet it belongs to the collection
/// (or the single exported network).
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkAttributeElement {
    pub name: String,
    pub value: Value,
    pub ty: AttributeType,
    pub subnet: Option<u64>,
}

impl NetworkAttributeElement {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        let ty = value.attribute_type();
        Self { name: name.into(), value, ty, subnet: None }
    }
}

/// Shared wire shape of all three attribute aspects.
#[derive(Debug, Serialize, Deserialize)]
struct AttributeWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    po: Option<u64>,
    n: String,
    v: Json,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    d: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    s: Option<u64>,
}

impl AttributeWire {
    fn encode(po: Option<u64>, name: &str, value: &Value, ty: AttributeType, s: Option<u64>) -> Result<Option<Json>> {
        if !ty.admits(value) {
            return Err(Error::TypeError(format!(
                "attribute '{name}' declared {ty} but holds {}",
                types::describe(value)
            )));
        }
        let Some(v) = types::to_wire(value) else {
            return Ok(None);
        };
        let d = (ty != AttributeType::STRING).then(|| ty.tag());
        Ok(Some(serde_json::to_value(AttributeWire { po, n: name.to_string(), v, d, s })?))
    }

    /// Coerce the raw value. `None` when the value is an empty list.
    fn typed_value(&self) -> Result<Option<(Value, AttributeType)>> {
        let ty = match &self.d {
            Some(tag) => AttributeType::from_tag(tag)?,
            None => AttributeType::STRING,
        };
        let coerced = types::coerce(&self.v, ty).map_err(|e| match e {
            Error::TypeError(msg) => Error::TypeError(format!("attribute '{}': {msg}", self.n)),
            other => other,
        })?;
        Ok(coerced.map(|v| (v, ty)))
    }
}

impl AttributeElement {
    pub(crate) fn to_json(&self) -> Result<Option<Json>> {
        AttributeWire::encode(Some(self.owner), &self.name, &self.value, self.ty, self.subnet)
    }

    pub(crate) fn from_json(raw: Json) -> Result<Option<Self>> {
        let wire: AttributeWire = decode_json(raw)?;
        let owner = wire.po.ok_or_else(|| {
            Error::ValidationError(format!("attribute '{}' has no owner (po)", wire.n))
        })?;
        Ok(wire.typed_value()?.map(|(value, ty)| AttributeElement {
            owner,
            name: wire.n,
            value,
            ty,
            subnet: wire.s,
        }))
    }
}

impl NetworkAttributeElement {
    pub(crate) fn to_json(&self) -> Result<Option<Json>> {
        AttributeWire::encode(None, &self.name, &self.value, self.ty, self.subnet)
    }

    pub(crate) fn from_json(raw: Json) -> Result<Option<Self>> {
        let wire: AttributeWire = decode_json(raw)?;
        Ok(wire.typed_value()?.map(|(value, ty)| NetworkAttributeElement {
            name: wire.n,
            value,
            ty,
            subnet: wire.s,
        }))
    }
}

// ============================================================================
// Layout and styling
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutElement {
    pub node: u64,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<u64>,
}

/// What a visual-properties element describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertiesOf {
    #[serde(rename = "network")]
    Network,
    #[serde(rename = "nodes:default")]
    NodesDefault,
    #[serde(rename = "edges:default")]
    EdgesDefault,
    /// Per-node bypass values; `applies_to` names the node.
    #[serde(rename = "nodes")]
    Nodes,
    /// Per-edge bypass values; `applies_to` names the edge.
    #[serde(rename = "edges")]
    Edges,
}

/// A mapping function in its wire form: a kind tag and a property string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualPropertiesElement {
    pub properties_of: PropertiesOf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applies_to: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<u64>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mappings: BTreeMap<String, MappingDefinition>,
}

impl VisualPropertiesElement {
    pub fn new(properties_of: PropertiesOf) -> Self {
        Self {
            properties_of,
            applies_to: None,
            view: None,
            properties: BTreeMap::new(),
            dependencies: BTreeMap::new(),
            mappings: BTreeMap::new(),
        }
    }
}

// ============================================================================
// Collections and groups
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubNetworkElement {
    #[serde(rename = "@id")]
    pub id: u64,
    #[serde(default)]
    pub nodes: Vec<u64>,
    #[serde(default)]
    pub edges: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    #[default]
    Subnetwork,
    View,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRelationElement {
    #[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<u64>,
    #[serde(rename = "c")]
    pub child: u64,
    #[serde(rename = "r", default)]
    pub relation: RelationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupElement {
    #[serde(rename = "@id")]
    pub id: u64,
    #[serde(rename = "n", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub nodes: Vec<u64>,
    #[serde(default)]
    pub internal_edges: Vec<u64>,
    #[serde(default)]
    pub external_edges: Vec<u64>,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<u64>,
}

/// A column declaration of one of the attribute tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableColumnElement {
    pub applies_to: String,
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "d", default = "string_type")]
    pub ty: AttributeType,
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<u64>,
}

fn string_type() -> AttributeType {
    AttributeType::STRING
}

// ============================================================================
// Opaque
// ============================================================================

/// An element of an aspect with no registered codec, kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueElement {
    pub aspect: String,
    pub data: Json,
}

impl OpaqueElement {
    pub fn new(aspect: impl Into<String>, data: Json) -> Self {
        Self { aspect: aspect.into(), data }
    }

    /// An embedded numeric `@id`, if the element has one.
    pub fn id(&self) -> Option<u64> {
        self.data.get("@id").and_then(Json::as_u64)
    }
}

// ============================================================================
// Serde-backed payloads
// ============================================================================

pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(raw: Json) -> Result<T> {
    serde_json::from_value(raw).map_err(|e| Error::ValidationError(format!("malformed element: {e}")))
}

macro_rules! serde_payload {
    ($($ty:ty),* $(,)?) => {$(
        impl $ty {
            pub(crate) fn to_json(&self) -> Result<Option<Json>> {
                Ok(Some(serde_json::to_value(self)?))
            }

            pub(crate) fn from_json(raw: Json) -> Result<Option<Self>> {
                decode_json(raw).map(Some)
            }
        }
    )*};
}

serde_payload!(
    NodeElement,
    EdgeElement,
    LayoutElement,
    VisualPropertiesElement,
    SubNetworkElement,
    NetworkRelationElement,
    GroupElement,
    TableColumnElement,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_node_wire_shape() {
        let node = NodeElement { id: 7, name: Some("a".into()), represents: None };
        assert_eq!(node.to_json().unwrap().unwrap(), json!({"@id": 7, "n": "a"}));
    }

    #[test]
    fn test_string_attribute_omits_type() {
        let attr = AttributeElement::new(3, "name", Value::from("x"));
        assert_eq!(attr.to_json().unwrap().unwrap(), json!({"po": 3, "n": "name", "v": "x"}));
    }

    #[test]
    fn test_attribute_decode_coerces() {
        let raw = json!({"po": 1, "n": "w", "v": "2.0E1", "d": "integer", "s": 9});
        let attr = AttributeElement::from_json(raw).unwrap().unwrap();
        assert_eq!(attr.value, Value::Integer(20));
        assert_eq!(attr.ty, AttributeType::Single(PrimitiveKind::Integer));
        assert_eq!(attr.subnet, Some(9));
    }

    #[test]
    fn test_attribute_bad_type_tag() {
        let raw = json!({"po": 1, "n": "w", "v": "1", "d": "decimal"});
        assert!(matches!(AttributeElement::from_json(raw), Err(Error::TypeError(_))));
    }

    #[test]
    fn test_empty_list_attribute_is_absent() {
        let raw = json!({"n": "tags", "v": [], "d": "list_of_string"});
        assert_eq!(NetworkAttributeElement::from_json(raw).unwrap(), None);
        let attr = NetworkAttributeElement::new("tags", Value::List(Vec::new()));
        assert_eq!(attr.to_json().unwrap(), None);
    }

    #[test]
    fn test_attribute_type_mismatch_on_encode() {
        let mut attr = AttributeElement::new(1, "x", Value::from("s"));
        attr.ty = AttributeType::Single(PrimitiveKind::Double);
        assert!(attr.to_json().is_err());
    }

    #[test]
    fn test_visual_properties_shape() {
        let mut vp = VisualPropertiesElement::new(PropertiesOf::NodesDefault);
        vp.view = Some(2);
        vp.properties.insert("NODE_SIZE".into(), "30.0".into());
        assert_eq!(
            vp.to_json().unwrap().unwrap(),
            json!({"properties_of": "nodes:default", "view": 2, "properties": {"NODE_SIZE": "30.0"}})
        );
    }

    #[test]
    fn test_opaque_id() {
        let o = OpaqueElement::new("custom", json!({"@id": 12, "x": 1}));
        assert_eq!(o.id(), Some(12));
        assert_eq!(OpaqueElement::new("custom", json!([1])).id(), None);
    }
}
