//! # Visual Styles
//!
//! The style-mapping algebra: mapping functions and their textual encoding
//! ([`mapping`]), continuous evaluation ([`interpolate`]), and the
//! [`StyleEngine`] contract through which the codec reads and installs
//! styles, with a reference in-memory engine ([`MemoryStyles`]).

pub mod interpolate;
pub mod mapping;
pub mod memory;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::PropertyMap;
use crate::Result;

pub use interpolate::{Breakpoint, ValueSpace};
pub use mapping::{ContinuousMapping, DiscreteMapping, MappingFunction, PassthroughMapping};
pub use memory::MemoryStyles;

/// What a visual property styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetKind {
    Network,
    Node,
    Edge,
}

/// A visual property known to the style engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisualProperty {
    pub target: TargetKind,
    /// Wire identifier, e.g. `NODE_FILL_COLOR`.
    pub name: String,
    /// How values of this property interpolate.
    pub space: ValueSpace,
}

impl VisualProperty {
    pub fn new(target: TargetKind, name: impl Into<String>, space: ValueSpace) -> Self {
        Self { target, name: name.into(), space }
    }
}

/// A per-element override of a visual property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bypass {
    /// Host ID of the node or edge.
    pub element: u64,
    pub property: VisualProperty,
    pub value: String,
}

// ============================================================================
// StyleEngine Trait
// ============================================================================

/// The style contract consumed by export and import.
///
/// All operations act on the engine's current style. Methods take `&self`;
/// implementations use interior mutability, like [`GraphModel`](crate::graph::GraphModel).
pub trait StyleEngine {
    /// Names of every style the engine holds.
    fn style_names(&self) -> Vec<String>;

    /// Create a style and make it current. Fails if the name is taken.
    fn create_style(&self, name: &str) -> Result<()>;

    /// Name of the current style, if any.
    fn current_style(&self) -> Option<String>;

    /// Resolve a property by target and wire name.
    fn lookup_property(&self, target: TargetKind, name: &str) -> Option<VisualProperty>;

    fn default_value(&self, property: &VisualProperty) -> Option<String>;

    fn set_default_value(&self, property: &VisualProperty, value: String);

    /// Every default of the current style.
    fn defaults(&self) -> Vec<(VisualProperty, String)>;

    /// Install a mapping, replacing any earlier one for the same property.
    fn add_mapping(&self, property: &VisualProperty, mapping: MappingFunction);

    fn mappings(&self) -> Vec<(VisualProperty, MappingFunction)>;

    fn bypasses(&self, target: TargetKind) -> Vec<Bypass>;

    fn set_bypass(&self, bypass: Bypass);

    /// Style dependencies such as `nodeSizeLocked`.
    fn dependencies(&self) -> BTreeMap<String, bool> {
        BTreeMap::new()
    }

    fn set_dependency(&self, _name: &str, _enabled: bool) {}

    /// The value `property` takes for one element with attributes `props`:
    /// bypass, else mapping, else default.
    fn resolve(&self, element: u64, props: &PropertyMap, property: &VisualProperty) -> Option<String> {
        if let Some(bypass) = self
            .bypasses(property.target)
            .into_iter()
            .find(|b| b.element == element && b.property.name == property.name)
        {
            return Some(bypass.value);
        }
        let mapped = self
            .mappings()
            .into_iter()
            .find(|(p, _)| p.name == property.name && p.target == property.target)
            .and_then(|(p, mapping)| mapping.evaluate(props.get(mapping.column())?, p.space));
        mapped.or_else(|| self.default_value(property))
    }
}
