//! Aspect registry: which aspects get a typed codec.

use hashbrown::HashMap;
use serde_json::Value as Json;

use super::element::*;
use super::AspectKind;
use crate::{Error, Result};

/// Encoder/decoder pair for one aspect kind.
///
/// `encode` yields `None` for elements that must not appear on the wire
/// (empty list attributes); `decode` yields `None` for wire elements that
/// carry nothing (the same case, read back).
#[derive(Clone, Copy)]
pub struct Codec {
    pub encode: fn(&AspectElement) -> Result<Option<Json>>,
    pub decode: fn(Json) -> Result<Option<AspectElement>>,
}

macro_rules! codec {
    ($variant:ident, $ty:ty) => {
        Codec {
            encode: |element| match element {
                AspectElement::$variant(payload) => payload.to_json(),
                other => Err(Error::ValidationError(format!(
                    "{} element cannot be written as {}",
                    other.kind(),
                    stringify!($variant)
                ))),
            },
            decode: |raw| Ok(<$ty>::from_json(raw)?.map(AspectElement::$variant)),
        }
    };
}

/// The built-in codec of a known aspect kind.
fn builtin(kind: &AspectKind) -> Option<Codec> {
    Some(match kind {
        AspectKind::Nodes => codec!(Node, NodeElement),
        AspectKind::Edges => codec!(Edge, EdgeElement),
        AspectKind::NodeAttributes => codec!(NodeAttribute, AttributeElement),
        AspectKind::EdgeAttributes => codec!(EdgeAttribute, AttributeElement),
        AspectKind::NetworkAttributes => codec!(NetworkAttribute, NetworkAttributeElement),
        AspectKind::CartesianLayout => codec!(CartesianLayout, LayoutElement),
        AspectKind::VisualProperties => codec!(VisualProperties, VisualPropertiesElement),
        AspectKind::SubNetworks => codec!(SubNetwork, SubNetworkElement),
        AspectKind::NetworkRelations => codec!(NetworkRelation, NetworkRelationElement),
        AspectKind::Groups => codec!(Group, GroupElement),
        AspectKind::TableColumns => codec!(TableColumn, TableColumnElement),
        AspectKind::Opaque(_) => return None,
    })
}

/// Maps aspect kinds to codecs.
///
/// Aspects without an entry are treated as opaque: read as raw JSON, and
/// only raw JSON may be written under them.
#[derive(Clone, Default)]
pub struct AspectRegistry {
    codecs: HashMap<AspectKind, Codec>,
}

impl AspectRegistry {
    /// An empty registry: everything is opaque.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every known aspect registered.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for kind in AspectKind::KNOWN {
            registry.register(kind);
        }
        registry
    }

    /// Register the built-in codec for `kind`. Returns false for opaque
    /// kinds, which have none.
    pub fn register(&mut self, kind: AspectKind) -> bool {
        match builtin(&kind) {
            Some(codec) => {
                self.codecs.insert(kind, codec);
                true
            }
            None => false,
        }
    }

    /// Drop `kind` so it is handled as opaque.
    pub fn without(mut self, kind: &AspectKind) -> Self {
        self.codecs.remove(kind);
        self
    }

    pub fn is_registered(&self, kind: &AspectKind) -> bool {
        self.codecs.contains_key(kind)
    }

    /// Encode `element` for a fragment of `aspect`.
    ///
    /// Opaque elements pass through untouched whatever the aspect. A typed
    /// element needs a codec for `aspect`, and must be of that aspect.
    pub fn encode(&self, aspect: &AspectKind, element: &AspectElement) -> Result<Option<Json>> {
        if let AspectElement::Opaque(opaque) = element {
            return Ok(Some(opaque.data.clone()));
        }
        let codec = self.codecs.get(aspect).ok_or_else(|| {
            Error::ValidationError(format!("no codec registered for aspect '{aspect}'"))
        })?;
        (codec.encode)(element)
    }

    /// Decode one wire element of the aspect called `name`.
    pub fn decode(&self, name: &str, raw: Json) -> Result<Option<AspectElement>> {
        let kind = AspectKind::from_name(name);
        match self.codecs.get(&kind) {
            Some(codec) => (codec.decode)(raw),
            None => Ok(Some(AspectElement::Opaque(OpaqueElement::new(name, raw)))),
        }
    }
}

impl std::fmt::Debug for AspectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&AspectKind> = self.codecs.keys().collect();
        kinds.sort();
        f.debug_struct("AspectRegistry").field("codecs", &kinds).finish()
    }
}
