//! ID correlation between host identifiers and wire identifiers, and
//! collision-free naming of derived artifacts.

use std::collections::BTreeMap;
use std::hash::Hash;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::aspect::OpaqueElement;
use crate::{Error, Result};

/// Opaque aspect a collection export writes so the wire IDs nodes and edges
/// were originally imported with survive a round trip.
pub const CX_ID_MAPPING: &str = "cxIdMapping";

/// Maximum number of names `unique_style_name` probes.
pub const STYLE_NAME_PROBES: usize = 100;

/// Host ⇄ wire identifier table for one element class (nodes, edges, ...).
///
/// Lives for one export or import session. On export with wire IDs enabled
/// it reuses IDs recorded from an earlier import and mints fresh ones above
/// the high-water mark for everything else.
#[derive(Debug, Clone)]
pub struct IdCorrelation<H: Eq + Hash + Copy> {
    host_to_wire: HashMap<H, u64>,
    wire_to_host: HashMap<u64, H>,
    next_wire: u64,
}

impl<H: Eq + Hash + Copy> Default for IdCorrelation<H> {
    fn default() -> Self {
        Self { host_to_wire: HashMap::new(), wire_to_host: HashMap::new(), next_wire: 0 }
    }
}

impl<H: Eq + Hash + Copy> IdCorrelation<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from recorded `(host, wire)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (H, u64)>) -> Self {
        let mut table = Self::new();
        for (host, wire) in pairs {
            table.record(host, wire);
        }
        table
    }

    /// Record that `host` is known as `wire` on the wire.
    ///
    /// A wire ID already bound to another host is left alone; the later host
    /// gets a fresh ID when it is resolved.
    pub fn record(&mut self, host: H, wire: u64) -> bool {
        if self.wire_to_host.contains_key(&wire) {
            return false;
        }
        self.host_to_wire.insert(host, wire);
        self.wire_to_host.insert(wire, host);
        self.next_wire = self.next_wire.max(wire.saturating_add(1));
        true
    }

    /// A wire ID no host holds yet: the high-water mark, or the lowest free
    /// ID once the mark is pinned at `u64::MAX`.
    fn mint(&self) -> u64 {
        if !self.wire_to_host.contains_key(&self.next_wire) {
            return self.next_wire;
        }
        (0..=u64::MAX)
            .find(|wire| !self.wire_to_host.contains_key(wire))
            .unwrap_or(self.next_wire)
    }

    /// The effective wire ID of `host`.
    ///
    /// With `use_wire_ids`, the recorded wire ID is reused or a fresh one is
    /// minted and recorded. Without, `host_id` itself is used.
    pub fn resolve(&mut self, host: H, host_id: u64, use_wire_ids: bool) -> u64 {
        if !use_wire_ids {
            return host_id;
        }
        if let Some(wire) = self.host_to_wire.get(&host) {
            return *wire;
        }
        let wire = self.mint();
        self.record(host, wire);
        wire
    }

    pub fn wire_of(&self, host: &H) -> Option<u64> {
        self.host_to_wire.get(host).copied()
    }

    pub fn host_of(&self, wire: u64) -> Option<H> {
        self.wire_to_host.get(&wire).copied()
    }

    pub fn len(&self) -> usize {
        self.host_to_wire.len()
    }

    pub fn is_empty(&self) -> bool {
        self.host_to_wire.is_empty()
    }
}

/// Exported `@id` → original wire ID, per element class.
///
/// A collection export writes host IDs as `@id`; this table lets an import
/// restore the wire IDs those elements carried before.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireIdMapping {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nodes: BTreeMap<u64, u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub edges: BTreeMap<u64, u64>,
}

impl WireIdMapping {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn to_opaque(&self) -> Result<OpaqueElement> {
        Ok(OpaqueElement::new(CX_ID_MAPPING, serde_json::to_value(self)?))
    }

    /// Read a mapping element. Later elements of the same document are
    /// merged in by the caller.
    pub fn from_opaque(element: &OpaqueElement) -> Result<Self> {
        serde_json::from_value(element.data.clone())
            .map_err(|e| Error::ValidationError(format!("malformed {CX_ID_MAPPING}: {e}")))
    }

    pub fn merge(&mut self, other: WireIdMapping) {
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges);
    }
}

/// Pick a style name that does not collide with `existing`.
///
/// Probes `base`, `base-1`, `base-2`, ... comparing case-insensitively, for
/// at most [`STYLE_NAME_PROBES`] candidates. If every candidate is taken the
/// last one probed is returned anyway, even though it collides.
pub fn unique_style_name<S: AsRef<str>>(base: &str, existing: &[S]) -> String {
    let taken = |candidate: &str| existing.iter().any(|e| e.as_ref().eq_ignore_ascii_case(candidate));
    let mut candidate = base.to_string();
    for attempt in 0..STYLE_NAME_PROBES {
        candidate = if attempt == 0 { base.to_string() } else { format!("{base}-{attempt}") };
        if !taken(&candidate) {
            return candidate;
        }
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeId;

    #[test]
    fn test_unique_style_name_skips_taken() {
        let existing = ["X", "X-1", "X-2", "X-3", "X-4"];
        assert_eq!(unique_style_name("X", &existing), "X-5");
    }

    #[test]
    fn test_unique_style_name_case_insensitive() {
        assert_eq!(unique_style_name("Style", &["style"]), "Style-1");
        assert_eq!(unique_style_name("Fresh", &["style"]), "Fresh");
    }

    #[test]
    fn test_unique_style_name_gives_up_after_bound() {
        let mut existing = vec!["S".to_string()];
        existing.extend((1..STYLE_NAME_PROBES).map(|i| format!("S-{i}")));
        assert_eq!(unique_style_name("S", &existing), "S-99");
    }

    #[test]
    fn test_resolve_without_wire_ids_uses_host() {
        let mut table: IdCorrelation<NodeId> = IdCorrelation::from_pairs([(NodeId(1), 40)]);
        assert_eq!(table.resolve(NodeId(1), 1, false), 1);
    }

    #[test]
    fn test_resolve_reuses_and_mints() {
        let mut table = IdCorrelation::from_pairs([(NodeId(1), 40), (NodeId(2), 7)]);
        assert_eq!(table.resolve(NodeId(1), 1, true), 40);
        assert_eq!(table.resolve(NodeId(3), 3, true), 41);
        assert_eq!(table.resolve(NodeId(3), 3, true), 41);
        assert_eq!(table.host_of(41), Some(NodeId(3)));
    }

    #[test]
    fn test_record_refuses_taken_wire_id() {
        let mut table = IdCorrelation::new();
        assert!(table.record(NodeId(1), 5));
        assert!(!table.record(NodeId(2), 5));
        assert_eq!(table.resolve(NodeId(2), 2, true), 6);
    }

    #[test]
    fn test_id_mapping_wire_shape() {
        let mut mapping = WireIdMapping::default();
        mapping.nodes.insert(3, 500);
        let opaque = mapping.to_opaque().unwrap();
        assert_eq!(opaque.aspect, CX_ID_MAPPING);
        assert_eq!(opaque.data, serde_json::json!({"nodes": {"3": 500}}));
        assert_eq!(WireIdMapping::from_opaque(&opaque).unwrap(), mapping);

        let bad = OpaqueElement::new(CX_ID_MAPPING, serde_json::json!({"nodes": {"x": "y"}}));
        assert!(matches!(WireIdMapping::from_opaque(&bad), Err(Error::ValidationError(_))));
    }

    #[test]
    fn test_largest_wire_id_does_not_overflow() {
        let mut table = IdCorrelation::new();
        assert!(table.record(NodeId(1), u64::MAX));
        assert_eq!(table.host_of(u64::MAX), Some(NodeId(1)));
        assert_eq!(table.resolve(NodeId(2), 2, true), 0);
        assert_eq!(table.resolve(NodeId(3), 3, true), 1);
        assert_eq!(table.resolve(NodeId(1), 1, true), u64::MAX);
    }
}
