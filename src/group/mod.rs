//! Group structural guard.
//!
//! Export must see every group expanded, so members and their edges are
//! written out. [`ExpandedGroups`] expands the collapsed groups of the
//! exported networks and re-collapses exactly those when it goes out of
//! scope, whether the export finished, failed or unwound.

use crate::graph::GraphModel;
use crate::model::{NetworkId, NodeId};
use crate::Result;

/// Groups that were collapsed before an export expanded them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupSnapshot {
    collapsed: Vec<(NetworkId, NodeId)>,
}

impl GroupSnapshot {
    /// Expand every collapsed group in `networks`, remembering which ones
    /// were collapsed.
    ///
    /// If expanding fails part way, the groups already expanded are
    /// collapsed again before the error is returned.
    pub fn take(model: &dyn GraphModel, networks: &[NetworkId]) -> Result<Self> {
        let mut snapshot = GroupSnapshot::default();
        for &net in networks {
            let groups = match model.collapsed_groups(net) {
                Ok(groups) => groups,
                Err(e) => {
                    snapshot.restore(model);
                    return Err(e);
                }
            };
            for group in groups {
                if let Err(e) = model.expand_group(net, group) {
                    snapshot.restore(model);
                    return Err(e);
                }
                snapshot.collapsed.push((net, group));
            }
        }
        if !snapshot.is_empty() {
            tracing::debug!(groups = snapshot.len(), "collapsed groups expanded for export");
        }
        Ok(snapshot)
    }

    /// Whether `group` of `net` was collapsed when the snapshot was taken.
    pub fn was_collapsed(&self, net: NetworkId, group: NodeId) -> bool {
        self.collapsed.contains(&(net, group))
    }

    pub fn len(&self) -> usize {
        self.collapsed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collapsed.is_empty()
    }

    /// Collapse the recorded groups again and clear the snapshot. Failures
    /// are logged, not returned; restore runs on error paths too.
    pub fn restore(&mut self, model: &dyn GraphModel) {
        for (net, group) in self.collapsed.drain(..) {
            if let Err(e) = model.collapse_group(net, group) {
                tracing::warn!(network = %net, group = %group, error = %e, "failed to re-collapse group");
            }
        }
    }
}

/// Scoped expansion: restores the snapshot on drop.
pub struct ExpandedGroups<'m> {
    model: &'m dyn GraphModel,
    snapshot: GroupSnapshot,
}

impl<'m> ExpandedGroups<'m> {
    pub fn new(model: &'m dyn GraphModel, networks: &[NetworkId]) -> Result<Self> {
        let snapshot = GroupSnapshot::take(model, networks)?;
        Ok(Self { model, snapshot })
    }

    pub fn snapshot(&self) -> &GroupSnapshot {
        &self.snapshot
    }
}

impl Drop for ExpandedGroups<'_> {
    fn drop(&mut self) {
        self.snapshot.restore(self.model);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraph;
    use crate::model::PropertyMap;

    fn grouped() -> (MemoryGraph, NetworkId, NodeId, NodeId) {
        let g = MemoryGraph::new();
        let net = g.create_network();
        let a = g.create_node(PropertyMap::new()).unwrap();
        let b = g.create_node(PropertyMap::new()).unwrap();
        g.add_node(net, a).unwrap();
        g.add_node(net, b).unwrap();
        let collapsed = g.create_group(net, None, Some("ab"), &[a, b]).unwrap();
        g.collapse_group(net, collapsed).unwrap();
        let c = g.create_node(PropertyMap::new()).unwrap();
        g.add_node(net, c).unwrap();
        let open = g.create_group(net, None, Some("c"), &[c]).unwrap();
        (g, net, collapsed, open)
    }

    #[test]
    fn test_guard_expands_then_restores() {
        let (g, net, collapsed, open) = grouped();
        {
            let guard = ExpandedGroups::new(&g, &[net]).unwrap();
            assert!(guard.snapshot().was_collapsed(net, collapsed));
            assert!(!guard.snapshot().was_collapsed(net, open));
            assert!(g.collapsed_groups(net).unwrap().is_empty());
        }
        assert_eq!(g.collapsed_groups(net).unwrap(), vec![collapsed]);
    }

    #[test]
    fn test_guard_restores_on_panic() {
        let (g, net, collapsed, _) = grouped();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = ExpandedGroups::new(&g, &[net]).unwrap();
            panic!("export blew up");
        }));
        assert!(result.is_err());
        assert_eq!(g.collapsed_groups(net).unwrap(), vec![collapsed]);
    }

    #[test]
    fn test_unknown_network_restores_partial_work() {
        let (g, net, collapsed, _) = grouped();
        let err = GroupSnapshot::take(&g, &[net, NetworkId(99)]);
        assert!(err.is_err());
        assert_eq!(g.collapsed_groups(net).unwrap(), vec![collapsed]);
    }
}
