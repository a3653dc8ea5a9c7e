//! PropertyMap: the attribute store on nodes, edges and networks.

use std::collections::BTreeMap;
use super::Value;

/// A map of attribute names to values.
///
/// Ordered so that exported attribute fragments are deterministic.
pub type PropertyMap = BTreeMap<String, Value>;
