//! Aspect metadata blocks and the terminal status element.
//!
//! A document carries metadata twice: before the body, with whatever the
//! producer knew up front, and after it, with true element counts and ID
//! high-water marks. Readers usually want the two merged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Metadata version written for every aspect.
pub const ASPECT_VERSION: &str = "1.0";

/// Metadata of one aspect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AspectMetadata {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_counter: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency_group: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Json>,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<i64>,
}

fn default_version() -> String {
    ASPECT_VERSION.to_string()
}

impl AspectMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            id_counter: None,
            element_count: None,
            consistency_group: None,
            properties: BTreeMap::new(),
            last_update: None,
        }
    }

    /// Overlay `later` onto `self`: fields present in `later` win.
    fn overlay(&mut self, later: &AspectMetadata) {
        self.version = later.version.clone();
        self.id_counter = later.id_counter.or(self.id_counter);
        self.element_count = later.element_count.or(self.element_count);
        self.consistency_group = later.consistency_group.or(self.consistency_group);
        self.last_update = later.last_update.or(self.last_update);
        self.properties.extend(later.properties.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

/// Ordered collection of aspect metadata, at most one entry per name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataCollection {
    entries: Vec<AspectMetadata>,
}

impl MetadataCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overlay an entry, keeping first-seen order.
    pub fn add(&mut self, entry: AspectMetadata) {
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => existing.overlay(&entry),
            None => self.entries.push(entry),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AspectMetadata> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AspectMetadata> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Combine pre- and post-metadata: one entry per aspect, post values
    /// overriding pre values.
    pub fn merge(pre: &MetadataCollection, post: &MetadataCollection) -> MetadataCollection {
        let mut merged = pre.clone();
        for entry in &post.entries {
            merged.add(entry.clone());
        }
        merged
    }

}

impl FromIterator<AspectMetadata> for MetadataCollection {
    fn from_iter<I: IntoIterator<Item = AspectMetadata>>(iter: I) -> Self {
        let mut collection = MetadataCollection::new();
        for entry in iter {
            collection.add(entry);
        }
        collection
    }
}

/// Outcome recorded at the end of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let mut m = AspectMetadata::new("nodes");
        m.element_count = Some(2);
        m.id_counter = Some(5);
        m.consistency_group = Some(1);
        assert_eq!(
            serde_json::to_value(&m).unwrap(),
            json!({"name": "nodes", "version": "1.0", "idCounter": 5, "elementCount": 2, "consistencyGroup": 1})
        );
    }

    #[test]
    fn test_merge_post_wins_and_dedups() {
        let mut pre_nodes = AspectMetadata::new("nodes");
        pre_nodes.element_count = Some(10);
        pre_nodes.last_update = Some(1);
        let pre: MetadataCollection = [pre_nodes, AspectMetadata::new("edges")].into_iter().collect();

        let mut post_nodes = AspectMetadata::new("nodes");
        post_nodes.element_count = Some(2);
        post_nodes.id_counter = Some(9);
        let post: MetadataCollection = [post_nodes].into_iter().collect();

        let merged = MetadataCollection::merge(&pre, &post);
        assert_eq!(merged.names(), vec!["nodes", "edges"]);
        let nodes = merged.get("nodes").unwrap();
        assert_eq!(nodes.element_count, Some(2));
        assert_eq!(nodes.id_counter, Some(9));
        assert_eq!(nodes.last_update, Some(1));
    }

    #[test]
    fn test_version_defaults_on_read() {
        let m: AspectMetadata = serde_json::from_value(json!({"name": "x"})).unwrap();
        assert_eq!(m.version, "1.0");
    }
}
