//! Shared helpers for the end-to-end tests.

#![allow(dead_code)]

use cx_rs::{
    export_network, import_network, ExportConfig, GraphModel, ImportConfig, ImportStats, MemoryGraph,
    MemoryStyles, NetworkId, NodeId, PropertyMap, Value,
};
use serde_json::Value as Json;

/// Route `tracing` output through the test harness. `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn props(pairs: &[(&str, Value)]) -> PropertyMap {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// Create a node with `pairs` and add it to `net`.
pub fn node(graph: &MemoryGraph, net: NetworkId, pairs: &[(&str, Value)]) -> NodeId {
    let id = graph.create_node(props(pairs)).unwrap();
    graph.add_node(net, id).unwrap();
    id
}

pub fn export(graph: &MemoryGraph, styles: &MemoryStyles, config: &ExportConfig) -> Vec<u8> {
    let mut buf = Vec::new();
    export_network(graph, styles, &mut buf, config).unwrap();
    buf
}

pub fn reimport(doc: &[u8]) -> (MemoryGraph, MemoryStyles, ImportStats) {
    let graph = MemoryGraph::new();
    let styles = MemoryStyles::new();
    let stats = import_network(&graph, &styles, doc, ImportConfig::default()).unwrap();
    (graph, styles, stats)
}

pub fn parse(doc: &[u8]) -> Json {
    serde_json::from_slice(doc).unwrap()
}

/// Every element of every fragment of `aspect`, in document order.
pub fn elements_of(doc: &[u8], aspect: &str) -> Vec<Json> {
    parse(doc)
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|fragment| fragment.get(aspect))
        .flat_map(|elements| elements.as_array().unwrap().clone())
        .collect()
}

/// Names of the fragments in document order, envelope entries included.
pub fn fragment_names(doc: &[u8]) -> Vec<String> {
    parse(doc)
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|fragment| fragment.as_object()?.keys().next().cloned())
        .collect()
}
