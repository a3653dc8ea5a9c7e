//! End-to-end collection exports: several subnetworks under one root,
//! shared and local attribute tables, and ignored columns.

mod common;

use common::*;
use cx_rs::{ExportConfig, ExportMode, GraphModel, MemoryGraph, MemoryStyles, NetworkId, NodeId, Scope, Value};
use pretty_assertions::assert_eq;

struct Fixture {
    graph: MemoryGraph,
    first: NetworkId,
    second: NetworkId,
    shared: NodeId,
}

/// Two subnetworks sharing node `b`; `b` has a local `rank` in the first.
fn fixture() -> Fixture {
    let graph = MemoryGraph::new();
    graph.set_network_attribute(Scope::Collection, "name", Value::from("root")).unwrap();
    let first = graph.create_network();
    let second = graph.create_network();
    graph.set_network_attribute(Scope::Subgraph(first), "name", Value::from("first")).unwrap();
    graph.set_network_attribute(Scope::Subgraph(second), "name", Value::from("second")).unwrap();

    let bookkeeping = |name: &str, suid: i64| {
        vec![
            ("name", Value::from(name)),
            ("SUID", Value::Long(suid)),
            ("selected", Value::Boolean(false)),
        ]
    };
    let a = node(&graph, first, &bookkeeping("a", 101));
    let b = node(&graph, first, &bookkeeping("b", 102));
    graph.add_node(second, b).unwrap();
    node(&graph, second, &bookkeeping("c", 103));
    let e = graph.create_edge(a, b, Some("pp"), props(&[])).unwrap();
    graph.add_edge(first, e).unwrap();

    graph.set_node_attribute(Scope::Subgraph(first), b, "rank", Value::Integer(1)).unwrap();
    Fixture { graph, first, second, shared: b }
}

fn collection() -> ExportConfig {
    ExportConfig::default().with_mode(ExportMode::Collection)
}

// ============================================================================
// 1. Collection structure
// ============================================================================

#[test]
fn test_collection_lists_every_subnetwork() {
    init_tracing();
    let f = fixture();
    let doc = export(&f.graph, &MemoryStyles::new(), &collection());

    assert_eq!(elements_of(&doc, "nodes").len(), 3);
    let subnetworks = elements_of(&doc, "cySubNetworks");
    assert_eq!(subnetworks.len(), 2);
    assert_eq!(subnetworks[0]["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(subnetworks[0]["edges"].as_array().unwrap().len(), 1);
    assert_eq!(subnetworks[1]["nodes"].as_array().unwrap().len(), 2);

    let relations = elements_of(&doc, "cyNetworkRelations");
    let names: Vec<&str> = relations.iter().filter_map(|r| r["name"].as_str()).collect();
    assert_eq!(names, vec!["first", "second"]);
    assert!(relations.iter().all(|r| r["r"] == "subnetwork"));
}

#[test]
fn test_local_attributes_carry_subnetwork() {
    let f = fixture();
    let doc = export(&f.graph, &MemoryStyles::new(), &collection());

    let rank: Vec<_> = elements_of(&doc, "nodeAttributes").into_iter().filter(|a| a["n"] == "rank").collect();
    assert_eq!(rank.len(), 1);
    assert_eq!(rank[0]["po"].as_u64(), Some(f.shared.0));
    assert_eq!(rank[0]["s"].as_u64(), Some(f.first.0));
    assert_eq!(rank[0]["d"], "integer");

    let network_attributes = elements_of(&doc, "networkAttributes");
    let root = network_attributes.iter().find(|a| a["v"] == "root").unwrap();
    assert!(root.get("s").is_none());
    let second = network_attributes.iter().find(|a| a["v"] == "second").unwrap();
    assert_eq!(second["s"].as_u64(), Some(f.second.0));
}

#[test]
fn test_single_mode_has_no_subnetwork_scoping() {
    let f = fixture();
    let config = ExportConfig::default().with_network(f.first);
    let doc = export(&f.graph, &MemoryStyles::new(), &config);

    assert_eq!(elements_of(&doc, "nodes").len(), 2);
    let attributes = elements_of(&doc, "nodeAttributes");
    assert!(attributes.iter().all(|a| a.get("s").is_none()));
    assert!(attributes.iter().any(|a| a["n"] == "rank"));
    assert!(elements_of(&doc, "cyNetworkRelations").is_empty());

    // Local name wins over the root's in single mode.
    let names: Vec<_> = elements_of(&doc, "networkAttributes").into_iter().filter(|a| a["n"] == "name").collect();
    assert_eq!(names.len(), 1);
    assert_eq!(names[0]["v"], "first");
}

// ============================================================================
// 2. Ignored columns
// ============================================================================

#[test]
fn test_default_ignored_columns_in_both_modes() {
    let f = fixture();
    for config in [ExportConfig::default(), collection()] {
        let doc = export(&f.graph, &MemoryStyles::new(), &config);
        for aspect in ["nodeAttributes", "cyTableColumn"] {
            let leaked: Vec<_> = elements_of(&doc, aspect)
                .into_iter()
                .filter(|a| a["n"] == "SUID" || a["n"] == "selected")
                .collect();
            assert!(leaked.is_empty(), "{aspect}: {leaked:?}");
        }
    }
}

#[test]
fn test_custom_ignored_columns() {
    let f = fixture();
    let config = collection().with_ignored_columns(["rank"]);
    let doc = export(&f.graph, &MemoryStyles::new(), &config);
    let attributes = elements_of(&doc, "nodeAttributes");
    assert!(attributes.iter().any(|a| a["n"] == "SUID"));
    assert!(!attributes.iter().any(|a| a["n"] == "rank"));
}

// ============================================================================
// 3. Reimport
// ============================================================================

#[test]
fn test_collection_reimport() {
    let f = fixture();
    let doc = export(&f.graph, &MemoryStyles::new(), &collection());
    let (copy, _, stats) = reimport(&doc);
    assert!(stats.warnings.is_empty(), "{:?}", stats.warnings);
    assert_eq!(stats.networks.len(), 2);

    let (first, second) = (stats.networks[0], stats.networks[1]);
    let name_of = |net| copy.network_attributes(Scope::Subgraph(net)).unwrap().get("name").cloned();
    assert_eq!(name_of(first), Some(Value::from("first")));
    assert_eq!(name_of(second), Some(Value::from("second")));
    assert_eq!(
        copy.network_attributes(Scope::Collection).unwrap().get("name"),
        Some(&Value::from("root"))
    );

    let b_in_first = copy.nodes(first).unwrap().into_iter().find(|n| n.name() == Some("b")).unwrap();
    let b_in_second = copy.nodes(second).unwrap().into_iter().find(|n| n.name() == Some("b")).unwrap();
    assert_eq!(b_in_first.id, b_in_second.id);

    let local = copy.node_attributes(Scope::Subgraph(first), b_in_first.id).unwrap();
    assert_eq!(local.get("rank"), Some(&Value::Integer(1)));
    assert!(copy.node_attributes(Scope::Subgraph(second), b_in_first.id).unwrap().get("rank").is_none());

    assert_eq!(copy.edges(first).unwrap().len(), 1);
    assert!(copy.edges(second).unwrap().is_empty());
}

// ============================================================================
// 4. Column filters
// ============================================================================

#[test]
fn test_node_column_filter_limits_attributes_only() {
    let f = fixture();
    let doc = export(&f.graph, &MemoryStyles::new(), &collection().with_node_columns(["rank"]));

    let attrs = elements_of(&doc, "nodeAttributes");
    assert_eq!(attrs.len(), 1);
    assert_eq!(attrs[0]["n"], "rank");
    assert_eq!(attrs[0]["po"].as_u64(), Some(f.shared.0));

    let node_columns: Vec<String> = elements_of(&doc, "cyTableColumn")
        .iter()
        .filter(|c| c["applies_to"] == "node_table")
        .map(|c| c["n"].as_str().unwrap().to_string())
        .collect();
    assert!(node_columns.contains(&"name".to_string()));
    assert!(node_columns.contains(&"rank".to_string()));
    // Nodes still carry their names.
    assert_eq!(elements_of(&doc, "nodes").iter().filter(|n| n.get("n").is_some()).count(), 3);
}

#[test]
fn test_network_column_filter() {
    let f = fixture();
    f.graph.set_network_attribute(Scope::Collection, "description", Value::from("two views")).unwrap();
    let doc = export(&f.graph, &MemoryStyles::new(), &collection().with_network_columns(["description"]));

    let names: Vec<String> =
        elements_of(&doc, "networkAttributes").iter().map(|a| a["n"].as_str().unwrap().to_string()).collect();
    assert_eq!(names, vec!["description".to_string()]);
    assert_eq!(elements_of(&doc, "cyNetworkRelations").len(), 2);
}

#[test]
fn test_empty_column_filter_writes_everything() {
    let f = fixture();
    let everything = export(&f.graph, &MemoryStyles::new(), &collection());
    let unfiltered = export(&f.graph, &MemoryStyles::new(), &collection().with_edge_columns(Vec::<String>::new()));
    assert_eq!(elements_of(&unfiltered, "nodeAttributes"), elements_of(&everything, "nodeAttributes"));
    assert_eq!(elements_of(&unfiltered, "edgeAttributes"), elements_of(&everything, "edgeAttributes"));
}
