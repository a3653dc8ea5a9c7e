//! End-to-end streaming reads: documents fed through tiny buffers, pretty
//! printed documents, truncation and per-element decode failures.

mod common;

use std::io::BufReader;

use common::*;
use cx_rs::{AspectElement, AspectKind, AspectRegistry, CxReader, Error, ExportConfig, GraphModel, MemoryGraph, MemoryStyles, Value};
use pretty_assertions::assert_eq;

fn sample() -> Vec<u8> {
    let graph = MemoryGraph::new();
    let net = graph.create_network();
    let a = node(&graph, net, &[("name", Value::from("a \"quoted\" [name]")), ("note", Value::from("{not json}"))]);
    let b = node(&graph, net, &[("name", Value::from("b\\c"))]);
    let e = graph.create_edge(a, b, Some("x"), props(&[])).unwrap();
    graph.add_edge(net, e).unwrap();
    export(&graph, &MemoryStyles::new(), &ExportConfig::default())
}

fn kinds<R: std::io::BufRead>(reader: CxReader<R>) -> Vec<AspectKind> {
    reader.map(|item| item.unwrap().kind()).collect()
}

// ============================================================================
// 1. Buffering and whitespace
// ============================================================================

#[test]
fn test_tiny_buffer_reads_same_elements() {
    init_tracing();
    let doc = sample();
    let whole = kinds(CxReader::new(&doc[..], AspectRegistry::standard()).unwrap());
    let trickled = kinds(CxReader::new(BufReader::with_capacity(3, &doc[..]), AspectRegistry::standard()).unwrap());
    assert_eq!(trickled, whole);
    assert!(whole.contains(&AspectKind::Nodes));
    assert!(whole.contains(&AspectKind::Edges));
}

#[test]
fn test_pretty_printed_document() {
    let doc = sample();
    let pretty = serde_json::to_vec_pretty(&parse(&doc)).unwrap();
    let mut reader = CxReader::new(&pretty[..], AspectRegistry::standard()).unwrap();
    let names: Vec<Option<String>> = reader
        .by_ref()
        .filter_map(|item| match item.unwrap() {
            AspectElement::Node(n) => Some(n.name),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec![Some("a \"quoted\" [name]".to_string()), Some("b\\c".to_string())]);
    assert!(reader.status().unwrap().success);
}

// ============================================================================
// 2. Failures
// ============================================================================

#[test]
fn test_truncated_document_fails_once() {
    let doc = sample();
    let cut = &doc[..doc.len() - 40];
    let mut reader = CxReader::new(cut, AspectRegistry::standard()).unwrap();
    let mut protocol_errors = 0;
    for item in reader.by_ref() {
        if let Err(Error::ProtocolError { offset, .. }) = item {
            assert!(offset <= cut.len());
            protocol_errors += 1;
        }
    }
    assert_eq!(protocol_errors, 1);
    assert!(reader.next().is_none());
    assert!(reader.status().is_none());
}

#[test]
fn test_bad_element_does_not_stop_the_stream() {
    let doc = br#"[{"metaData":[]},
        {"nodeAttributes":[{"po":1,"n":"x","v":"abc","d":"integer"},{"po":1,"n":"y","v":"4","d":"integer"}]},
        {"metaData":[]},{"status":[{"success":true}]}]"#;
    let items: Vec<_> = CxReader::new(&doc[..], AspectRegistry::standard()).unwrap().collect();
    assert_eq!(items.len(), 2);
    assert!(matches!(items[0], Err(Error::TypeError(_))));
    match &items[1] {
        Ok(AspectElement::NodeAttribute(attr)) => assert_eq!(attr.value, Value::Integer(4)),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_opaque_aspect_is_kept_verbatim() {
    let doc = br#"[{"metaData":[]},{"provenanceHistory":[{"entity":{"uri":"x","props":[1,2]}}]},{"metaData":[]}]"#;
    let items: Vec<_> = CxReader::new(&doc[..], AspectRegistry::standard())
        .unwrap()
        .map(|item| item.unwrap())
        .collect();
    match &items[..] {
        [AspectElement::Opaque(o)] => {
            assert_eq!(o.aspect, "provenanceHistory");
            assert_eq!(o.data["entity"]["props"][1], 2);
        }
        other => panic!("unexpected {other:?}"),
    }
}
