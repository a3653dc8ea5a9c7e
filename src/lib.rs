//! # cx-rs: Streaming Property-Graph Exchange
//!
//! Reads and writes networks in an aspect-oriented JSON exchange format:
//! a top-level array of *fragments*, each holding elements of one *aspect*
//! (nodes, edges, attributes, layout, visual style, ...), bracketed by
//! metadata blocks and a terminal status.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `GraphModel` and `StyleEngine` are the contracts with
//!    the host application; export and import only talk through them
//! 2. **Clean DTOs**: `Node`, `Edge`, `Value` cross all boundaries
//! 3. **Streaming wire layer**: `CxWriter` writes elements straight to its
//!    sink and `CxReader` yields one element at a time. `export_network`
//!    gathers every aspect before the first byte goes out, so element
//!    counts are known up front; cancellation is checked between fragments
//! 4. **Closed aspect set**: known aspects are an enum with typed payloads.
//!    Unknown aspects are stored on the model as opaque JSON by an import
//!    and written back by a full export
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cx_rs::{export_network, import_network, ExportConfig, ImportConfig};
//! use cx_rs::{GraphModel, MemoryGraph, MemoryStyles, PropertyMap, Value};
//!
//! # fn example() -> cx_rs::Result<()> {
//! let graph = MemoryGraph::new();
//! let net = graph.create_network();
//! let mut props = PropertyMap::new();
//! props.insert("name".into(), Value::from("Ada"));
//! let ada = graph.create_node(props)?;
//! graph.add_node(net, ada)?;
//!
//! let mut doc = Vec::new();
//! export_network(&graph, &MemoryStyles::new(), &mut doc, &ExportConfig::default())?;
//!
//! let copy = MemoryGraph::new();
//! let stats = import_network(&copy, &MemoryStyles::new(), &doc[..], ImportConfig::default())?;
//! assert_eq!(stats.nodes, 1);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod types;
pub mod schema;
pub mod aspect;
pub mod style;
pub mod correlation;
pub mod metadata;
pub mod writer;
pub mod reader;
pub mod graph;
pub mod group;
pub mod export;
pub mod import;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Node, Edge, Value, PropertyMap, Position, Group,
    NodeId, EdgeId, NetworkId, Scope,
};

// ============================================================================
// Re-exports: Wire
// ============================================================================

pub use aspect::{AspectElement, AspectKind, AspectRegistry};
pub use metadata::{AspectMetadata, MetadataCollection, Status};
pub use reader::CxReader;
pub use writer::{AspectRequest, CancelFlag, CxWriter, WriterOptions};

// ============================================================================
// Re-exports: Collaborators and drivers
// ============================================================================

pub use graph::{GraphModel, MemoryGraph};
pub use style::{MemoryStyles, StyleEngine};
pub use export::{export_network, ExportConfig, ExportMode, ExportStats};
pub use import::{import_network, GraphBuilder, ImportConfig, ImportStats};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Undeclared attribute '{name}' in {table}")]
    UndeclaredAttribute { table: String, name: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Structural error: {0}")]
    StructuralError(String),

    #[error("Protocol error at byte {offset}: {message}")]
    ProtocolError { offset: usize, message: String },

    #[error("Cancelled")]
    Cancelled,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
