//! # Streaming Writer
//!
//! Emits one exchange document:
//!
//! ```text
//! [ {"numberVerification":[...]},
//!   {"metaData":[ pre ]},
//!   {"<aspect>":[ elements ]}*,
//!   {"metaData":[ post ]},
//!   {"status":[ {"success":..,"message":..} ]} ]
//! ```
//!
//! Pre-metadata lists what the caller requested, with expected counts when
//! known. Post-metadata is computed from what was actually written: true
//! element counts and the highest `@id` per aspect. An aspect that ended
//! up with no elements is left out of post-metadata.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value as Json;

use crate::aspect::{AspectElement, AspectKind, AspectRegistry};
use crate::metadata::{AspectMetadata, MetadataCollection, Status};
use crate::{Error, Result};

/// Value the number-verification preamble carries (2^48 - 1).
pub const NUMBER_VERIFICATION: u64 = 281_474_976_710_655;

// ============================================================================
// Cancellation
// ============================================================================

/// Cooperative cancellation, checked between fragments.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Requests and options
// ============================================================================

/// An aspect the caller intends to write.
#[derive(Debug, Clone, PartialEq)]
pub struct AspectRequest {
    pub kind: AspectKind,
    /// Element count, when known before the body is written.
    pub expected_count: Option<u64>,
}

impl AspectRequest {
    pub fn new(kind: AspectKind) -> Self {
        Self { kind, expected_count: None }
    }

    pub fn with_count(kind: AspectKind, count: u64) -> Self {
        Self { kind, expected_count: Some(count) }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WriterOptions {
    /// Tag written on every metadata entry of this document.
    pub consistency_group: Option<u64>,
    pub cancel: CancelFlag,
}

/// Fail if the requested aspects cannot appear together.
///
/// Visual properties and layout are anchored to subnetworks; requesting
/// them without `cySubNetworks` is a `StructuralError`.
pub fn check_aspect_set<'a>(requested: impl IntoIterator<Item = &'a AspectKind> + Clone) -> Result<()> {
    let has_subnetworks = requested.clone().into_iter().any(|k| *k == AspectKind::SubNetworks);
    match requested.into_iter().find(|k| k.requires_subnetworks()) {
        Some(kind) if !has_subnetworks => Err(Error::StructuralError(format!(
            "aspect '{kind}' requires '{}' to be requested as well",
            AspectKind::SubNetworks
        ))),
        _ => Ok(()),
    }
}

// ============================================================================
// CxWriter
// ============================================================================

#[derive(Debug)]
struct Tally {
    kind: AspectKind,
    count: u64,
    max_id: Option<u64>,
}

/// Writer handle for one document. Obtain with [`CxWriter::begin`], finish
/// with [`CxWriter::end`].
pub struct CxWriter<W: Write> {
    out: W,
    registry: AspectRegistry,
    options: WriterOptions,
    tallies: Vec<Tally>,
}

impl<W: Write> CxWriter<W> {
    /// Validate the request and write the preamble and pre-metadata.
    ///
    /// A `StructuralError` is returned before anything is written.
    pub fn begin(
        mut out: W,
        registry: AspectRegistry,
        requested: &[AspectRequest],
        options: WriterOptions,
    ) -> Result<Self> {
        check_aspect_set(requested.iter().map(|r| &r.kind))?;

        let now = chrono::Utc::now().timestamp_millis();
        let pre: MetadataCollection = requested
            .iter()
            .map(|r| AspectMetadata {
                element_count: r.expected_count,
                consistency_group: options.consistency_group,
                last_update: Some(now),
                ..AspectMetadata::new(r.kind.name())
            })
            .collect();

        write!(out, "[{{\"numberVerification\":[{{\"longNumber\":{NUMBER_VERIFICATION}}}]}}")?;
        write!(out, ",{{\"metaData\":")?;
        serde_json::to_writer(&mut out, &pre)?;
        write!(out, "}}")?;
        tracing::debug!(aspects = ?pre.names(), "pre-metadata written");

        Ok(Self { out, registry, options, tallies: Vec::new() })
    }

    /// Write one fragment of `aspect`. May be called any number of times per
    /// aspect. Returns the number of elements written.
    ///
    /// Every element is encoded before the first byte of the fragment is
    /// written, so an encoding failure never leaves a fragment half open.
    /// Elements that encode to nothing (empty list attributes) are skipped,
    /// and a fragment left empty is not written at all.
    pub fn write_fragment(&mut self, aspect: &AspectKind, elements: &[AspectElement]) -> Result<usize> {
        if self.options.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut encoded: Vec<Json> = Vec::with_capacity(elements.len());
        let mut max_id: Option<u64> = None;
        for element in elements {
            let Some(json) = self.registry.encode(aspect, element)? else { continue };
            let id = match element {
                AspectElement::Opaque(_) => json.get("@id").and_then(Json::as_u64),
                typed => typed.id(),
            };
            max_id = max_id.max(id);
            encoded.push(json);
        }
        if encoded.is_empty() {
            return Ok(0);
        }

        write!(self.out, ",{{")?;
        serde_json::to_writer(&mut self.out, aspect.name())?;
        write!(self.out, ":")?;
        serde_json::to_writer(&mut self.out, &encoded)?;
        write!(self.out, "}}")?;

        let count = encoded.len();
        match self.tallies.iter_mut().find(|t| t.kind == *aspect) {
            Some(tally) => {
                tally.count += count as u64;
                tally.max_id = tally.max_id.max(max_id);
            }
            None => self.tallies.push(Tally { kind: aspect.clone(), count: count as u64, max_id }),
        }
        tracing::debug!(aspect = %aspect, count, "fragment written");
        Ok(count)
    }

    /// Post-metadata as it would be written now.
    pub fn post_metadata(&self) -> MetadataCollection {
        self.tallies
            .iter()
            .filter(|t| t.count > 0)
            .map(|t| AspectMetadata {
                element_count: Some(t.count),
                id_counter: t.max_id,
                consistency_group: self.options.consistency_group,
                ..AspectMetadata::new(t.kind.name())
            })
            .collect()
    }

    /// Write post-metadata and status, close the document and hand back the
    /// sink. Called with `success == false` after a failure or cancellation
    /// so the document is still well formed.
    pub fn end(mut self, success: bool, message: Option<&str>) -> Result<W> {
        let post = self.post_metadata();
        write!(self.out, ",{{\"metaData\":")?;
        serde_json::to_writer(&mut self.out, &post)?;
        write!(self.out, "}}")?;

        let status = Status { success, message: message.map(str::to_string) };
        write!(self.out, ",{{\"status\":[")?;
        serde_json::to_writer(&mut self.out, &status)?;
        write!(self.out, "]}}]")?;
        self.out.flush()?;

        if success {
            tracing::info!(aspects = post.len(), "document closed");
        } else {
            tracing::warn!(message = message.unwrap_or(""), "document closed with failure status");
        }
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aspect::{NodeElement, OpaqueElement};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn node(id: u64) -> AspectElement {
        AspectElement::Node(NodeElement { id, name: None, represents: None })
    }

    fn parse(buf: Vec<u8>) -> Json {
        serde_json::from_slice(&buf).unwrap()
    }

    #[test]
    fn test_empty_document_is_well_formed() {
        let w = CxWriter::begin(Vec::new(), AspectRegistry::standard(), &[], WriterOptions::default()).unwrap();
        let doc = parse(w.end(true, None).unwrap());
        assert_eq!(
            doc,
            json!([
                {"numberVerification": [{"longNumber": 281474976710655u64}]},
                {"metaData": []},
                {"metaData": []},
                {"status": [{"success": true}]}
            ])
        );
    }

    #[test]
    fn test_post_metadata_counts_and_id_counter() {
        let requested = [AspectRequest::new(AspectKind::Nodes), AspectRequest::new(AspectKind::Edges)];
        let mut w = CxWriter::begin(Vec::new(), AspectRegistry::standard(), &requested, WriterOptions::default())
            .unwrap();
        w.write_fragment(&AspectKind::Nodes, &[node(3), node(9)]).unwrap();
        w.write_fragment(&AspectKind::Nodes, &[node(4)]).unwrap();
        w.write_fragment(&AspectKind::Edges, &[]).unwrap();

        let post = w.post_metadata();
        assert_eq!(post.names(), vec!["nodes"]);
        assert_eq!(post.get("nodes").unwrap().element_count, Some(3));
        assert_eq!(post.get("nodes").unwrap().id_counter, Some(9));

        let doc = parse(w.end(true, None).unwrap());
        let fragments: Vec<&Json> = doc.as_array().unwrap().iter().filter(|e| e.get("nodes").is_some()).collect();
        assert_eq!(fragments.len(), 2);
        assert!(doc.as_array().unwrap().iter().all(|e| e.get("edges").is_none()));
    }

    #[test]
    fn test_layout_without_subnetworks_is_structural_error() {
        let requested = [AspectRequest::new(AspectKind::Nodes), AspectRequest::new(AspectKind::CartesianLayout)];
        let mut sink = Vec::new();
        let structural = matches!(
            CxWriter::begin(&mut sink, AspectRegistry::standard(), &requested, WriterOptions::default()),
            Err(Error::StructuralError(_))
        );
        assert!(structural);
        assert!(sink.is_empty());

        let ok = [
            AspectRequest::new(AspectKind::VisualProperties),
            AspectRequest::new(AspectKind::SubNetworks),
        ];
        assert!(CxWriter::begin(Vec::new(), AspectRegistry::standard(), &ok, WriterOptions::default()).is_ok());
    }

    #[test]
    fn test_opaque_passthrough_tracks_id() {
        let kind = AspectKind::Opaque("provenanceHistory".into());
        let mut w = CxWriter::begin(
            Vec::new(),
            AspectRegistry::standard(),
            &[AspectRequest::new(kind.clone())],
            WriterOptions::default(),
        )
        .unwrap();
        let raw = json!({"@id": 77, "entity": {"uri": "x"}});
        w.write_fragment(&kind, &[AspectElement::Opaque(OpaqueElement::new("provenanceHistory", raw.clone()))])
            .unwrap();
        assert_eq!(w.post_metadata().get("provenanceHistory").unwrap().id_counter, Some(77));
        let doc = parse(w.end(true, None).unwrap());
        assert!(doc.as_array().unwrap().contains(&json!({"provenanceHistory": [raw]})));
    }

    #[test]
    fn test_cancelled_writer_still_closes() {
        let options = WriterOptions::default();
        let cancel = options.cancel.clone();
        let mut w = CxWriter::begin(Vec::new(), AspectRegistry::standard(), &[], options).unwrap();
        w.write_fragment(&AspectKind::Nodes, &[node(1)]).unwrap();
        cancel.cancel();
        assert!(matches!(w.write_fragment(&AspectKind::Nodes, &[node(2)]), Err(Error::Cancelled)));
        let doc = parse(w.end(false, Some("cancelled")).unwrap());
        let last = doc.as_array().unwrap().last().unwrap().clone();
        assert_eq!(last, json!({"status": [{"success": false, "message": "cancelled"}]}));
    }

    #[test]
    fn test_encoding_failure_leaves_no_fragment() {
        let mut w = CxWriter::begin(Vec::new(), AspectRegistry::standard(), &[], WriterOptions::default()).unwrap();
        // A node under the edges aspect is rejected before anything is written.
        assert!(w.write_fragment(&AspectKind::Edges, &[node(1)]).is_err());
        let doc = parse(w.end(false, Some("bad fragment")).unwrap());
        assert_eq!(doc.as_array().unwrap().len(), 4);
    }
}
