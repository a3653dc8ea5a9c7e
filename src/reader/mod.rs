//! # Streaming Reader
//!
//! `CxReader` walks a document element by element. Construction consumes
//! the preamble and pre-metadata; iterating yields aspect elements in
//! document order. Post-metadata and status become available once the
//! iterator has reached them.
//!
//! Errors come in two strengths:
//! - an element that cannot be decoded into its typed form is yielded as a
//!   `ValidationError`/`TypeError` and iteration continues;
//! - a broken envelope is a `ProtocolError`, after which the iterator is
//!   fused.

mod scanner;

use std::io::BufRead;

use serde_json::Value as Json;

use crate::aspect::{AspectElement, AspectRegistry};
use crate::metadata::{MetadataCollection, Status};
use crate::{Error, Result};

use scanner::Scanner;

const META_DATA: &str = "metaData";
const STATUS: &str = "status";
const NUMBER_VERIFICATION: &str = "numberVerification";

#[derive(Debug, Clone, PartialEq)]
enum State {
    /// Between top-level objects.
    TopLevel,
    /// Inside the element array of a fragment.
    Fragment { aspect: String, first: bool },
    Done,
    Failed,
}

/// Streaming reader over one exchange document.
pub struct CxReader<R: BufRead> {
    scanner: Scanner<R>,
    registry: AspectRegistry,
    state: State,
    pre: MetadataCollection,
    post: Option<MetadataCollection>,
    status: Option<Status>,
    pre_seen: bool,
    body_started: bool,
}

impl<R: BufRead> CxReader<R> {
    /// Open a document: read the outer `[`, the optional number
    /// verification and the pre-metadata.
    ///
    /// A document that starts straight with fragments has empty
    /// pre-metadata.
    pub fn new(source: R, registry: AspectRegistry) -> Result<Self> {
        let mut reader = Self {
            scanner: Scanner::new(source),
            registry,
            state: State::TopLevel,
            pre: MetadataCollection::new(),
            post: None,
            status: None,
            pre_seen: false,
            body_started: false,
        };
        reader.scanner.expect(b'[')?;
        if reader.scanner.peek_token()? == Some(b']') {
            reader.scanner.expect(b']')?;
            reader.state = State::Done;
            return Ok(reader);
        }
        while reader.state == State::TopLevel && !reader.pre_seen && !reader.body_started {
            reader.open_top_level()?;
        }
        tracing::debug!(aspects = ?reader.pre.names(), "pre-metadata read");
        Ok(reader)
    }

    pub fn pre_metadata(&self) -> &MetadataCollection {
        &self.pre
    }

    /// `None` until the iterator has passed the post-metadata.
    pub fn post_metadata(&self) -> Option<&MetadataCollection> {
        self.post.as_ref()
    }

    /// Pre- and post-metadata merged, one entry per aspect.
    pub fn metadata(&self) -> MetadataCollection {
        match &self.post {
            Some(post) => MetadataCollection::merge(&self.pre, post),
            None => self.pre.clone(),
        }
    }

    /// `None` until the iterator has passed the status element.
    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    /// True once the closing `]` has been read.
    pub fn is_finished(&self) -> bool {
        self.state == State::Done
    }

    /// Read `{"key":` of the next top-level object and dispatch on the key.
    /// Metadata, status and number verification are consumed whole; a
    /// fragment is left open at its first element.
    fn open_top_level(&mut self) -> Result<()> {
        self.scanner.expect(b'{')?;
        let key = self.scanner.read_key()?;
        self.open_member(key)
    }

    fn open_member(&mut self, key: String) -> Result<()> {
        match key.as_str() {
            NUMBER_VERIFICATION => {
                self.scanner.read_value()?;
                self.close_member()
            }
            META_DATA => {
                let value = self.scanner.read_value()?;
                let collection: MetadataCollection = self.parse_envelope(value, META_DATA)?;
                if !self.body_started && !self.pre_seen {
                    self.pre = collection;
                    self.pre_seen = true;
                } else {
                    let post = self.post.get_or_insert_with(MetadataCollection::new);
                    for entry in collection.iter() {
                        post.add(entry.clone());
                    }
                }
                self.close_member()
            }
            STATUS => {
                let value = self.scanner.read_value()?;
                let statuses: Vec<Status> = self.parse_envelope(value, STATUS)?;
                self.status = statuses.into_iter().next();
                self.close_member()
            }
            _ => {
                self.scanner.expect(b'[')?;
                self.body_started = true;
                self.state = State::Fragment { aspect: key, first: true };
                Ok(())
            }
        }
    }

    fn parse_envelope<T: serde::de::DeserializeOwned>(&self, value: Json, what: &str) -> Result<T> {
        serde_json::from_value(value).map_err(|e| self.scanner.error(format!("malformed {what}: {e}")))
    }

    /// After a member value: either another member of the same object, or
    /// the end of the object followed by `,` or the closing `]`.
    fn close_member(&mut self) -> Result<()> {
        match self.scanner.next_token()? {
            Some(b',') => {
                let key = self.scanner.read_key()?;
                return self.open_member(key);
            }
            Some(b'}') => {}
            Some(b) => return Err(self.scanner.error(format!("expected ',' or '}}', found '{}'", b as char))),
            None => return Err(self.scanner.error("unterminated object")),
        }
        match self.scanner.next_token()? {
            Some(b',') => self.state = State::TopLevel,
            Some(b']') => {
                self.state = State::Done;
                tracing::debug!(status = ?self.status, "document finished");
            }
            Some(b) => return Err(self.scanner.error(format!("expected ',' or ']', found '{}'", b as char))),
            None => return Err(self.scanner.error("unterminated document")),
        }
        Ok(())
    }

    /// Advance to the next raw element and the name of its aspect.
    fn next_raw(&mut self) -> Result<Option<(String, Json)>> {
        loop {
            match &mut self.state {
                State::Done | State::Failed => return Ok(None),
                State::TopLevel => self.open_top_level()?,
                State::Fragment { aspect, first } => {
                    if self.scanner.peek_token()? == Some(b']') {
                        self.scanner.expect(b']')?;
                        self.close_member()?;
                        continue;
                    }
                    if !*first {
                        self.scanner.expect(b',')?;
                    }
                    *first = false;
                    let aspect = aspect.clone();
                    let raw = self.scanner.read_value()?;
                    return Ok(Some((aspect, raw)));
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for CxReader<R> {
    type Item = Result<AspectElement>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (aspect, raw) = match self.next_raw() {
                Ok(Some(next)) => next,
                Ok(None) => return None,
                Err(e) => {
                    self.state = State::Failed;
                    let e = match e {
                        Error::ProtocolError { .. } => e,
                        other => self.scanner.error(other.to_string()),
                    };
                    tracing::warn!(error = %e, "document stream aborted");
                    return Some(Err(e));
                }
            };
            match self.registry.decode(&aspect, raw) {
                Ok(Some(element)) => return Some(Ok(element)),
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!(aspect = %aspect, error = %e, "element rejected");
                    return Some(Err(e));
                }
            }
        }
    }
}
