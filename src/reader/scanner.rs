//! Byte-level scanner over the document envelope.
//!
//! The envelope (outer array, fragment objects, fragment arrays) is walked
//! token by token; each element inside is captured as raw bytes and handed
//! to `serde_json`. Only one element is ever buffered.

use std::io::BufRead;

use serde_json::Value as Json;

use crate::{Error, Result};

pub(crate) struct Scanner<R> {
    inner: R,
    offset: usize,
}

impl<R: BufRead> Scanner<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> Error {
        Error::ProtocolError { offset: self.offset, message: message.into() }
    }

    fn peek(&mut self) -> Result<Option<u8>> {
        Ok(self.inner.fill_buf()?.first().copied())
    }

    fn bump(&mut self) -> Result<Option<u8>> {
        let byte = self.peek()?;
        if byte.is_some() {
            self.inner.consume(1);
            self.offset += 1;
        }
        Ok(byte)
    }

    fn skip_ws(&mut self) -> Result<()> {
        while let Some(b) = self.peek()? {
            if !b.is_ascii_whitespace() {
                break;
            }
            self.bump()?;
        }
        Ok(())
    }

    /// Next non-whitespace byte, without consuming it.
    pub(crate) fn peek_token(&mut self) -> Result<Option<u8>> {
        self.skip_ws()?;
        self.peek()
    }

    /// Consume and return the next non-whitespace byte.
    pub(crate) fn next_token(&mut self) -> Result<Option<u8>> {
        self.skip_ws()?;
        self.bump()
    }

    pub(crate) fn expect(&mut self, want: u8) -> Result<()> {
        match self.next_token()? {
            Some(b) if b == want => Ok(()),
            Some(b) => Err(self.error(format!("expected '{}', found '{}'", want as char, b as char))),
            None => Err(self.error(format!("expected '{}', found end of input", want as char))),
        }
    }

    /// Read an object key: a JSON string followed by `:`.
    pub(crate) fn read_key(&mut self) -> Result<String> {
        self.skip_ws()?;
        let mut raw = Vec::new();
        self.capture_string(&mut raw)?;
        let key: String = serde_json::from_slice(&raw).map_err(|e| self.error(format!("bad key: {e}")))?;
        self.expect(b':')?;
        Ok(key)
    }

    /// Read one complete JSON value.
    pub(crate) fn read_value(&mut self) -> Result<Json> {
        let raw = self.capture_value()?;
        serde_json::from_slice(&raw).map_err(|e| self.error(format!("malformed element: {e}")))
    }

    fn capture_string(&mut self, buf: &mut Vec<u8>) -> Result<()> {
        match self.bump()? {
            Some(b'"') => buf.push(b'"'),
            Some(b) => return Err(self.error(format!("expected string, found '{}'", b as char))),
            None => return Err(self.error("expected string, found end of input")),
        }
        self.capture_string_tail(buf)
    }

    /// Capture after an opening quote up to and including the closing one.
    fn capture_string_tail(&mut self, buf: &mut Vec<u8>) -> Result<()> {
        loop {
            match self.bump()? {
                Some(b'\\') => {
                    buf.push(b'\\');
                    let escaped = self.bump()?.ok_or_else(|| self.error("unterminated string"))?;
                    buf.push(escaped);
                }
                Some(b'"') => {
                    buf.push(b'"');
                    return Ok(());
                }
                Some(b) => buf.push(b),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn capture_value(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        match self.peek_token()? {
            None => return Err(self.error("expected value, found end of input")),
            Some(b'"') => self.capture_string(&mut buf)?,
            Some(b'{' | b'[') => {
                let mut depth = 0usize;
                loop {
                    let b = self.bump()?.ok_or_else(|| self.error("unbalanced element"))?;
                    buf.push(b);
                    match b {
                        b'"' => self.capture_string_tail(&mut buf)?,
                        b'{' | b'[' => depth += 1,
                        b'}' | b']' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                }
            }
            Some(_) => {
                while let Some(b) = self.peek()? {
                    if matches!(b, b',' | b']' | b'}') || b.is_ascii_whitespace() {
                        break;
                    }
                    buf.push(b);
                    self.bump()?;
                }
            }
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_captures_nested_value_with_tricky_strings() {
        let src = br#" {"a": "x]}\"y", "b": [1, {"c": null}]} , 5"#;
        let mut s = Scanner::new(&src[..]);
        assert_eq!(s.read_value().unwrap(), json!({"a": "x]}\"y", "b": [1, {"c": null}]}));
        s.expect(b',').unwrap();
        assert_eq!(s.read_value().unwrap(), json!(5));
    }

    #[test]
    fn test_key() {
        let mut s = Scanner::new(&br#" "nodes" : ["#[..]);
        assert_eq!(s.read_key().unwrap(), "nodes");
        s.expect(b'[').unwrap();
    }

    #[test]
    fn test_truncated_value_is_protocol_error() {
        let mut s = Scanner::new(&br#"{"a": [1, 2"#[..]);
        assert!(matches!(s.read_value(), Err(Error::ProtocolError { .. })));
    }
}
