//! Native attribute value type matching the exchange format's type system.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{AttributeType, PrimitiveKind};

/// A typed attribute value as held by the host graph.
///
/// Covers every type the exchange format can carry:
/// - Scalars: String, Integer (32-bit), Long (64-bit), Double, Boolean
/// - Lists: homogeneous lists of any scalar kind
///
/// There is no null variant. An absent attribute is simply not present in
/// the owner's [`PropertyMap`](super::PropertyMap).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    String(String),
    Integer(i32),
    Long(i64),
    Double(f64),
    Boolean(bool),
    List(Vec<Value>),
}

// ============================================================================
// Type checking
// ============================================================================

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "STRING",
            Value::Integer(_) => "INTEGER",
            Value::Long(_) => "LONG",
            Value::Double(_) => "DOUBLE",
            Value::Boolean(_) => "BOOLEAN",
            Value::List(_) => "LIST",
        }
    }

    pub fn is_list(&self) -> bool { matches!(self, Value::List(_)) }
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Long(_) | Value::Double(_))
    }

    /// The attribute type of this value.
    ///
    /// Lists take the kind of their first element; an empty list reports
    /// `list_of_string`, which is what the wire format assumes when it has
    /// nothing better to go on.
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            Value::List(items) => AttributeType::ListOf(
                items.first().and_then(Value::primitive_kind).unwrap_or(PrimitiveKind::String),
            ),
            other => AttributeType::Single(other.primitive_kind().unwrap_or(PrimitiveKind::String)),
        }
    }

    /// Scalar kind, or `None` for lists.
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self {
            Value::String(_) => Some(PrimitiveKind::String),
            Value::Integer(_) => Some(PrimitiveKind::Integer),
            Value::Long(_) => Some(PrimitiveKind::Long),
            Value::Double(_) => Some(PrimitiveKind::Double),
            Value::Boolean(_) => Some(PrimitiveKind::Boolean),
            Value::List(_) => None,
        }
    }

    /// Attempt to extract as f64 (any numeric scalar).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Long(l) => Some(*l as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Attempt to extract as &str
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Textual form used on the wire and in mapping evaluation.
    ///
    /// Unlike `Display`, strings are not quoted.
    pub fn to_text(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Long(l) => l.to_string(),
            Value::Double(d) => format_double(*d),
            Value::Boolean(b) => b.to_string(),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::to_text).collect();
                inner.join(",")
            }
        }
    }
}

/// Doubles always carry a fractional part or exponent so they re-read as
/// doubles (`1` would otherwise be ambiguous with an integer).
pub(crate) fn format_double(d: f64) -> String {
    if d.is_finite() && d.fract() == 0.0 && d.abs() < 1e15 {
        format!("{d:.1}")
    } else {
        format!("{d}")
    }
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<bool> for Value { fn from(v: bool) -> Self { Value::Boolean(v) } }
impl From<i32> for Value { fn from(v: i32) -> Self { Value::Integer(v) } }
impl From<i64> for Value { fn from(v: i64) -> Self { Value::Long(v) } }
impl From<f64> for Value { fn from(v: f64) -> Self { Value::Double(v) } }
impl From<String> for Value { fn from(v: String) -> Self { Value::String(v) } }
impl From<&str> for Value { fn from(v: &str) -> Self { Value::String(v.to_owned()) } }
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self { Value::List(v.into_iter().map(Into::into).collect()) }
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Long(l) => write!(f, "{l}L"),
            Value::Double(d) => write!(f, "{}", format_double(*d)),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::List(l) => {
                write!(f, "[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from() {
        assert_eq!(Value::from("hello"), Value::String("hello".into()));
        assert_eq!(Value::from(42), Value::Integer(42));
        assert_eq!(Value::from(42i64), Value::Long(42));
        assert_eq!(Value::from(3.5), Value::Double(3.5));
        assert_eq!(Value::from(true), Value::Boolean(true));
    }

    #[test]
    fn test_attribute_type() {
        assert_eq!(Value::from(1.5).attribute_type(), AttributeType::Single(PrimitiveKind::Double));
        assert_eq!(
            Value::from(vec![1i64, 2]).attribute_type(),
            AttributeType::ListOf(PrimitiveKind::Long)
        );
        assert_eq!(
            Value::List(Vec::new()).attribute_type(),
            AttributeType::ListOf(PrimitiveKind::String)
        );
    }

    #[test]
    fn test_double_text_keeps_fraction() {
        assert_eq!(Value::Double(3.0).to_text(), "3.0");
        assert_eq!(Value::Double(0.25).to_text(), "0.25");
    }
}
