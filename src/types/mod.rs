//! Attribute type tags and coercion between wire text and native values.
//!
//! The exchange format carries attribute values as text (or JSON numbers and
//! booleans from lenient producers) next to a type tag such as `double` or
//! `list_of_long`. Everything here is a pure function.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as Json;

use crate::model::Value;
use crate::{Error, Result};

/// Scalar kinds the format knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    String,
    Integer,
    Long,
    Double,
    Boolean,
}

impl PrimitiveKind {
    pub fn tag(self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Integer => "integer",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Boolean => "boolean",
        }
    }

    fn from_scalar_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "string" => PrimitiveKind::String,
            "integer" => PrimitiveKind::Integer,
            "long" => PrimitiveKind::Long,
            "double" => PrimitiveKind::Double,
            "boolean" => PrimitiveKind::Boolean,
            _ => return None,
        })
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, PrimitiveKind::Integer | PrimitiveKind::Long | PrimitiveKind::Double)
    }
}

/// A full attribute type: a scalar kind, or a list of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    Single(PrimitiveKind),
    ListOf(PrimitiveKind),
}

impl AttributeType {
    pub const STRING: AttributeType = AttributeType::Single(PrimitiveKind::String);

    /// Parse a wire type tag. Unknown tags are a `TypeError`.
    pub fn from_tag(tag: &str) -> Result<Self> {
        let parsed = match tag.strip_prefix("list_of_") {
            Some(inner) => PrimitiveKind::from_scalar_tag(inner).map(AttributeType::ListOf),
            None => PrimitiveKind::from_scalar_tag(tag).map(AttributeType::Single),
        };
        parsed.ok_or_else(|| Error::TypeError(format!("unknown attribute type tag '{tag}'")))
    }

    pub fn tag(self) -> String {
        match self {
            AttributeType::Single(k) => k.tag().to_string(),
            AttributeType::ListOf(k) => format!("list_of_{}", k.tag()),
        }
    }

    pub fn kind(self) -> PrimitiveKind {
        match self {
            AttributeType::Single(k) | AttributeType::ListOf(k) => k,
        }
    }

    pub fn is_list(self) -> bool {
        matches!(self, AttributeType::ListOf(_))
    }

    /// Whether `value` has exactly this type.
    pub fn admits(self, value: &Value) -> bool {
        match (self, value) {
            (AttributeType::ListOf(k), Value::List(items)) => {
                items.iter().all(|v| v.primitive_kind() == Some(k))
            }
            (AttributeType::Single(k), v) => v.primitive_kind() == Some(k),
            _ => false,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

impl FromStr for AttributeType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        AttributeType::from_tag(s)
    }
}

impl Serialize for AttributeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.tag())
    }
}

impl<'de> Deserialize<'de> for AttributeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        AttributeType::from_tag(&tag).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Coercion
// ============================================================================

/// Coerce one raw wire scalar (string, number or boolean) to `kind`.
///
/// Integer and long targets always go through an `f64` first so that
/// producers writing `1.0E3` or `42.0` are accepted; the result is then
/// narrowed (saturating, fraction truncated).
pub fn coerce_scalar(raw: &Json, kind: PrimitiveKind) -> Result<Value> {
    match kind {
        PrimitiveKind::String => match raw {
            Json::String(s) => Ok(Value::String(s.clone())),
            Json::Number(n) => Ok(Value::String(n.to_string())),
            Json::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(mismatch(other, kind)),
        },
        PrimitiveKind::Integer => Ok(Value::Integer(raw_to_f64(raw, kind)? as i32)),
        PrimitiveKind::Long => Ok(Value::Long(raw_to_f64(raw, kind)? as i64)),
        PrimitiveKind::Double => Ok(Value::Double(raw_to_f64(raw, kind)?)),
        PrimitiveKind::Boolean => match raw {
            Json::Bool(b) => Ok(Value::Boolean(*b)),
            Json::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Boolean(true)),
            Json::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Boolean(false)),
            other => Err(mismatch(other, kind)),
        },
    }
}

/// Coerce a text value (as found in mapping definitions) to `kind`.
pub fn coerce_text(text: &str, kind: PrimitiveKind) -> Result<Value> {
    coerce_scalar(&Json::String(text.to_string()), kind)
}

/// Coerce a raw wire list elementwise.
///
/// An empty result is reported as `None`: an empty list attribute is
/// treated as absent and never emitted.
pub fn coerce_list(raw: &[Json], kind: PrimitiveKind) -> Result<Option<Value>> {
    let items = raw
        .iter()
        .map(|item| coerce_scalar(item, kind))
        .collect::<Result<Vec<_>>>()?;
    Ok(if items.is_empty() { None } else { Some(Value::List(items)) })
}

/// Coerce a raw wire value to a full attribute type.
///
/// `None` means "absent" (an empty list).
pub fn coerce(raw: &Json, ty: AttributeType) -> Result<Option<Value>> {
    match (ty, raw) {
        (AttributeType::ListOf(kind), Json::Array(items)) => coerce_list(items, kind),
        // A lone scalar where a list is declared is a one-element list.
        (AttributeType::ListOf(kind), scalar) => Ok(Some(Value::List(vec![coerce_scalar(scalar, kind)?]))),
        (AttributeType::Single(_), Json::Array(_)) => Err(Error::TypeError(format!(
            "expected a single {ty} value, got a list"
        ))),
        (AttributeType::Single(kind), scalar) => coerce_scalar(scalar, kind).map(Some),
    }
}

/// Render a native value in the wire's textual form.
///
/// Scalars become JSON strings, lists become arrays of strings. `None` for
/// empty lists, which are not emitted.
pub fn to_wire(value: &Value) -> Option<Json> {
    match value {
        Value::List(items) if items.is_empty() => None,
        Value::List(items) => Some(Json::Array(
            items.iter().map(|v| Json::String(v.to_text())).collect(),
        )),
        scalar => Some(Json::String(scalar.to_text())),
    }
}

/// What `value` actually holds, for error messages.
///
/// Well-formed values report their type tag. A list whose items are not
/// all of one scalar kind names every kind it holds, in order of first
/// appearance.
pub fn describe(value: &Value) -> String {
    let ty = value.attribute_type();
    if ty.admits(value) || matches!(value, Value::List(items) if items.is_empty()) {
        return ty.tag();
    }
    let Value::List(items) = value else {
        return ty.tag();
    };
    let mut kinds: Vec<&str> = Vec::new();
    for item in items {
        let kind = item.primitive_kind().map_or("list", PrimitiveKind::tag);
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    format!("a mixed list of {}", kinds.join(", "))
}

fn raw_to_f64(raw: &Json, kind: PrimitiveKind) -> Result<f64> {
    match raw {
        Json::Number(n) => n.as_f64().ok_or_else(|| mismatch(raw, kind)),
        Json::String(s) => s.trim().parse::<f64>().map_err(|_| mismatch(raw, kind)),
        other => Err(mismatch(other, kind)),
    }
}

fn mismatch(raw: &Json, kind: PrimitiveKind) -> Error {
    Error::TypeError(format!("cannot coerce {raw} to {}", kind.tag()))
}
