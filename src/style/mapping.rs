//! Visual mapping functions and their property-string encoding.
//!
//! A mapping definition is a flat list of `key=value` entries separated by
//! commas, with a literal comma in a value doubled (`,,`):
//!
//! ```text
//! COL=degree,T=integer,K=0=1,V=0=#FF0000,K=1=2,V=1=#00FF00
//! COL=score,T=double,L=0=red,E=0=red,G=0=red,OV=0=0.0,L=1=blue,E=1=blue,G=1=blue,OV=1=10.0
//! COL=name,T=string
//! ```
//!
//! Indexed entries are `KEY=<n>=<value>` and are read from index 0 until the
//! first index whose leading key (`K` or `OV`) is missing.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::interpolate::{self, Breakpoint, Breakpoints, ValueSpace};
use crate::aspect::MappingDefinition;
use crate::model::value::format_double;
use crate::model::Value;
use crate::types::{self, AttributeType, PrimitiveKind};
use crate::{Error, Result};

pub const PASSTHROUGH: &str = "PASSTHROUGH";
pub const DISCRETE: &str = "DISCRETE";
pub const CONTINUOUS: &str = "CONTINUOUS";

// ============================================================================
// Mapping functions
// ============================================================================

/// A function from an attribute column to a visual property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MappingFunction {
    Passthrough(PassthroughMapping),
    Discrete(DiscreteMapping),
    Continuous(ContinuousMapping),
}

/// Column value used as the style value, after coercion to `ty`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassthroughMapping {
    pub column: String,
    pub ty: AttributeType,
}

/// Exact-match lookup from column value to style value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscreteMapping {
    pub column: String,
    pub ty: AttributeType,
    /// Keys are coerced to `ty`; insertion order is preserved on the wire.
    pub entries: Vec<(Value, String)>,
}

/// Interpolation over sorted breakpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousMapping {
    pub column: String,
    pub ty: AttributeType,
    breakpoints: Breakpoints,
}

impl PassthroughMapping {
    pub fn new(column: impl Into<String>, ty: AttributeType) -> Self {
        Self { column: column.into(), ty }
    }
}

impl DiscreteMapping {
    pub fn new(column: impl Into<String>, ty: AttributeType) -> Self {
        Self { column: column.into(), ty, entries: Vec::new() }
    }

    /// Add an entry; the key is coerced to the mapping's type.
    pub fn with_entry(mut self, key: &str, value: impl Into<String>) -> Result<Self> {
        let key = types::coerce_text(key, self.ty.kind())?;
        self.entries.push((key, value.into()));
        Ok(self)
    }

    pub fn lookup(&self, key: &Value) -> Option<&str> {
        let key = types::coerce_text(&key.to_text(), self.ty.kind()).ok()?;
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }
}

impl ContinuousMapping {
    /// Build a continuous mapping. Thresholds must be strictly ascending
    /// and finite; anything else is a `ValidationError`.
    pub fn new(
        column: impl Into<String>,
        ty: AttributeType,
        breakpoints: impl IntoIterator<Item = Breakpoint>,
    ) -> Result<Self> {
        let column = column.into();
        if !ty.kind().is_numeric() || ty.is_list() {
            return Err(Error::ValidationError(format!(
                "continuous mapping on '{column}' needs a numeric column, got {ty}"
            )));
        }
        let breakpoints: Breakpoints = breakpoints.into_iter().collect();
        if breakpoints.iter().any(|b| !b.threshold.is_finite()) {
            return Err(Error::ValidationError(format!(
                "continuous mapping on '{column}' has a non-finite threshold"
            )));
        }
        if breakpoints.windows(2).any(|w| w[0].threshold >= w[1].threshold) {
            return Err(Error::ValidationError(format!(
                "continuous mapping on '{column}' has unsorted breakpoints"
            )));
        }
        Ok(Self { column, ty, breakpoints })
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    pub fn evaluate(&self, v: f64, space: ValueSpace) -> Option<String> {
        interpolate::evaluate(&self.breakpoints, v, space)
    }
}

impl MappingFunction {
    pub fn column(&self) -> &str {
        match self {
            MappingFunction::Passthrough(m) => &m.column,
            MappingFunction::Discrete(m) => &m.column,
            MappingFunction::Continuous(m) => &m.column,
        }
    }

    pub fn column_type(&self) -> AttributeType {
        match self {
            MappingFunction::Passthrough(m) => m.ty,
            MappingFunction::Discrete(m) => m.ty,
            MappingFunction::Continuous(m) => m.ty,
        }
    }

    pub fn kind_tag(&self) -> &'static str {
        match self {
            MappingFunction::Passthrough(_) => PASSTHROUGH,
            MappingFunction::Discrete(_) => DISCRETE,
            MappingFunction::Continuous(_) => CONTINUOUS,
        }
    }

    /// Evaluate against a column value.
    ///
    /// `None` when the mapping has nothing for this value (discrete miss,
    /// value not coercible, non-numeric value for a continuous mapping).
    pub fn evaluate(&self, value: &Value, space: ValueSpace) -> Option<String> {
        match self {
            MappingFunction::Passthrough(m) => match m.ty {
                AttributeType::ListOf(_) => Some(value.to_text()),
                AttributeType::Single(kind) => {
                    types::coerce_text(&value.to_text(), kind).ok().map(|v| v.to_text())
                }
            },
            MappingFunction::Discrete(m) => m.lookup(value).map(str::to_string),
            MappingFunction::Continuous(m) => {
                let v = value.as_f64().or_else(|| value.as_str()?.trim().parse().ok())?;
                m.evaluate(v, space)
            }
        }
    }

    // ========================================================================
    // Wire encoding
    // ========================================================================

    pub fn to_definition(&self) -> MappingDefinition {
        let mut entries: Vec<(String, String)> = vec![
            ("COL".into(), self.column().to_string()),
            ("T".into(), self.column_type().tag()),
        ];
        match self {
            MappingFunction::Passthrough(_) => {}
            MappingFunction::Discrete(m) => {
                for (i, (k, v)) in m.entries.iter().enumerate() {
                    entries.push((format!("K={i}"), k.to_text()));
                    entries.push((format!("V={i}"), v.clone()));
                }
            }
            MappingFunction::Continuous(m) => {
                for (i, b) in m.breakpoints.iter().enumerate() {
                    entries.push((format!("L={i}"), b.lesser.clone()));
                    entries.push((format!("E={i}"), b.equal.clone()));
                    entries.push((format!("G={i}"), b.greater.clone()));
                    entries.push((format!("OV={i}"), threshold_text(b.threshold, m.ty.kind())));
                }
            }
        }
        MappingDefinition {
            kind: self.kind_tag().to_string(),
            definition: join_entries(&entries),
        }
    }

    /// Decode a wire mapping.
    ///
    /// Unknown kinds, a missing `COL` and unsorted breakpoints are
    /// `ValidationError`s; an unknown `T` is a `TypeError`. A continuous
    /// index lacking any of `L`/`E`/`G` is skipped with a warning.
    pub fn from_definition(def: &MappingDefinition) -> Result<Self> {
        let props = PropertyString::parse(&def.definition)?;
        let column = props
            .plain
            .get("COL")
            .cloned()
            .ok_or_else(|| Error::ValidationError(format!("{} mapping without COL", def.kind)))?;
        let ty = match props.plain.get("T") {
            Some(tag) => AttributeType::from_tag(tag)?,
            None => AttributeType::STRING,
        };

        match def.kind.as_str() {
            PASSTHROUGH => Ok(MappingFunction::Passthrough(PassthroughMapping::new(column, ty))),
            DISCRETE => {
                let mut mapping = DiscreteMapping::new(column, ty);
                for i in 0.. {
                    let Some(key) = props.indexed("K", i) else { break };
                    let Some(value) = props.indexed("V", i) else {
                        tracing::warn!(column = %mapping.column, index = i, "discrete entry without V, skipped");
                        continue;
                    };
                    match types::coerce_text(key, ty.kind()) {
                        Ok(k) => mapping.entries.push((k, value.to_string())),
                        Err(e) => {
                            tracing::warn!(column = %mapping.column, index = i, "discrete key skipped: {e}")
                        }
                    }
                }
                Ok(MappingFunction::Discrete(mapping))
            }
            CONTINUOUS => {
                let mut points = Vec::new();
                for i in 0.. {
                    let Some(ov) = props.indexed("OV", i) else { break };
                    let threshold: f64 = ov.trim().parse().map_err(|_| {
                        Error::ValidationError(format!("continuous threshold OV={i} '{ov}' is not a number"))
                    })?;
                    match (props.indexed("L", i), props.indexed("E", i), props.indexed("G", i)) {
                        (Some(l), Some(e), Some(g)) => points.push(Breakpoint::new(threshold, l, e, g)),
                        _ => tracing::warn!(
                            column = %column,
                            index = i,
                            "continuous breakpoint without L/E/G, skipped"
                        ),
                    }
                }
                Ok(MappingFunction::Continuous(ContinuousMapping::new(column, ty, points)?))
            }
            other => Err(Error::ValidationError(format!("unknown mapping type '{other}'"))),
        }
    }
}

fn threshold_text(t: f64, kind: PrimitiveKind) -> String {
    match kind {
        PrimitiveKind::Integer | PrimitiveKind::Long if t.fract() == 0.0 => format!("{}", t as i64),
        _ => format_double(t),
    }
}

// ============================================================================
// Property strings
// ============================================================================

/// A parsed definition: plain `KEY=value` entries and indexed
/// `KEY=<n>=value` entries.
#[derive(Debug, Default)]
struct PropertyString {
    plain: HashMap<String, String>,
    indexed: HashMap<(String, usize), String>,
}

impl PropertyString {
    fn parse(definition: &str) -> Result<Self> {
        let mut parsed = PropertyString::default();
        for entry in split_entries(definition) {
            if entry.is_empty() {
                continue;
            }
            let (key, rest) = entry.split_once('=').ok_or_else(|| {
                Error::ValidationError(format!("mapping entry '{entry}' has no '='"))
            })?;
            let index = rest
                .split_once('=')
                .and_then(|(n, value)| n.parse::<usize>().ok().map(|n| (n, value)));
            match (key, index) {
                ("COL" | "T", _) | (_, None) => {
                    parsed.plain.insert(key.to_string(), rest.to_string());
                }
                (_, Some((n, value))) => {
                    parsed.indexed.insert((key.to_string(), n), value.to_string());
                }
            }
        }
        Ok(parsed)
    }

    fn indexed(&self, key: &str, n: usize) -> Option<&str> {
        self.indexed.get(&(key.to_string(), n)).map(String::as_str)
    }
}

/// Split on single commas; a doubled comma is a literal comma.
fn split_entries(definition: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut chars = definition.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ',' {
            if chars.peek() == Some(&',') {
                chars.next();
                current.push(',');
            } else {
                entries.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    entries.push(current);
    entries
}

fn join_entries(entries: &[(String, String)]) -> String {
    entries
        .iter()
        .map(|(k, v)| format!("{k}={}", v.replace(',', ",,")))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn double() -> AttributeType {
        AttributeType::Single(PrimitiveKind::Double)
    }

    #[test]
    fn test_passthrough_encoding() {
        let m = MappingFunction::Passthrough(PassthroughMapping::new("name", AttributeType::STRING));
        let def = m.to_definition();
        assert_eq!(def.kind, "PASSTHROUGH");
        assert_eq!(def.definition, "COL=name,T=string");
        assert_eq!(MappingFunction::from_definition(&def).unwrap(), m);
    }

    #[test]
    fn test_discrete_encoding_escapes_commas() {
        let m = DiscreteMapping::new("kind", AttributeType::STRING)
            .with_entry("a,b", "#FF0000")
            .unwrap()
            .with_entry("c", "#00FF00")
            .unwrap();
        let def = MappingFunction::Discrete(m.clone()).to_definition();
        assert_eq!(def.definition, "COL=kind,T=string,K=0=a,,b,V=0=#FF0000,K=1=c,V=1=#00FF00");
        let back = MappingFunction::from_definition(&def).unwrap();
        assert_eq!(back, MappingFunction::Discrete(m));
    }

    #[test]
    fn test_discrete_lookup_coerces_keys() {
        let m = DiscreteMapping::new("degree", AttributeType::Single(PrimitiveKind::Integer))
            .with_entry("2", "big")
            .unwrap();
        assert_eq!(m.lookup(&Value::Long(2)), Some("big"));
        assert_eq!(m.lookup(&Value::from("2")), Some("big"));
        assert_eq!(m.lookup(&Value::Integer(3)), None);
    }

    #[test]
    fn test_continuous_decode_stops_at_first_missing_ov() {
        let def = MappingDefinition {
            kind: CONTINUOUS.into(),
            definition: "COL=s,T=double,L=0=1,E=0=1,G=0=1,OV=0=0,L=1=2,E=1=2,G=1=2,OV=1=5,L=3=9,E=3=9,G=3=9,OV=3=9"
                .into(),
        };
        let MappingFunction::Continuous(m) = MappingFunction::from_definition(&def).unwrap() else {
            panic!("expected continuous");
        };
        assert_eq!(m.breakpoints().len(), 2);
    }

    #[test]
    fn test_continuous_incomplete_point_is_dropped() {
        let def = MappingDefinition {
            kind: CONTINUOUS.into(),
            definition: "COL=s,T=double,L=0=1,G=0=1,OV=0=0,L=1=2,E=1=2,G=1=2,OV=1=5".into(),
        };
        let MappingFunction::Continuous(m) = MappingFunction::from_definition(&def).unwrap() else {
            panic!("expected continuous");
        };
        assert_eq!(m.breakpoints().len(), 1);
        assert_eq!(m.breakpoints()[0].threshold, 5.0);
    }

    #[test]
    fn test_unsorted_breakpoints_rejected() {
        let res = ContinuousMapping::new(
            "s",
            double(),
            vec![Breakpoint::new(10.0, "a", "a", "a"), Breakpoint::new(0.0, "b", "b", "b")],
        );
        assert!(matches!(res, Err(Error::ValidationError(_))));

        let def = MappingDefinition {
            kind: CONTINUOUS.into(),
            definition: "COL=s,T=double,L=0=1,E=0=1,G=0=1,OV=0=5,L=1=2,E=1=2,G=1=2,OV=1=0".into(),
        };
        assert!(matches!(MappingFunction::from_definition(&def), Err(Error::ValidationError(_))));
    }

    #[test]
    fn test_continuous_round_trip_and_evaluate() {
        let m = ContinuousMapping::new(
            "score",
            double(),
            vec![Breakpoint::new(0.0, "red", "red", "red"), Breakpoint::new(10.0, "blue", "blue", "blue")],
        )
        .unwrap();
        let f = MappingFunction::Continuous(m);
        let back = MappingFunction::from_definition(&f.to_definition()).unwrap();
        assert_eq!(back, f);
        assert_eq!(back.evaluate(&Value::Double(5.0), ValueSpace::Color).unwrap(), "#800080");
        assert_eq!(back.evaluate(&Value::Integer(-1), ValueSpace::Color).unwrap(), "red");
    }

    #[test]
    fn test_integer_thresholds_written_without_fraction() {
        let m = ContinuousMapping::new(
            "degree",
            AttributeType::Single(PrimitiveKind::Integer),
            vec![Breakpoint::new(1.0, "1", "1", "1")],
        )
        .unwrap();
        let def = MappingFunction::Continuous(m).to_definition();
        assert!(def.definition.ends_with("OV=0=1"));
    }

    #[test]
    fn test_unknown_kind_and_missing_column() {
        let bad_kind = MappingDefinition { kind: "FANCY".into(), definition: "COL=a,T=string".into() };
        assert!(matches!(MappingFunction::from_definition(&bad_kind), Err(Error::ValidationError(_))));
        let no_col = MappingDefinition { kind: PASSTHROUGH.into(), definition: "T=string".into() };
        assert!(matches!(MappingFunction::from_definition(&no_col), Err(Error::ValidationError(_))));
        let bad_type = MappingDefinition { kind: PASSTHROUGH.into(), definition: "COL=a,T=float".into() };
        assert!(matches!(MappingFunction::from_definition(&bad_type), Err(Error::TypeError(_))));
    }

    #[test]
    fn test_continuous_needs_numeric_column() {
        assert!(ContinuousMapping::new("name", AttributeType::STRING, Vec::new()).is_err());
    }
}
