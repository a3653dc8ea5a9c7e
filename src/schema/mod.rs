//! Attribute declaration table.
//!
//! Per owner kind (network, node, edge) a mapping from attribute name to its
//! declared type and arity. Used to "extend" sparse records to their full
//! declared shape and to validate records before they reach the graph.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{PropertyMap, Value};
use crate::types::{self, AttributeType};
use crate::{Error, Result};

/// The table an attribute belongs to. Each is an independent namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    Network,
    Node,
    Edge,
}

impl OwnerKind {
    /// Wire name used by the table-column aspect.
    pub fn table_name(self) -> &'static str {
        match self {
            OwnerKind::Network => "network_table",
            OwnerKind::Node => "node_table",
            OwnerKind::Edge => "edge_table",
        }
    }

    pub fn from_table_name(name: &str) -> Option<Self> {
        match name {
            "network_table" => Some(OwnerKind::Network),
            "node_table" => Some(OwnerKind::Node),
            "edge_table" => Some(OwnerKind::Edge),
            _ => None,
        }
    }
}

/// One declared attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub ty: AttributeType,
    pub single_valued: bool,
}

/// A field of an extended record.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Set(Value),
    /// Declared, but the source record had no value. Never coerced or
    /// defaulted.
    Unset,
}

impl Slot {
    pub fn value(&self) -> Option<&Value> {
        match self {
            Slot::Set(v) => Some(v),
            Slot::Unset => None,
        }
    }
}

/// A record extended to its full declared shape.
pub type Record = BTreeMap<String, Slot>;

/// Declarations for all three owner kinds.
#[derive(Debug, Clone, Default)]
pub struct AttributeDeclarations {
    tables: BTreeMap<OwnerKind, BTreeMap<String, Declaration>>,
}

impl AttributeDeclarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name` on `owner`. Redeclaring replaces the earlier entry.
    ///
    /// A list type cannot be single-valued; that combination is a
    /// `TypeError`.
    pub fn declare(
        &mut self,
        owner: OwnerKind,
        name: impl Into<String>,
        ty: AttributeType,
        single_valued: bool,
    ) -> Result<()> {
        let name = name.into();
        if ty.is_list() == single_valued {
            return Err(Error::TypeError(format!(
                "attribute '{name}' declared {ty} with single_valued={single_valued}"
            )));
        }
        self.tables
            .entry(owner)
            .or_default()
            .insert(name, Declaration { ty, single_valued });
        Ok(())
    }

    /// Declare with the arity implied by the type.
    pub fn declare_type(&mut self, owner: OwnerKind, name: impl Into<String>, ty: AttributeType) {
        self.tables
            .entry(owner)
            .or_default()
            .insert(name.into(), Declaration { ty, single_valued: !ty.is_list() });
    }

    pub fn get(&self, owner: OwnerKind, name: &str) -> Option<&Declaration> {
        self.tables.get(&owner)?.get(name)
    }

    /// Declared attributes of one owner kind, in name order.
    pub fn iter(&self, owner: OwnerKind) -> impl Iterator<Item = (&str, &Declaration)> {
        self.tables
            .get(&owner)
            .into_iter()
            .flat_map(|t| t.iter().map(|(k, v)| (k.as_str(), v)))
    }

    pub fn is_empty(&self, owner: OwnerKind) -> bool {
        self.tables.get(&owner).is_none_or(|t| t.is_empty())
    }

    /// Fill every declared-but-absent field with [`Slot::Unset`].
    ///
    /// Fields present in `partial` but not declared are carried through
    /// unchanged; `validate` decides what to do with them.
    pub fn extend(&self, owner: OwnerKind, partial: &PropertyMap) -> Record {
        let mut record: Record = partial
            .iter()
            .map(|(k, v)| (k.clone(), Slot::Set(v.clone())))
            .collect();
        for (name, _) in self.iter(owner) {
            record.entry(name.to_string()).or_insert(Slot::Unset);
        }
        record
    }

    /// Check `record` against the declarations for `owner`.
    ///
    /// Undeclared keys fail with `UndeclaredAttribute` when `strict`, and are
    /// ignored otherwise. A declared key holding a value of the wrong type or
    /// arity is a `TypeError` in both modes.
    pub fn validate(&self, owner: OwnerKind, record: &Record, strict: bool) -> Result<()> {
        for (name, slot) in record {
            let Some(decl) = self.get(owner, name) else {
                if strict {
                    return Err(Error::UndeclaredAttribute {
                        table: owner.table_name().to_string(),
                        name: name.clone(),
                    });
                }
                continue;
            };
            let Slot::Set(value) = slot else { continue };
            if decl.single_valued == value.is_list() || !decl.ty.admits(value) {
                return Err(Error::TypeError(format!(
                    "attribute '{name}' declared {} but holds {}",
                    decl.ty,
                    types::describe(value)
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveKind;
    use pretty_assertions::assert_eq;

    fn decls() -> AttributeDeclarations {
        let mut d = AttributeDeclarations::new();
        d.declare(OwnerKind::Node, "name", AttributeType::STRING, true).unwrap();
        d.declare(OwnerKind::Node, "score", AttributeType::Single(PrimitiveKind::Double), true).unwrap();
        d.declare(OwnerKind::Node, "tags", AttributeType::ListOf(PrimitiveKind::String), false).unwrap();
        d
    }

    #[test]
    fn test_extend_marks_absent_as_unset() {
        let mut partial = PropertyMap::new();
        partial.insert("name".into(), Value::from("a"));
        let record = decls().extend(OwnerKind::Node, &partial);
        assert_eq!(record.len(), 3);
        assert_eq!(record["name"], Slot::Set(Value::from("a")));
        assert_eq!(record["score"], Slot::Unset);
        assert_eq!(record["tags"], Slot::Unset);
    }

    #[test]
    fn test_strict_rejects_undeclared() {
        let d = decls();
        let mut partial = PropertyMap::new();
        partial.insert("color".into(), Value::from("red"));
        let record = d.extend(OwnerKind::Node, &partial);
        assert!(matches!(
            d.validate(OwnerKind::Node, &record, true),
            Err(Error::UndeclaredAttribute { .. })
        ));
        assert!(d.validate(OwnerKind::Node, &record, false).is_ok());
    }

    #[test]
    fn test_namespaces_are_independent() {
        let d = decls();
        let mut partial = PropertyMap::new();
        partial.insert("name".into(), Value::from("e"));
        let record = d.extend(OwnerKind::Edge, &partial);
        assert_eq!(record.len(), 1);
        assert!(d.validate(OwnerKind::Edge, &record, true).is_err());
    }

    #[test]
    fn test_type_mismatch() {
        let d = decls();
        let mut partial = PropertyMap::new();
        partial.insert("score".into(), Value::from("high"));
        let record = d.extend(OwnerKind::Node, &partial);
        assert!(matches!(d.validate(OwnerKind::Node, &record, false), Err(Error::TypeError(_))));
    }

    #[test]
    fn test_list_cannot_be_single_valued() {
        let mut d = AttributeDeclarations::new();
        let res = d.declare(OwnerKind::Edge, "w", AttributeType::ListOf(PrimitiveKind::Long), true);
        assert!(res.is_err());
    }
}
