//! # Relation Types
//!
//! Graph relations ("triples") of one subject, as returned by the relation
//! queries and fed to the bound-fan-out filter.
//!
//! Two layouts exist:
//! - grouped: outgoing/incoming collections keyed by predicate
//! - flat: one list of triples touching the subject in either direction

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Direction of a relation relative to the subject entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The entity is the subject of the relation.
    Out,
    /// The entity is the object of the relation.
    In,
}

/// One neighbor of an entity along a predicate: a node or a literal value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityInfo {
    /// Node identifier; empty for literal values.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dcid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Literal value; empty for nodes.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    /// Declared types, most specific first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provenance_id: String,
}

impl EntityInfo {
    /// A typed node neighbor.
    #[must_use]
    pub fn node(dcid: impl Into<String>, types: &[&str]) -> Self {
        Self {
            dcid: dcid.into(),
            types: types.iter().map(|t| (*t).to_string()).collect(),
            ..Self::default()
        }
    }

    /// An untyped literal neighbor.
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }
}

/// The neighbors of an entity along one predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityInfoCollection {
    #[serde(default)]
    pub entities: Vec<EntityInfo>,
}

impl EntityInfoCollection {
    #[must_use]
    pub fn new(entities: Vec<EntityInfo>) -> Self {
        Self { entities }
    }
}

/// A single subject-predicate-object statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject_id: String,
    pub predicate: String,
    /// Object node; empty when the object is a literal.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub object_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub object_name: String,
    /// Object literal; empty when the object is a node.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub object_value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provenance_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subject_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub object_types: Vec<String>,
}

impl Triple {
    /// Direction of this triple as seen from `entity`.
    #[must_use]
    pub fn direction_from(&self, entity: &str) -> Direction {
        if self.subject_id == entity {
            Direction::Out
        } else {
            Direction::In
        }
    }

    /// Types of the end opposite to `entity`.
    #[must_use]
    pub fn neighbor_types(&self, entity: &str) -> &[String] {
        match self.direction_from(entity) {
            Direction::Out => &self.object_types,
            Direction::In => &self.subject_types,
        }
    }
}

/// Every relation of one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triples {
    /// Outgoing neighbors keyed by predicate.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub out_nodes: BTreeMap<String, EntityInfoCollection>,
    /// Incoming neighbors keyed by predicate.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub in_nodes: BTreeMap<String, EntityInfoCollection>,
    /// Flat triple list (legacy cache layout).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triples: Vec<Triple>,
}

impl Triples {
    /// Neighbors in one direction.
    #[must_use]
    pub fn nodes(&self, direction: Direction) -> &BTreeMap<String, EntityInfoCollection> {
        match direction {
            Direction::Out => &self.out_nodes,
            Direction::In => &self.in_nodes,
        }
    }

    /// Mutable neighbors in one direction.
    pub fn nodes_mut(&mut self, direction: Direction) -> &mut BTreeMap<String, EntityInfoCollection> {
        match direction {
            Direction::Out => &mut self.out_nodes,
            Direction::In => &mut self.in_nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_and_neighbor_types() {
        let t = Triple {
            subject_id: "geoId/06".into(),
            predicate: "containedInPlace".into(),
            object_id: "country/USA".into(),
            subject_types: vec!["State".into()],
            object_types: vec!["Country".into()],
            ..Triple::default()
        };
        assert_eq!(t.direction_from("geoId/06"), Direction::Out);
        assert_eq!(t.neighbor_types("geoId/06"), ["Country".to_string()]);
        assert_eq!(t.direction_from("country/USA"), Direction::In);
        assert_eq!(t.neighbor_types("country/USA"), ["State".to_string()]);
    }

    #[test]
    fn grouped_json_skips_empty_layouts() {
        let mut triples = Triples::default();
        triples.nodes_mut(Direction::Out).insert(
            "name".into(),
            EntityInfoCollection::new(vec![EntityInfo::literal("California")]),
        );
        let json = serde_json::to_string(&triples).expect("serialize");
        assert!(json.contains("out_nodes"));
        assert!(!json.contains("in_nodes"));
        assert!(!json.contains("\"triples\""));
    }
}
