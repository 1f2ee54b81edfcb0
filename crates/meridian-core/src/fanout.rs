//! # Bound-Fan-Out Filter
//!
//! Caps relation results per (direction, predicate, neighbor type) bucket so
//! that one neighbor type cannot crowd out the others, and so the output
//! size stays bounded.
//!
//! The filter is independent of source ranking. Buckets are sorted by
//! identifier before truncation, which makes the output the same for any
//! input order. A limit of 0 means unbounded.

use crate::primitives::UNTYPED_BUCKET;
use crate::triples::{Direction, EntityInfo, EntityInfoCollection, Triple, Triples};
use std::collections::BTreeMap;

/// Per-bucket cap applied to relation results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FanOutFilter {
    limit: usize,
}

impl FanOutFilter {
    /// Create a filter; `limit == 0` disables capping.
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self { limit }
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.limit == 0
    }

    /// Cap every relation layout of `entity`'s triples in place.
    pub fn apply(&self, entity: &str, triples: &mut Triples) {
        if self.is_unbounded() {
            return;
        }
        for direction in [Direction::Out, Direction::In] {
            for collection in triples.nodes_mut(direction).values_mut() {
                self.apply_collection(collection);
            }
        }
        if !triples.triples.is_empty() {
            self.apply_flat(entity, &mut triples.triples);
        }
    }

    /// Cap one predicate's neighbor list by neighbor type.
    ///
    /// Lists already at or below the limit are left untouched.
    pub fn apply_collection(&self, collection: &mut EntityInfoCollection) {
        if self.is_unbounded() || collection.entities.len() <= self.limit {
            return;
        }

        let mut buckets: BTreeMap<String, Vec<EntityInfo>> = BTreeMap::new();
        for entity in collection.entities.drain(..) {
            let key = entity
                .types
                .first()
                .cloned()
                .unwrap_or_else(|| UNTYPED_BUCKET.to_string());
            buckets.entry(key).or_default().push(entity);
        }

        for mut bucket in buckets.into_values() {
            bucket.sort_by(|a, b| a.dcid.cmp(&b.dcid).then_with(|| a.value.cmp(&b.value)));
            bucket.truncate(self.limit);
            collection.entities.append(&mut bucket);
        }
    }

    /// Cap a flat triple list of `entity`.
    ///
    /// Buckets are keyed by (direction, predicate, neighbor type) and sorted
    /// by (predicate, subject, object id, object value).
    pub fn apply_flat(&self, entity: &str, triples: &mut Vec<Triple>) {
        if self.is_unbounded() {
            return;
        }

        let mut buckets: BTreeMap<(Direction, String, String), Vec<Triple>> = BTreeMap::new();
        for triple in triples.drain(..) {
            let neighbor_type = triple
                .neighbor_types(entity)
                .first()
                .cloned()
                .unwrap_or_default();
            let key = (
                triple.direction_from(entity),
                triple.predicate.clone(),
                neighbor_type,
            );
            buckets.entry(key).or_default().push(triple);
        }

        for mut bucket in buckets.into_values() {
            bucket.sort_by(|a, b| {
                a.predicate
                    .cmp(&b.predicate)
                    .then_with(|| a.subject_id.cmp(&b.subject_id))
                    .then_with(|| a.object_id.cmp(&b.object_id))
                    .then_with(|| a.object_value.cmp(&b.object_value))
            });
            bucket.truncate(self.limit);
            triples.append(&mut bucket);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn dcids(collection: &EntityInfoCollection) -> Vec<&str> {
        collection.entities.iter().map(|e| e.dcid.as_str()).collect()
    }

    #[test]
    fn caps_each_neighbor_type_independently() {
        let mut collection = EntityInfoCollection::new(vec![
            EntityInfo::node("t1/e", &["T1"]),
            EntityInfo::node("t1/b", &["T1"]),
            EntityInfo::node("t2/a", &["T2"]),
            EntityInfo::node("t1/d", &["T1"]),
            EntityInfo::node("t1/a", &["T1"]),
            EntityInfo::node("t1/c", &["T1"]),
        ]);

        FanOutFilter::new(2).apply_collection(&mut collection);
        assert_eq!(dcids(&collection), vec!["t1/a", "t1/b", "t2/a"]);
    }

    #[test]
    fn zero_limit_is_identity() {
        let original = EntityInfoCollection::new(vec![
            EntityInfo::node("b", &["T"]),
            EntityInfo::node("a", &["T"]),
            EntityInfo::node("c", &["T"]),
        ]);
        let mut collection = original.clone();
        FanOutFilter::new(0).apply_collection(&mut collection);
        assert_eq!(collection, original);
    }

    #[test]
    fn short_lists_keep_their_order() {
        let original = EntityInfoCollection::new(vec![
            EntityInfo::node("b", &["T"]),
            EntityInfo::node("a", &["U"]),
        ]);
        let mut collection = original.clone();
        FanOutFilter::new(2).apply_collection(&mut collection);
        assert_eq!(collection, original);
    }

    #[test]
    fn literals_share_the_untyped_bucket() {
        let mut collection = EntityInfoCollection::new(vec![
            EntityInfo::literal("z"),
            EntityInfo::literal("x"),
            EntityInfo::literal("y"),
            EntityInfo::node("n1", &["Place"]),
        ]);
        FanOutFilter::new(1).apply_collection(&mut collection);

        // "Place" < "_" in byte order.
        assert_eq!(collection.entities[0].dcid, "n1");
        assert_eq!(collection.entities[1].value, "x");
        assert_eq!(collection.entities.len(), 2);
    }

    #[test]
    fn apply_covers_both_directions() {
        let many = |prefix: &str| {
            EntityInfoCollection::new(
                (0..5)
                    .map(|i| EntityInfo::node(format!("{prefix}/{i}"), &["T"]))
                    .collect(),
            )
        };
        let mut triples = Triples::default();
        triples.out_nodes.insert("p".into(), many("out"));
        triples.in_nodes.insert("q".into(), many("in"));

        FanOutFilter::new(3).apply("e", &mut triples);
        assert_eq!(triples.out_nodes["p"].entities.len(), 3);
        assert_eq!(triples.in_nodes["q"].entities.len(), 3);
    }

    #[test]
    fn flat_layout_buckets_by_direction_and_predicate() {
        let out = |object: &str, ty: &str| Triple {
            subject_id: "e".into(),
            predicate: "p".into(),
            object_id: object.into(),
            object_types: vec![ty.into()],
            ..Triple::default()
        };
        let incoming = |subject: &str| Triple {
            subject_id: subject.into(),
            predicate: "p".into(),
            object_id: "e".into(),
            subject_types: vec!["T".into()],
            ..Triple::default()
        };
        let mut triples = vec![
            out("o3", "T"),
            incoming("s2"),
            out("o1", "T"),
            out("o2", "T"),
            incoming("s1"),
            out("o9", "U"),
        ];

        FanOutFilter::new(1).apply_flat("e", &mut triples);
        let seen: Vec<(&str, &str)> = triples
            .iter()
            .map(|t| (t.subject_id.as_str(), t.object_id.as_str()))
            .collect();
        assert_eq!(seen, vec![("e", "o1"), ("e", "o9"), ("s1", "e")]);
    }
}
