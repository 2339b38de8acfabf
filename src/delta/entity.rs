//! Entities extracted from one comparison graph.
//!
//! They live for a single comparison. Node and edge ids point into the
//! graph they were extracted from and are never compared across graphs.

use crate::model::keys::ATTRIBUTE_DELIMITER;
use crate::model::{NodeId, RelId};

/// A repeatable substructure of a record (content-schema entity).
#[derive(Debug, Clone, PartialEq)]
pub struct CsEntity {
    pub node_id: NodeId,
    /// Edges from the record node to the entity node.
    pub path: Vec<RelId>,
    pub keys: Vec<KeyEntity>,
    pub values: Vec<ValueEntity>,
    /// 1-based position among the entities sharing the key tuple.
    pub entity_order: i64,
    /// Digest over everything below the entity node.
    pub content: String,
}

impl CsEntity {
    pub fn new(node_id: NodeId, path: Vec<RelId>) -> Self {
        Self {
            node_id,
            path,
            keys: Vec::new(),
            values: Vec::new(),
            entity_order: 0,
            content: String::new(),
        }
    }

    /// Key tuple: key values in key-path order.
    pub fn key(&self) -> String {
        let mut key = String::new();
        for (i, k) in self.keys.iter().enumerate() {
            if i > 0 {
                key.push(ATTRIBUTE_DELIMITER);
            }
            key.push_str(&k.value);
        }
        key
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyEntity {
    pub node_id: NodeId,
    pub value: String,
}

/// A single value, inside a CS entity or hanging directly off the record.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueEntity {
    pub node_id: NodeId,
    pub edge_id: RelId,
    /// Edges from the record node to the value node.
    pub path: Vec<RelId>,
    pub predicate: String,
    pub value: String,
    pub order: Option<i64>,
    /// Key tuple of the owning entity, empty for record-level values.
    pub key: String,
    pub entity_order: i64,
}

/// A branch below an entity (or the record) that the key/value stages left
/// unresolved.
#[derive(Debug, Clone, PartialEq)]
pub struct SubGraphEntity {
    /// Target node of the branch edge.
    pub node_id: NodeId,
    pub edge_id: RelId,
    /// Edges from the record node down to and including the branch edge.
    pub path: Vec<RelId>,
    /// Entity key and order of the anchor, empty for the record itself.
    pub key: String,
    /// Predicates from the anchor to the branch edge.
    pub predicates: String,
    pub order: Option<i64>,
    /// Digest over everything below the branch edge.
    pub content: String,
}

/// One leaf of an unresolved sub-graph.
#[derive(Debug, Clone, PartialEq)]
pub struct SubGraphLeafEntity {
    pub node_id: NodeId,
    /// Edges from the record node down to the leaf.
    pub path: Vec<RelId>,
    pub key: String,
    pub predicates: String,
    pub order: Option<i64>,
    /// `predicate#order` segments from the branch edge to the leaf.
    pub leaf_path: String,
    /// The leaf itself (`L:`, `R:` or `B:` prefixed).
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_tuple() {
        let mut entity = CsEntity::new(NodeId(1), Vec::new());
        entity.keys.push(KeyEntity { node_id: NodeId(2), value: "245".into() });
        entity.keys.push(KeyEntity { node_id: NodeId(3), value: "a".into() });
        assert_eq!(entity.key(), "245\u{1E}a");
    }
}
