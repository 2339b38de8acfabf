//! Node in the property graph.

use serde::{Deserialize, Serialize};
use super::{keys, NodeType, PropertyMap, Value};

/// Arena index of a node. Stable for the lifetime of one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node in the property graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub labels: Vec<String>,
    pub properties: PropertyMap,
}

impl Node {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            labels: Vec::new(),
            properties: PropertyMap::new(),
        }
    }

    pub fn with_labels(mut self, labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Node type recorded at ingestion. `None` when missing or unknown.
    pub fn node_type(&self) -> Option<NodeType> {
        self.get_str(keys::NODETYPE).and_then(NodeType::from_name)
    }

    pub fn uri(&self) -> Option<&str> {
        self.get_str(keys::URI)
    }

    pub fn literal_value(&self) -> Option<&str> {
        self.get_str(keys::VALUE)
    }

    /// Leaves terminate a resource description: literals and URI-bearing nodes.
    pub fn is_leaf(&self) -> bool {
        match self.node_type() {
            Some(t) => !t.is_blank(),
            None => self.uri().is_some() || self.literal_value().is_some(),
        }
    }

    /// Content of a leaf for hashing: the literal value, else the URI.
    pub fn content(&self) -> Option<&str> {
        self.literal_value().or_else(|| self.uri())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_roundtrip() {
        let node = Node::new(NodeId(1))
            .with_property(keys::NODETYPE, NodeType::Literal.name())
            .with_property(keys::VALUE, "Title A");

        assert_eq!(node.node_type(), Some(NodeType::Literal));
        assert_eq!(node.content(), Some("Title A"));
        assert!(node.is_leaf());
    }

    #[test]
    fn test_bnode_is_not_leaf() {
        let node = Node::new(NodeId(2)).with_property(keys::NODETYPE, NodeType::BNode.name());
        assert!(!node.is_leaf());
        assert_eq!(node.content(), None);
    }

    #[test]
    fn test_unknown_node_type() {
        let node = Node::new(NodeId(3)).with_property(keys::NODETYPE, "__SOMETHING__");
        assert_eq!(node.node_type(), None);
    }
}
