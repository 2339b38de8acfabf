//! Node kinds stored under `__NODETYPE__`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Resource,
    BNode,
    /// A resource used as the object of `rdf:type`.
    TypeResource,
    /// A blank node used as the object of `rdf:type`.
    TypeBNode,
    Literal,
}

impl NodeType {
    pub fn name(self) -> &'static str {
        match self {
            NodeType::Resource => "__RESOURCE__",
            NodeType::BNode => "__BNODE__",
            NodeType::TypeResource => "__TYPE_RESOURCE__",
            NodeType::TypeBNode => "__TYPE_BNODE__",
            NodeType::Literal => "__LITERAL__",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "__RESOURCE__" => Some(NodeType::Resource),
            "__BNODE__" => Some(NodeType::BNode),
            "__TYPE_RESOURCE__" => Some(NodeType::TypeResource),
            "__TYPE_BNODE__" => Some(NodeType::TypeBNode),
            "__LITERAL__" => Some(NodeType::Literal),
            _ => None,
        }
    }

    pub fn is_blank(self) -> bool {
        matches!(self, NodeType::BNode | NodeType::TypeBNode)
    }

    pub fn is_resource(self) -> bool {
        matches!(self, NodeType::Resource | NodeType::TypeResource)
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_roundtrip() {
        for t in [
            NodeType::Resource,
            NodeType::BNode,
            NodeType::TypeResource,
            NodeType::TypeBNode,
            NodeType::Literal,
        ] {
            assert_eq!(NodeType::from_name(t.name()), Some(t));
        }
        assert_eq!(NodeType::from_name("__NOPE__"), None);
    }
}
