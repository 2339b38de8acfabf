//! # GDM statement model
//!
//! Wire types for records as they enter and leave the store: a `Model` of
//! `Resource`s, each a list of `Statement`s (subject, predicate, object
//! plus order/uuid/confidence/evidence qualifiers).

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Nodes
// ============================================================================

/// Subject or object of a statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GdmNode {
    Resource {
        uri: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data_model: Option<String>,
    },
    /// Blank node. The id is local to one model or one graph snapshot.
    #[serde(rename = "BNode")]
    BNode { id: u64 },
    Literal { value: String },
}

/// Classification of a statement node, as used by the identity hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GdmNodeType {
    Resource,
    #[serde(rename = "BNode")]
    BNode,
    Literal,
}

impl fmt::Display for GdmNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GdmNodeType::Resource => f.write_str("Resource"),
            GdmNodeType::BNode => f.write_str("BNode"),
            GdmNodeType::Literal => f.write_str("Literal"),
        }
    }
}

impl GdmNode {
    pub fn resource(uri: impl Into<String>) -> Self {
        GdmNode::Resource { uri: uri.into(), data_model: None }
    }

    pub fn bnode(id: u64) -> Self {
        GdmNode::BNode { id }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        GdmNode::Literal { value: value.into() }
    }

    pub fn node_type(&self) -> GdmNodeType {
        match self {
            GdmNode::Resource { .. } => GdmNodeType::Resource,
            GdmNode::BNode { .. } => GdmNodeType::BNode,
            GdmNode::Literal { .. } => GdmNodeType::Literal,
        }
    }

    pub fn uri(&self) -> Option<&str> {
        match self {
            GdmNode::Resource { uri, .. } => Some(uri),
            _ => None,
        }
    }
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Predicate {
    pub uri: String,
}

impl Predicate {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub subject: GdmNode,
    pub predicate: Predicate,
    pub object: GdmNode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl Statement {
    pub fn new(subject: GdmNode, predicate: impl Into<String>, object: GdmNode) -> Self {
        Self {
            id: None,
            subject,
            predicate: Predicate::new(predicate),
            object,
            order: None,
            uuid: None,
            confidence: None,
            evidence: None,
        }
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn with_confidence(mut self, confidence: impl Into<String>) -> Self {
        self.confidence = Some(confidence.into());
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }
}

// ============================================================================
// Resources and models
// ============================================================================

/// One record: the statements describing a single resource URI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub uri: String,
    #[serde(default)]
    pub statements: Vec<Statement>,
}

impl Resource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into(), statements: Vec::new() }
    }

    pub fn add_statement(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_resource(&mut self, resource: Resource) {
        self.resources.push(resource);
    }

    pub fn resource(&self, uri: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.uri == uri)
    }

    pub fn statement_count(&self) -> usize {
        self.resources.iter().map(Resource::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_statement_wire_shape() {
        let stmt = Statement::new(
            GdmNode::resource("http://example.org/r1"),
            "http://purl.org/dc/terms/title",
            GdmNode::literal("Title A"),
        )
        .with_order(1);

        let json = serde_json::to_value(&stmt).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "subject": { "type": "Resource", "uri": "http://example.org/r1" },
                "predicate": { "uri": "http://purl.org/dc/terms/title" },
                "object": { "type": "Literal", "value": "Title A" },
                "order": 1
            })
        );

        let back: Statement = serde_json::from_value(json).unwrap();
        assert_eq!(back, stmt);
    }

    #[test]
    fn test_bnode_serde() {
        let json = serde_json::to_string(&GdmNode::bnode(7)).unwrap();
        assert_eq!(json, r#"{"type":"BNode","id":7}"#);
    }
}
