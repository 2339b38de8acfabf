//! Reading resources back as GDM.
//!
//! A resource's description is its concise bounded description: every
//! statement reachable from the resource node through nodes that carry no
//! URI. Literals and URI nodes end the walk.

use std::collections::HashSet;

use tracing::debug;

use crate::gdm::{GdmNode, Model, Resource, Statement};
use crate::index::{scoped_key, IndexName};
use crate::model::{keys, Direction, Node, NodeId, NodeType, Relationship, Value};
use crate::storage::StorageBackend;
use crate::tx::TxMode;
use crate::Result;

/// GDM view of a stored node. `None` when the node cannot be classified.
pub(crate) fn gdm_node(node: &Node) -> Option<GdmNode> {
    match node.node_type()? {
        NodeType::Resource | NodeType::TypeResource => Some(GdmNode::Resource {
            uri: node.uri()?.to_owned(),
            data_model: node.get_str(keys::DATA_MODEL).map(str::to_owned),
        }),
        NodeType::BNode | NodeType::TypeBNode => Some(GdmNode::bnode(node.id.0)),
        NodeType::Literal => Some(GdmNode::literal(node.literal_value()?)),
    }
}

/// GDM view of a stored statement edge.
pub(crate) fn read_statement(rel: &Relationship, subject: &Node, object: &Node) -> Option<Statement> {
    let subject = gdm_node(subject)?;
    let object = gdm_node(object)?;

    Some(Statement {
        id: Some(rel.id.0),
        subject,
        predicate: crate::gdm::Predicate::new(rel.rel_type.as_str()),
        object,
        order: rel.order(),
        uuid: rel.get_str(keys::UUID).map(str::to_owned),
        confidence: rel.get_str(keys::CONFIDENCE).map(str::to_owned),
        evidence: rel.get_str(keys::EVIDENCE).map(str::to_owned),
    })
}

/// One statement edge of a description, with both ends loaded.
#[derive(Debug, Clone)]
pub(crate) struct DescribedEdge {
    pub rel: Relationship,
    pub subject: Node,
    pub object: Node,
}

/// Concise bounded description of `root`, in ingestion order.
///
/// With a scope, only edges of that data model are followed.
pub(crate) async fn describe<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    root: &Node,
    scope: Option<&str>,
) -> Result<Vec<DescribedEdge>> {
    let mut edges = Vec::new();
    let mut visited: HashSet<NodeId> = HashSet::from([root.id]);
    let mut stack = vec![root.clone()];

    while let Some(subject) = stack.pop() {
        let rels = backend.get_relationships(tx, subject.id, Direction::Outgoing, None).await?;
        for rel in rels {
            if let Some(scope) = scope {
                if rel.get_str(keys::DATA_MODEL) != Some(scope) {
                    continue;
                }
            }
            let Some(object) = backend.get_node(tx, rel.dst).await? else {
                continue;
            };
            if object.uri().is_none() && object.literal_value().is_none() && visited.insert(object.id) {
                stack.push(object.clone());
            }
            edges.push(DescribedEdge { rel, subject: subject.clone(), object });
        }
    }

    edges.sort_by_key(|e| {
        let index = e.rel.get(keys::INDEX).and_then(Value::as_int);
        (index.is_none(), index, e.rel.id)
    });
    Ok(edges)
}

/// Reads resources of one scope.
pub struct ResourceReader<'a, B: StorageBackend> {
    backend: &'a B,
    scope: Option<String>,
}

impl<'a, B: StorageBackend> ResourceReader<'a, B> {
    pub fn new(backend: &'a B, scope: Option<String>) -> Self {
        Self { backend, scope }
    }

    /// Resource node of `uri` in this reader's scope.
    pub(crate) async fn resource_node(&self, tx: &B::Tx, uri: &str) -> Result<Option<Node>> {
        let id = match &self.scope {
            Some(scope) => {
                self.backend
                    .lookup_node(tx, IndexName::ResourcesWithDataModel, &scoped_key(uri, scope))
                    .await?
            }
            None => self.backend.lookup_node(tx, IndexName::Resources, uri).await?,
        };
        match id {
            Some(id) => self.backend.get_node(tx, id).await,
            None => Ok(None),
        }
    }

    pub(crate) async fn read_in(&self, tx: &B::Tx, root: &Node) -> Result<Option<Resource>> {
        let Some(uri) = root.uri() else {
            debug!(node = %root.id, "record node has no URI");
            return Ok(None);
        };

        let mut resource = Resource::new(uri);
        for edge in describe(self.backend, tx, root, self.scope.as_deref()).await? {
            match read_statement(&edge.rel, &edge.subject, &edge.object) {
                Some(statement) => resource.add_statement(statement),
                None => debug!(rel = %edge.rel.id, "skipping statement with unclassifiable node"),
            }
        }
        Ok(Some(resource))
    }

    /// Read the description of one resource.
    pub async fn read(&self, uri: &str) -> Result<Option<Resource>> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let resource = match self.resource_node(&tx, uri).await? {
            Some(root) => self.read_in(&tx, &root).await?,
            None => None,
        };
        self.backend.commit_tx(tx).await?;
        Ok(resource)
    }

    /// Read every record of a class: nodes labelled `record_class_uri`
    /// (and, when scoped, belonging to the scope's data model).
    pub async fn read_model(&self, record_class_uri: &str) -> Result<Model> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let mut model = Model::new();
        for node in self.backend.nodes_by_label(&tx, record_class_uri).await? {
            if let Some(scope) = &self.scope {
                if node.get_str(keys::DATA_MODEL) != Some(scope.as_str()) {
                    continue;
                }
            }
            if let Some(resource) = self.read_in(&tx, &node).await? {
                model.add_resource(resource);
            }
        }
        self.backend.commit_tx(tx).await?;
        debug!(resources = model.resources.len(), class = record_class_uri, "read model");
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{ingest, IngestConfig};
    use crate::storage::MemoryBackend;
    use pretty_assertions::assert_eq;

    const R1: &str = "http://example.org/r1";
    const TITLE: &str = "http://purl.org/dc/terms/title";
    const CREATOR: &str = "http://purl.org/dc/terms/creator";
    const NAME: &str = "http://xmlns.com/foaf/0.1/name";
    const KNOWS: &str = "http://xmlns.com/foaf/0.1/knows";
    const DOCUMENT: &str = "http://purl.org/ontology/bibo/Document";

    fn sample() -> Model {
        let mut resource = Resource::new(R1);
        resource.add_statement(Statement::new(GdmNode::resource(R1), keys::RDF_TYPE, GdmNode::resource(DOCUMENT)));
        resource.add_statement(Statement::new(GdmNode::resource(R1), TITLE, GdmNode::literal("Title A")).with_order(1));
        resource.add_statement(Statement::new(GdmNode::resource(R1), CREATOR, GdmNode::bnode(1)));
        resource.add_statement(Statement::new(GdmNode::bnode(1), NAME, GdmNode::literal("Ada")).with_confidence("0.7"));
        resource.add_statement(Statement::new(GdmNode::bnode(1), KNOWS, GdmNode::resource("http://example.org/p2")));
        let mut model = Model::new();
        model.add_resource(resource);
        model
    }

    #[tokio::test]
    async fn test_read_back_in_ingestion_order() {
        let db = MemoryBackend::new();
        ingest(&db, &sample(), IngestConfig::default()).await.unwrap();

        let resource = ResourceReader::new(&db, None).read(R1).await.unwrap().unwrap();
        let predicates: Vec<&str> = resource.statements.iter().map(|s| s.predicate.uri.as_str()).collect();
        assert_eq!(predicates, vec![keys::RDF_TYPE, TITLE, CREATOR, NAME, KNOWS]);

        assert_eq!(resource.statements[1].object, GdmNode::literal("Title A"));
        assert_eq!(resource.statements[1].order, Some(1));
        assert_eq!(resource.statements[3].confidence.as_deref(), Some("0.7"));
        assert!(resource.statements.iter().all(|s| s.uuid.is_some()));
        // the creator bnode is the subject of the name statement
        assert_eq!(resource.statements[2].object, resource.statements[3].subject);
    }

    #[tokio::test]
    async fn test_walk_stops_at_uri_nodes() {
        let db = MemoryBackend::new();
        let mut model = sample();
        let mut other = Resource::new("http://example.org/p2");
        other.add_statement(Statement::new(
            GdmNode::resource("http://example.org/p2"), NAME, GdmNode::literal("Bob"),
        ));
        model.add_resource(other);
        ingest(&db, &model, IngestConfig::default()).await.unwrap();

        let resource = ResourceReader::new(&db, None).read(R1).await.unwrap().unwrap();
        assert_eq!(resource.len(), 5);
    }

    #[tokio::test]
    async fn test_read_model_by_record_class() {
        let db = MemoryBackend::new();
        ingest(&db, &sample(), IngestConfig::scoped("dm")).await.unwrap();

        let model = ResourceReader::new(&db, Some("dm".into())).read_model(DOCUMENT).await.unwrap();
        assert_eq!(model.resources.len(), 1);
        assert_eq!(model.resources[0].uri, R1);

        let other = ResourceReader::new(&db, Some("other".into())).read_model(DOCUMENT).await.unwrap();
        assert!(other.resources.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_resource() {
        let db = MemoryBackend::new();
        assert!(ResourceReader::new(&db, None).read(R1).await.unwrap().is_none());
    }
}
