//! Entity extraction.
//!
//! Turns one comparison graph into the entities the matchers work on:
//! content-schema entities with their keys and values, record-level
//! values, and the sub-graphs and leaves nothing else explained.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::hash::digest;
use crate::index::IndexName;
use crate::model::keys::ATTRIBUTE_DELIMITER;
use crate::model::{keys, Direction, Node, NodeId, NodeType, RelId, Relationship};
use crate::storage::StorageBackend;
use crate::{Error, Result};

use super::attribute_path::{relative_attribute_path, AttributePath, ContentSchema};
use super::entity::{CsEntity, KeyEntity, SubGraphEntity, SubGraphLeafEntity, ValueEntity};
use super::mark::DeltaState;
use super::ComparisonGraph;

// ============================================================================
// Leaves and content digests
// ============================================================================

/// A leaf reached from some starting point, with the way there.
#[derive(Debug, Clone)]
pub(crate) struct Leaf {
    pub node_id: NodeId,
    /// Edges from the record node to the leaf.
    pub rels: Vec<RelId>,
    /// `predicate#order` segments from the starting point, joined by `/`.
    pub leaf_path: String,
    pub content: String,
}

impl Leaf {
    fn line(&self) -> String {
        format!("{}={}", self.leaf_path, self.content)
    }
}

fn segment(rel: &Relationship) -> String {
    match rel.order() {
        Some(order) => format!("{}#{order}", rel.rel_type),
        None => format!("{}#", rel.rel_type),
    }
}

fn join_segment(prefix: &str, rel: &Relationship) -> String {
    if prefix.is_empty() {
        segment(rel)
    } else {
        format!("{prefix}/{}", segment(rel))
    }
}

fn leaf_content(node: &Node) -> String {
    match (node.node_type(), node.literal_value(), node.uri()) {
        (Some(NodeType::Literal), Some(value), _) => format!("L:{value}"),
        (_, _, Some(uri)) => format!("R:{uri}"),
        (_, Some(value), None) => format!("L:{value}"),
        _ => "B:".to_owned(),
    }
}

/// Every leaf below `start`, depth first in edge order.
///
/// A leaf is a literal, a URI node, or a blank node without statements of
/// its own. `prefix` and `rels` describe how `start` was reached.
pub(crate) async fn collect_leaves<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    start: &Node,
    prefix: String,
    rels: Vec<RelId>,
) -> Result<Vec<Leaf>> {
    let mut leaves = Vec::new();
    if start.is_leaf() {
        leaves.push(Leaf { node_id: start.id, rels, leaf_path: prefix, content: leaf_content(start) });
        return Ok(leaves);
    }

    let mut visited: HashSet<NodeId> = HashSet::from([start.id]);
    let mut stack = vec![(start.id, prefix, rels)];

    while let Some((current, prefix, rels)) = stack.pop() {
        let outgoing = backend.get_relationships(tx, current, Direction::Outgoing, None).await?;
        if outgoing.is_empty() {
            leaves.push(Leaf { node_id: current, rels, leaf_path: prefix, content: "B:".to_owned() });
            continue;
        }
        // reversed so the stack pops siblings in edge order
        for rel in outgoing.into_iter().rev() {
            let target = backend.get_node(tx, rel.dst).await?
                .ok_or_else(|| Error::GraphAccessError(format!("dangling relationship {}", rel.id)))?;
            let path = join_segment(&prefix, &rel);
            let mut below = rels.clone();
            below.push(rel.id);

            if target.is_leaf() {
                leaves.push(Leaf { node_id: target.id, rels: below, leaf_path: path, content: leaf_content(&target) });
            } else if visited.insert(target.id) {
                stack.push((target.id, path, below));
            }
        }
    }
    Ok(leaves)
}

/// Order-independent digest over a set of leaves.
pub(crate) fn content_digest(leaves: &[Leaf]) -> String {
    let mut lines: Vec<String> = leaves.iter().map(Leaf::line).collect();
    lines.sort();
    digest(&lines.join("\n"))
}

/// Digest of everything below `node`.
pub(crate) async fn node_content<B: StorageBackend>(backend: &B, tx: &B::Tx, node: &Node) -> Result<String> {
    let leaves = collect_leaves(backend, tx, node, String::new(), Vec::new()).await?;
    Ok(content_digest(&leaves))
}

/// Leaves below one edge, their paths starting with the edge itself.
async fn edge_leaves<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    rel: &Relationship,
    rels: Vec<RelId>,
) -> Result<Vec<Leaf>> {
    let target = backend.get_node(tx, rel.dst).await?
        .ok_or_else(|| Error::GraphAccessError(format!("dangling relationship {}", rel.id)))?;
    collect_leaves(backend, tx, &target, segment(rel), rels).await
}

/// Whether any edge below `node` carries a delta state.
pub(crate) async fn subtree_marked<B: StorageBackend>(backend: &B, tx: &B::Tx, node: NodeId) -> Result<bool> {
    let mut visited: HashSet<NodeId> = HashSet::from([node]);
    let mut stack = vec![node];

    while let Some(current) = stack.pop() {
        for rel in backend.get_relationships(tx, current, Direction::Outgoing, None).await? {
            if DeltaState::of(&rel).is_some() {
                return Ok(true);
            }
            if visited.insert(rel.dst) {
                stack.push(rel.dst);
            }
        }
    }
    Ok(false)
}

// ============================================================================
// Content-schema entities
// ============================================================================

/// Extract the content-schema entities of a record.
///
/// Entities are the end nodes of the schema's common attribute path. Keys
/// and values are found below each entity along the relative key and value
/// paths. Entities sharing a key tuple are numbered 1..n in graph order.
pub async fn cs_entities<B: StorageBackend>(
    graph: &ComparisonGraph<B>,
    schema: &ContentSchema,
) -> Result<Vec<CsEntity>> {
    let common = schema.common_attribute_path()?;
    let backend = graph.backend();
    let tx = graph.tx();

    let mut entities: Vec<CsEntity> = backend
        .follow(tx, &[graph.root().id], &common.uris())
        .await?
        .into_iter()
        .map(|path| CsEntity::new(path.end().id, path.relationships.iter().map(|r| r.id).collect()))
        .collect();
    if entities.is_empty() {
        debug!(uri = graph.uri(), common = %common, "no content-schema entities");
        return Ok(entities);
    }

    let positions: HashMap<NodeId, usize> = entities.iter().enumerate().map(|(i, e)| (e.node_id, i)).collect();
    let starts: Vec<NodeId> = entities.iter().map(|e| e.node_id).collect();

    for key_path in &schema.key_paths {
        let Some(relative) = relative_attribute_path(key_path, &common) else {
            warn!(path = %key_path, "key path does not reach below the entity, skipped");
            continue;
        };
        for path in backend.follow(tx, &starts, &relative.uris()).await? {
            let Some(value) = path.end().content() else {
                continue;
            };
            if let Some(&i) = positions.get(&path.start().id) {
                entities[i].keys.push(KeyEntity { node_id: path.end().id, value: value.to_owned() });
            }
        }
    }

    if let Some(value_path) = &schema.value_path {
        match relative_attribute_path(value_path, &common) {
            Some(relative) => {
                for path in backend.follow(tx, &starts, &relative.uris()).await? {
                    let (Some(value), Some(last)) = (path.end().content(), path.last_relationship()) else {
                        continue;
                    };
                    let Some(&i) = positions.get(&path.start().id) else {
                        continue;
                    };
                    let mut rels = entities[i].path.clone();
                    rels.extend(path.relationships.iter().map(|r| r.id));
                    entities[i].values.push(ValueEntity {
                        node_id: path.end().id,
                        edge_id: last.id,
                        path: rels,
                        predicate: last.rel_type.clone(),
                        value: value.to_owned(),
                        order: last.order(),
                        key: String::new(),
                        entity_order: 0,
                    });
                }
            }
            None => warn!(path = %value_path, "value path does not reach below the entity, skipped"),
        }
    }

    let mut groups: IndexMap<String, i64> = IndexMap::new();
    for entity in &mut entities {
        let key = entity.key();
        let order = groups.entry(key.clone()).or_insert(0);
        *order += 1;
        entity.entity_order = *order;
        for value in &mut entity.values {
            value.key = key.clone();
            value.entity_order = *order;
        }

        let node = backend.get_node(tx, entity.node_id).await?
            .ok_or_else(|| Error::GraphAccessError(format!("node {} vanished", entity.node_id)))?;
        entity.content = node_content(backend, tx, &node).await?;
    }

    debug!(uri = graph.uri(), entities = entities.len(), groups = groups.len(), "extracted content-schema entities");
    Ok(entities)
}

// ============================================================================
// Record-level values
// ============================================================================

/// Leaves hanging directly off the record node whose edges are still
/// unmarked.
pub async fn flat_values<B: StorageBackend>(graph: &ComparisonGraph<B>) -> Result<Vec<ValueEntity>> {
    let backend = graph.backend();
    let tx = graph.tx();

    let mut values = Vec::new();
    for rel in backend.get_relationships(tx, graph.root().id, Direction::Outgoing, None).await? {
        if DeltaState::of(&rel).is_some() {
            continue;
        }
        let Some(target) = backend.get_node(tx, rel.dst).await? else {
            continue;
        };
        if !target.is_leaf() {
            continue;
        }
        let Some(value) = target.content() else {
            continue;
        };
        values.push(ValueEntity {
            node_id: target.id,
            edge_id: rel.id,
            path: vec![rel.id],
            predicate: rel.rel_type.clone(),
            value: value.to_owned(),
            order: rel.order(),
            key: String::new(),
            entity_order: 0,
        });
    }
    Ok(values)
}

// ============================================================================
// Sub-graphs
// ============================================================================

/// Where the sub-graph walk starts: an unresolved entity, or the record.
#[derive(Debug, Clone)]
pub struct Anchor {
    pub node_id: NodeId,
    /// Edges from the record node to the anchor.
    pub path: Vec<RelId>,
    pub key: String,
}

impl Anchor {
    pub fn entity(entity: &CsEntity) -> Self {
        Self {
            node_id: entity.node_id,
            path: entity.path.clone(),
            key: format!("{}#{}", entity.key(), entity.entity_order),
        }
    }

    pub fn record(root: NodeId) -> Self {
        Self { node_id: root, path: Vec::new(), key: String::new() }
    }
}

/// Unmarked branches below the anchors.
///
/// Edges already marked are skipped, as are edges into `stop_at` (entity
/// nodes, which are handled by their own anchor). A branch whose subtree
/// is partly marked is descended into, so each candidate is a maximal
/// branch with no state anywhere below it.
pub async fn sub_graph_entities<B: StorageBackend>(
    graph: &ComparisonGraph<B>,
    anchors: &[Anchor],
    stop_at: &HashSet<NodeId>,
) -> Result<Vec<SubGraphEntity>> {
    let backend = graph.backend();
    let tx = graph.tx();
    let mut entities = Vec::new();

    for anchor in anchors {
        let mut visited: HashSet<NodeId> = HashSet::from([anchor.node_id]);
        let mut stack = vec![(anchor.node_id, anchor.path.clone(), String::new())];

        while let Some((current, path, predicates)) = stack.pop() {
            let rels = backend.get_relationships(tx, current, Direction::Outgoing, None).await?;
            for rel in rels.into_iter().rev() {
                if DeltaState::of(&rel).is_some() || stop_at.contains(&rel.dst) {
                    continue;
                }
                let target = backend.get_node(tx, rel.dst).await?
                    .ok_or_else(|| Error::GraphAccessError(format!("dangling relationship {}", rel.id)))?;

                let mut below = path.clone();
                below.push(rel.id);
                let predicates = if predicates.is_empty() {
                    rel.rel_type.clone()
                } else {
                    format!("{predicates}{ATTRIBUTE_DELIMITER}{}", rel.rel_type)
                };

                if !target.is_leaf() && subtree_marked(backend, tx, target.id).await? {
                    if visited.insert(target.id) {
                        stack.push((target.id, below, predicates));
                    }
                    continue;
                }

                let leaves = edge_leaves(backend, tx, &rel, below.clone()).await?;
                entities.push(SubGraphEntity {
                    node_id: target.id,
                    edge_id: rel.id,
                    path: below,
                    key: anchor.key.clone(),
                    predicates,
                    order: rel.order(),
                    content: content_digest(&leaves),
                });
            }
        }
    }

    debug!(uri = graph.uri(), anchors = anchors.len(), sub_graphs = entities.len(), "extracted sub-graphs");
    Ok(entities)
}

/// Decompose a sub-graph into its leaves.
pub async fn leaf_entities<B: StorageBackend>(
    graph: &ComparisonGraph<B>,
    sub_graph: &SubGraphEntity,
) -> Result<Vec<SubGraphLeafEntity>> {
    let backend = graph.backend();
    let tx = graph.tx();
    let rel = backend.get_relationship(tx, sub_graph.edge_id).await?
        .ok_or_else(|| Error::GraphAccessError(format!("relationship {} vanished", sub_graph.edge_id)))?;

    let leaves = edge_leaves(backend, tx, &rel, sub_graph.path.clone()).await?;
    Ok(leaves
        .into_iter()
        .map(|leaf| SubGraphLeafEntity {
            node_id: leaf.node_id,
            path: leaf.rels,
            key: sub_graph.key.clone(),
            predicates: sub_graph.predicates.clone(),
            order: sub_graph.order,
            leaf_path: leaf.leaf_path,
            content: leaf.content,
        })
        .collect())
}

// ============================================================================
// Record identifiers
// ============================================================================

/// The record identifier of `root`: the first literal at the end of `path`.
pub async fn record_identifier<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    root: NodeId,
    path: &AttributePath,
) -> Result<Option<String>> {
    for found in backend.follow(tx, &[root], &path.uris()).await? {
        if found.is_empty() {
            continue;
        }
        if let Some(value) = found.end().literal_value() {
            return Ok(Some(value.to_owned()));
        }
    }
    Ok(None)
}

/// The resource whose record identifier at `path` is `identifier`.
///
/// Starts from the literals carrying the identifier and walks the path
/// backwards. With a scope, only resources of that data model count.
pub async fn resource_by_record_identifier<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    identifier: &str,
    path: &AttributePath,
    scope: Option<&str>,
) -> Result<Option<Node>> {
    if path.is_empty() {
        return Ok(None);
    }

    let mut current: Vec<NodeId> = backend.lookup_nodes(tx, IndexName::Values, identifier).await?;
    for attribute in path.attributes().iter().rev() {
        let mut previous = Vec::new();
        for node in &current {
            for rel in backend.get_relationships(tx, *node, Direction::Incoming, Some(attribute.uri())).await? {
                if !previous.contains(&rel.src) {
                    previous.push(rel.src);
                }
            }
        }
        current = previous;
        if current.is_empty() {
            return Ok(None);
        }
    }

    for id in current {
        let Some(node) = backend.get_node(tx, id).await? else {
            continue;
        };
        if node.node_type() != Some(NodeType::Resource) {
            continue;
        }
        if let Some(scope) = scope {
            if node.get_str(keys::DATA_MODEL) != Some(scope) {
                continue;
            }
        }
        return Ok(Some(node));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gdm::{GdmNode, Model, Resource, Statement};
    use crate::ingest::{ingest, IngestConfig};
    use crate::storage::MemoryBackend;
    use crate::tx::TxMode;
    use pretty_assertions::assert_eq;

    const R1: &str = "http://example.org/r1";
    const FIELD: &str = "http://example.org/field";
    const NR: &str = "http://example.org/nr";
    const VALUE: &str = "http://example.org/value";
    const TITLE: &str = "http://purl.org/dc/terms/title";
    const ID: &str = "http://example.org/id";

    fn field(resource: &mut Resource, bnode: u64, nr: &str, values: &[&str]) {
        resource.add_statement(Statement::new(GdmNode::resource(R1), FIELD, GdmNode::bnode(bnode)));
        resource.add_statement(Statement::new(GdmNode::bnode(bnode), NR, GdmNode::literal(nr)));
        for (i, value) in values.iter().enumerate() {
            resource.add_statement(
                Statement::new(GdmNode::bnode(bnode), VALUE, GdmNode::literal(*value)).with_order(i as i64 + 1),
            );
        }
    }

    fn schema() -> ContentSchema {
        ContentSchema::new(
            vec![AttributePath::from_uris([FIELD, NR])],
            AttributePath::from_uris([FIELD, VALUE]),
        )
    }

    #[tokio::test]
    async fn test_entities_with_keys_values_and_order() {
        let mut resource = Resource::new(R1);
        field(&mut resource, 1, "245", &["a", "b"]);
        field(&mut resource, 2, "100", &["x"]);
        field(&mut resource, 3, "245", &["c"]);
        let g = ComparisonGraph::from_resource(&resource).await.unwrap();

        let entities = cs_entities(&g, &schema()).await.unwrap();
        assert_eq!(entities.len(), 3);

        let summary: Vec<(String, i64, Vec<&str>)> = entities
            .iter()
            .map(|e| (e.key(), e.entity_order, e.values.iter().map(|v| v.value.as_str()).collect()))
            .collect();
        assert_eq!(summary, vec![
            ("245".to_string(), 1, vec!["a", "b"]),
            ("100".to_string(), 1, vec!["x"]),
            ("245".to_string(), 2, vec!["c"]),
        ]);

        let second = &entities[0].values[1];
        assert_eq!(second.order, Some(2));
        assert_eq!(second.key, "245");
        assert_eq!(second.path.len(), 2);
        assert_eq!(second.path[0], entities[0].path[0]);
    }

    #[tokio::test]
    async fn test_equal_subtrees_have_equal_content() {
        let mut resource = Resource::new(R1);
        field(&mut resource, 1, "245", &["a"]);
        field(&mut resource, 2, "245", &["a"]);
        field(&mut resource, 3, "245", &["b"]);
        let g = ComparisonGraph::from_resource(&resource).await.unwrap();

        let entities = cs_entities(&g, &schema()).await.unwrap();
        assert_eq!(entities[0].content, entities[1].content);
        assert_ne!(entities[0].content, entities[2].content);
    }

    #[tokio::test]
    async fn test_entity_without_values() {
        let mut resource = Resource::new(R1);
        field(&mut resource, 1, "245", &[]);
        let g = ComparisonGraph::from_resource(&resource).await.unwrap();

        let entities = cs_entities(&g, &schema()).await.unwrap();
        assert_eq!(entities.len(), 1);
        assert!(entities[0].values.is_empty());
        assert_eq!(entities[0].key(), "245");
        assert_eq!(entities[0].entity_order, 1);
    }

    #[tokio::test]
    async fn test_flat_values_skip_structure() {
        let mut resource = Resource::new(R1);
        resource.add_statement(Statement::new(GdmNode::resource(R1), TITLE, GdmNode::literal("Title A")));
        field(&mut resource, 1, "245", &["a"]);
        let g = ComparisonGraph::from_resource(&resource).await.unwrap();

        let values = flat_values(&g).await.unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].predicate, TITLE);
        assert_eq!(values[0].value, "Title A");
    }

    #[tokio::test]
    async fn test_sub_graphs_and_leaves() {
        let mut resource = Resource::new(R1);
        field(&mut resource, 1, "245", &["a", "b"]);
        let g = ComparisonGraph::from_resource(&resource).await.unwrap();

        let subs = sub_graph_entities(&g, &[Anchor::record(g.root().id)], &HashSet::new()).await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].predicates, FIELD);

        let leaves = leaf_entities(&g, &subs[0]).await.unwrap();
        let mut paths: Vec<String> = leaves.iter().map(|l| format!("{}={}", l.leaf_path, l.content)).collect();
        paths.sort();
        assert_eq!(paths, vec![
            format!("{FIELD}#/{NR}#=L:245"),
            format!("{FIELD}#/{VALUE}#1=L:a"),
            format!("{FIELD}#/{VALUE}#2=L:b"),
        ]);
        assert!(leaves.iter().all(|l| l.path.len() == 2));
    }

    #[tokio::test]
    async fn test_record_identifier_both_ways() {
        let backend = MemoryBackend::new();
        let mut model = Model::new();
        let mut resource = Resource::new(R1);
        resource.add_statement(Statement::new(GdmNode::resource(R1), ID, GdmNode::literal("rec-1")));
        model.add_resource(resource);
        ingest(&backend, &model, IngestConfig::default()).await.unwrap();

        let tx = backend.begin_tx(TxMode::ReadOnly).await.unwrap();
        let path = AttributePath::from_uris([ID]);
        let root = backend.lookup_node(&tx, IndexName::Resources, R1).await.unwrap().unwrap();

        assert_eq!(record_identifier(&backend, &tx, root, &path).await.unwrap().as_deref(), Some("rec-1"));
        let found = resource_by_record_identifier(&backend, &tx, "rec-1", &path, None).await.unwrap();
        assert_eq!(found.map(|n| n.id), Some(root));
        assert!(resource_by_record_identifier(&backend, &tx, "rec-2", &path, None).await.unwrap().is_none());
        assert!(resource_by_record_identifier(&backend, &tx, "rec-1", &path, Some("http://example.org/dm"))
            .await
            .unwrap()
            .is_none());
    }
}
