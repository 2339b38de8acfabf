//! Semantic delta between two versions of a record.
//!
//! Both versions are loaded into private comparison graphs. Entities are
//! extracted from each and paired by a sequence of hash matchers, most
//! specific first:
//!
//! 1. whole content-schema entities
//! 2. entity values
//! 3. entity value slots (modifications)
//! 4. record-level values
//! 5. record-level value slots (modifications)
//! 6. remaining sub-graphs, then their leaves, then leaf slots
//!
//! Each verdict is marked on the graphs as a [`DeltaState`]; a segment
//! keeps its first state. The [`Changeset`] is read off the marked graphs.

pub mod attribute_path;
pub mod changeset;
pub mod entity;
pub mod extract;
mod graph;
mod mark;
pub mod matching;

pub use attribute_path::{relative_attribute_path, Attribute, AttributePath, ContentSchema};
pub use changeset::Changeset;
pub use entity::{CsEntity, KeyEntity, SubGraphEntity, SubGraphLeafEntity, ValueEntity};
pub use graph::ComparisonGraph;
pub use mark::DeltaState;
pub use matching::{Matcher, Side};

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::debug;

use crate::gdm::Resource;
use crate::model::NodeId;
use crate::storage::StorageBackend;
use crate::Result;

use extract::{cs_entities, flat_values, leaf_entities, sub_graph_entities, Anchor};
use matching::hashes;

/// Compare two versions of a record.
///
/// Without a content schema only record-level values and sub-graphs are
/// compared. A schema that lacks key or value paths is rejected before any
/// work is done.
pub async fn compute_delta(
    existing: &Resource,
    new: &Resource,
    schema: Option<&ContentSchema>,
) -> Result<Changeset> {
    if let Some(schema) = schema {
        schema.validate()?;
    }

    let mut existing_graph = ComparisonGraph::from_resource(existing).await?;
    let mut new_graph = ComparisonGraph::from_resource(new).await?;

    let changeset = compute_delta_with(&mut existing_graph, &mut new_graph, schema).await?;

    existing_graph.close().await?;
    new_graph.close().await?;
    Ok(changeset)
}

/// Run the matcher pipeline on two loaded comparison graphs.
pub async fn compute_delta_with<B: StorageBackend>(
    existing: &mut ComparisonGraph<B>,
    new: &mut ComparisonGraph<B>,
    schema: Option<&ContentSchema>,
) -> Result<Changeset> {
    let mut modified: IndexMap<NodeId, NodeId> = IndexMap::new();
    let pending = match schema {
        Some(schema) => match_cs_entities(existing, new, schema, &mut modified).await?,
        None => Pending::default(),
    };
    match_flat_values(existing, new, &mut modified).await?;
    match_sub_graphs(existing, new, pending, &mut modified).await?;

    let resolved_existing = existing.resolve_ancestors().await?;
    let resolved_new = new.resolve_ancestors().await?;
    debug!(existing = resolved_existing, new = resolved_new, "resolved ancestor edges");

    Changeset::assemble(existing, new, modified).await
}

/// Content-schema entities left for the sub-graph stage.
#[derive(Debug, Default)]
struct Pending {
    existing: Vec<Anchor>,
    new: Vec<Anchor>,
    existing_entities: HashSet<NodeId>,
    new_entities: HashSet<NodeId>,
}

async fn match_cs_entities<B: StorageBackend>(
    existing: &mut ComparisonGraph<B>,
    new: &mut ComparisonGraph<B>,
    schema: &ContentSchema,
    modified: &mut IndexMap<NodeId, NodeId>,
) -> Result<Pending> {
    let existing_entities = cs_entities(existing, schema).await?;
    let new_entities = cs_entities(new, schema).await?;

    let mut pending = Pending {
        existing_entities: existing_entities.iter().map(|e| e.node_id).collect(),
        new_entities: new_entities.iter().map(|e| e.node_id).collect(),
        ..Default::default()
    };

    let entities = Matcher::exact(existing_entities, new_entities, hashes::cs_entity);
    for (e, n) in entities.pairs() {
        existing.mark_path(&e.path, DeltaState::ExactMatch).await?;
        existing.mark_subtree(e.node_id, DeltaState::ExactMatch).await?;
        new.mark_path(&n.path, DeltaState::ExactMatch).await?;
        new.mark_subtree(n.node_id, DeltaState::ExactMatch).await?;
    }
    debug!(matched = entities.matches().len(), "content-schema entities");

    let unresolved_existing = entities.remainder(Side::Existing);
    let unresolved_new = entities.remainder(Side::New);
    pending.existing = unresolved_existing.iter().map(Anchor::entity).collect();
    pending.new = unresolved_new.iter().map(Anchor::entity).collect();

    let values = Matcher::exact(
        unresolved_existing.into_iter().flat_map(|e| e.values).collect(),
        unresolved_new.into_iter().flat_map(|e| e.values).collect(),
        hashes::cs_value,
    );
    for (e, n) in values.pairs() {
        existing.mark_path(&e.path, DeltaState::ExactMatch).await?;
        new.mark_path(&n.path, DeltaState::ExactMatch).await?;
    }
    debug!(matched = values.matches().len(), "content-schema values");

    let slots = Matcher::modification(
        values.remainder(Side::Existing),
        values.remainder(Side::New),
        hashes::cs_value_slot,
        hashes::value_content,
    );
    settle_values(existing, new, &slots, modified).await?;
    debug!(modified = slots.modifications().len(), "content-schema value slots");

    Ok(pending)
}

async fn match_flat_values<B: StorageBackend>(
    existing: &mut ComparisonGraph<B>,
    new: &mut ComparisonGraph<B>,
    modified: &mut IndexMap<NodeId, NodeId>,
) -> Result<()> {
    let values = Matcher::exact(flat_values(existing).await?, flat_values(new).await?, hashes::flat_value);
    for (e, n) in values.pairs() {
        existing.mark_path(&e.path, DeltaState::ExactMatch).await?;
        new.mark_path(&n.path, DeltaState::ExactMatch).await?;
    }
    debug!(matched = values.matches().len(), "record values");

    let slots = Matcher::modification(
        values.remainder(Side::Existing),
        values.remainder(Side::New),
        hashes::flat_value_slot,
        hashes::value_content,
    );
    settle_values(existing, new, &slots, modified).await?;
    debug!(modified = slots.modifications().len(), "record value slots");
    Ok(())
}

/// Mark the outcome of a value modification matcher.
async fn settle_values<B: StorageBackend>(
    existing: &mut ComparisonGraph<B>,
    new: &mut ComparisonGraph<B>,
    slots: &Matcher<ValueEntity>,
    modified: &mut IndexMap<NodeId, NodeId>,
) -> Result<()> {
    for (e, n) in slots.modifications() {
        existing.mark_path(&e.path, DeltaState::Modification).await?;
        new.mark_path(&n.path, DeltaState::Modification).await?;
        modified.insert(e.node_id, n.node_id);
    }
    for (e, n) in slots.unchanged() {
        existing.mark_path(&e.path, DeltaState::ExactMatch).await?;
        new.mark_path(&n.path, DeltaState::ExactMatch).await?;
    }
    for e in slots.non_matched(Side::Existing) {
        existing.mark_path(&e.path, DeltaState::Deletion).await?;
    }
    for n in slots.non_matched(Side::New) {
        new.mark_path(&n.path, DeltaState::Addition).await?;
    }
    Ok(())
}

async fn match_sub_graphs<B: StorageBackend>(
    existing: &mut ComparisonGraph<B>,
    new: &mut ComparisonGraph<B>,
    mut pending: Pending,
    modified: &mut IndexMap<NodeId, NodeId>,
) -> Result<()> {
    // a record that is its own entity is covered by the entity anchor
    if !pending.existing_entities.contains(&existing.root().id) {
        pending.existing.push(Anchor::record(existing.root().id));
    }
    if !pending.new_entities.contains(&new.root().id) {
        pending.new.push(Anchor::record(new.root().id));
    }

    let sub_graphs = Matcher::exact(
        sub_graph_entities(existing, &pending.existing, &pending.existing_entities).await?,
        sub_graph_entities(new, &pending.new, &pending.new_entities).await?,
        hashes::sub_graph,
    );
    for (e, n) in sub_graphs.pairs() {
        existing.mark_path(&e.path, DeltaState::ExactMatch).await?;
        existing.mark_subtree(e.node_id, DeltaState::ExactMatch).await?;
        new.mark_path(&n.path, DeltaState::ExactMatch).await?;
        new.mark_subtree(n.node_id, DeltaState::ExactMatch).await?;
    }
    debug!(matched = sub_graphs.matches().len(), "sub-graphs");

    let mut existing_leaves = Vec::new();
    for sub_graph in sub_graphs.non_matched(Side::Existing) {
        existing_leaves.extend(leaf_entities(existing, sub_graph).await?);
    }
    let mut new_leaves = Vec::new();
    for sub_graph in sub_graphs.non_matched(Side::New) {
        new_leaves.extend(leaf_entities(new, sub_graph).await?);
    }

    let leaves = Matcher::exact(existing_leaves, new_leaves, hashes::sub_graph_leaf);
    for (e, n) in leaves.pairs() {
        existing.mark_path(&e.path, DeltaState::ExactMatch).await?;
        new.mark_path(&n.path, DeltaState::ExactMatch).await?;
    }

    let slots = Matcher::modification(
        leaves.remainder(Side::Existing),
        leaves.remainder(Side::New),
        hashes::sub_graph_leaf_slot,
        hashes::leaf_content,
    );
    for (e, n) in slots.modifications() {
        existing.mark_path(&e.path, DeltaState::Modification).await?;
        new.mark_path(&n.path, DeltaState::Modification).await?;
        modified.insert(e.node_id, n.node_id);
    }
    for (e, n) in slots.unchanged() {
        existing.mark_path(&e.path, DeltaState::ExactMatch).await?;
        new.mark_path(&n.path, DeltaState::ExactMatch).await?;
    }
    for e in slots.non_matched(Side::Existing) {
        existing.mark_path(&e.path, DeltaState::Deletion).await?;
    }
    for n in slots.non_matched(Side::New) {
        new.mark_path(&n.path, DeltaState::Addition).await?;
    }
    debug!(
        matched = leaves.matches().len(),
        modified = slots.modifications().len(),
        "sub-graph leaves"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gdm::{GdmNode, Statement};
    use crate::Error;
    use pretty_assertions::assert_eq;

    const R1: &str = "http://example.org/r1";
    const TITLE: &str = "http://purl.org/dc/terms/title";
    const CREATOR: &str = "http://purl.org/dc/terms/creator";
    const NAME: &str = "http://xmlns.com/foaf/0.1/name";
    const MBOX: &str = "http://xmlns.com/foaf/0.1/mbox";

    fn titled(title: &str) -> Resource {
        let mut resource = Resource::new(R1);
        resource.add_statement(Statement::new(GdmNode::resource(R1), TITLE, GdmNode::literal(title)));
        resource
    }

    #[tokio::test]
    async fn test_flat_modification() {
        let changeset = compute_delta(&titled("Title A"), &titled("Title B"), None).await.unwrap();
        assert!(changeset.added.is_empty());
        assert!(changeset.removed.is_empty());
        assert_eq!(changeset.modified.len(), 1);

        let (old, new) = changeset.modified.first().map(|(a, b)| (*a, *b)).unwrap();
        assert_eq!(changeset.existing_modified[&old].object, GdmNode::literal("Title A"));
        assert_eq!(changeset.new_modified[&new].object, GdmNode::literal("Title B"));
    }

    #[tokio::test]
    async fn test_flat_addition_and_removal() {
        let mut existing = titled("Title A");
        existing.add_statement(Statement::new(GdmNode::resource(R1), MBOX, GdmNode::resource("mailto:a@example.org")));
        let mut new = titled("Title A");
        new.add_statement(Statement::new(GdmNode::resource(R1), NAME, GdmNode::literal("Ada")));

        let changeset = compute_delta(&existing, &new, None).await.unwrap();
        assert!(changeset.modified.is_empty());
        assert_eq!(changeset.removed.values().map(|s| s.predicate.uri.as_str()).collect::<Vec<_>>(), vec![MBOX]);
        assert_eq!(changeset.added.values().map(|s| s.predicate.uri.as_str()).collect::<Vec<_>>(), vec![NAME]);
    }

    #[tokio::test]
    async fn test_nested_leaf_modification_without_schema() {
        let creator = |name: &str| {
            let mut resource = titled("Title A");
            resource.add_statement(Statement::new(GdmNode::resource(R1), CREATOR, GdmNode::bnode(1)));
            resource.add_statement(Statement::new(GdmNode::bnode(1), NAME, GdmNode::literal(name)));
            resource
        };

        let changeset = compute_delta(&creator("Ada"), &creator("Grace"), None).await.unwrap();
        assert!(changeset.added.is_empty());
        assert!(changeset.removed.is_empty());
        assert_eq!(changeset.modified.len(), 1);
        // the creator edge above the changed name is modified as well
        assert_eq!(changeset.existing_modified.len(), 2);
        assert_eq!(changeset.new_modified.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_schema_fails_fast() {
        let schema = ContentSchema::default();
        let result = compute_delta(&titled("Title A"), &titled("Title A"), Some(&schema)).await;
        assert!(matches!(result, Err(Error::ConfigurationError(_))));
    }
}
