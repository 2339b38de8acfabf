//! # Storage Backend Trait
//!
//! The contract between the GDM layers (ingestion, reading, delta) and a
//! property graph store. Everything above this module talks to the graph
//! only through `StorageBackend`.
//!
//! ## Implementations
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryBackend` | `memory` | Arena-backed, in-memory. Permanent store for tests and embedding, and the private graph of each delta comparison |

pub mod memory;

use std::collections::HashSet;

use async_trait::async_trait;
use crate::model::*;
use crate::tx::{Transaction, TxMode};
use crate::index::IndexName;
use crate::{Error, Result};

pub use memory::MemoryBackend;

// ============================================================================
// StorageBackend Trait
// ============================================================================

/// The graph-store collaborator.
///
/// Relationship listings are in insertion order. Ingestion relies on it for
/// statement order and the delta engine for stable pairing of equal hashes.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// The transaction type for this backend.
    type Tx: Transaction;

    // ========================================================================
    // Transactions
    // ========================================================================

    async fn begin_tx(&self, mode: TxMode) -> Result<Self::Tx>;

    async fn commit_tx(&self, tx: Self::Tx) -> Result<()>;

    async fn rollback_tx(&self, tx: Self::Tx) -> Result<()>;

    // ========================================================================
    // Node CRUD
    // ========================================================================

    /// Create a node with the given labels and properties.
    async fn create_node(
        &self,
        tx: &mut Self::Tx,
        labels: &[&str],
        props: PropertyMap,
    ) -> Result<NodeId>;

    /// Get a node by ID. Returns None if not found.
    async fn get_node(&self, tx: &Self::Tx, id: NodeId) -> Result<Option<Node>>;

    /// Set a property on a node (upsert).
    async fn set_node_property(
        &self,
        tx: &mut Self::Tx,
        id: NodeId,
        key: &str,
        val: Value,
    ) -> Result<()>;

    /// Add a label to a node. Returns false if the node already had it.
    async fn add_label(&self, tx: &mut Self::Tx, id: NodeId, label: &str) -> Result<bool>;

    // ========================================================================
    // Relationship CRUD
    // ========================================================================

    /// Create a relationship between two nodes.
    async fn create_relationship(
        &self,
        tx: &mut Self::Tx,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<RelId>;

    async fn get_relationship(&self, tx: &Self::Tx, id: RelId) -> Result<Option<Relationship>>;

    /// Set a property on a relationship (upsert).
    async fn set_relationship_property(
        &self,
        tx: &mut Self::Tx,
        id: RelId,
        key: &str,
        val: Value,
    ) -> Result<()>;

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Get all relationships of a node, optionally filtered by direction and type.
    async fn get_relationships(
        &self,
        tx: &Self::Tx,
        node: NodeId,
        dir: Direction,
        rel_type: Option<&str>,
    ) -> Result<Vec<Relationship>>;

    /// Follow an attribute sequence outward from each start node.
    ///
    /// Only outgoing edges whose type equals the attribute at the current
    /// depth are accepted. Returns the paths of exactly `attributes.len()`
    /// edges, grouped by start node in the given order, siblings in
    /// insertion order. An empty sequence yields the start nodes themselves.
    async fn follow(
        &self,
        tx: &Self::Tx,
        starts: &[NodeId],
        attributes: &[&str],
    ) -> Result<Vec<Path>> {
        let mut results = Vec::new();
        let mut seen = HashSet::new();

        for &start in starts {
            if !seen.insert(start) {
                continue;
            }
            let start_node = self.get_node(tx, start).await?
                .ok_or_else(|| Error::NotFound(format!("Node {start}")))?;

            let mut frontier = vec![Path::single(start_node)];
            for &attribute in attributes {
                let mut next = Vec::new();
                for path in &frontier {
                    let tip = path.end().id;
                    let rels = self
                        .get_relationships(tx, tip, Direction::Outgoing, Some(attribute))
                        .await?;
                    for rel in rels {
                        if path.nodes.iter().any(|n| n.id == rel.dst) {
                            continue;
                        }
                        if let Some(node) = self.get_node(tx, rel.dst).await? {
                            let mut extended = path.clone();
                            extended.append(rel, node);
                            next.push(extended);
                        }
                    }
                }
                frontier = next;
                if frontier.is_empty() { break; }
            }
            results.extend(frontier);
        }

        Ok(results)
    }

    // ========================================================================
    // Index
    // ========================================================================

    /// Add a node under `key` in a node index.
    async fn index_node(
        &self,
        tx: &mut Self::Tx,
        index: IndexName,
        key: &str,
        node: NodeId,
    ) -> Result<()>;

    /// All nodes indexed under `key`, oldest first.
    async fn lookup_nodes(&self, tx: &Self::Tx, index: IndexName, key: &str) -> Result<Vec<NodeId>>;

    /// First node indexed under `key`.
    async fn lookup_node(&self, tx: &Self::Tx, index: IndexName, key: &str) -> Result<Option<NodeId>> {
        Ok(self.lookup_nodes(tx, index, key).await?.into_iter().next())
    }

    /// Put a relationship under `key`, replacing any previous entry.
    async fn index_relationship(
        &self,
        tx: &mut Self::Tx,
        index: IndexName,
        key: &str,
        rel: RelId,
    ) -> Result<()>;

    async fn lookup_relationship(
        &self,
        tx: &Self::Tx,
        index: IndexName,
        key: &str,
    ) -> Result<Option<RelId>>;

    // ========================================================================
    // Schema introspection
    // ========================================================================

    /// Total number of nodes.
    async fn node_count(&self, tx: &Self::Tx) -> Result<u64>;

    /// Total number of relationships.
    async fn relationship_count(&self, tx: &Self::Tx) -> Result<u64>;

    // ========================================================================
    // Scan
    // ========================================================================

    /// Find all nodes with a given label.
    async fn nodes_by_label(&self, tx: &Self::Tx, label: &str) -> Result<Vec<Node>>;
}
