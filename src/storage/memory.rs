//! In-memory storage backend.
//!
//! The reference implementation of `StorageBackend`. Nodes and
//! relationships live in id-keyed arenas behind `RwLock`s; statements refer
//! to nodes only by `NodeId`, so one blank node can be shared by any number
//! of edges.
//!
//! ## Limitations
//!
//! - **No real transactions**: `commit_tx()` and `rollback_tx()` do not
//!   journal. Writes are applied immediately. Rollback does NOT undo mutations.
//!   Commits are counted so batch commit behaviour stays observable.
//! - **Single-writer only**: Per-collection locks mean multi-step mutations
//!   are NOT atomic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use hashbrown::HashMap;
use parking_lot::RwLock;
use async_trait::async_trait;

use crate::model::*;
use crate::tx::{Transaction, TxMode, TxId};
use crate::index::IndexName;
use crate::{Error, Result};
use super::StorageBackend;

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-memory property graph storage.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    nodes: RwLock<HashMap<NodeId, Node>>,
    relationships: RwLock<HashMap<RelId, Relationship>>,
    /// node_id → relationship IDs, insertion order
    adjacency: RwLock<HashMap<NodeId, Vec<RelId>>>,
    label_index: RwLock<HashMap<String, Vec<NodeId>>>,
    node_indexes: RwLock<HashMap<(IndexName, String), Vec<NodeId>>>,
    rel_indexes: RwLock<HashMap<(IndexName, String), RelId>>,
    next_node_id: AtomicU64,
    next_rel_id: AtomicU64,
    next_tx_id: AtomicU64,
    commits: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                nodes: RwLock::new(HashMap::new()),
                relationships: RwLock::new(HashMap::new()),
                adjacency: RwLock::new(HashMap::new()),
                label_index: RwLock::new(HashMap::new()),
                node_indexes: RwLock::new(HashMap::new()),
                rel_indexes: RwLock::new(HashMap::new()),
                next_node_id: AtomicU64::new(1),
                next_rel_id: AtomicU64::new(1),
                next_tx_id: AtomicU64::new(1),
                commits: AtomicU64::new(0),
            }),
        }
    }

    /// Number of transactions committed so far.
    pub fn commit_count(&self) -> u64 {
        self.inner.commits.load(Ordering::Relaxed)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MemoryTx
// ============================================================================

/// In-memory transaction (a marker, no MVCC).
pub struct MemoryTx {
    id: TxId,
    mode: TxMode,
}

impl Transaction for MemoryTx {
    fn mode(&self) -> TxMode { self.mode }
    fn id(&self) -> TxId { self.id }
}

fn ensure_writable(tx: &MemoryTx) -> Result<()> {
    if tx.is_writable() {
        Ok(())
    } else {
        Err(Error::TxError(format!("{} is read-only", tx.id)))
    }
}

// ============================================================================
// StorageBackend impl
// ============================================================================

#[async_trait]
impl StorageBackend for MemoryBackend {
    type Tx = MemoryTx;

    async fn begin_tx(&self, mode: TxMode) -> Result<MemoryTx> {
        let id = TxId(self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed));
        Ok(MemoryTx { id, mode })
    }

    async fn commit_tx(&self, _tx: MemoryTx) -> Result<()> {
        self.inner.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// WARNING: Mutations applied during this transaction are NOT reverted.
    async fn rollback_tx(&self, _tx: MemoryTx) -> Result<()> { Ok(()) }

    // ========================================================================
    // Node CRUD
    // ========================================================================

    async fn create_node(
        &self,
        tx: &mut MemoryTx,
        labels: &[&str],
        props: PropertyMap,
    ) -> Result<NodeId> {
        ensure_writable(tx)?;
        let id = NodeId(self.inner.next_node_id.fetch_add(1, Ordering::Relaxed));
        let node = Node {
            id,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            properties: props,
        };

        {
            let mut idx = self.inner.label_index.write();
            for label in &node.labels {
                idx.entry(label.clone()).or_default().push(id);
            }
        }

        self.inner.nodes.write().insert(id, node);
        self.inner.adjacency.write().insert(id, Vec::new());

        Ok(id)
    }

    async fn get_node(&self, _tx: &MemoryTx, id: NodeId) -> Result<Option<Node>> {
        Ok(self.inner.nodes.read().get(&id).cloned())
    }

    async fn set_node_property(
        &self,
        tx: &mut MemoryTx,
        id: NodeId,
        key: &str,
        val: Value,
    ) -> Result<()> {
        ensure_writable(tx)?;
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        node.properties.insert(key.to_string(), val);
        Ok(())
    }

    async fn add_label(&self, tx: &mut MemoryTx, id: NodeId, label: &str) -> Result<bool> {
        ensure_writable(tx)?;
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        if node.has_label(label) {
            return Ok(false);
        }
        node.labels.push(label.to_string());
        drop(nodes);
        self.inner.label_index.write().entry(label.to_string()).or_default().push(id);
        Ok(true)
    }

    // ========================================================================
    // Relationship CRUD
    // ========================================================================

    async fn create_relationship(
        &self,
        tx: &mut MemoryTx,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<RelId> {
        ensure_writable(tx)?;
        {
            let nodes = self.inner.nodes.read();
            if !nodes.contains_key(&src) {
                return Err(Error::NotFound(format!("Source node {src}")));
            }
            if !nodes.contains_key(&dst) {
                return Err(Error::NotFound(format!("Target node {dst}")));
            }
        }

        let id = RelId(self.inner.next_rel_id.fetch_add(1, Ordering::Relaxed));
        let rel = Relationship {
            id,
            src,
            dst,
            rel_type: rel_type.to_string(),
            properties: props,
        };

        self.inner.relationships.write().insert(id, rel);

        let mut adj = self.inner.adjacency.write();
        adj.entry(src).or_default().push(id);
        if src != dst {
            adj.entry(dst).or_default().push(id);
        }

        Ok(id)
    }

    async fn get_relationship(&self, _tx: &MemoryTx, id: RelId) -> Result<Option<Relationship>> {
        Ok(self.inner.relationships.read().get(&id).cloned())
    }

    async fn set_relationship_property(
        &self,
        tx: &mut MemoryTx,
        id: RelId,
        key: &str,
        val: Value,
    ) -> Result<()> {
        ensure_writable(tx)?;
        let mut rels = self.inner.relationships.write();
        let rel = rels.get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Relationship {id}")))?;
        rel.properties.insert(key.to_string(), val);
        Ok(())
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    async fn get_relationships(
        &self,
        _tx: &MemoryTx,
        node: NodeId,
        dir: Direction,
        rel_type: Option<&str>,
    ) -> Result<Vec<Relationship>> {
        let adj = self.inner.adjacency.read();
        let rels = self.inner.relationships.read();

        let Some(rel_ids) = adj.get(&node) else {
            return Ok(Vec::new());
        };

        Ok(rel_ids
            .iter()
            .filter_map(|rid| rels.get(rid))
            .filter(|rel| match dir {
                Direction::Outgoing => rel.src == node,
                Direction::Incoming => rel.dst == node,
                Direction::Both => true,
            })
            .filter(|rel| rel_type.is_none_or(|t| rel.rel_type == t))
            .cloned()
            .collect())
    }

    // ========================================================================
    // Index
    // ========================================================================

    async fn index_node(
        &self,
        tx: &mut MemoryTx,
        index: IndexName,
        key: &str,
        node: NodeId,
    ) -> Result<()> {
        ensure_writable(tx)?;
        let mut idx = self.inner.node_indexes.write();
        let ids = idx.entry((index, key.to_string())).or_default();
        if !ids.contains(&node) {
            ids.push(node);
        }
        Ok(())
    }

    async fn lookup_nodes(&self, _tx: &MemoryTx, index: IndexName, key: &str) -> Result<Vec<NodeId>> {
        Ok(self.inner.node_indexes.read()
            .get(&(index, key.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn index_relationship(
        &self,
        tx: &mut MemoryTx,
        index: IndexName,
        key: &str,
        rel: RelId,
    ) -> Result<()> {
        ensure_writable(tx)?;
        self.inner.rel_indexes.write().insert((index, key.to_string()), rel);
        Ok(())
    }

    async fn lookup_relationship(
        &self,
        _tx: &MemoryTx,
        index: IndexName,
        key: &str,
    ) -> Result<Option<RelId>> {
        Ok(self.inner.rel_indexes.read().get(&(index, key.to_string())).copied())
    }

    // ========================================================================
    // Schema introspection
    // ========================================================================

    async fn node_count(&self, _tx: &MemoryTx) -> Result<u64> {
        Ok(self.inner.nodes.read().len() as u64)
    }

    async fn relationship_count(&self, _tx: &MemoryTx) -> Result<u64> {
        Ok(self.inner.relationships.read().len() as u64)
    }

    // ========================================================================
    // Scan
    // ========================================================================

    async fn nodes_by_label(&self, _tx: &MemoryTx, label: &str) -> Result<Vec<Node>> {
        let idx = self.inner.label_index.read();
        let nodes = self.inner.nodes.read();

        let Some(ids) = idx.get(label) else {
            return Ok(Vec::new());
        };
        Ok(ids.iter().filter_map(|id| nodes.get(id).cloned()).collect())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get_node() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();

        let mut props = PropertyMap::new();
        props.insert(keys::URI.into(), Value::from("http://example.org/r1"));

        let id = db.create_node(&mut tx, &[], props).await.unwrap();
        let node = db.get_node(&tx, id).await.unwrap().unwrap();

        assert!(node.labels.is_empty());
        assert_eq!(node.uri(), Some("http://example.org/r1"));
    }

    #[tokio::test]
    async fn test_read_only_tx_rejects_writes() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();

        let result = db.create_node(&mut tx, &[], PropertyMap::new()).await;
        assert!(matches!(result, Err(Error::TxError(_))));
    }

    #[tokio::test]
    async fn test_add_label_reports_novelty() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();

        let a = db.create_node(&mut tx, &[], PropertyMap::new()).await.unwrap();
        assert!(db.add_label(&mut tx, a, "bibo:Document").await.unwrap());
        assert!(!db.add_label(&mut tx, a, "bibo:Document").await.unwrap());
        assert_eq!(db.nodes_by_label(&tx, "bibo:Document").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_relationships_keep_insertion_order() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();

        let a = db.create_node(&mut tx, &[], PropertyMap::new()).await.unwrap();
        let mut targets = Vec::new();
        for _ in 0..5 {
            let b = db.create_node(&mut tx, &[], PropertyMap::new()).await.unwrap();
            db.create_relationship(&mut tx, a, b, "p", PropertyMap::new()).await.unwrap();
            targets.push(b);
        }

        let rels = db.get_relationships(&tx, a, Direction::Outgoing, Some("p")).await.unwrap();
        let dsts: Vec<NodeId> = rels.iter().map(|r| r.dst).collect();
        assert_eq!(dsts, targets);
    }

    #[tokio::test]
    async fn test_relationship_properties() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();

        let a = db.create_node(&mut tx, &[], PropertyMap::new()).await.unwrap();
        let b = db.create_node(&mut tx, &[], PropertyMap::new()).await.unwrap();
        let rel_id = db.create_relationship(&mut tx, a, b, "p", PropertyMap::new()).await.unwrap();

        db.set_relationship_property(&mut tx, rel_id, keys::ORDER, Value::from(2i64)).await.unwrap();
        let rel = db.get_relationship(&tx, rel_id).await.unwrap().unwrap();
        assert_eq!(rel.order(), Some(2));
    }

    #[tokio::test]
    async fn test_indexes() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();

        let a = db.create_node(&mut tx, &[], PropertyMap::new()).await.unwrap();
        let b = db.create_node(&mut tx, &[], PropertyMap::new()).await.unwrap();
        let rel = db.create_relationship(&mut tx, a, b, "p", PropertyMap::new()).await.unwrap();

        db.index_node(&mut tx, IndexName::Values, "x", a).await.unwrap();
        db.index_node(&mut tx, IndexName::Values, "x", b).await.unwrap();
        db.index_node(&mut tx, IndexName::Values, "x", a).await.unwrap();
        db.index_relationship(&mut tx, IndexName::StatementHashes, "h", rel).await.unwrap();

        assert_eq!(db.lookup_nodes(&tx, IndexName::Values, "x").await.unwrap(), vec![a, b]);
        assert_eq!(db.lookup_node(&tx, IndexName::Resources, "x").await.unwrap(), None);
        assert_eq!(
            db.lookup_relationship(&tx, IndexName::StatementHashes, "h").await.unwrap(),
            Some(rel)
        );
    }

    #[tokio::test]
    async fn test_commit_count() {
        let db = MemoryBackend::new();
        for _ in 0..3 {
            let tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
            db.commit_tx(tx).await.unwrap();
        }
        let tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        db.rollback_tx(tx).await.unwrap();
        assert_eq!(db.commit_count(), 3);
    }

    #[tokio::test]
    async fn test_traversal() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();

        let a = db.create_node(&mut tx, &[], PropertyMap::new()).await.unwrap();
        let b = db.create_node(&mut tx, &[], PropertyMap::new()).await.unwrap();
        let c = db.create_node(&mut tx, &[], PropertyMap::new()).await.unwrap();

        db.create_relationship(&mut tx, a, b, "p", PropertyMap::new()).await.unwrap();
        db.create_relationship(&mut tx, b, c, "p", PropertyMap::new()).await.unwrap();

        let paths = db.follow(&tx, &[a], &["p", "p"]).await.unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].end().id, c);

        // no third hop
        assert!(db.follow(&tx, &[a], &["p", "p", "p"]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_follow_accepts_only_the_attribute_sequence() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();

        let root = db.create_node(&mut tx, &[], PropertyMap::new()).await.unwrap();
        let e1 = db.create_node(&mut tx, &[], PropertyMap::new()).await.unwrap();
        let e2 = db.create_node(&mut tx, &[], PropertyMap::new()).await.unwrap();
        let other = db.create_node(&mut tx, &[], PropertyMap::new()).await.unwrap();
        let v1 = db.create_node(&mut tx, &[], PropertyMap::new()).await.unwrap();
        let v2 = db.create_node(&mut tx, &[], PropertyMap::new()).await.unwrap();

        db.create_relationship(&mut tx, root, e1, "field", PropertyMap::new()).await.unwrap();
        db.create_relationship(&mut tx, root, other, "leader", PropertyMap::new()).await.unwrap();
        db.create_relationship(&mut tx, root, e2, "field", PropertyMap::new()).await.unwrap();
        db.create_relationship(&mut tx, e1, v1, "value", PropertyMap::new()).await.unwrap();
        db.create_relationship(&mut tx, e2, v2, "value", PropertyMap::new()).await.unwrap();
        db.create_relationship(&mut tx, e2, other, "id", PropertyMap::new()).await.unwrap();

        let paths = db.follow(&tx, &[root], &["field", "value"]).await.unwrap();
        let ends: Vec<NodeId> = paths.iter().map(|p| p.end().id).collect();
        assert_eq!(ends, vec![v1, v2]);
        assert!(paths.iter().all(|p| p.len() == 2));

        let entities = db.follow(&tx, &[e2, e1], &["value"]).await.unwrap();
        let starts: Vec<NodeId> = entities.iter().map(|p| p.start().id).collect();
        assert_eq!(starts, vec![e2, e1]);

        let itself = db.follow(&tx, &[root], &[]).await.unwrap();
        assert_eq!(itself.len(), 1);
        assert!(itself[0].is_empty());
    }
}
