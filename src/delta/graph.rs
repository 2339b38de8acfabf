//! The private graph one side of a comparison runs on.

use crate::enrich::enrich_hierarchy;
use crate::gdm::{Model, Resource};
use crate::index::IndexName;
use crate::ingest::{ingest, IngestConfig};
use crate::model::{keys, props, Node, NodeType, Value};
use crate::storage::{MemoryBackend, StorageBackend};
use crate::tx::TxMode;
use crate::{Error, Result};

/// One version of a record, loaded into its own graph.
///
/// Owns its backend and a write transaction for the lifetime of the
/// comparison; delta states are recorded on its nodes and edges, never on
/// the permanent store.
pub struct ComparisonGraph<B: StorageBackend> {
    backend: B,
    tx: B::Tx,
    root: Node,
}

impl<B: StorageBackend> ComparisonGraph<B> {
    /// Open the record `uri` of an already populated backend and stamp its
    /// hierarchy levels.
    pub async fn open(backend: B, uri: &str) -> Result<Self> {
        let mut tx = backend.begin_tx(TxMode::ReadWrite).await?;
        let root = match backend.lookup_node(&tx, IndexName::Resources, uri).await? {
            Some(id) => backend.get_node(&tx, id).await?,
            None => None,
        };
        let Some(root) = root else {
            backend.rollback_tx(tx).await?;
            return Err(Error::NotFound(format!("resource {uri}")));
        };

        enrich_hierarchy(&backend, &mut tx, root.id).await?;
        Ok(Self { backend, tx, root })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn uri(&self) -> &str {
        self.root.uri().unwrap_or_default()
    }

    pub(crate) fn tx(&self) -> &B::Tx {
        &self.tx
    }

    pub(crate) fn parts(&mut self) -> (&B, &mut B::Tx) {
        (&self.backend, &mut self.tx)
    }

    /// End the comparison's transaction.
    pub async fn close(self) -> Result<()> {
        self.backend.commit_tx(self.tx).await
    }
}

impl ComparisonGraph<MemoryBackend> {
    /// Load a resource into a fresh in-memory graph.
    pub async fn from_resource(resource: &Resource) -> Result<Self> {
        let backend = MemoryBackend::new();
        let mut model = Model::new();
        model.add_resource(resource.clone());
        ingest(&backend, &model, IngestConfig::default()).await?;

        // a record without statements of its own still needs a root
        let mut tx = backend.begin_tx(TxMode::ReadWrite).await?;
        if backend.lookup_node(&tx, IndexName::Resources, &resource.uri).await?.is_none() {
            let root = backend.create_node(&mut tx, &[], props([
                (keys::URI, Value::from(resource.uri.as_str())),
                (keys::NODETYPE, Value::from(NodeType::Resource.name())),
            ])).await?;
            backend.index_node(&mut tx, IndexName::Resources, &resource.uri, root).await?;
        }
        backend.commit_tx(tx).await?;

        Self::open(backend, &resource.uri).await
    }
}
