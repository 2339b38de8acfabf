//! Scope handling for ingestion.
//!
//! A `GraphWriter` decides how resource nodes are found and indexed and how
//! statements are registered, depending on whether the ingestion is scoped
//! to a data model.

use async_trait::async_trait;

use crate::index::{scoped_key, IndexName};
use crate::model::{NodeId, RelId};
use crate::storage::StorageBackend;
use crate::Result;

#[async_trait]
pub trait GraphWriter<B: StorageBackend>: Send + Sync {
    /// Existing node of a resource, if this scope has seen it.
    async fn resolve_resource(
        &self,
        backend: &B,
        tx: &B::Tx,
        uri: &str,
        data_model: Option<&str>,
    ) -> Result<Option<NodeId>>;

    /// Register a freshly created resource node.
    async fn index_resource(
        &self,
        backend: &B,
        tx: &mut B::Tx,
        uri: &str,
        data_model: Option<&str>,
        node: NodeId,
    ) -> Result<()>;

    /// Value of `__DATA_MODEL__` for a node (given its own data model) or,
    /// with `None`, for a statement edge.
    fn scope_property(&self, data_model: Option<&str>) -> Option<String>;

    /// Identifier of a resource inside the statement identity hash.
    fn resource_identifier(&self, uri: &str, data_model: Option<&str>) -> String;

    /// Register a statement edge under its uuid.
    async fn index_statement(
        &self,
        backend: &B,
        tx: &mut B::Tx,
        rel: RelId,
        uuid: &str,
    ) -> Result<()>;
}

// ============================================================================
// Scoped
// ============================================================================

/// Resources and statements belong to one data model. The same URI in two
/// data models is two nodes.
#[derive(Debug, Clone)]
pub struct ScopedWriter {
    data_model_uri: String,
}

impl ScopedWriter {
    pub fn new(data_model_uri: impl Into<String>) -> Self {
        Self { data_model_uri: data_model_uri.into() }
    }

    fn scope<'a>(&'a self, data_model: Option<&'a str>) -> &'a str {
        data_model.unwrap_or(&self.data_model_uri)
    }
}

#[async_trait]
impl<B: StorageBackend> GraphWriter<B> for ScopedWriter {
    async fn resolve_resource(
        &self,
        backend: &B,
        tx: &B::Tx,
        uri: &str,
        data_model: Option<&str>,
    ) -> Result<Option<NodeId>> {
        let key = scoped_key(uri, self.scope(data_model));
        backend.lookup_node(tx, IndexName::ResourcesWithDataModel, &key).await
    }

    async fn index_resource(
        &self,
        backend: &B,
        tx: &mut B::Tx,
        uri: &str,
        data_model: Option<&str>,
        node: NodeId,
    ) -> Result<()> {
        let key = scoped_key(uri, self.scope(data_model));
        backend.index_node(tx, IndexName::ResourcesWithDataModel, &key, node).await?;
        backend.index_node(tx, IndexName::Resources, uri, node).await
    }

    fn scope_property(&self, data_model: Option<&str>) -> Option<String> {
        Some(self.scope(data_model).to_owned())
    }

    fn resource_identifier(&self, uri: &str, data_model: Option<&str>) -> String {
        scoped_key(uri, self.scope(data_model))
    }

    async fn index_statement(
        &self,
        backend: &B,
        tx: &mut B::Tx,
        rel: RelId,
        uuid: &str,
    ) -> Result<()> {
        let key = format!("{}.{uuid}", self.data_model_uri);
        backend.index_relationship(tx, IndexName::StatementUuidsWithDataModel, &key, rel).await
    }
}

// ============================================================================
// Unscoped
// ============================================================================

/// One global namespace: a URI always resolves to the same node.
#[derive(Debug, Clone, Default)]
pub struct UnscopedWriter;

#[async_trait]
impl<B: StorageBackend> GraphWriter<B> for UnscopedWriter {
    async fn resolve_resource(
        &self,
        backend: &B,
        tx: &B::Tx,
        uri: &str,
        _data_model: Option<&str>,
    ) -> Result<Option<NodeId>> {
        backend.lookup_node(tx, IndexName::Resources, uri).await
    }

    async fn index_resource(
        &self,
        backend: &B,
        tx: &mut B::Tx,
        uri: &str,
        data_model: Option<&str>,
        node: NodeId,
    ) -> Result<()> {
        if let Some(data_model) = data_model {
            let key = scoped_key(uri, data_model);
            backend.index_node(tx, IndexName::ResourcesWithDataModel, &key, node).await?;
        }
        backend.index_node(tx, IndexName::Resources, uri, node).await
    }

    fn scope_property(&self, data_model: Option<&str>) -> Option<String> {
        data_model.map(str::to_owned)
    }

    fn resource_identifier(&self, uri: &str, _data_model: Option<&str>) -> String {
        uri.to_owned()
    }

    async fn index_statement(
        &self,
        backend: &B,
        tx: &mut B::Tx,
        rel: RelId,
        uuid: &str,
    ) -> Result<()> {
        backend.index_relationship(tx, IndexName::StatementUuids, uuid, rel).await
    }
}
