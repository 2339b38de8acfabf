//! # GDM ingestion
//!
//! Writes GDM statements into a property graph: one node per resource
//! (per scope), per blank node and per literal occurrence, one edge per
//! distinct triple. Commits in batches (every N statements or T seconds),
//! so a failure mid-model leaves the batches before it in place.

pub mod writer;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::gdm::{GdmNode, GdmNodeType, Model, Resource, Statement};
use crate::hash::{hash_key, statement_hash};
use crate::index::IndexName;
use crate::model::{keys, props, NodeId, NodeType, PropertyMap, RelId, Value};
use crate::storage::StorageBackend;
use crate::tx::TxMode;
use crate::{Error, Result};

pub use writer::{GraphWriter, ScopedWriter, UnscopedWriter};

// ============================================================================
// Configuration
// ============================================================================

/// Batch commit thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitPolicy {
    pub max_statements: usize,
    pub max_interval_secs: u64,
}

impl Default for CommitPolicy {
    fn default() -> Self {
        Self {
            max_statements: 50_000,
            max_interval_secs: 30,
        }
    }
}

/// How a model is written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Data model the statements belong to. `None` writes into the global
    /// namespace.
    pub scope_uri: Option<String>,
    /// A re-submitted triple overwrites the stored edge's qualifiers.
    pub update_mode: bool,
    /// Stamp new edges with a validity range starting at `version`.
    pub versioned: bool,
    pub version: u32,
    pub commit: CommitPolicy,
}

impl IngestConfig {
    pub fn scoped(scope_uri: impl Into<String>) -> Self {
        Self { scope_uri: Some(scope_uri.into()), ..Self::default() }
    }

    pub(crate) fn writer<B: StorageBackend>(&self) -> Box<dyn GraphWriter<B>> {
        match &self.scope_uri {
            Some(uri) => Box::new(ScopedWriter::new(uri.clone())),
            None => Box::new(UnscopedWriter),
        }
    }
}

/// Counters of one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub statements: u64,
    pub nodes_added: u64,
    pub relationships_added: u64,
    pub labels_added: u64,
    pub literals: u64,
    /// Statements whose triple was already stored.
    pub deduplicated: u64,
    pub commits: u64,
}

// ============================================================================
// Handler
// ============================================================================

/// Streams statements into a backend.
///
/// Blank node ids are resolved per handler: the same id in two handlers is
/// two different nodes.
pub struct GdmHandler<'a, B: StorageBackend> {
    backend: &'a B,
    config: IngestConfig,
    writer: Box<dyn GraphWriter<B>>,
    tx: Option<B::Tx>,
    bnodes: HashMap<u64, NodeId>,
    /// Blank node ids first resolved in the open batch.
    batch_bnodes: Vec<u64>,
    stats: IngestStats,
    /// Counters as of the last commit.
    committed: IngestStats,
    pending: usize,
    tick: Instant,
}

/// A resolved statement end.
struct Endpoint {
    node: NodeId,
    kind: GdmNodeType,
    identifier: String,
}

impl<'a, B: StorageBackend> GdmHandler<'a, B> {
    pub fn new(backend: &'a B, config: IngestConfig) -> Self {
        let writer = config.writer::<B>();
        Self {
            backend,
            config,
            writer,
            tx: None,
            bnodes: HashMap::new(),
            batch_bnodes: Vec::new(),
            stats: IngestStats::default(),
            committed: IngestStats::default(),
            pending: 0,
            tick: Instant::now(),
        }
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    pub async fn handle_resource(&mut self, resource: &Resource) -> Result<()> {
        for statement in &resource.statements {
            self.handle_statement(&resource.uri, statement).await?;
        }
        Ok(())
    }

    /// Write one statement of `resource_uri`.
    ///
    /// On failure the open transaction is rolled back together with
    /// everything the batch recorded: counters return to the last commit and
    /// blank nodes first seen in the batch are forgotten. The handler stays
    /// usable; the next statement starts a new batch.
    pub async fn handle_statement(&mut self, resource_uri: &str, statement: &Statement) -> Result<()> {
        let mut tx = match self.tx.take() {
            Some(tx) => tx,
            None => self.backend.begin_tx(TxMode::ReadWrite).await?,
        };

        match self.write_statement(&mut tx, resource_uri, statement).await {
            Ok(()) => {
                self.stats.statements += 1;
                self.pending += 1;
                self.tx = Some(tx);
                self.maybe_commit().await
            }
            Err(e) => {
                error!(resource = resource_uri, predicate = %statement.predicate.uri, error = %e,
                    "statement write failed, rolling back");
                self.discard_batch();
                self.backend.rollback_tx(tx).await?;
                Err(e)
            }
        }
    }

    /// Commit the last batch and return the counters.
    pub async fn finish(mut self) -> Result<IngestStats> {
        self.commit().await?;
        debug!(stats = ?self.stats, "ingestion finished");
        Ok(self.stats)
    }

    async fn maybe_commit(&mut self) -> Result<()> {
        let policy = self.config.commit;
        let interval = Duration::from_secs(policy.max_interval_secs);
        if self.pending >= policy.max_statements || self.tick.elapsed() >= interval {
            debug!(pending = self.pending, "batch threshold reached");
            self.commit().await?;
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            self.backend.commit_tx(tx).await?;
            self.stats.commits += 1;
            debug!(statements = self.pending, commits = self.stats.commits, "committed batch");
        }
        self.committed = self.stats;
        self.batch_bnodes.clear();
        self.pending = 0;
        self.tick = Instant::now();
        Ok(())
    }

    fn discard_batch(&mut self) {
        for id in self.batch_bnodes.drain(..) {
            self.bnodes.remove(&id);
        }
        self.stats = self.committed;
        self.pending = 0;
    }

    // ========================================================================
    // Statement write
    // ========================================================================

    async fn write_statement(&mut self, tx: &mut B::Tx, resource_uri: &str, statement: &Statement) -> Result<()> {
        let predicate = statement.predicate.uri.as_str();
        let is_type = predicate == keys::RDF_TYPE;

        let subject = match &statement.subject {
            GdmNode::Literal { value } => {
                return Err(Error::InvalidStatement(format!(
                    "literal subject \"{value}\" for predicate {predicate}"
                )));
            }
            node => self.resolve_node(tx, resource_uri, node, false).await?,
        };

        if is_type {
            if let Some(type_uri) = statement.object.uri() {
                if self.backend.add_label(tx, subject.node, type_uri).await? {
                    self.stats.labels_added += 1;
                }
            }
        }

        // Literals are fresh nodes, so their statement is checked for
        // duplicates before one is created.
        if let GdmNode::Literal { value } = &statement.object {
            let hash = statement_hash(
                subject.kind,
                Some(&subject.identifier),
                predicate,
                GdmNodeType::Literal,
                Some(value),
            )?;
            if let Some(rel) = self.existing_edge(tx, hash).await? {
                return self.deduplicate(tx, rel, statement).await;
            }
            let object = self.create_literal(tx, resource_uri, value).await?;
            return self.create_edge(tx, resource_uri, subject.node, object, hash, statement).await;
        }

        let object = self.resolve_node(tx, resource_uri, &statement.object, is_type).await?;
        let hash = statement_hash(
            subject.kind,
            Some(&subject.identifier),
            predicate,
            object.kind,
            Some(&object.identifier),
        )?;
        if let Some(rel) = self.existing_edge(tx, hash).await? {
            return self.deduplicate(tx, rel, statement).await;
        }
        self.create_edge(tx, resource_uri, subject.node, object.node, hash, statement).await
    }

    /// Find or create the node of a resource or blank node.
    async fn resolve_node(
        &mut self,
        tx: &mut B::Tx,
        resource_uri: &str,
        node: &GdmNode,
        as_type: bool,
    ) -> Result<Endpoint> {
        match node {
            GdmNode::Resource { uri, data_model } => {
                let data_model = data_model.as_deref();
                let identifier = self.writer.resource_identifier(uri, data_model);
                let existing = if as_type {
                    self.backend.lookup_node(tx, IndexName::ResourceTypes, uri).await?
                } else {
                    self.writer.resolve_resource(self.backend, tx, uri, data_model).await?
                };
                let node = match existing {
                    Some(id) => id,
                    None => self.create_resource(tx, uri, data_model, as_type).await?,
                };
                Ok(Endpoint { node, kind: GdmNodeType::Resource, identifier })
            }
            GdmNode::BNode { id } => {
                let node = match self.bnodes.get(id) {
                    Some(&node) => node,
                    None => {
                        let node_type = if as_type { NodeType::TypeBNode } else { NodeType::BNode };
                        let labels: &[&str] = if as_type { &[keys::RDFS_CLASS] } else { &[] };
                        let node = self.backend.create_node(tx, labels, props([
                            (keys::NODETYPE, Value::from(node_type.name())),
                            (keys::RESOURCE, Value::from(resource_uri)),
                        ])).await?;
                        self.stats.nodes_added += 1;
                        self.bnodes.insert(*id, node);
                        self.batch_bnodes.push(*id);
                        node
                    }
                };
                Ok(Endpoint { node, kind: GdmNodeType::BNode, identifier: node.to_string() })
            }
            GdmNode::Literal { value } => Err(Error::InvalidStatement(format!(
                "literal \"{value}\" cannot be resolved as a shared node"
            ))),
        }
    }

    async fn create_resource(
        &mut self,
        tx: &mut B::Tx,
        uri: &str,
        data_model: Option<&str>,
        as_type: bool,
    ) -> Result<NodeId> {
        let node_type = if as_type { NodeType::TypeResource } else { NodeType::Resource };
        let labels: &[&str] = if as_type { &[keys::RDFS_CLASS] } else { &[] };
        let mut properties = props([
            (keys::URI, Value::from(uri)),
            (keys::NODETYPE, Value::from(node_type.name())),
        ]);
        if let Some(scope) = self.writer.scope_property(data_model) {
            properties.insert(keys::DATA_MODEL.to_owned(), Value::from(scope));
        }

        let node = self.backend.create_node(tx, labels, properties).await?;
        self.stats.nodes_added += 1;

        if as_type {
            self.backend.index_node(tx, IndexName::ResourceTypes, uri, node).await?;
        } else {
            self.writer.index_resource(self.backend, tx, uri, data_model, node).await?;
        }
        Ok(node)
    }

    async fn create_literal(&mut self, tx: &mut B::Tx, resource_uri: &str, value: &str) -> Result<NodeId> {
        let node = self.backend.create_node(tx, &[keys::LEAF], props([
            (keys::VALUE, Value::from(value)),
            (keys::NODETYPE, Value::from(NodeType::Literal.name())),
            (keys::RESOURCE, Value::from(resource_uri)),
        ])).await?;
        self.backend.index_node(tx, IndexName::Values, value, node).await?;
        self.stats.nodes_added += 1;
        self.stats.literals += 1;
        Ok(node)
    }

    async fn existing_edge(&self, tx: &B::Tx, hash: u64) -> Result<Option<RelId>> {
        self.backend.lookup_relationship(tx, IndexName::StatementHashes, &hash_key(hash)).await
    }

    /// The first occurrence of a triple wins, unless in update mode.
    async fn deduplicate(&mut self, tx: &mut B::Tx, rel: RelId, statement: &Statement) -> Result<()> {
        self.stats.deduplicated += 1;
        if !self.config.update_mode {
            return Ok(());
        }

        if let Some(order) = statement.order {
            self.backend.set_relationship_property(tx, rel, keys::ORDER, Value::from(order)).await?;
        }
        if let Some(confidence) = &statement.confidence {
            self.backend.set_relationship_property(tx, rel, keys::CONFIDENCE, Value::from(confidence.as_str())).await?;
        }
        if let Some(evidence) = &statement.evidence {
            self.backend.set_relationship_property(tx, rel, keys::EVIDENCE, Value::from(evidence.as_str())).await?;
        }
        Ok(())
    }

    async fn create_edge(
        &mut self,
        tx: &mut B::Tx,
        resource_uri: &str,
        subject: NodeId,
        object: NodeId,
        hash: u64,
        statement: &Statement,
    ) -> Result<()> {
        let uuid = statement
            .uuid
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut properties: PropertyMap = props([
            (keys::UUID, Value::from(uuid.as_str())),
            (keys::INDEX, Value::from(self.stats.statements as i64)),
            (keys::RESOURCE, Value::from(resource_uri)),
            (keys::ORDER, Value::from(statement.order)),
            (keys::CONFIDENCE, Value::from(statement.confidence.clone())),
            (keys::EVIDENCE, Value::from(statement.evidence.clone())),
            (keys::DATA_MODEL, Value::from(self.writer.scope_property(None))),
        ]);
        if self.config.versioned {
            properties.insert(keys::VALID_FROM.to_owned(), Value::from(self.config.version));
            properties.insert(keys::VALID_TO.to_owned(), Value::from(i64::MAX));
        }

        let rel = self.backend
            .create_relationship(tx, subject, object, &statement.predicate.uri, properties)
            .await?;
        self.backend.index_relationship(tx, IndexName::StatementHashes, &hash_key(hash), rel).await?;
        self.writer.index_statement(self.backend, tx, rel, &uuid).await?;
        self.stats.relationships_added += 1;
        Ok(())
    }
}

/// Write a whole model and commit.
pub async fn ingest<B: StorageBackend>(backend: &B, model: &Model, config: IngestConfig) -> Result<IngestStats> {
    let mut handler = GdmHandler::new(backend, config);
    for resource in &model.resources {
        handler.handle_resource(resource).await?;
    }
    handler.finish().await
}

// ============================================================================
// Tests
// ============================================================================
