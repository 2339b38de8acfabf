//! # gdm-graph: statement graphs and semantic deltas
//!
//! Stores GDM statements (subject / predicate / object with order,
//! confidence and evidence qualifiers) as a property graph, reads them back,
//! and compares two versions of a record statement by statement.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `StorageBackend` is the contract between the handlers and storage
//! 2. **Clean DTOs**: `Node`, `Relationship`, `Value` cross all boundaries
//! 3. **Configuration as data**: one ingestion handler, driven by `IngestConfig`
//! 4. **Private comparison graphs**: delta states never touch the permanent store
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gdm_graph::{Graph, GdmNode, IngestConfig, Model, Resource, Statement};
//!
//! # async fn example() -> gdm_graph::Result<()> {
//! let graph = Graph::open_memory().await?;
//!
//! let uri = "http://example.org/r1";
//! let mut v1 = Resource::new(uri);
//! v1.add_statement(Statement::new(
//!     GdmNode::resource(uri),
//!     "http://purl.org/dc/terms/title",
//!     GdmNode::literal("Title A"),
//! ));
//! let mut model = Model::new();
//! model.add_resource(v1);
//! graph.ingest(&model, IngestConfig::default()).await?;
//!
//! let mut v2 = Resource::new(uri);
//! v2.add_statement(Statement::new(
//!     GdmNode::resource(uri),
//!     "http://purl.org/dc/terms/title",
//!     GdmNode::literal("Title B"),
//! ));
//! let mut update = Model::new();
//! update.add_resource(v2);
//!
//! let delta = graph.delta_for_model(&update, None, None).await?;
//! for (uri, changeset) in &delta.changesets {
//!     println!("{uri}: {} modified", changeset.modified.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage Backends
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | Memory | (default) | In-memory arena graph for ingestion and comparisons |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod gdm;
pub mod storage;
pub mod tx;
pub mod index;
pub mod hash;
pub mod ingest;
pub mod read;
pub mod enrich;
pub mod delta;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Node, Relationship, Path, Value, PropertyMap,
    NodeId, RelId, Direction, NodeType,
};

pub use gdm::{GdmNode, GdmNodeType, Model, Predicate, Resource, Statement};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{MemoryBackend, StorageBackend};

// ============================================================================
// Re-exports: Transactions
// ============================================================================

pub use tx::{Transaction, TxMode, TxId};

// ============================================================================
// Re-exports: Ingestion, reading, delta
// ============================================================================

pub use ingest::{CommitPolicy, GdmHandler, IngestConfig, IngestStats};
pub use read::ResourceReader;
pub use delta::{
    compute_delta, AttributePath, Changeset, ComparisonGraph, ContentSchema, DeltaState,
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ============================================================================
// Top-level Graph handle
// ============================================================================

/// The primary entry point. A `Graph` wraps the permanent store.
pub struct Graph<B: StorageBackend> {
    backend: B,
}

/// Changesets of an incoming model against the permanent store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDelta {
    /// Keyed by the incoming resource URI.
    pub changesets: IndexMap<String, Changeset>,
    /// Incoming resources with no existing version.
    pub new_resources: Vec<Resource>,
}

impl<B: StorageBackend> Graph<B> {
    /// Create a Graph with the given backend.
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    /// Write a model into the store.
    pub async fn ingest(&self, model: &Model, config: IngestConfig) -> Result<IngestStats> {
        ingest::ingest(&self.backend, model, config).await
    }

    /// Read one resource back as GDM.
    pub async fn read_resource(&self, uri: &str, scope: Option<&str>) -> Result<Option<Resource>> {
        ResourceReader::new(&self.backend, scope.map(str::to_owned)).read(uri).await
    }

    /// Read every record of a class.
    pub async fn read_model(&self, record_class_uri: &str, scope: Option<&str>) -> Result<Model> {
        ResourceReader::new(&self.backend, scope.map(str::to_owned)).read_model(record_class_uri).await
    }

    /// Compare every resource of `model` with its stored version.
    ///
    /// The stored version is found by record identifier when the schema
    /// names one, else by URI. Resources without a stored version are
    /// returned as new.
    pub async fn delta_for_model(
        &self,
        model: &Model,
        schema: Option<&ContentSchema>,
        scope: Option<&str>,
    ) -> Result<ModelDelta> {
        if let Some(schema) = schema {
            schema.validate()?;
        }

        let reader = ResourceReader::new(&self.backend, scope.map(str::to_owned));
        let mut delta = ModelDelta::default();

        for resource in &model.resources {
            let mut new_graph = ComparisonGraph::from_resource(resource).await?;

            let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
            let stored = match schema.and_then(|s| s.record_identifier.as_ref()) {
                Some(path) => {
                    let identifier = delta::extract::record_identifier(
                        new_graph.backend(),
                        new_graph.tx(),
                        new_graph.root().id,
                        path,
                    )
                    .await?;
                    match identifier {
                        Some(identifier) => {
                            delta::extract::resource_by_record_identifier(
                                &self.backend,
                                &tx,
                                &identifier,
                                path,
                                scope,
                            )
                            .await?
                        }
                        None => {
                            debug!(uri = %resource.uri, "incoming resource has no record identifier");
                            None
                        }
                    }
                }
                None => reader.resource_node(&tx, &resource.uri).await?,
            };
            let existing = match stored {
                Some(node) => reader.read_in(&tx, &node).await?,
                None => None,
            };
            self.backend.commit_tx(tx).await?;

            let Some(existing) = existing else {
                new_graph.close().await?;
                delta.new_resources.push(resource.clone());
                continue;
            };

            let mut existing_graph = ComparisonGraph::from_resource(&existing).await?;
            let changeset = delta::compute_delta_with(&mut existing_graph, &mut new_graph, schema).await?;
            existing_graph.close().await?;
            new_graph.close().await?;

            delta.changesets.insert(resource.uri.clone(), changeset);
        }

        info!(
            compared = delta.changesets.len(),
            new = delta.new_resources.len(),
            "model delta computed"
        );
        Ok(delta)
    }

    /// Access the underlying backend (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

/// In-memory graph for testing and embedding.
impl Graph<storage::MemoryBackend> {
    pub async fn open_memory() -> Result<Self> {
        let backend = storage::MemoryBackend::new();
        Ok(Self::with_backend(backend))
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Graph access error: {0}")]
    GraphAccessError(String),

    #[error("Hashing error: {0}")]
    HashingError(String),

    #[error("Invalid statement: {0}")]
    InvalidStatement(String),

    #[error("Transaction error: {0}")]
    TxError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
