//! Named exact-match indexes kept next to the graph.
//!
//! Node indexes map a string key to one or more nodes, relationship indexes
//! map a key to a single statement edge.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexName {
    /// Resource URI → resource node.
    Resources,
    /// URI + data model URI → resource node.
    ResourcesWithDataModel,
    /// Type URI → type node, one per type.
    ResourceTypes,
    /// Literal value → literal nodes.
    Values,
    /// Statement identity hash → statement edge.
    StatementHashes,
    StatementUuids,
    StatementUuidsWithDataModel,
}

impl IndexName {
    pub fn as_str(self) -> &'static str {
        match self {
            IndexName::Resources => "resources",
            IndexName::ResourcesWithDataModel => "resources_w_data_model",
            IndexName::ResourceTypes => "resource_types",
            IndexName::Values => "values",
            IndexName::StatementHashes => "statement_hashes",
            IndexName::StatementUuids => "statement_uuids",
            IndexName::StatementUuidsWithDataModel => "statement_uuids_w_data_model",
        }
    }
}

impl std::fmt::Display for IndexName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite key for data-model scoped indexes.
pub fn scoped_key(key: &str, scope: &str) -> String {
    format!("{key}{scope}")
}
