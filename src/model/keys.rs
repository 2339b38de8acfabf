//! Reserved property and label names.
//!
//! Every GDM node and statement edge carries its identity and qualifiers
//! under these keys. User predicates never start with a double underscore.

pub const URI: &str = "__URI__";
pub const VALUE: &str = "__VALUE__";
pub const NODETYPE: &str = "__NODETYPE__";
pub const DATA_MODEL: &str = "__DATA_MODEL__";
pub const RESOURCE: &str = "__RESOURCE__";
pub const UUID: &str = "__UUID__";
pub const ORDER: &str = "__ORDER__";
/// Position of a statement in its ingestion batch.
pub const INDEX: &str = "__INDEX__";
pub const CONFIDENCE: &str = "__CONFIDENCE__";
pub const EVIDENCE: &str = "__EVIDENCE__";
pub const HIERARCHY_LEVEL: &str = "__HIERARCHY_LEVEL__";
pub const DELTA_STATE: &str = "__DELTA_STATE__";
pub const VALID_FROM: &str = "__VALID_FROM__";
pub const VALID_TO: &str = "__VALID_TO__";

/// Label on leaf nodes (literals and resource objects).
pub const LEAF: &str = "__LEAF__";

/// Joins attribute URIs in the string form of an attribute path.
pub const ATTRIBUTE_DELIMITER: char = '\u{1E}';

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
/// Label on type nodes (objects of `rdf:type`).
pub const RDFS_CLASS: &str = "http://www.w3.org/2000/01/rdf-schema#Class";
