//! Statement identity hash.
//!
//! A statement is identified by its canonical string
//! `"<SubjectType>:<subjectId> <predicate> <ObjectType>:<objectId> "`. The
//! identifiers are the (optionally scoped) URI for resources, the graph-local
//! node id for blank nodes and the value for literals. Qualifiers (order,
//! uuid, confidence, evidence) never enter the hash, so at most one edge per
//! distinct triple is stored.
//!
//! One scheme serves ingestion and delta matching alike: seeded XXH3.

use xxhash_rust::xxh3::{xxh3_128_with_seed, xxh3_64_with_seed};

use crate::gdm::GdmNodeType;
use crate::{Error, Result};

/// Fixed key for all identity hashes. Changing it invalidates every stored
/// `StatementHashes` index entry.
const HASH_SEED: u64 = 0x6764_6d5f_7374_6d74;

/// Canonical string of a statement.
pub fn canonical_statement(
    subject_type: GdmNodeType,
    subject_id: &str,
    predicate: &str,
    object_type: GdmNodeType,
    object_id: &str,
) -> String {
    format!("{subject_type}:{subject_id} {predicate} {object_type}:{object_id} ")
}

/// Identity hash of a statement.
///
/// Fails with `HashingError` when either identifier could not be resolved.
pub fn statement_hash(
    subject_type: GdmNodeType,
    subject_id: Option<&str>,
    predicate: &str,
    object_type: GdmNodeType,
    object_id: Option<&str>,
) -> Result<u64> {
    let subject_id = subject_id.ok_or_else(|| {
        Error::HashingError(format!("missing {subject_type} subject identifier for predicate {predicate}"))
    })?;
    let object_id = object_id.ok_or_else(|| {
        Error::HashingError(format!("missing {object_type} object identifier for predicate {predicate}"))
    })?;

    let canonical = canonical_statement(subject_type, subject_id, predicate, object_type, object_id);
    Ok(xxh3_64_with_seed(canonical.as_bytes(), HASH_SEED))
}

/// Index key form of a statement hash.
pub fn hash_key(hash: u64) -> String {
    format!("{hash:016x}")
}

/// 128-bit hex digest, used for matcher hash strings.
pub fn digest(input: &str) -> String {
    format!("{:032x}", xxh3_128_with_seed(input.as_bytes(), HASH_SEED))
}
