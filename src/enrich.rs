//! Hierarchy levels.
//!
//! Stamps `__HIERARCHY_LEVEL__` on a resource's description: statements
//! leaving the resource node are level 0, statements leaving a blank node
//! one level deeper than the edge that reached it. Leaves get the level of
//! their incoming edge plus one.

use std::collections::HashSet;

use tracing::debug;

use crate::model::{keys, Direction, NodeId, Value};
use crate::storage::StorageBackend;
use crate::{Error, Result};

/// Stamp hierarchy levels below `root`. Returns the number of edges visited.
pub async fn enrich_hierarchy<B: StorageBackend>(backend: &B, tx: &mut B::Tx, root: NodeId) -> Result<usize> {
    let mut edges = 0;
    let mut visited: HashSet<NodeId> = HashSet::from([root]);
    let mut stack: Vec<(NodeId, i64)> = vec![(root, 0)];

    while let Some((subject, level)) = stack.pop() {
        let rels = backend.get_relationships(tx, subject, Direction::Outgoing, None).await?;
        if rels.is_empty() {
            continue;
        }
        backend.set_node_property(tx, subject, keys::HIERARCHY_LEVEL, Value::from(level)).await?;

        for rel in rels {
            backend.set_relationship_property(tx, rel.id, keys::HIERARCHY_LEVEL, Value::from(level)).await?;
            edges += 1;

            let object = backend.get_node(tx, rel.dst).await?
                .ok_or_else(|| Error::GraphAccessError(format!("dangling relationship {}", rel.id)))?;
            if object.is_leaf() {
                backend.set_node_property(tx, object.id, keys::HIERARCHY_LEVEL, Value::from(level + 1)).await?;
            } else if visited.insert(object.id) {
                stack.push((object.id, level + 1));
            }
        }
    }

    debug!(root = %root, edges, "hierarchy levels stamped");
    Ok(edges)
}
