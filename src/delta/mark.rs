//! Delta states on comparison graphs.
//!
//! Every matcher verdict is written onto the edges (and their target nodes)
//! from the record node down to the matched entity. A segment keeps the
//! first state it receives: stages run from most to least specific, so
//! exact matches win over modifications, and both over additions and
//! deletions.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::model::{keys, Direction, NodeId, RelId, Relationship, Value};
use crate::read::describe;
use crate::storage::StorageBackend;
use crate::{Error, Result};

use super::ComparisonGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeltaState {
    ExactMatch,
    Modification,
    Addition,
    Deletion,
}

impl DeltaState {
    pub fn name(self) -> &'static str {
        match self {
            DeltaState::ExactMatch => "ExactMatch",
            DeltaState::Modification => "Modification",
            DeltaState::Addition => "Addition",
            DeltaState::Deletion => "Deletion",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ExactMatch" => Some(DeltaState::ExactMatch),
            "Modification" => Some(DeltaState::Modification),
            "Addition" => Some(DeltaState::Addition),
            "Deletion" => Some(DeltaState::Deletion),
            _ => None,
        }
    }

    pub fn of(rel: &Relationship) -> Option<Self> {
        rel.get_str(keys::DELTA_STATE).and_then(Self::from_name)
    }
}

impl std::fmt::Display for DeltaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl<B: StorageBackend> ComparisonGraph<B> {
    pub async fn edge_state(&self, rel: RelId) -> Result<Option<DeltaState>> {
        let rel = self.backend().get_relationship(self.tx(), rel).await?
            .ok_or_else(|| Error::GraphAccessError(format!("relationship {rel} vanished")))?;
        Ok(DeltaState::of(&rel))
    }

    pub async fn node_state(&self, node: NodeId) -> Result<Option<DeltaState>> {
        let node = self.backend().get_node(self.tx(), node).await?
            .ok_or_else(|| Error::GraphAccessError(format!("node {node} vanished")))?;
        Ok(node.get_str(keys::DELTA_STATE).and_then(DeltaState::from_name))
    }

    /// Mark an edge and its target node. Returns false if the edge already
    /// carried a state.
    pub async fn mark_edge(&mut self, rel: RelId, state: DeltaState) -> Result<bool> {
        if self.edge_state(rel).await?.is_some() {
            return Ok(false);
        }
        let target = {
            let (backend, tx) = self.parts();
            backend.set_relationship_property(tx, rel, keys::DELTA_STATE, Value::from(state.name())).await?;
            backend.get_relationship(tx, rel).await?
                .ok_or_else(|| Error::GraphAccessError(format!("relationship {rel} vanished")))?
                .dst
        };
        if self.node_state(target).await?.is_none() {
            let (backend, tx) = self.parts();
            backend.set_node_property(tx, target, keys::DELTA_STATE, Value::from(state.name())).await?;
        }
        trace!(%rel, %state, "marked");
        Ok(true)
    }

    /// Mark every still unmarked edge of a path.
    pub async fn mark_path(&mut self, path: &[RelId], state: DeltaState) -> Result<()> {
        for &rel in path {
            self.mark_edge(rel, state).await?;
        }
        Ok(())
    }

    /// Mark every still unmarked edge below `node`, down to the leaves.
    pub async fn mark_subtree(&mut self, node: NodeId, state: DeltaState) -> Result<()> {
        let mut visited: HashSet<NodeId> = HashSet::from([node]);
        let mut stack = vec![node];

        while let Some(current) = stack.pop() {
            let rels = self.backend()
                .get_relationships(self.tx(), current, Direction::Outgoing, None)
                .await?;
            for rel in rels {
                self.mark_edge(rel.id, state).await?;
                let Some(target) = self.backend().get_node(self.tx(), rel.dst).await? else {
                    continue;
                };
                if !target.is_leaf() && visited.insert(target.id) {
                    stack.push(target.id);
                }
            }
        }
        Ok(())
    }

    /// Give unmarked structural edges the state of what lies below them,
    /// deepest first.
    ///
    /// An edge above exact or modified content becomes `Modification` if
    /// any child is modified, else `ExactMatch`; an edge above only added
    /// (or only removed) content takes that state. Edges with no marked
    /// child stay unmarked. Returns the number of edges resolved.
    pub async fn resolve_ancestors(&mut self) -> Result<usize> {
        let root = self.root().clone();
        let mut edges = describe(self.backend(), self.tx(), &root, None).await?;
        edges.sort_by_key(|e| std::cmp::Reverse(e.rel.hierarchy_level().unwrap_or(-1)));

        let mut resolved = 0;
        for edge in edges {
            if edge.object.is_leaf() || self.edge_state(edge.rel.id).await?.is_some() {
                continue;
            }
            let children = self.backend()
                .get_relationships(self.tx(), edge.object.id, Direction::Outgoing, None)
                .await?;
            let states: Vec<DeltaState> = children.iter().filter_map(DeltaState::of).collect();

            let state = if states.contains(&DeltaState::Modification) {
                Some(DeltaState::Modification)
            } else if states.contains(&DeltaState::ExactMatch) {
                Some(DeltaState::ExactMatch)
            } else {
                states.first().copied()
            };
            if let Some(state) = state {
                self.mark_edge(edge.rel.id, state).await?;
                resolved += 1;
            }
        }
        Ok(resolved)
    }
}
