//! The output of a comparison.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::gdm::Statement;
use crate::model::NodeId;
use crate::read::{describe, read_statement};
use crate::storage::StorageBackend;
use crate::Result;

use super::mark::DeltaState;
use super::ComparisonGraph;

/// Added, removed and modified statements between two versions of a
/// record.
///
/// Added and removed statements are keyed by their uuid and serialize as
/// plain lists. Node ids refer to the comparison graph of their side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Changeset {
    #[serde(with = "statement_list")]
    pub added: IndexMap<String, Statement>,
    #[serde(with = "statement_list")]
    pub removed: IndexMap<String, Statement>,
    /// Existing value node to the new value node replacing it.
    pub modified: IndexMap<NodeId, NodeId>,
    pub existing_modified: IndexMap<NodeId, Statement>,
    pub new_modified: IndexMap<NodeId, Statement>,
}

impl Changeset {
    /// No statement was added, removed or modified.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    pub fn has_changes(&self) -> bool {
        !self.is_empty()
    }

    /// Collect the statements of both marked graphs by state.
    pub(crate) async fn assemble<B: StorageBackend>(
        existing: &ComparisonGraph<B>,
        new: &ComparisonGraph<B>,
        modified: IndexMap<NodeId, NodeId>,
    ) -> Result<Self> {
        let mut changeset = Changeset { modified, ..Default::default() };

        for (statement_key, object, state, statement) in marked_statements(existing).await? {
            match state {
                DeltaState::Deletion => {
                    changeset.removed.insert(statement_key, statement);
                }
                DeltaState::Modification => {
                    changeset.existing_modified.insert(object, statement);
                }
                _ => {}
            }
        }
        for (statement_key, object, state, statement) in marked_statements(new).await? {
            match state {
                DeltaState::Addition => {
                    changeset.added.insert(statement_key, statement);
                }
                DeltaState::Modification => {
                    changeset.new_modified.insert(object, statement);
                }
                _ => {}
            }
        }

        debug!(
            added = changeset.added.len(),
            removed = changeset.removed.len(),
            modified = changeset.modified.len(),
            "changeset assembled"
        );
        Ok(changeset)
    }
}

fn statement_key(statement: &Statement) -> String {
    match (&statement.uuid, statement.id) {
        (Some(uuid), _) => uuid.clone(),
        (None, Some(id)) => id.to_string(),
        (None, None) => String::new(),
    }
}

async fn marked_statements<B: StorageBackend>(
    graph: &ComparisonGraph<B>,
) -> Result<Vec<(String, NodeId, DeltaState, Statement)>> {
    let edges = describe(graph.backend(), graph.tx(), graph.root(), None).await?;
    Ok(edges
        .into_iter()
        .filter_map(|edge| {
            let state = DeltaState::of(&edge.rel)?;
            let statement = read_statement(&edge.rel, &edge.subject, &edge.object)?;
            Some((statement_key(&statement), edge.object.id, state, statement))
        })
        .collect())
}

mod statement_list {
    use indexmap::IndexMap;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{statement_key, Statement};

    pub fn serialize<S: Serializer>(map: &IndexMap<String, Statement>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(map.values())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<IndexMap<String, Statement>, D::Error> {
        let statements = Vec::<Statement>::deserialize(deserializer)?;
        Ok(statements.into_iter().map(|s| (statement_key(&s), s)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gdm::GdmNode;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wire_shape() {
        let mut changeset = Changeset::default();
        let statement = Statement::new(
            GdmNode::resource("http://example.org/r1"),
            "http://purl.org/dc/terms/title",
            GdmNode::literal("Title B"),
        )
        .with_uuid("u-1");
        changeset.added.insert("u-1".into(), statement.clone());
        changeset.modified.insert(NodeId(3), NodeId(7));
        changeset.new_modified.insert(NodeId(7), statement);

        let json = serde_json::to_value(&changeset).unwrap();
        assert!(json["added"].is_array());
        assert_eq!(json["added"][0]["uuid"], "u-1");
        assert_eq!(json["removed"], serde_json::json!([]));
        assert_eq!(json["modified"]["3"], 7);
        assert!(json["newModified"]["7"].is_object());
        assert_eq!(json["existingModified"], serde_json::json!({}));

        let back: Changeset = serde_json::from_value(json).unwrap();
        assert_eq!(back, changeset);
    }

    #[test]
    fn test_empty() {
        let mut changeset = Changeset::default();
        assert!(changeset.is_empty());
        changeset.modified.insert(NodeId(1), NodeId(2));
        assert!(changeset.has_changes());
    }
}
