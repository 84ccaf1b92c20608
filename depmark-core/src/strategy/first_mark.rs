//! Strategy that keeps the first cause of every mark.

use indexmap::IndexSet;

use crate::graph::{AnalysisContext, NodeRef, Reason};

use super::{LogVisitor, MarkStrategy, MarkTable, Provenance};

/// Records the first reason each node was marked.
///
/// Replaying the log gives exactly one incoming edge per marked node, so
/// the exported graph is a spanning forest rooted at the root reasons. This
/// answers "why is this node retained" with a single path.
pub struct FirstMarkLogStrategy<C: AnalysisContext> {
    marks: MarkTable<C, Provenance<C>>,
}

impl<C: AnalysisContext> Default for FirstMarkLogStrategy<C> {
    fn default() -> Self {
        Self {
            marks: MarkTable::new(),
        }
    }
}

impl<C: AnalysisContext> MarkStrategy<C> for FirstMarkLogStrategy<C> {
    fn mark_node(
        &mut self,
        node: &NodeRef<C>,
        reason_node1: Option<&NodeRef<C>>,
        reason_node2: Option<&NodeRef<C>>,
        reason: Reason,
    ) -> bool {
        if self.marks.contains(node) {
            return false;
        }
        self.marks
            .insert_once(node, Provenance::new(reason_node1, reason_node2, reason));
        true
    }

    fn is_marked(&self, node: &NodeRef<C>) -> bool {
        self.marks.contains(node)
    }

    fn replay(&self, marked_nodes: &[NodeRef<C>], visitor: &mut dyn LogVisitor<C>) {
        let mut roots: IndexSet<&str> = IndexSet::new();
        let mut pairs: IndexSet<(&NodeRef<C>, &NodeRef<C>)> = IndexSet::new();

        for node in marked_nodes {
            let Some(provenance) = self.marks.get(node) else {
                continue;
            };
            let first_sighting = match provenance {
                Provenance::Root(reason) => roots.insert(&**reason),
                Provenance::Edge { .. } => false,
                Provenance::Combined { first, second, .. } => pairs.insert((first, second)),
            };
            if first_sighting {
                provenance.replay_node(visitor);
            }
        }

        for node in marked_nodes {
            if let Some(provenance) = self.marks.get(node) {
                provenance.replay_edge(node, visitor);
            }
        }
    }
}
