//! Strategy that keeps every cause of every mark.

use indexmap::IndexSet;
use smallvec::SmallVec;

use crate::graph::{AnalysisContext, NodeRef, Reason};

use super::{LogVisitor, MarkStrategy, MarkTable, Provenance};

type MarkLog<C> = SmallVec<[Provenance<C>; 2]>;

/// Records every reason a node was marked, including repeat marks.
///
/// The replay reconstructs the complete causality multigraph, at the cost
/// of retaining every edge the analysis walked.
pub struct FullGraphLogStrategy<C: AnalysisContext> {
    marks: MarkTable<C, MarkLog<C>>,
}

impl<C: AnalysisContext> Default for FullGraphLogStrategy<C> {
    fn default() -> Self {
        Self {
            marks: MarkTable::new(),
        }
    }
}

impl<C: AnalysisContext> MarkStrategy<C> for FullGraphLogStrategy<C> {
    fn mark_node(
        &mut self,
        node: &NodeRef<C>,
        reason_node1: Option<&NodeRef<C>>,
        reason_node2: Option<&NodeRef<C>>,
        reason: Reason,
    ) -> bool {
        let provenance = Provenance::new(reason_node1, reason_node2, reason);
        match self.marks.get_mut(node) {
            Some(log) => {
                log.push(provenance);
                false
            }
            None => {
                let mut log = MarkLog::new();
                log.push(provenance);
                self.marks.insert_once(node, log);
                true
            }
        }
    }

    fn is_marked(&self, node: &NodeRef<C>) -> bool {
        self.marks.contains(node)
    }

    fn replay(&self, marked_nodes: &[NodeRef<C>], visitor: &mut dyn LogVisitor<C>) {
        let mut roots: IndexSet<&str> = IndexSet::new();
        let mut pairs: IndexSet<(&NodeRef<C>, &NodeRef<C>)> = IndexSet::new();

        for node in marked_nodes {
            let Some(log) = self.marks.get(node) else {
                continue;
            };
            for provenance in log {
                let first_sighting = match provenance {
                    Provenance::Root(reason) => roots.insert(&**reason),
                    Provenance::Edge { .. } => false,
                    Provenance::Combined { first, second, .. } => pairs.insert((first, second)),
                };
                if first_sighting {
                    provenance.replay_node(visitor);
                }
            }
        }

        for node in marked_nodes {
            let Some(log) = self.marks.get(node) else {
                continue;
            };
            for provenance in log {
                provenance.replay_edge(node, visitor);
            }
        }
    }
}
