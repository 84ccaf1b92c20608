//! Strategy that keeps only the mark itself.

use crate::graph::{AnalysisContext, NodeRef, Reason};

use super::{LogVisitor, MarkStrategy, MarkTable};

/// Marks nodes without recording why.
///
/// This is the strategy for production runs, where only the final set of
/// reachable nodes matters.
pub struct NoLogStrategy<C: AnalysisContext> {
    marks: MarkTable<C, ()>,
}

impl<C: AnalysisContext> Default for NoLogStrategy<C> {
    fn default() -> Self {
        Self {
            marks: MarkTable::new(),
        }
    }
}

impl<C: AnalysisContext> MarkStrategy<C> for NoLogStrategy<C> {
    fn mark_node(
        &mut self,
        node: &NodeRef<C>,
        _reason_node1: Option<&NodeRef<C>>,
        _reason_node2: Option<&NodeRef<C>>,
        _reason: Reason,
    ) -> bool {
        if self.marks.contains(node) {
            return false;
        }
        self.marks.insert_once(node, ());
        true
    }

    fn is_marked(&self, node: &NodeRef<C>) -> bool {
        self.marks.contains(node)
    }

    fn replay(&self, _marked_nodes: &[NodeRef<C>], _visitor: &mut dyn LogVisitor<C>) {}
}
