//! Mark Strategies
//!
//! A mark strategy decides how much provenance is kept when a node is
//! marked. All strategies mark exactly the same nodes for the same graph;
//! they differ only in what they can later replay for graph export.
//!
//! - [`NoLogStrategy`] keeps nothing beyond the mark itself.
//! - [`FirstMarkLogStrategy`] keeps the first cause of each mark, which
//!   yields one explanation path per node.
//! - [`FullGraphLogStrategy`] keeps every cause ever seen, including marks
//!   of nodes that were already marked.
//!
//! Mark payloads live in a [`MarkTable`] owned by the strategy, keyed by
//! node identity, so node implementations never carry strategy-specific
//! state.

mod first_mark;
mod full_log;
mod level;
mod no_log;

use std::fmt;

use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::graph::{AnalysisContext, NodeRef, Reason};

pub use first_mark::FirstMarkLogStrategy;
pub use full_log::FullGraphLogStrategy;
pub use level::DependencyTrackingLevel;
pub use no_log::NoLogStrategy;

/// Policy for recording why nodes were marked.
pub trait MarkStrategy<C: AnalysisContext>: Default {
    /// Mark `node`, recording the cause as the strategy sees fit.
    ///
    /// Returns `true` iff the node was not marked before. Marking an
    /// already-marked node never changes the marked set.
    fn mark_node(
        &mut self,
        node: &NodeRef<C>,
        reason_node1: Option<&NodeRef<C>>,
        reason_node2: Option<&NodeRef<C>>,
        reason: Reason,
    ) -> bool;

    /// Check whether `node` has been marked.
    fn is_marked(&self, node: &NodeRef<C>) -> bool;

    /// Replay recorded provenance for the given marked nodes.
    ///
    /// Synthetic nodes (roots and combined pairs) are visited before any
    /// edge that refers to them.
    fn replay(&self, marked_nodes: &[NodeRef<C>], visitor: &mut dyn LogVisitor<C>);
}

/// Receiver of replayed provenance.
pub trait LogVisitor<C: AnalysisContext> {
    /// A synthetic node standing for a root reason.
    fn visit_root(&mut self, reason: &str);

    /// A synthetic node standing for the pair `(first, second)`.
    fn visit_combined_node(&mut self, first: &NodeRef<C>, second: &NodeRef<C>);

    /// `target` was marked because of `source`.
    fn visit_edge(&mut self, source: &NodeRef<C>, target: &NodeRef<C>, reason: &str);

    /// `target` was marked as a root.
    fn visit_root_edge(&mut self, root_reason: &str, target: &NodeRef<C>);

    /// `target` was marked because of the pair `(first, second)`.
    fn visit_combined_edge(
        &mut self,
        first: &NodeRef<C>,
        second: &NodeRef<C>,
        target: &NodeRef<C>,
        reason: &str,
    );
}

/// Node-identity keyed storage for mark payloads.
///
/// Each slot is written once; the payload may be updated afterwards, but
/// setting a slot that already exists is a consistency violation.
pub struct MarkTable<C: AnalysisContext, M> {
    slots: IndexMap<NodeRef<C>, M>,
}

impl<C: AnalysisContext, M> MarkTable<C, M> {
    pub fn new() -> Self {
        Self {
            slots: IndexMap::new(),
        }
    }

    pub fn contains(&self, node: &NodeRef<C>) -> bool {
        self.slots.contains_key(node)
    }

    pub fn get(&self, node: &NodeRef<C>) -> Option<&M> {
        self.slots.get(node)
    }

    pub fn get_mut(&mut self, node: &NodeRef<C>) -> Option<&mut M> {
        self.slots.get_mut(node)
    }

    /// Set the slot for `node`.
    ///
    /// # Panics
    ///
    /// Panics if the slot is already set.
    pub fn insert_once(&mut self, node: &NodeRef<C>, mark: M) {
        match self.slots.entry(node.clone()) {
            Entry::Occupied(_) => panic!("mark slot of {node:?} was already set"),
            Entry::Vacant(slot) => {
                slot.insert(mark);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<C: AnalysisContext, M> Default for MarkTable<C, M> {
    fn default() -> Self {
        Self::new()
    }
}

/// One recorded cause of a mark.
pub(crate) enum Provenance<C: AnalysisContext> {
    Root(Reason),
    Edge {
        source: NodeRef<C>,
        reason: Reason,
    },
    Combined {
        first: NodeRef<C>,
        second: NodeRef<C>,
        reason: Reason,
    },
}

impl<C: AnalysisContext> Provenance<C> {
    pub(crate) fn new(
        reason_node1: Option<&NodeRef<C>>,
        reason_node2: Option<&NodeRef<C>>,
        reason: Reason,
    ) -> Self {
        match (reason_node1, reason_node2) {
            (None, None) => Provenance::Root(reason),
            (Some(source), None) | (None, Some(source)) => Provenance::Edge {
                source: source.clone(),
                reason,
            },
            (Some(first), Some(second)) => Provenance::Combined {
                first: first.clone(),
                second: second.clone(),
                reason,
            },
        }
    }

    /// Visit the synthetic node this cause needs, if any.
    pub(crate) fn replay_node(&self, visitor: &mut dyn LogVisitor<C>) {
        match self {
            Provenance::Root(reason) => visitor.visit_root(reason),
            Provenance::Edge { .. } => {}
            Provenance::Combined { first, second, .. } => {
                visitor.visit_combined_node(first, second)
            }
        }
    }

    pub(crate) fn replay_edge(&self, target: &NodeRef<C>, visitor: &mut dyn LogVisitor<C>) {
        match self {
            Provenance::Root(reason) => visitor.visit_root_edge(reason, target),
            Provenance::Edge { source, reason } => visitor.visit_edge(source, target, reason),
            Provenance::Combined {
                first,
                second,
                reason,
            } => visitor.visit_combined_edge(first, second, target, reason),
        }
    }
}

impl<C: AnalysisContext> fmt::Debug for Provenance<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Root(reason) => f.debug_tuple("Root").field(reason).finish(),
            Provenance::Edge { source, reason } => f
                .debug_struct("Edge")
                .field("source", source)
                .field("reason", reason)
                .finish(),
            Provenance::Combined {
                first,
                second,
                reason,
            } => f
                .debug_struct("Combined")
                .field("first", first)
                .field("second", second)
                .field("reason", reason)
                .finish(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixture::Graph;

    #[test]
    fn mark_table_sets_slots_once() {
        let graph = Graph::new();
        let mut table = MarkTable::<Graph, u32>::new();
        let a = graph.node("a");

        assert!(!table.contains(&a));
        table.insert_once(&a, 1);
        assert!(table.contains(&a));
        assert_eq!(table.get(&a), Some(&1));

        *table.get_mut(&a).unwrap() += 1;
        assert_eq!(table.get(&a), Some(&2));
        assert_eq!(table.len(), 1);
    }

    #[test]
    #[should_panic(expected = "already set")]
    fn mark_table_rejects_second_write() {
        let graph = Graph::new();
        let mut table = MarkTable::<Graph, ()>::new();
        let a = graph.node("a");
        table.insert_once(&a, ());
        table.insert_once(&a, ());
    }

    #[test]
    fn provenance_classifies_causes() {
        let graph = Graph::new();
        let a = graph.node("a");
        let b = graph.node("b");

        assert!(matches!(Provenance::<Graph>::new(None, None, "root".into()), Provenance::Root(_)));
        assert!(matches!(Provenance::new(Some(&a), None, "edge".into()), Provenance::Edge { .. }));
        assert!(matches!(
            Provenance::new(Some(&a), Some(&b), "pair".into()),
            Provenance::Combined { .. }
        ));
    }
}
