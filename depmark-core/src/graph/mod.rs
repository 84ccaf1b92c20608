//! Dependency Graph
//!
//! This module implements the marking engine that computes which nodes of
//! a program (methods, types, data blobs) are reachable from a set of roots.
//!
//! # Overview
//!
//! The graph is never stored as a whole. Nodes are supplied by the embedder
//! and report their own outgoing edges on demand:
//!
//! - Static edges: if the node is marked, the target is marked.
//! - Conditional edges: the target is marked once both the node and a
//!   second, condition node are marked, in either order.
//! - Dynamic edges: discovered by a node looking at the list of marked
//!   nodes as it grows.
//!
//! # Design Decisions
//!
//! 1. Node identity is pointer identity. Two nodes with equal contents are
//!    still different nodes.
//!
//! 2. Marks live in a table owned by the mark strategy, not in the nodes,
//!    so node types carry no strategy-specific state.
//!
//! 3. The marked list is append-only. Dynamic scanners keep a cursor into
//!    it and are shown each marked node exactly once.

mod analyzer;
mod deferred;
#[cfg(test)]
pub(crate) mod fixture;
mod node;

pub use analyzer::{
    Analysis, ComputeDependencyRoutine, DependencyAnalyzer, NewMarkedNodeObserver, PhaseChangeHook,
    ResultSorter,
};
pub use deferred::DeferredDependencies;
pub use node::{
    AnalysisContext, CombinedDependencyListEntry, DependencyListEntry, DependencyNode,
    DynamicDependencyNode, NodeRef, Reason,
};
