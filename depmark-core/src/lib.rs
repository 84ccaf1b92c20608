//! Depmark Core
//!
//! This crate provides the dependency-marking engine used by ahead-of-time
//! compilation pipelines to find the minimal set of artifacts (methods,
//! types, data blobs) reachable from a program's roots.
//! It implements:
//!
//! - A fixpoint analyzer over static, conditional, and dynamic edges
//! - Pluggable mark strategies trading memory for provenance detail
//! - Graph export of the recorded provenance for visualization tools
//!
//! The engine does not know what a node represents. The embedder supplies
//! nodes, answers their dependency queries, and owns their lifetime.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: The node contract and the dependency analyzer
//! - `strategy`: Mark strategies and the replay visitor
//! - `export`: Graph documents, DGML and JSON output
//!
//! # Example
//!
//! ```rust,ignore
//! use depmark_core::graph::DependencyAnalyzer;
//! use depmark_core::strategy::FirstMarkLogStrategy;
//! use depmark_core::export::GraphDocument;
//!
//! let mut analyzer = DependencyAnalyzer::<_, FirstMarkLogStrategy<_>>::new(factory);
//! analyzer.add_root(factory.method("Main"), "Main method");
//! analyzer.set_compute_dependency_routine(|batch, factory| factory.compile(batch));
//! analyzer.compute_marked_nodes()?;
//!
//! for node in analyzer.marked_node_list() {
//!     emit(node);
//! }
//!
//! GraphDocument::build(&analyzer).write_dgml(File::create("deps.dgml")?)?;
//! ```

pub mod error;
pub mod export;
pub mod graph;
pub mod strategy;

pub use error::{ExportError, ParseTrackingLevelError};
pub use export::GraphDocument;
pub use graph::{
    Analysis, AnalysisContext, CombinedDependencyListEntry, DeferredDependencies,
    DependencyAnalyzer, DependencyListEntry, DependencyNode, DynamicDependencyNode, NodeRef,
    Reason,
};
pub use strategy::{
    DependencyTrackingLevel, FirstMarkLogStrategy, FullGraphLogStrategy, LogVisitor,
    MarkStrategy, NoLogStrategy,
};
