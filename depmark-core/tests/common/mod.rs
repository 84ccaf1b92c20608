//! Rule-driven test graph.
//!
//! Nodes are identified by name and created on first lookup, the way a
//! compiler's node factory caches nodes by symbol. Edges are rules over
//! names, registered before the analysis starts.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use depmark_core::graph::{
    Analysis, AnalysisContext, CombinedDependencyListEntry, DeferredDependencies,
    DependencyAnalyzer, DependencyListEntry, DependencyNode, DynamicDependencyNode, NodeRef,
};
use depmark_core::strategy::MarkStrategy;
use indexmap::IndexMap;
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TestGraphError {
    #[error("malformed metadata for `{0}`")]
    Malformed(String),
}

type DynamicRule = Box<dyn Fn(&str, &str) -> Option<(String, String)> + Send + Sync>;

struct StaticRule {
    node: String,
    dependency: String,
    reason: String,
}

struct ConditionalRule {
    node: String,
    condition: String,
    dependency: String,
    reason: String,
}

#[derive(Default)]
pub struct TestGraph {
    nodes: Mutex<IndexMap<String, Arc<TestNode>>>,
    static_rules: Vec<StaticRule>,
    conditional_rules: Vec<ConditionalRule>,
    dynamic_rules: Vec<DynamicRule>,
    deferred: bool,
    retiring: bool,
    malformed: Vec<String>,
}

impl AnalysisContext for TestGraph {
    type Error = TestGraphError;
}

impl TestGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes start without dependencies; the dependency routine supplies them.
    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    /// Dynamic nodes stop scanning after their first call that finds
    /// something.
    pub fn retiring(mut self) -> Self {
        self.retiring = true;
        self
    }

    /// Dependency queries for `node` fail.
    pub fn malformed(mut self, node: &str) -> Self {
        self.malformed.push(node.to_string());
        self
    }

    pub fn add_static_rule(&mut self, node: &str, dependency: &str, reason: &str) {
        self.static_rules.push(StaticRule {
            node: node.to_string(),
            dependency: dependency.to_string(),
            reason: reason.to_string(),
        });
    }

    pub fn add_conditional_rule(
        &mut self,
        node: &str,
        condition: &str,
        dependency: &str,
        reason: &str,
    ) {
        self.conditional_rules.push(ConditionalRule {
            node: node.to_string(),
            condition: condition.to_string(),
            dependency: dependency.to_string(),
            reason: reason.to_string(),
        });
    }

    /// `rule(this, other)` returns the dependency name and reason produced
    /// when node `this` sees marked node `other`.
    pub fn add_dynamic_rule<F>(&mut self, rule: F)
    where
        F: Fn(&str, &str) -> Option<(String, String)> + Send + Sync + 'static,
    {
        self.dynamic_rules.push(Box::new(rule));
    }

    pub fn typed_node(&self, name: &str) -> Arc<TestNode> {
        let mut nodes = self.nodes.lock();
        if let Some(node) = nodes.get(name) {
            return node.clone();
        }
        let node = Arc::new(TestNode {
            name: name.to_string(),
            dynamic: !self.dynamic_rules.is_empty(),
            deferred: self.deferred.then(DeferredDependencies::new),
            marked: AtomicUsize::new(0),
            scans: AtomicUsize::new(0),
            retired: AtomicBool::new(false),
        });
        nodes.insert(name.to_string(), node.clone());
        node
    }

    pub fn node(&self, name: &str) -> NodeRef<TestGraph> {
        self.typed_node(name).into()
    }

    /// Times `on_marked` ran for `name`.
    pub fn mark_count(&self, name: &str) -> usize {
        self.typed_node(name).marked.load(Ordering::SeqCst)
    }

    /// Times `search_dynamic_dependencies` ran for `name`.
    pub fn scan_count(&self, name: &str) -> usize {
        self.typed_node(name).scans.load(Ordering::SeqCst)
    }

    /// Dependency routine: fills the deferred lists of every node in `batch`.
    pub fn compute_batch(&self, batch: &[NodeRef<TestGraph>]) -> Result<(), TestGraphError> {
        for node in batch {
            let typed = self.typed_node(&node.name(self));
            let Some(deferred) = &typed.deferred else {
                continue;
            };
            deferred.set(
                self.static_entries(&typed.name)?,
                self.conditional_entries(&typed.name)?,
            );
        }
        Ok(())
    }

    fn check_metadata(&self, name: &str) -> Result<(), TestGraphError> {
        if self.malformed.iter().any(|bad| bad == name) {
            return Err(TestGraphError::Malformed(name.to_string()));
        }
        Ok(())
    }

    fn static_entries(
        &self,
        name: &str,
    ) -> Result<Vec<DependencyListEntry<TestGraph>>, TestGraphError> {
        self.check_metadata(name)?;
        Ok(self
            .static_rules
            .iter()
            .filter(|rule| rule.node == name)
            .map(|rule| DependencyListEntry::new(self.node(&rule.dependency), rule.reason.clone()))
            .collect())
    }

    fn conditional_entries(
        &self,
        name: &str,
    ) -> Result<Vec<CombinedDependencyListEntry<TestGraph>>, TestGraphError> {
        self.check_metadata(name)?;
        Ok(self
            .conditional_rules
            .iter()
            .filter(|rule| rule.node == name)
            .map(|rule| {
                CombinedDependencyListEntry::new(
                    self.node(&rule.dependency),
                    self.node(&rule.condition),
                    rule.reason.clone(),
                )
            })
            .collect())
    }
}

pub struct TestNode {
    name: String,
    dynamic: bool,
    deferred: Option<DeferredDependencies<TestGraph>>,
    marked: AtomicUsize,
    scans: AtomicUsize,
    retired: AtomicBool,
}

impl DependencyNode<TestGraph> for TestNode {
    fn name(&self, _context: &TestGraph) -> String {
        self.name.clone()
    }

    fn static_dependencies_computed(&self) -> bool {
        self.deferred.as_ref().map_or(true, DeferredDependencies::is_computed)
    }

    fn static_dependencies(
        &self,
        context: &TestGraph,
    ) -> Result<Vec<DependencyListEntry<TestGraph>>, TestGraphError> {
        match &self.deferred {
            Some(deferred) => Ok(deferred.static_dependencies()),
            None => context.static_entries(&self.name),
        }
    }

    fn conditional_static_dependencies(
        &self,
        context: &TestGraph,
    ) -> Result<Vec<CombinedDependencyListEntry<TestGraph>>, TestGraphError> {
        match &self.deferred {
            Some(deferred) => Ok(deferred.conditional_dependencies()),
            None => context.conditional_entries(&self.name),
        }
    }

    fn on_marked(&self, _context: &TestGraph) {
        self.marked.fetch_add(1, Ordering::SeqCst);
    }

    fn as_dynamic(&self) -> Option<&dyn DynamicDependencyNode<TestGraph>> {
        if self.dynamic {
            Some(self)
        } else {
            None
        }
    }
}

impl DynamicDependencyNode<TestGraph> for TestNode {
    fn has_dynamic_dependencies(&self) -> bool {
        !self.retired.load(Ordering::SeqCst)
    }

    fn search_dynamic_dependencies(
        &self,
        marked_nodes: &[NodeRef<TestGraph>],
        first_node: usize,
        context: &TestGraph,
    ) -> Result<Vec<CombinedDependencyListEntry<TestGraph>>, TestGraphError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let mut found = Vec::new();
        for other in &marked_nodes[first_node..] {
            let other_name = other.name(context);
            for rule in &context.dynamic_rules {
                if let Some((dependency, reason)) = rule(&self.name, &other_name) {
                    found.push(CombinedDependencyListEntry::new(
                        context.node(&dependency),
                        other.clone(),
                        reason,
                    ));
                }
            }
        }
        if context.retiring && !found.is_empty() {
            self.retired.store(true, Ordering::SeqCst);
        }
        Ok(found)
    }
}

/// Analyze `graph` from `roots` with strategy `S`.
pub fn analyze<S>(
    graph: TestGraph,
    roots: &[&str],
) -> Result<DependencyAnalyzer<TestGraph, S>, TestGraphError>
where
    S: MarkStrategy<TestGraph>,
{
    let mut analyzer = DependencyAnalyzer::<TestGraph, S>::new(graph);
    analyzer.set_compute_dependency_routine(|batch, graph| graph.compute_batch(batch));
    for root in roots {
        let node = analyzer.context().node(root);
        analyzer.add_root(node, format!("root {root}"));
    }
    analyzer.compute_marked_nodes()?;
    Ok(analyzer)
}

/// Sorted names of the marked nodes.
pub fn marked_names<A>(analysis: &A) -> Vec<String>
where
    A: Analysis<TestGraph> + ?Sized,
{
    let mut names: Vec<_> = analysis
        .marked_node_list()
        .iter()
        .map(|node| node.name(analysis.context()))
        .collect();
    names.sort();
    names
}

pub fn names(list: &[&str]) -> Vec<String> {
    let mut names: Vec<_> = list.iter().map(|name| name.to_string()).collect();
    names.sort();
    names
}
