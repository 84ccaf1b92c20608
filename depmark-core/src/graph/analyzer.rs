//! Dependency Analyzer
//!
//! The analyzer computes the set of nodes reachable from a set of roots,
//! following three kinds of edges until nothing new gets marked.
//!
//! # Algorithm
//!
//! 1. Roots are marked, appended to the marked list and queued.
//! 2. Static phase: each queued node reports its static dependencies, which
//!    are marked, and its conditional dependencies. A conditional
//!    dependency whose condition is already marked is marked right away;
//!    otherwise it waits, keyed by the condition node, and fires the moment
//!    the condition gets marked.
//! 3. Dynamic phase: once the queue drains, every dynamically interesting
//!    node is shown the part of the marked list it has not seen yet and
//!    may produce more dependencies.
//! 4. Repeat until both phases mark nothing. If a phase-change hook is
//!    installed it then gets a chance to add roots, and marking resumes if
//!    any of them were new.
//!
//! Marking is monotonic and the node universe is finite, so the loop
//! terminates.
//!
//! # Failure
//!
//! Errors from dependency queries propagate out of
//! [`compute_marked_nodes`](DependencyAnalyzer::compute_marked_nodes)
//! unchanged and leave the analyzer unusable. Consistency violations, such
//! as reading results before convergence, panic.

use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::fmt;

use smallvec::SmallVec;
use tracing::{debug, debug_span, trace};

use super::node::{AnalysisContext, NodeRef, Reason};
use crate::strategy::{LogVisitor, MarkStrategy};

/// Batched dependency computation supplied by the embedder.
///
/// Called with marked nodes whose dependencies are not computed yet. Before
/// returning `Ok`, it must have made every one of them report
/// `static_dependencies_computed() == true`.
pub type ComputeDependencyRoutine<C> =
    Box<dyn FnMut(&[NodeRef<C>], &C) -> Result<(), <C as AnalysisContext>::Error> + Send>;

/// Called once for every newly marked node.
pub type NewMarkedNodeObserver<C> = Box<dyn FnMut(&NodeRef<C>) + Send>;

/// Called with an increasing phase number whenever marking reaches a
/// fixpoint. Returns extra roots, each with its reason.
pub type PhaseChangeHook<C> = Box<dyn FnMut(u32, &C) -> Vec<(NodeRef<C>, Reason)> + Send>;

/// Ordering applied to the final marked node list.
pub type ResultSorter<C> = Box<dyn Fn(&NodeRef<C>, &NodeRef<C>, &C) -> Ordering + Send>;

/// Object-safe view of an analyzer, independent of its mark strategy.
pub trait Analysis<C: AnalysisContext> {
    /// Get the analysis context.
    fn context(&self) -> &C;

    /// Mark `node` unconditionally.
    fn add_root(&mut self, node: NodeRef<C>, reason: Reason);

    /// Run marking to a fixpoint.
    fn compute_marked_nodes(&mut self) -> Result<(), C::Error>;

    /// The marked nodes, valid only after convergence.
    fn marked_node_list(&self) -> &[NodeRef<C>];

    /// Check whether `node` has been marked so far.
    fn is_marked(&self, node: &NodeRef<C>) -> bool;

    /// Replay recorded provenance for the converged marked list.
    fn replay(&self, visitor: &mut dyn LogVisitor<C>);

    /// Install the batched dependency computation.
    fn set_compute_dependency_routine(&mut self, routine: ComputeDependencyRoutine<C>);

    /// Install an observer called once per newly marked node.
    fn set_new_marked_node_observer(&mut self, observer: NewMarkedNodeObserver<C>);

    /// Install a hook that may add roots each time marking reaches a fixpoint.
    fn set_phase_change_hook(&mut self, hook: PhaseChangeHook<C>);

    /// Order the marked node list with `sorter` instead of mark order.
    fn set_result_sorter(&mut self, sorter: ResultSorter<C>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnalysisState {
    /// Marks were made since the last fixpoint (or none was ever computed).
    Unconverged,
    Converged,
    /// A dependency query failed; the analyzer must be discarded.
    Poisoned,
}

/// A conditional dependency waiting for its condition to be marked.
struct ConditionalEdge<C: AnalysisContext> {
    target: NodeRef<C>,
    owner: NodeRef<C>,
    reason: Reason,
}

/// Scan cursor of a dynamically interesting node into the marked list.
struct DynamicScanner<C: AnalysisContext> {
    node: NodeRef<C>,
    next: usize,
}

/// The fixpoint marking engine.
///
/// `C` is the embedder's context, `S` the [`MarkStrategy`] deciding how much
/// provenance is kept. One analyzer runs on one thread; independent
/// analyzers may run in parallel as long as they share no nodes.
pub struct DependencyAnalyzer<C: AnalysisContext, S: MarkStrategy<C>> {
    context: C,
    strategy: S,

    /// Every marked node, in the order it was marked. Append-only.
    marked_nodes: Vec<NodeRef<C>>,

    /// Marked nodes whose dependencies have not been processed.
    pending: VecDeque<NodeRef<C>>,

    /// Conditional dependencies keyed by their not-yet-marked condition.
    deferred_conditionals: HashMap<NodeRef<C>, SmallVec<[ConditionalEdge<C>; 4]>>,

    /// Conditional dependencies whose condition just got marked, with that
    /// condition node.
    ready_conditionals: Vec<(ConditionalEdge<C>, NodeRef<C>)>,

    dynamic_scanners: Vec<DynamicScanner<C>>,

    compute_dependency_routine: Option<ComputeDependencyRoutine<C>>,
    new_marked_node_observer: Option<NewMarkedNodeObserver<C>>,
    phase_change_hook: Option<PhaseChangeHook<C>>,
    result_sorter: Option<ResultSorter<C>>,

    /// Result snapshot taken at convergence, in sorter order if one is set.
    marked_node_list: Vec<NodeRef<C>>,
    phase: u32,
    state: AnalysisState,
}

impl<C: AnalysisContext, S: MarkStrategy<C>> DependencyAnalyzer<C, S> {
    /// Create an analyzer with no roots.
    pub fn new(context: C) -> Self {
        Self {
            context,
            strategy: S::default(),
            marked_nodes: Vec::new(),
            pending: VecDeque::new(),
            deferred_conditionals: HashMap::new(),
            ready_conditionals: Vec::new(),
            dynamic_scanners: Vec::new(),
            compute_dependency_routine: None,
            new_marked_node_observer: None,
            phase_change_hook: None,
            result_sorter: None,
            marked_node_list: Vec::new(),
            phase: 0,
            state: AnalysisState::Unconverged,
        }
    }

    /// Order [`marked_node_list`](Self::marked_node_list) with `sorter`
    /// instead of mark order.
    pub fn with_result_sorter<F>(mut self, sorter: F) -> Self
    where
        F: Fn(&NodeRef<C>, &NodeRef<C>, &C) -> Ordering + Send + 'static,
    {
        self.set_result_sorter(Box::new(sorter));
        self
    }

    /// Order [`marked_node_list`](Self::marked_node_list) with `sorter`.
    ///
    /// An already converged list is re-sorted right away.
    pub fn set_result_sorter(&mut self, sorter: ResultSorter<C>) {
        self.result_sorter = Some(sorter);
        if self.state == AnalysisState::Converged {
            self.sort_results();
        }
    }

    /// Install the batched dependency computation.
    pub fn set_compute_dependency_routine<F>(&mut self, routine: F)
    where
        F: FnMut(&[NodeRef<C>], &C) -> Result<(), C::Error> + Send + 'static,
    {
        self.compute_dependency_routine = Some(Box::new(routine));
    }

    /// Install an observer called once per newly marked node.
    pub fn set_new_marked_node_observer<F>(&mut self, observer: F)
    where
        F: FnMut(&NodeRef<C>) + Send + 'static,
    {
        self.new_marked_node_observer = Some(Box::new(observer));
    }

    /// Install a hook that may add roots each time marking reaches a
    /// fixpoint.
    pub fn set_phase_change_hook<F>(&mut self, hook: F)
    where
        F: FnMut(u32, &C) -> Vec<(NodeRef<C>, Reason)> + Send + 'static,
    {
        self.phase_change_hook = Some(Box::new(hook));
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Mark `node` as a root.
    ///
    /// Roots may also be added after a run has converged; the next call to
    /// [`compute_marked_nodes`](Self::compute_marked_nodes) resumes from
    /// the existing marks.
    pub fn add_root(&mut self, node: impl Into<NodeRef<C>>, reason: impl Into<Reason>) {
        self.assert_usable();
        let node = node.into();
        let reason = reason.into();
        trace!(node = %node.name(&self.context), reason = %reason, "adding root");
        self.mark(node, None, None, reason);
    }

    /// Check whether `node` has been marked so far.
    pub fn is_marked(&self, node: &NodeRef<C>) -> bool {
        self.strategy.is_marked(node)
    }

    /// Run marking to a fixpoint.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a dependency query or by the
    /// dependency routine. The analyzer is unusable afterwards.
    pub fn compute_marked_nodes(&mut self) -> Result<(), C::Error> {
        self.assert_usable();
        if self.state == AnalysisState::Converged {
            return Ok(());
        }

        let _span = debug_span!("compute_marked_nodes").entered();
        let result = self.run_to_fixpoint();
        if result.is_err() {
            debug!(marked = self.marked_nodes.len(), "dependency analysis failed");
            self.state = AnalysisState::Poisoned;
        }
        result
    }

    /// The marked nodes after convergence.
    ///
    /// # Panics
    ///
    /// Panics if called before [`compute_marked_nodes`](Self::compute_marked_nodes)
    /// converged, or after it failed.
    pub fn marked_node_list(&self) -> &[NodeRef<C>] {
        self.assert_usable();
        assert!(
            self.state == AnalysisState::Converged,
            "marked node list read before dependency analysis converged"
        );
        &self.marked_node_list
    }

    /// Replay the strategy's provenance log over the marked node list.
    pub fn replay(&self, visitor: &mut dyn LogVisitor<C>) {
        self.strategy.replay(self.marked_node_list(), visitor);
    }

    fn run_to_fixpoint(&mut self) -> Result<(), C::Error> {
        loop {
            self.process_pending()?;
            if self.scan_dynamic_dependencies()? {
                continue;
            }

            let Some(hook) = self.phase_change_hook.as_mut() else {
                break;
            };
            self.phase += 1;
            let roots = hook(self.phase, &self.context);
            debug!(phase = self.phase, roots = roots.len(), "dependency phase change");

            let mut added = false;
            for (node, reason) in roots {
                added |= self.mark(node, None, None, reason);
            }
            if !added {
                break;
            }
        }

        self.finish();
        Ok(())
    }

    /// Static phase: drain the queue of marked, unprocessed nodes.
    fn process_pending(&mut self) -> Result<(), C::Error> {
        while let Some(node) = self.pending.pop_front() {
            if !node.static_dependencies_computed() {
                self.compute_dependencies(&node)?;
            }

            for entry in node.static_dependencies(&self.context)? {
                self.mark(entry.node, Some(&node), None, entry.reason);
            }

            for entry in node.conditional_static_dependencies(&self.context)? {
                if self.strategy.is_marked(&entry.other_reason_node) {
                    self.mark(
                        entry.node,
                        Some(&node),
                        Some(&entry.other_reason_node),
                        entry.reason,
                    );
                } else {
                    self.deferred_conditionals
                        .entry(entry.other_reason_node)
                        .or_default()
                        .push(ConditionalEdge {
                            target: entry.node,
                            owner: node.clone(),
                            reason: entry.reason,
                        });
                }
            }
        }
        Ok(())
    }

    /// Hand `node`, and every other queued node still missing its
    /// dependencies, to the dependency routine.
    fn compute_dependencies(&mut self, node: &NodeRef<C>) -> Result<(), C::Error> {
        let mut batch = vec![node.clone()];
        batch.extend(
            self.pending
                .iter()
                .filter(|queued| !queued.static_dependencies_computed())
                .cloned(),
        );

        let Some(routine) = self.compute_dependency_routine.as_mut() else {
            panic!(
                "dependencies of `{}` are not computed and no dependency routine is installed",
                node.name(&self.context)
            );
        };
        debug!(batch = batch.len(), "computing deferred dependencies");
        routine(&batch, &self.context)?;

        for computed in &batch {
            assert!(
                computed.static_dependencies_computed(),
                "dependency routine left dependencies of `{}` uncomputed",
                computed.name(&self.context)
            );
        }
        Ok(())
    }

    /// Dynamic phase: present each interesting node with the marked nodes
    /// it has not seen. Returns whether anything new was marked.
    fn scan_dynamic_dependencies(&mut self) -> Result<bool, C::Error> {
        let marked_before = self.marked_nodes.len();

        // Scanners registered during this pass are visited in this pass too.
        let mut index = 0;
        while index < self.dynamic_scanners.len() {
            let scanner = &self.dynamic_scanners[index];
            let node = scanner.node.clone();
            let first_node = scanner.next;
            index += 1;

            // The length is re-read for every scanner: marks made for an
            // earlier scanner extend what later ones get to see.
            let visible = self.marked_nodes.len();
            if first_node >= visible {
                continue;
            }
            let Some(dynamic) = node.as_dynamic() else {
                continue;
            };
            if !dynamic.has_dynamic_dependencies() {
                continue;
            }

            let found =
                dynamic.search_dynamic_dependencies(&self.marked_nodes, first_node, &self.context)?;
            // Nodes marked below were not presented in this call, so the
            // cursor stops at what was visible.
            self.dynamic_scanners[index - 1].next = visible;

            for entry in found {
                self.mark(
                    entry.node,
                    Some(&node),
                    Some(&entry.other_reason_node),
                    entry.reason,
                );
            }
        }

        let grew = self.marked_nodes.len() > marked_before;
        if grew {
            debug!(
                new = self.marked_nodes.len() - marked_before,
                "dynamic dependencies marked new nodes"
            );
        }
        Ok(grew)
    }

    /// Mark a node and fire any conditional dependencies it unblocks.
    ///
    /// Returns `true` iff `node` itself was newly marked.
    pub(crate) fn mark(
        &mut self,
        node: NodeRef<C>,
        reason_node1: Option<&NodeRef<C>>,
        reason_node2: Option<&NodeRef<C>>,
        reason: Reason,
    ) -> bool {
        let newly_marked = self.mark_one(node, reason_node1, reason_node2, reason);

        while let Some((edge, condition)) = self.ready_conditionals.pop() {
            trace!(
                dependency = %edge.target.name(&self.context),
                condition = %condition.name(&self.context),
                "conditional dependency fired"
            );
            self.mark_one(edge.target, Some(&edge.owner), Some(&condition), edge.reason);
        }

        newly_marked
    }

    fn mark_one(
        &mut self,
        node: NodeRef<C>,
        reason_node1: Option<&NodeRef<C>>,
        reason_node2: Option<&NodeRef<C>>,
        reason: Reason,
    ) -> bool {
        if !self
            .strategy
            .mark_node(&node, reason_node1, reason_node2, reason)
        {
            return false;
        }
        trace!(
            node = %node.name(&self.context),
            index = self.marked_nodes.len(),
            "marked"
        );

        self.state = AnalysisState::Unconverged;
        self.marked_nodes.push(node.clone());
        self.pending.push_back(node.clone());

        node.on_marked(&self.context);
        if let Some(observer) = self.new_marked_node_observer.as_mut() {
            observer(&node);
        }

        if node.is_dynamically_interesting() {
            self.dynamic_scanners.push(DynamicScanner {
                node: node.clone(),
                next: 0,
            });
        }

        if let Some(waiting) = self.deferred_conditionals.remove(&node) {
            self.ready_conditionals
                .extend(waiting.into_iter().map(|edge| (edge, node.clone())));
        }
        true
    }

    fn finish(&mut self) {
        self.marked_node_list = self.marked_nodes.clone();
        self.sort_results();
        self.state = AnalysisState::Converged;
        debug!(
            marked = self.marked_nodes.len(),
            waiting_conditionals = self.deferred_conditionals.len(),
            phase = self.phase,
            "dependency analysis converged"
        );
    }

    fn sort_results(&mut self) {
        if let Some(sorter) = &self.result_sorter {
            let context = &self.context;
            self.marked_node_list.sort_by(|a, b| sorter(a, b, context));
        }
    }

    fn assert_usable(&self) {
        assert!(
            self.state != AnalysisState::Poisoned,
            "dependency analyzer used after a failed run"
        );
    }
}

impl<C: AnalysisContext, S: MarkStrategy<C>> Analysis<C> for DependencyAnalyzer<C, S> {
    fn context(&self) -> &C {
        &self.context
    }

    fn add_root(&mut self, node: NodeRef<C>, reason: Reason) {
        DependencyAnalyzer::add_root(self, node, reason);
    }

    fn compute_marked_nodes(&mut self) -> Result<(), C::Error> {
        DependencyAnalyzer::compute_marked_nodes(self)
    }

    fn marked_node_list(&self) -> &[NodeRef<C>] {
        DependencyAnalyzer::marked_node_list(self)
    }

    fn is_marked(&self, node: &NodeRef<C>) -> bool {
        self.strategy.is_marked(node)
    }

    fn replay(&self, visitor: &mut dyn LogVisitor<C>) {
        DependencyAnalyzer::replay(self, visitor);
    }

    fn set_compute_dependency_routine(&mut self, routine: ComputeDependencyRoutine<C>) {
        self.compute_dependency_routine = Some(routine);
    }

    fn set_new_marked_node_observer(&mut self, observer: NewMarkedNodeObserver<C>) {
        self.new_marked_node_observer = Some(observer);
    }

    fn set_phase_change_hook(&mut self, hook: PhaseChangeHook<C>) {
        self.phase_change_hook = Some(hook);
    }

    fn set_result_sorter(&mut self, sorter: ResultSorter<C>) {
        DependencyAnalyzer::set_result_sorter(self, sorter);
    }
}

impl<C: AnalysisContext, S: MarkStrategy<C>> fmt::Debug for DependencyAnalyzer<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyAnalyzer")
            .field("marked", &self.marked_nodes.len())
            .field("pending", &self.pending.len())
            .field("waiting_conditions", &self.deferred_conditionals.len())
            .field("dynamic_scanners", &self.dynamic_scanners.len())
            .field("phase", &self.phase)
            .field("state", &self.state)
            .finish()
    }
}
