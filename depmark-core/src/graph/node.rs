//! Graph Nodes
//!
//! This module defines the contract every node in the dependency graph
//! implements, and the identity handle the analyzer uses to track nodes.
//!
//! # Capabilities
//!
//! Every node has static dependencies (possibly empty) and may have
//! conditional ones. Nodes that want to inspect the growing list of marked
//! nodes opt in through [`DependencyNode::as_dynamic`], so the common node
//! kinds never pay for the dynamic scan.

use std::borrow::Cow;
use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// Human-readable explanation attached to an edge or a root.
///
/// Reasons only feed diagnostics and graph export; they never change which
/// nodes end up marked.
pub type Reason = Cow<'static, str>;

/// The embedder-supplied value threaded through every dependency query.
///
/// The analyzer never inspects the context. The only thing it needs from it
/// is the embedder's error type, which every fallible query returns and which
/// propagates out of the analysis unchanged.
pub trait AnalysisContext {
    /// Error raised by the embedder while computing dependencies.
    type Error;
}

impl AnalysisContext for () {
    type Error = Infallible;
}

/// A participant in dependency analysis.
///
/// Implementations are owned by the embedder (usually a cache keyed by a
/// symbol name) and shared with the analyzer through [`NodeRef`].
pub trait DependencyNode<C: AnalysisContext>: Send + Sync {
    /// Diagnostic name, used for labels in graph export.
    fn name(&self, context: &C) -> String;

    /// Whether the static and conditional dependency lists are available.
    ///
    /// Nodes whose dependencies are expensive to compute return `false`
    /// until the analyzer's dependency routine has filled them in.
    fn static_dependencies_computed(&self) -> bool {
        true
    }

    /// Unconditional dependencies: if this node is marked, each target is.
    fn static_dependencies(&self, context: &C) -> Result<Vec<DependencyListEntry<C>>, C::Error>;

    /// Dependencies that apply only once `other_reason_node` is also marked.
    fn conditional_static_dependencies(
        &self,
        _context: &C,
    ) -> Result<Vec<CombinedDependencyListEntry<C>>, C::Error> {
        Ok(Vec::new())
    }

    /// Called exactly once, when the node first becomes marked.
    ///
    /// Must not rely on the node's dependencies having been computed.
    fn on_marked(&self, _context: &C) {}

    /// The dynamic-dependency capability, if this node has one.
    fn as_dynamic(&self) -> Option<&dyn DynamicDependencyNode<C>> {
        None
    }
}

/// Optional capability for nodes whose dependencies are discovered by
/// looking at other marked nodes.
pub trait DynamicDependencyNode<C: AnalysisContext>: Send + Sync {
    /// Whether another scan could still produce anything.
    ///
    /// A node may return `false` once it has produced all of its dynamic
    /// dependencies; the analyzer then stops presenting nodes to it.
    fn has_dynamic_dependencies(&self) -> bool {
        true
    }

    /// Inspect `marked_nodes[first_node..]` and return any new dependencies.
    ///
    /// Entries before `first_node` were presented in an earlier call. The
    /// slice grows between calls and only ever gets appended to.
    fn search_dynamic_dependencies(
        &self,
        marked_nodes: &[NodeRef<C>],
        first_node: usize,
        context: &C,
    ) -> Result<Vec<CombinedDependencyListEntry<C>>, C::Error>;
}

/// Shared handle to a dependency node.
///
/// Equality and hashing are by identity: two handles are equal only if they
/// point at the same node instance, no matter what the nodes contain.
pub struct NodeRef<C: AnalysisContext>(Arc<dyn DependencyNode<C>>);

impl<C: AnalysisContext> NodeRef<C> {
    /// Wrap a freshly created node.
    pub fn new<N>(node: N) -> Self
    where
        N: DependencyNode<C> + 'static,
    {
        Self(Arc::new(node))
    }

    /// Wrap a node that is already shared as a trait object.
    pub fn from_shared(node: Arc<dyn DependencyNode<C>>) -> Self {
        Self(node)
    }

    /// Get the underlying shared node.
    pub fn as_arc(&self) -> &Arc<dyn DependencyNode<C>> {
        &self.0
    }

    /// Whether this node opted into dynamic dependency analysis.
    pub fn is_dynamically_interesting(&self) -> bool {
        self.0.as_dynamic().is_some()
    }

    fn address(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl<C: AnalysisContext> Clone for NodeRef<C> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<C: AnalysisContext> PartialEq for NodeRef<C> {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl<C: AnalysisContext> Eq for NodeRef<C> {}

impl<C: AnalysisContext> Hash for NodeRef<C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl<C: AnalysisContext> Deref for NodeRef<C> {
    type Target = dyn DependencyNode<C>;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl<C: AnalysisContext> fmt::Debug for NodeRef<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef({:p})", self.address())
    }
}

impl<C, N> From<Arc<N>> for NodeRef<C>
where
    C: AnalysisContext,
    N: DependencyNode<C> + 'static,
{
    fn from(node: Arc<N>) -> Self {
        Self(node)
    }
}

/// An unconditional dependency on `node`.
pub struct DependencyListEntry<C: AnalysisContext> {
    pub node: NodeRef<C>,
    pub reason: Reason,
}

impl<C: AnalysisContext> DependencyListEntry<C> {
    pub fn new(node: impl Into<NodeRef<C>>, reason: impl Into<Reason>) -> Self {
        Self {
            node: node.into(),
            reason: reason.into(),
        }
    }
}

impl<C: AnalysisContext> Clone for DependencyListEntry<C> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            reason: self.reason.clone(),
        }
    }
}

impl<C: AnalysisContext> fmt::Debug for DependencyListEntry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyListEntry")
            .field("node", &self.node)
            .field("reason", &self.reason)
            .finish()
    }
}

/// A dependency on `node` attributed to two causes.
///
/// For conditional dependencies `other_reason_node` is the condition: the
/// target is marked once both the owning node and the condition are marked.
/// For dynamic dependencies it is the marked node whose presence produced
/// the dependency.
pub struct CombinedDependencyListEntry<C: AnalysisContext> {
    pub node: NodeRef<C>,
    pub other_reason_node: NodeRef<C>,
    pub reason: Reason,
}

impl<C: AnalysisContext> CombinedDependencyListEntry<C> {
    pub fn new(
        node: impl Into<NodeRef<C>>,
        other_reason_node: impl Into<NodeRef<C>>,
        reason: impl Into<Reason>,
    ) -> Self {
        Self {
            node: node.into(),
            other_reason_node: other_reason_node.into(),
            reason: reason.into(),
        }
    }
}

impl<C: AnalysisContext> Clone for CombinedDependencyListEntry<C> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            other_reason_node: self.other_reason_node.clone(),
            reason: self.reason.clone(),
        }
    }
}

impl<C: AnalysisContext> fmt::Debug for CombinedDependencyListEntry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombinedDependencyListEntry")
            .field("node", &self.node)
            .field("other_reason_node", &self.other_reason_node)
            .field("reason", &self.reason)
            .finish()
    }
}
