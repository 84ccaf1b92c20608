//! Deferred dependency lists.
//!
//! Nodes whose dependencies come from expensive work (compiling a method
//! body, reading metadata) cannot answer dependency queries up front. They
//! report [`static_dependencies_computed`] as `false`, and the
//! analyzer hands batches of them to the embedder's dependency routine,
//! which fills a [`DeferredDependencies`] cell for each.
//!
//! [`static_dependencies_computed`]: super::DependencyNode::static_dependencies_computed

use std::fmt;

use parking_lot::RwLock;

use super::node::{AnalysisContext, CombinedDependencyListEntry, DependencyListEntry};

struct ComputedDependencies<C: AnalysisContext> {
    static_dependencies: Vec<DependencyListEntry<C>>,
    conditional_dependencies: Vec<CombinedDependencyListEntry<C>>,
}

/// Write-once storage for a node's static and conditional dependencies.
pub struct DeferredDependencies<C: AnalysisContext> {
    lists: RwLock<Option<ComputedDependencies<C>>>,
}

impl<C: AnalysisContext> DeferredDependencies<C> {
    /// Create an empty cell.
    pub fn new() -> Self {
        Self {
            lists: RwLock::new(None),
        }
    }

    /// Check whether the lists have been supplied.
    pub fn is_computed(&self) -> bool {
        self.lists.read().is_some()
    }

    /// Supply the lists.
    ///
    /// # Panics
    ///
    /// Panics if the lists were already supplied.
    pub fn set(
        &self,
        static_dependencies: Vec<DependencyListEntry<C>>,
        conditional_dependencies: Vec<CombinedDependencyListEntry<C>>,
    ) {
        let mut lists = self.lists.write();
        assert!(
            lists.is_none(),
            "deferred dependencies were computed more than once"
        );
        *lists = Some(ComputedDependencies {
            static_dependencies,
            conditional_dependencies,
        });
    }

    /// Get the static dependencies.
    ///
    /// # Panics
    ///
    /// Panics if the lists have not been supplied yet.
    pub fn static_dependencies(&self) -> Vec<DependencyListEntry<C>> {
        match self.lists.read().as_ref() {
            Some(lists) => lists.static_dependencies.clone(),
            None => panic!("static dependencies read before they were computed"),
        }
    }

    /// Get the conditional dependencies.
    ///
    /// # Panics
    ///
    /// Panics if the lists have not been supplied yet.
    pub fn conditional_dependencies(&self) -> Vec<CombinedDependencyListEntry<C>> {
        match self.lists.read().as_ref() {
            Some(lists) => lists.conditional_dependencies.clone(),
            None => panic!("conditional dependencies read before they were computed"),
        }
    }
}

impl<C: AnalysisContext> Default for DeferredDependencies<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: AnalysisContext> fmt::Debug for DeferredDependencies<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredDependencies")
            .field("computed", &self.is_computed())
            .finish()
    }
}
