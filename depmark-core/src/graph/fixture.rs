//! Small name-keyed graph shared by the unit tests.

use std::convert::Infallible;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::node::{
    AnalysisContext, CombinedDependencyListEntry, DependencyListEntry, DependencyNode,
    DynamicDependencyNode, NodeRef,
};

/// Graph context: nodes are created on first lookup and edges are rules
/// over node names.
pub struct Graph {
    nodes: Mutex<IndexMap<String, NodeRef<Graph>>>,
    edges: Vec<(&'static str, &'static str)>,
    conditional: Vec<(&'static str, &'static str, &'static str)>,
    /// Nodes with this prefix pair with every other marked node carrying
    /// the same prefix, producing `"{self}+{other}"`.
    pairing_prefix: Option<&'static str>,
}

impl AnalysisContext for Graph {
    type Error = Infallible;
}

impl Graph {
    pub fn new() -> Self {
        Self {
            nodes: Mutex::new(IndexMap::new()),
            edges: Vec::new(),
            conditional: Vec::new(),
            pairing_prefix: None,
        }
    }

    pub fn edge(mut self, from: &'static str, to: &'static str) -> Self {
        self.edges.push((from, to));
        self
    }

    /// `from` depends on `to` once `condition` is marked.
    pub fn conditional(
        mut self,
        from: &'static str,
        to: &'static str,
        condition: &'static str,
    ) -> Self {
        self.conditional.push((from, to, condition));
        self
    }

    pub fn pairing(mut self, prefix: &'static str) -> Self {
        self.pairing_prefix = Some(prefix);
        self
    }

    pub fn node(&self, name: &str) -> NodeRef<Graph> {
        let mut nodes = self.nodes.lock();
        if let Some(node) = nodes.get(name) {
            return node.clone();
        }
        let dynamic = self.pairing_prefix.is_some_and(|prefix| name.starts_with(prefix));
        let node = NodeRef::new(Named {
            name: name.to_string(),
            dynamic,
        });
        nodes.insert(name.to_string(), node.clone());
        node
    }
}

pub struct Named {
    name: String,
    dynamic: bool,
}

impl DependencyNode<Graph> for Named {
    fn name(&self, _context: &Graph) -> String {
        self.name.clone()
    }

    fn static_dependencies(
        &self,
        context: &Graph,
    ) -> Result<Vec<DependencyListEntry<Graph>>, Infallible> {
        Ok(context
            .edges
            .iter()
            .filter(|(from, _)| *from == self.name)
            .map(|(_, to)| {
                DependencyListEntry::new(context.node(to), format!("{} uses {}", self.name, to))
            })
            .collect())
    }

    fn conditional_static_dependencies(
        &self,
        context: &Graph,
    ) -> Result<Vec<CombinedDependencyListEntry<Graph>>, Infallible> {
        Ok(context
            .conditional
            .iter()
            .filter(|(from, _, _)| *from == self.name)
            .map(|(_, to, condition)| {
                CombinedDependencyListEntry::new(
                    context.node(to),
                    context.node(condition),
                    "conditional",
                )
            })
            .collect())
    }

    fn as_dynamic(&self) -> Option<&dyn DynamicDependencyNode<Graph>> {
        if self.dynamic {
            Some(self)
        } else {
            None
        }
    }
}

impl DynamicDependencyNode<Graph> for Named {
    fn search_dynamic_dependencies(
        &self,
        marked_nodes: &[NodeRef<Graph>],
        first_node: usize,
        context: &Graph,
    ) -> Result<Vec<CombinedDependencyListEntry<Graph>>, Infallible> {
        let mut found = Vec::new();
        for other in &marked_nodes[first_node..] {
            let other_name = other.name(context);
            if other_name == self.name
                || !other.is_dynamically_interesting()
                || other_name.contains('+')
            {
                continue;
            }
            if self.name.contains('+') {
                continue;
            }
            found.push(CombinedDependencyListEntry::new(
                context.node(&format!("{}+{}", self.name, other_name)),
                other.clone(),
                "pairing",
            ));
        }
        Ok(found)
    }
}
