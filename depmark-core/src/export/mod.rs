//! Graph Export
//!
//! Turns the result of an analysis into a structural graph document for
//! visualization tools. The document holds one node per marked node, one
//! per distinct root reason and one per distinct pair of causes, plus one
//! link per replayed causal relationship.
//!
//! How many links there are depends on the mark strategy: none for
//! [`NoLogStrategy`](crate::strategy::NoLogStrategy), exactly one into
//! every marked node for
//! [`FirstMarkLogStrategy`](crate::strategy::FirstMarkLogStrategy), and
//! every recorded cause for
//! [`FullGraphLogStrategy`](crate::strategy::FullGraphLogStrategy).

mod dgml;

use std::io::Write;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use tracing::debug;

use crate::error::ExportError;
use crate::graph::{Analysis, AnalysisContext, NodeRef};
use crate::strategy::LogVisitor;

/// Stroke color of links from a root reason.
pub const ROOT_LINK_COLOR: &str = "#C00000";

/// Stroke color of links from a combined node, and into it from its causes.
pub const COMBINED_LINK_COLOR: &str = "#0050C0";

/// A visual node: a marked node or a root reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: u32,
    pub label: String,
}

/// A visual node standing for a pair of causes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombinedNode {
    pub id: u32,
    /// `"(first, second)"`.
    pub label: String,
    pub first: u32,
    pub second: u32,
}

/// What a link stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// A static or single-cause edge between marked nodes.
    Dependency,
    /// A root reason marking a node.
    Root,
    /// A pair of causes marking a node.
    Combined,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphLink {
    pub source: u32,
    pub target: u32,
    pub reason: String,
    pub kind: LinkKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
}

/// Structural description of an analyzed dependency graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDocument {
    pub nodes: Vec<GraphNode>,
    pub combined_nodes: Vec<CombinedNode>,
    pub links: Vec<GraphLink>,
}

impl GraphDocument {
    /// Build the document for a converged analysis.
    ///
    /// Marked nodes get ids `0..n` in marked-list order; synthetic nodes
    /// follow in the order the replay first mentions them.
    ///
    /// # Panics
    ///
    /// Panics if the analysis has not converged.
    pub fn build<C, A>(analysis: &A) -> Self
    where
        C: AnalysisContext,
        A: Analysis<C> + ?Sized,
    {
        let mut builder = GraphBuilder::new(analysis.context());
        for node in analysis.marked_node_list() {
            builder.node_id(node);
        }
        analysis.replay(&mut builder);

        let document = builder.document;
        debug!(
            nodes = document.nodes.len(),
            combined = document.combined_nodes.len(),
            links = document.links.len(),
            "built dependency graph document"
        );
        document
    }

    /// Links of the given kind.
    pub fn links_of(&self, kind: LinkKind) -> impl Iterator<Item = &GraphLink> + '_ {
        self.links.iter().filter(move |link| link.kind == kind)
    }

    /// Look up a plain node by label.
    pub fn node_by_label(&self, label: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.label == label)
    }

    /// Write the document in the DGML directed-graph dialect.
    pub fn write_dgml<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        dgml::write(self, writer)
    }

    /// Write the document as JSON.
    pub fn write_json<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Render the document as a JSON string.
    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Collects replayed provenance into a [`GraphDocument`], assigning stable
/// ids to everything it sees.
struct GraphBuilder<'a, C: AnalysisContext> {
    context: &'a C,
    next_id: u32,
    node_ids: IndexMap<NodeRef<C>, u32>,
    root_ids: IndexMap<String, u32>,
    combined_ids: IndexMap<(NodeRef<C>, NodeRef<C>), u32>,
    combined_links: IndexSet<(u32, u32)>,
    document: GraphDocument,
}

impl<'a, C: AnalysisContext> GraphBuilder<'a, C> {
    fn new(context: &'a C) -> Self {
        Self {
            context,
            next_id: 0,
            node_ids: IndexMap::new(),
            root_ids: IndexMap::new(),
            combined_ids: IndexMap::new(),
            combined_links: IndexSet::new(),
            document: GraphDocument::default(),
        }
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn node_id(&mut self, node: &NodeRef<C>) -> u32 {
        if let Some(&id) = self.node_ids.get(node) {
            return id;
        }
        let id = self.allocate();
        self.node_ids.insert(node.clone(), id);
        self.document.nodes.push(GraphNode {
            id,
            label: node.name(self.context),
        });
        id
    }

    fn root_id(&mut self, reason: &str) -> u32 {
        if let Some(&id) = self.root_ids.get(reason) {
            return id;
        }
        let id = self.allocate();
        self.root_ids.insert(reason.to_string(), id);
        self.document.nodes.push(GraphNode {
            id,
            label: reason.to_string(),
        });
        id
    }

    fn combined_id(&mut self, first: &NodeRef<C>, second: &NodeRef<C>) -> u32 {
        let key = (first.clone(), second.clone());
        if let Some(&id) = self.combined_ids.get(&key) {
            return id;
        }

        let first_id = self.node_id(first);
        let second_id = self.node_id(second);
        let id = self.allocate();
        self.combined_ids.insert(key, id);
        self.document.combined_nodes.push(CombinedNode {
            id,
            label: format!("({}, {})", first.name(self.context), second.name(self.context)),
            first: first_id,
            second: second_id,
        });
        id
    }

    fn link(&mut self, source: u32, target: u32, reason: &str, kind: LinkKind) {
        let stroke_color = match kind {
            LinkKind::Dependency => None,
            LinkKind::Root => Some(ROOT_LINK_COLOR.to_string()),
            LinkKind::Combined => Some(COMBINED_LINK_COLOR.to_string()),
        };
        self.document.links.push(GraphLink {
            source,
            target,
            reason: reason.to_string(),
            kind,
            stroke_color,
        });
    }
}

impl<C: AnalysisContext> LogVisitor<C> for GraphBuilder<'_, C> {
    fn visit_root(&mut self, reason: &str) {
        self.root_id(reason);
    }

    fn visit_combined_node(&mut self, first: &NodeRef<C>, second: &NodeRef<C>) {
        self.combined_id(first, second);
    }

    fn visit_edge(&mut self, source: &NodeRef<C>, target: &NodeRef<C>, reason: &str) {
        let source = self.node_id(source);
        let target = self.node_id(target);
        self.link(source, target, reason, LinkKind::Dependency);
    }

    fn visit_root_edge(&mut self, root_reason: &str, target: &NodeRef<C>) {
        let source = self.root_id(root_reason);
        let target = self.node_id(target);
        self.link(source, target, root_reason, LinkKind::Root);
    }

    fn visit_combined_edge(
        &mut self,
        first: &NodeRef<C>,
        second: &NodeRef<C>,
        target: &NodeRef<C>,
        reason: &str,
    ) {
        let source = self.combined_id(first, second);
        let target = self.node_id(target);
        if self.combined_links.insert((source, target)) {
            self.link(source, target, reason, LinkKind::Combined);
        }
    }
}
