//! Arena-backed markup tree implementing [`TemplateTree`].
//!
//! Every node lives in one `Vec` and is addressed by [`NodeId`]. Detaching a
//! node does not free it. Slots come back only through
//! [`TemplateTree::discard`] and are handed out again by later allocations,
//! so a discarded handle must not be used afterwards.

use std::fmt;

use crate::error::TreeError;
use crate::markup;
use crate::tree::TemplateTree;
use crate::types::{Marker, MarkerKind, NodeId};

// ---------------------------------------------------------------------------
// Node types
// ---------------------------------------------------------------------------

/// Payload of a tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Container with no markup of its own (document root, parse holder).
    Fragment,
    Element(Element),
    /// Raw text; entities are kept as written.
    Text(String),
    Comment(String),
    CData(String),
}

/// An element with its attributes in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<Attribute>,
    /// Written as `<name/>` in the source.
    pub self_closing: bool,
}

/// One attribute slot. Marker attributes are lifted into typed markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    Plain { name: String, value: String },
    Marker(Marker),
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            self_closing: false,
        }
    }

    pub fn marker(&self, kind: MarkerKind) -> Option<&Marker> {
        self.attributes.iter().find_map(|a| match a {
            Attribute::Marker(m) if m.kind() == kind => Some(m),
            _ => None,
        })
    }

    pub fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.attributes.iter().filter_map(|a| match a {
            Attribute::Marker(m) => Some(m),
            Attribute::Plain { .. } => None,
        })
    }

    /// Raw value of a non-marker attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find_map(|a| match a {
            Attribute::Plain { name: n, value } if n == name => Some(value.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    suppressed: bool,
    sealed: bool,
    freed: bool,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            suppressed: false,
            sealed: false,
            freed: false,
        }
    }

    fn vacant() -> Self {
        Self {
            freed: true,
            ..Self::new(NodeKind::Fragment)
        }
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A markup fragment held as a node arena.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    /// Discarded slots, reused before the arena grows.
    free: Vec<NodeId>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document holding only a root fragment.
    pub fn new() -> Self {
        Document {
            nodes: vec![NodeData::new(NodeKind::Fragment)],
            free: Vec::new(),
            root: NodeId(0),
        }
    }

    /// Parse an HTML/XHTML fragment. See [`crate::markup`] for leniency rules.
    pub fn parse(source: &str) -> Result<Self, TreeError> {
        let mut doc = Document::new();
        let root = doc.root;
        markup::parse_into(&mut doc, root, source)?;
        Ok(doc)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.data(node).kind
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.data(node).children
    }

    pub fn element(&self, node: NodeId) -> Option<&Element> {
        match &self.data(node).kind {
            NodeKind::Element(e) => Some(e),
            _ => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        match &mut self.data_mut(node).kind {
            NodeKind::Element(e) => Some(e),
            _ => None,
        }
    }

    /// First child element of `node`, skipping text and comments.
    pub fn first_element_child(&self, node: NodeId) -> Option<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .find(|c| self.element(*c).is_some())
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Text(text.into()))
    }

    pub(crate) fn create_node(&mut self, kind: NodeKind) -> NodeId {
        self.alloc(kind)
    }

    /// Set a marker on an element, replacing one of the same kind.
    /// Ignored for non-element nodes.
    pub fn set_marker(&mut self, node: NodeId, marker: Marker) {
        let Some(element) = self.element_mut(node) else {
            return;
        };
        let kind = marker.kind();
        for attr in element.attributes.iter_mut() {
            if let Attribute::Marker(m) = attr {
                if m.kind() == kind {
                    *m = marker;
                    return;
                }
            }
        }
        element.attributes.push(Attribute::Marker(marker));
    }

    /// Every marker beneath `node`, including inside sealed subtrees.
    pub fn markers_in(&self, node: NodeId) -> Vec<(NodeId, Marker)> {
        let mut out = Vec::new();
        for id in self.descendants(node) {
            if let Some(e) = self.element(id) {
                out.extend(e.markers().map(|m| (id, m.clone())));
            }
        }
        out
    }

    /// Descendants of `node` in document order, excluding `node`.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Full markup of `node` including the node itself. Seals are ignored.
    pub fn outer_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        markup::write_node(self, node, &mut out, false);
        out
    }

    /// Arena slots, live or waiting for reuse.
    pub fn slot_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn is_sealed(&self, node: NodeId) -> bool {
        self.data(node).sealed
    }

    // -- arena plumbing -----------------------------------------------------

    fn data(&self, node: NodeId) -> &NodeData {
        &self.nodes[node.0]
    }

    fn data_mut(&mut self, node: NodeId) -> &mut NodeData {
        &mut self.nodes[node.0]
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let data = NodeData::new(kind);
        match self.free.pop() {
            Some(id) => {
                *self.data_mut(id) = data;
                id
            }
            None => {
                let id = NodeId(self.nodes.len());
                self.nodes.push(data);
                id
            }
        }
    }

    /// Detach `node` and return its whole subtree to the free list.
    fn release(&mut self, node: NodeId) {
        if node == self.root {
            return;
        }
        self.detach(node);
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let data = std::mem::replace(self.data_mut(id), NodeData::vacant());
            if data.freed {
                continue;
            }
            stack.extend(data.children);
            self.free.push(id);
        }
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.data_mut(node).parent.take() {
            self.data_mut(parent).children.retain(|c| *c != node);
        }
    }

    fn position_in_parent(&self, node: NodeId) -> Result<(NodeId, usize), TreeError> {
        let parent = self
            .data(node)
            .parent
            .ok_or(TreeError::Detached { node: node.0 })?;
        let index = self
            .children(parent)
            .iter()
            .position(|c| *c == node)
            .ok_or(TreeError::Detached { node: node.0 })?;
        Ok((parent, index))
    }

    /// Swap sealed-subtree placeholders under `holder` for the real nodes.
    fn relink_placeholders(&mut self, holder: NodeId) -> Result<(), TreeError> {
        let placeholders: Vec<(NodeId, NodeId)> = self
            .descendants(holder)
            .into_iter()
            .filter_map(|id| match self.kind(id) {
                NodeKind::Comment(text) => markup::placeholder_target(text)
                    .filter(|target| target.0 < self.nodes.len() && self.is_sealed(*target))
                    .map(|target| (id, target)),
                _ => None,
            })
            .collect();
        for (placeholder, target) in placeholders {
            self.replace(placeholder, &[target])?;
            self.release(placeholder);
        }
        Ok(())
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.outer_markup(self.root))
    }
}

// ---------------------------------------------------------------------------
// TemplateTree
// ---------------------------------------------------------------------------

impl TemplateTree for Document {
    type Node = NodeId;

    fn find_by_marker(&self, scope: NodeId, kind: MarkerKind) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if self.is_sealed(id) {
                continue;
            }
            if self.element(id).and_then(|e| e.marker(kind)).is_some() {
                out.push(id);
            }
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    fn marker(&self, node: NodeId, kind: MarkerKind) -> Option<&str> {
        self.element(node)?.marker(kind).map(Marker::value)
    }

    fn remove_marker(&mut self, node: NodeId, kind: MarkerKind) {
        if let Some(element) = self.element_mut(node) {
            element
                .attributes
                .retain(|a| !matches!(a, Attribute::Marker(m) if m.kind() == kind));
        }
    }

    fn clone_subtree(&mut self, node: NodeId) -> NodeId {
        let kind = self.kind(node).clone();
        let copy = self.alloc(kind);
        let children = self.children(node).to_vec();
        for child in children {
            let child_copy = self.clone_subtree(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    fn replace(&mut self, node: NodeId, with: &[NodeId]) -> Result<(), TreeError> {
        for n in with.iter().filter(|n| **n != node) {
            self.detach(*n);
        }
        let (parent, index) = self.position_in_parent(node)?;
        let incoming: Vec<NodeId> = with.iter().copied().filter(|n| *n != node).collect();
        for n in &incoming {
            self.data_mut(*n).parent = Some(parent);
        }
        self.data_mut(parent)
            .children
            .splice(index..=index, incoming);
        self.data_mut(node).parent = None;
        Ok(())
    }

    fn remove(&mut self, node: NodeId) {
        self.detach(node);
    }

    fn discard(&mut self, node: NodeId) {
        self.release(node);
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.data_mut(child).parent = Some(parent);
        self.data_mut(parent).children.push(child);
    }

    fn insert_before(&mut self, reference: NodeId, node: NodeId) -> Result<(), TreeError> {
        self.detach(node);
        let (parent, index) = self.position_in_parent(reference)?;
        self.data_mut(node).parent = Some(parent);
        self.data_mut(parent).children.insert(index, node);
        Ok(())
    }

    fn inner_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            markup::write_node(self, *child, &mut out, true);
        }
        out
    }

    fn set_inner_markup(&mut self, node: NodeId, source: &str) -> Result<(), TreeError> {
        let holder = self.alloc(NodeKind::Fragment);
        if let Err(err) = markup::parse_into(self, holder, source) {
            self.release(holder);
            return Err(err);
        }
        // Sealed nodes leave `node` here, so the old children released
        // below no longer reach them.
        self.relink_placeholders(holder)?;

        let old = std::mem::take(&mut self.data_mut(node).children);
        for child in old {
            self.data_mut(child).parent = None;
            self.release(child);
        }
        let new = std::mem::take(&mut self.data_mut(holder).children);
        for child in &new {
            self.data_mut(*child).parent = Some(node);
        }
        self.data_mut(node).children = new;
        self.release(holder);
        Ok(())
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.data(node).parent
    }

    fn set_suppressed(&mut self, node: NodeId, suppressed: bool) {
        self.data_mut(node).suppressed = suppressed;
    }

    fn is_suppressed(&self, node: NodeId) -> bool {
        self.data(node).suppressed
    }

    fn seal(&mut self, node: NodeId) {
        self.data_mut(node).sealed = true;
    }

    fn unseal(&mut self, node: NodeId) {
        self.data_mut(node).sealed = false;
        for id in self.descendants(node) {
            self.data_mut(id).sealed = false;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
