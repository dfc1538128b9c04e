//! The tree adapter seam between the renderer and a concrete markup tree.
//!
//! The renderer never parses markup itself. It locates markers, clones,
//! moves and removes subtrees, and rewrites inner markup exclusively through
//! [`TemplateTree`]. [`crate::Document`] is the bundled implementation.

use std::fmt;
use std::hash::Hash;

use crate::error::TreeError;
use crate::types::MarkerKind;

/// Query and mutation primitives the renderer needs from a template tree.
///
/// # Suppression and sealing
///
/// Two per-node flags carry renderer bookkeeping through the tree:
///
/// - *suppressed*: a conditional that must not be evaluated at the current
///   level. Set and cleared within one conditional pass.
/// - *sealed*: a subtree already rendered at a deeper scope. Sealed subtrees
///   are skipped by [`TemplateTree::find_by_marker`] and travel through
///   [`TemplateTree::inner_markup`] / [`TemplateTree::set_inner_markup`] as
///   opaque placeholders, so their text is never scanned again.
pub trait TemplateTree {
    type Node: Copy + Eq + Hash + fmt::Debug;

    /// Descendants of `scope` (not `scope` itself) carrying a marker of
    /// `kind`, in document order. Sealed subtrees are not entered.
    fn find_by_marker(&self, scope: Self::Node, kind: MarkerKind) -> Vec<Self::Node>;

    /// The marker value of `kind` on `node`, if present. `Else` yields `""`.
    fn marker(&self, node: Self::Node, kind: MarkerKind) -> Option<&str>;

    /// Strip the marker of `kind` from `node`; a no-op when absent.
    fn remove_marker(&mut self, node: Self::Node, kind: MarkerKind);

    /// Deep-copy `node` into a new detached subtree.
    fn clone_subtree(&mut self, node: Self::Node) -> Self::Node;

    /// Put `with` (in order) where `node` is, detaching `node`.
    fn replace(&mut self, node: Self::Node, with: &[Self::Node]) -> Result<(), TreeError>;

    /// Detach `node` from its parent.
    fn remove(&mut self, node: Self::Node);

    /// Detach `node` for good. The tree may reuse the storage of the whole
    /// subtree, so no handle into it may be used afterwards.
    fn discard(&mut self, node: Self::Node) {
        self.remove(node);
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    fn append_child(&mut self, parent: Self::Node, child: Self::Node);

    /// Insert `node` immediately before `reference` under the same parent.
    fn insert_before(&mut self, reference: Self::Node, node: Self::Node) -> Result<(), TreeError>;

    /// Serialized children of `node`, sealed subtrees as placeholders.
    fn inner_markup(&self, node: Self::Node) -> String;

    /// Replace the children of `node` by parsing `markup`. Placeholders
    /// produced by [`TemplateTree::inner_markup`] are re-linked to their
    /// sealed subtrees. On error the children are left untouched.
    fn set_inner_markup(&mut self, node: Self::Node, markup: &str) -> Result<(), TreeError>;

    fn parent_of(&self, node: Self::Node) -> Option<Self::Node>;

    fn set_suppressed(&mut self, node: Self::Node, suppressed: bool);

    fn is_suppressed(&self, node: Self::Node) -> bool;

    /// Mark the subtree rooted at `node` as opaque to the current pass:
    /// either rendered at a deeper scope or left for one.
    fn seal(&mut self, node: Self::Node);

    /// Clear every seal in the subtree rooted at `node`.
    fn unseal(&mut self, node: Self::Node);

    /// True when `node` is `ancestor` or lies beneath it.
    fn is_within(&self, node: Self::Node, ancestor: Self::Node) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent_of(n);
        }
        false
    }
}
