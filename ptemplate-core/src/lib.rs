//! ptemplate core library — template tree, markers, data values, errors.
//!
//! Public API surface:
//! - [`types`] — [`Marker`], [`MarkerKind`], [`NodeId`]
//! - [`tree`] — the [`TemplateTree`] adapter trait
//! - [`document`] — [`Document`], the arena tree implementation
//! - [`markup`] — parsing and serializing HTML fragments
//! - [`value`] — truthiness, display strings, [`LoopContext`]
//! - [`error`] — [`TreeError`]

pub mod document;
pub mod error;
pub mod markup;
pub mod tree;
pub mod types;
pub mod value;

pub use document::{Attribute, Document, Element, NodeKind};
pub use error::TreeError;
pub use tree::TemplateTree;
pub use types::{Marker, MarkerKind, NodeId};
pub use value::{DataMap, LoopContext};
