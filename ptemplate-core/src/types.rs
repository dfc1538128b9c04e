//! Template structure types shared by the tree adapter and the renderer.
//!
//! A template node optionally carries typed markers. The markup adapter maps
//! the concrete attributes onto them:
//!
//! | Attribute             | Marker                          |
//! |-----------------------|---------------------------------|
//! | `data-repeat-on="x"`  | [`Marker::Repeat`] (`"x"`)      |
//! | `data-if="expr"`      | [`Marker::Conditional`]         |
//! | `data-else`           | [`Marker::Else`]                |

use std::fmt;

use serde::{Deserialize, Serialize};

/// Attribute name for repeat markers.
pub const REPEAT_ATTR: &str = "data-repeat-on";
/// Attribute name for conditional markers.
pub const CONDITIONAL_ATTR: &str = "data-if";
/// Attribute name for else-branch markers.
pub const ELSE_ATTR: &str = "data-else";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Handle to a node inside a [`crate::Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Markers
// ---------------------------------------------------------------------------

/// The kind of a marker, without its payload. Used for lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    Repeat,
    Conditional,
    Else,
}

impl MarkerKind {
    /// The markup attribute this marker kind is written as.
    pub fn attribute(&self) -> &'static str {
        match self {
            MarkerKind::Repeat => REPEAT_ATTR,
            MarkerKind::Conditional => CONDITIONAL_ATTR,
            MarkerKind::Else => ELSE_ATTR,
        }
    }

    /// Map a markup attribute name back to a marker kind.
    pub fn from_attribute(name: &str) -> Option<Self> {
        match name {
            REPEAT_ATTR => Some(MarkerKind::Repeat),
            CONDITIONAL_ATTR => Some(MarkerKind::Conditional),
            ELSE_ATTR => Some(MarkerKind::Else),
            _ => None,
        }
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerKind::Repeat => write!(f, "repeat"),
            MarkerKind::Conditional => write!(f, "conditional"),
            MarkerKind::Else => write!(f, "else"),
        }
    }
}

/// A typed template marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Marker {
    /// Repeat this element once per item of the named array.
    Repeat(String),
    /// Keep this element only when the condition holds.
    Conditional(String),
    /// Fallback content of the enclosing conditional.
    Else,
}

impl Marker {
    pub fn kind(&self) -> MarkerKind {
        match self {
            Marker::Repeat(_) => MarkerKind::Repeat,
            Marker::Conditional(_) => MarkerKind::Conditional,
            Marker::Else => MarkerKind::Else,
        }
    }

    /// Marker payload. `Else` carries none and yields `""`.
    pub fn value(&self) -> &str {
        match self {
            Marker::Repeat(v) | Marker::Conditional(v) => v,
            Marker::Else => "",
        }
    }

    /// Rebuild a marker from its kind and raw attribute value.
    pub fn from_parts(kind: MarkerKind, value: impl Into<String>) -> Self {
        match kind {
            MarkerKind::Repeat => Marker::Repeat(value.into()),
            MarkerKind::Conditional => Marker::Conditional(value.into()),
            MarkerKind::Else => Marker::Else,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
