//! Error types for ptemplate-core.

use thiserror::Error;

/// All errors that can arise from tree parsing and mutation.
#[derive(Debug, Error)]
pub enum TreeError {
    /// The markup reader rejected the input.
    #[error("markup parse error at byte {position}: {message}")]
    Parse { position: u64, message: String },

    /// Element name, attribute, or text was not valid UTF-8.
    #[error("markup is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// A structural operation needed a parent, but the node is detached.
    #[error("node {node} has no parent")]
    Detached { node: usize },
}
