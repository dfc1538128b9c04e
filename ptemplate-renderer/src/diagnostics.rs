//! Non-fatal rendering issues and the sinks that receive them.
//!
//! Nothing in a render call is allowed to fail. Every anomaly is turned into
//! an [`Issue`], handed to a [`DiagnosticSink`] (when `debug` is on), and the
//! renderer carries on with best-effort output.

use thiserror::Error;

/// A problem noticed during rendering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Issue {
    /// Data bound to a scope was not a mapping.
    #[error("data passed to render must be an object and not {found}")]
    DataNotMapping { found: &'static str },

    /// A field reference was absent or falsy; substituted with "".
    #[error("cannot find {field} in data")]
    MissingField { field: String },

    /// An array had no repeat block to expand into.
    #[error("array \"{name}\" not used")]
    ArrayNotMatched { name: String },

    /// An array matched more than one repeat block.
    #[error("array \"{name}\" matches {count} repeat blocks")]
    AmbiguousArray { name: String, count: usize },

    /// An array item was neither a mapping nor a scalar; skipped.
    #[error("item {index} of array \"{name}\" is {found}, skipped")]
    BadArrayElement {
        name: String,
        index: usize,
        found: &'static str,
    },

    /// A filter name had no registered function; value passed through.
    #[error("{filter} is not a valid filter")]
    UnknownFilter { filter: String },

    /// A trusted-mode condition could not be evaluated; treated as false.
    #[error("condition \"{condition}\" failed: {reason}")]
    ExpressionFailed { condition: String, reason: String },

    /// A lookup-only condition looks like an expression.
    #[error("\"{condition}\" may not be a valid if condition when trusted mode is off")]
    SuspiciousCondition { condition: String },

    /// Repeat nesting went deeper than the configured bound.
    #[error("repeat \"{name}\" exceeds maximum nesting depth {max_depth}")]
    DepthExceeded { name: String, max_depth: usize },

    /// The tree adapter rejected a mutation.
    #[error("markup update failed: {message}")]
    Markup { message: String },
}

/// Human-readable kind of a JSON value, for diagnostics.
pub fn value_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Receiver for rendering issues. Fire-and-forget.
pub trait DiagnosticSink {
    fn report(&mut self, issue: &Issue);
}

/// Forwards issues to `tracing` at `warn` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&mut self, issue: &Issue) {
        tracing::warn!(target: "ptemplate", "{issue}");
    }
}

/// Keeps every issue in order of occurrence.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    pub issues: Vec<Issue>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Rendered messages, one per issue.
    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&mut self, issue: &Issue) {
        self.issues.push(issue.clone());
    }
}

impl<F: FnMut(&Issue)> DiagnosticSink for F {
    fn report(&mut self, issue: &Issue) {
        self(issue)
    }
}
