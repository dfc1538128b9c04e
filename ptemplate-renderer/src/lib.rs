//! # ptemplate-renderer
//!
//! Recursive, data-driven template renderer. Templates are ordinary markup
//! annotated with `data-repeat-on`, `data-if` and `data-else` attributes and
//! `[[field|filter]]` references; data is a JSON-like mapping.
//!
//! ## Usage
//!
//! ```rust
//! use ptemplate_renderer::{CollectingSink, RenderConfig, Renderer};
//! use serde_json::json;
//!
//! let renderer = Renderer::new(RenderConfig::default());
//! let mut sink = CollectingSink::new();
//! let html = renderer
//!     .render_markup(
//!         r#"<ul><li data-repeat-on="pets">[[name]]</li></ul>"#,
//!         &json!({"pets": [{"name": "Buddy"}, {"name": "Rex"}]}),
//!         &mut sink,
//!     )
//!     .unwrap();
//! assert_eq!(html, "<ul><li>Buddy</li><li>Rex</li></ul>");
//! ```

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod expr;
pub mod filters;
pub mod segments;

pub use config::{ConditionMode, RenderConfig, RenderOptions};
pub use diagnostics::{CollectingSink, DiagnosticSink, Issue, TracingSink};
pub use engine::{render, Renderer};
pub use error::ConfigError;
pub use filters::{Filter, FilterRegistry};
