//! The rendering engine: [`Renderer`] and the three per-scope passes.
//!
//! # Pipeline
//!
//! Every scope (the top-level node, then each repeat clone) runs:
//!
//! 1. **Conditionals**: resolve `data-if` / `data-else` at this level.
//!    Conditionals inside repeat blocks are suppressed for the pass and
//!    evaluated later, per clone, with the clone's data and loop context.
//! 2. **Repeats**: for every array in the data, clone its unique
//!    `data-repeat-on` block once per item, render each clone as a child
//!    scope, insert the clones where the block was, drop the block.
//! 3. **Fields**: scan the scope's inner markup for `[[field|filter]]`
//!    references and substitute them. Rendered clones and repeat blocks
//!    left unexpanded are sealed and invisible to this scan.
//!
//! No step can fail the call. Anomalies become [`Issue`]s; see
//! [`crate::diagnostics`].

use std::ops::{Deref, DerefMut};

use serde_json::Value;

use ptemplate_core::value::{to_display_string, truthy, DataMap, LoopContext, THIS_KEY};
use ptemplate_core::{Document, MarkerKind, TemplateTree, TreeError};

use crate::config::{ConditionMode, RenderConfig};
use crate::diagnostics::{value_kind, DiagnosticSink, Issue, TracingSink};
use crate::expr::{self, looks_like_expression};
use crate::filters::SAFE;
use crate::segments::{self, FieldRef, Segment};

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Template renderer bound to one [`RenderConfig`].
///
/// Create once and reuse; rendering does not mutate the renderer.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Renderer { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render `node` against `data`, logging issues through `tracing`.
    pub fn render<T: TemplateTree>(&self, tree: &mut T, node: T::Node, data: &Value) -> T::Node {
        self.render_with_sink(tree, node, data, &mut TracingSink)
    }

    /// Render `node` against `data`, reporting issues to `sink` when
    /// `debug` is set.
    ///
    /// Returns the rendered node: a fresh detached clone by default, or
    /// `node` itself with `in_place`. When `data` is not a mapping, `node`
    /// is returned untouched.
    pub fn render_with_sink<T: TemplateTree>(
        &self,
        tree: &mut T,
        node: T::Node,
        data: &Value,
        sink: &mut dyn DiagnosticSink,
    ) -> T::Node {
        render(tree, node, data, &self.config, sink)
    }

    /// Parse `markup`, render it, and serialize the result.
    pub fn render_markup(
        &self,
        markup: &str,
        data: &Value,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<String, TreeError> {
        let mut doc = Document::parse(markup)?;
        let root = doc.root();
        let rendered = self.render_with_sink(&mut doc, root, data, sink);
        tracing::trace!(slots = doc.slot_count(), "rendered markup");
        Ok(doc.outer_markup(rendered))
    }
}

/// Render `node` against `data` with an explicit config and sink.
pub fn render<T: TemplateTree>(
    tree: &mut T,
    node: T::Node,
    data: &Value,
    config: &RenderConfig,
    sink: &mut dyn DiagnosticSink,
) -> T::Node {
    let mut pass = Pass { config, sink };
    let Value::Object(map) = data else {
        pass.issue(Issue::DataNotMapping {
            found: value_kind(data),
        });
        return node;
    };

    let target = if config.in_place {
        node
    } else {
        tree.clone_subtree(node)
    };
    pass.render_scope(tree, target, map, None, 0);
    tree.unseal(target);
    target
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Name resolution for one render scope: data first, then loop fields.
#[derive(Debug, Clone, Copy)]
struct Scope<'d> {
    data: &'d DataMap,
    loop_ctx: Option<LoopContext>,
}

impl Scope<'_> {
    fn loop_field(&self, name: &str) -> Option<Value> {
        self.loop_ctx.and_then(|ctx| ctx.get(name))
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        self.data.get(name).cloned().or_else(|| self.loop_field(name))
    }

    /// Lookup-only condition test.
    fn flag(&self, name: &str) -> bool {
        self.data.get(name).is_some_and(truthy) || self.loop_field(name).is_some_and(|v| truthy(&v))
    }

    /// Field value for substitution. Falsy values count as missing.
    fn field(&self, name: &str) -> Option<Value> {
        self.data
            .get(name)
            .filter(|v| truthy(v))
            .cloned()
            .or_else(|| self.loop_field(name).filter(truthy))
    }
}

// ---------------------------------------------------------------------------
// Suppression guard
// ---------------------------------------------------------------------------

/// Marks nodes suppressed for its lifetime; clears the marks on drop.
struct Suppressed<'t, T: TemplateTree> {
    tree: &'t mut T,
    nodes: Vec<T::Node>,
}

impl<'t, T: TemplateTree> Suppressed<'t, T> {
    fn new(tree: &'t mut T, nodes: Vec<T::Node>) -> Self {
        for node in &nodes {
            tree.set_suppressed(*node, true);
        }
        Suppressed { tree, nodes }
    }
}

impl<T: TemplateTree> Drop for Suppressed<'_, T> {
    fn drop(&mut self) {
        for node in &self.nodes {
            self.tree.set_suppressed(*node, false);
        }
    }
}

impl<T: TemplateTree> Deref for Suppressed<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.tree
    }
}

impl<T: TemplateTree> DerefMut for Suppressed<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.tree
    }
}

// ---------------------------------------------------------------------------
// Passes
// ---------------------------------------------------------------------------

struct Pass<'r> {
    config: &'r RenderConfig,
    sink: &'r mut dyn DiagnosticSink,
}

impl Pass<'_> {
    fn issue(&mut self, issue: Issue) {
        tracing::debug!(target: "ptemplate", "{issue}");
        if self.config.debug {
            self.sink.report(&issue);
        }
    }

    fn render_scope<T: TemplateTree>(
        &mut self,
        tree: &mut T,
        node: T::Node,
        data: &DataMap,
        loop_ctx: Option<LoopContext>,
        depth: usize,
    ) {
        tracing::trace!(depth, fields = data.len(), "rendering scope");
        let scope = Scope { data, loop_ctx };
        self.eval_conditionals(tree, node, &scope);
        self.expand_repeats(tree, node, data, depth);
        seal_pending_repeats(tree, node);
        self.substitute_fields(tree, node, &scope);
    }

    // -- 1. conditionals ----------------------------------------------------

    fn eval_conditionals<T: TemplateTree>(&mut self, tree: &mut T, root: T::Node, scope: &Scope<'_>) {
        let deferred: Vec<T::Node> = tree
            .find_by_marker(root, MarkerKind::Repeat)
            .into_iter()
            .flat_map(|block| tree.find_by_marker(block, MarkerKind::Conditional))
            .collect();
        let mut tree = Suppressed::new(tree, deferred);

        let conditionals: Vec<T::Node> = tree
            .find_by_marker(root, MarkerKind::Conditional)
            .into_iter()
            .filter(|c| !tree.is_suppressed(*c))
            .collect();

        for cond in conditionals {
            // An earlier decision may have discarded this node.
            if !tree.is_within(cond, root) {
                continue;
            }
            let Some(condition) = tree.marker(cond, MarkerKind::Conditional).map(str::to_owned)
            else {
                continue;
            };
            let keep = self.condition_holds(&condition, scope);
            let branches = paired_else_branches(&*tree, cond);

            if keep {
                for branch in branches {
                    tree.discard(branch);
                }
                tree.remove_marker(cond, MarkerKind::Conditional);
            } else {
                for branch in &branches {
                    tree.remove_marker(*branch, MarkerKind::Else);
                }
                match tree.replace(cond, &branches) {
                    Ok(()) => tree.discard(cond),
                    Err(err) => self.issue(Issue::Markup {
                        message: err.to_string(),
                    }),
                }
            }
        }
    }

    fn condition_holds(&mut self, condition: &str, scope: &Scope<'_>) -> bool {
        match self.config.mode {
            ConditionMode::LookupOnly => {
                if looks_like_expression(condition) {
                    self.issue(Issue::SuspiciousCondition {
                        condition: condition.to_string(),
                    });
                }
                scope.flag(condition)
            }
            ConditionMode::Trusted => {
                match expr::evaluate(condition, |name| scope.lookup(name)) {
                    Ok(keep) => keep,
                    Err(err) => {
                        self.issue(Issue::ExpressionFailed {
                            condition: condition.to_string(),
                            reason: err.to_string(),
                        });
                        false
                    }
                }
            }
        }
    }

    // -- 2. repeats ---------------------------------------------------------

    fn expand_repeats<T: TemplateTree>(
        &mut self,
        tree: &mut T,
        root: T::Node,
        data: &DataMap,
        depth: usize,
    ) {
        for (name, value) in data {
            let Value::Array(items) = value else {
                continue;
            };

            let matches: Vec<T::Node> = tree
                .find_by_marker(root, MarkerKind::Repeat)
                .into_iter()
                .filter(|n| tree.marker(*n, MarkerKind::Repeat) == Some(name.as_str()))
                .filter(|n| !inside_repeat_block(&*tree, *n, root))
                .collect();
            let template = match matches.as_slice() {
                [one] => *one,
                [] => {
                    self.issue(Issue::ArrayNotMatched { name: name.clone() });
                    continue;
                }
                many => {
                    self.issue(Issue::AmbiguousArray {
                        name: name.clone(),
                        count: many.len(),
                    });
                    continue;
                }
            };
            if depth >= self.config.max_depth {
                self.issue(Issue::DepthExceeded {
                    name: name.clone(),
                    max_depth: self.config.max_depth,
                });
                continue;
            }

            for (index, item) in items.iter().enumerate() {
                let wrapped: DataMap;
                let child_data = match item {
                    Value::Object(map) => map,
                    Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                        wrapped = [(THIS_KEY.to_string(), item.clone())].into_iter().collect();
                        &wrapped
                    }
                    other => {
                        self.issue(Issue::BadArrayElement {
                            name: name.clone(),
                            index,
                            found: value_kind(other),
                        });
                        continue;
                    }
                };

                let copy = tree.clone_subtree(template);
                tree.remove_marker(copy, MarkerKind::Repeat);
                let loop_ctx = LoopContext::new(index, items.len());
                self.render_scope(tree, copy, child_data, Some(loop_ctx), depth + 1);

                if let Err(err) = tree.insert_before(template, copy) {
                    self.issue(Issue::Markup {
                        message: err.to_string(),
                    });
                    tree.discard(copy);
                    continue;
                }
                tree.seal(copy);
            }
            tree.discard(template);
        }
    }

    // -- 3. fields ----------------------------------------------------------

    fn substitute_fields<T: TemplateTree>(&mut self, tree: &mut T, node: T::Node, scope: &Scope<'_>) {
        let config = self.config;
        let markup = tree.inner_markup(node);
        if !segments::has_fields(&markup, &config.ldelim, &config.rdelim) {
            return;
        }

        let mut rendered = String::with_capacity(markup.len());
        for segment in segments::tokenize(&markup, &config.ldelim, &config.rdelim) {
            match segment {
                Segment::Text(text) => rendered.push_str(text),
                Segment::Field(field) => rendered.push_str(&self.field_value(&field, scope)),
            }
        }

        if rendered != markup {
            if let Err(err) = tree.set_inner_markup(node, &rendered) {
                self.issue(Issue::Markup {
                    message: err.to_string(),
                });
            }
        }
    }

    fn field_value(&mut self, field: &FieldRef<'_>, scope: &Scope<'_>) -> String {
        let config = self.config;
        let mut value = scope.field(field.name).unwrap_or_else(|| {
            self.issue(Issue::MissingField {
                field: field.name.to_string(),
            });
            Value::from("")
        });

        let mut safe = false;
        for name in &field.filters {
            if *name == SAFE {
                safe = true;
                continue;
            }
            match config.filters.get(name) {
                Some(filter) => value = filter(&value),
                None => self.issue(Issue::UnknownFilter {
                    filter: name.to_string(),
                }),
            }
        }

        match value {
            Value::String(s) if !safe => escape_text(&s),
            other => to_display_string(&other),
        }
    }
}

/// Escape `<` so substituted text cannot open a tag.
pub fn escape_text(text: &str) -> String {
    text.replace('<', "&lt;")
}

/// Else blocks belonging to `cond`: no other conditional or repeat block
/// sits between them and `cond`.
fn paired_else_branches<T: TemplateTree>(tree: &T, cond: T::Node) -> Vec<T::Node> {
    tree.find_by_marker(cond, MarkerKind::Else)
        .into_iter()
        .filter(|branch| {
            let mut current = tree.parent_of(*branch);
            while let Some(n) = current {
                if n == cond {
                    return true;
                }
                if tree.marker(n, MarkerKind::Conditional).is_some()
                    || tree.marker(n, MarkerKind::Repeat).is_some()
                {
                    return false;
                }
                current = tree.parent_of(n);
            }
            false
        })
        .collect()
}

/// Seal the repeat blocks still under `root` so the field pass leaves them
/// verbatim.
fn seal_pending_repeats<T: TemplateTree>(tree: &mut T, root: T::Node) {
    for block in tree.find_by_marker(root, MarkerKind::Repeat) {
        tree.seal(block);
    }
}

/// True when a repeat block other than `node` encloses `node` below `root`.
fn inside_repeat_block<T: TemplateTree>(tree: &T, node: T::Node, root: T::Node) -> bool {
    let mut current = tree.parent_of(node);
    while let Some(n) = current {
        if n == root {
            return false;
        }
        if tree.marker(n, MarkerKind::Repeat).is_some() {
            return true;
        }
        current = tree.parent_of(n);
    }
    false
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use serde_json::json;

    fn render_debug(markup: &str, data: Value) -> (String, CollectingSink) {
        let renderer = Renderer::new(RenderConfig::default().with_debug(true));
        let mut sink = CollectingSink::new();
        let out = renderer
            .render_markup(markup, &data, &mut sink)
            .expect("template parses");
        (out, sink)
    }

    #[test]
    fn escaping_only_touches_lt() {
        assert_eq!(escape_text("a < b > c"), "a &lt; b > c");
        assert_eq!(escape_text("<<"), "&lt;&lt;");
        assert_eq!(escape_text("plain"), "plain");
    }

    #[test]
    fn suppression_is_cleared_after_pass() {
        let mut doc = Document::parse(
            r#"<ul><li data-repeat-on="xs"><b data-if="this">x</b></li></ul>"#,
        )
        .expect("parse");
        let root = doc.root();
        let inner_if = doc.find_by_marker(root, MarkerKind::Conditional)[0];
        let config = RenderConfig::default();
        let mut sink = CollectingSink::new();
        let mut pass = Pass {
            config: &config,
            sink: &mut sink,
        };
        let data = DataMap::new();
        pass.eval_conditionals(&mut doc, root, &Scope { data: &data, loop_ctx: None });
        assert!(!doc.is_suppressed(inner_if));
        assert_eq!(doc.marker(inner_if, MarkerKind::Conditional), Some("this"));
    }

    #[test]
    fn loop_fields_resolve_after_data() {
        let data = json!({"length": "custom"});
        let map = data.as_object().expect("object");
        let scope = Scope {
            data: map,
            loop_ctx: Some(LoopContext::new(0, 2)),
        };
        assert_eq!(scope.lookup("length"), Some(json!("custom")));
        assert_eq!(scope.lookup("loop_first"), Some(json!(true)));
        assert!(scope.flag("loop_notlast"));
        assert!(!scope.flag("loop_last"));
        assert_eq!(scope.field("loop_last"), None);
    }

    #[test]
    fn depth_limit_stops_expansion() {
        let renderer = Renderer::new(RenderConfig::default().with_debug(true).with_max_depth(1));
        let mut sink = CollectingSink::new();
        let out = renderer
            .render_markup(
                r#"<ul data-repeat-on="outer"><li data-repeat-on="inner">[[this]]</li></ul>"#,
                &json!({"outer": [{"inner": [1, 2]}]}),
                &mut sink,
            )
            .expect("render");
        assert_eq!(out, r#"<ul><li data-repeat-on="inner">[[this]]</li></ul>"#);
        assert_eq!(
            sink.issues,
            vec![Issue::DepthExceeded {
                name: "inner".into(),
                max_depth: 1
            }]
        );
    }

    #[test]
    fn non_mapping_data_returns_node_untouched() {
        let (out, sink) = render_debug("<p>[[x]]</p>", json!([1, 2]));
        assert_eq!(out, "<p>[[x]]</p>");
        assert_eq!(
            sink.issues,
            vec![Issue::DataNotMapping { found: "an array" }]
        );
    }

    #[test]
    fn scalar_items_bind_to_this() {
        let (out, sink) = render_debug(
            r#"<ol><li data-repeat-on="tags">[[this]]</li></ol>"#,
            json!({"tags": ["a", 2, true]}),
        );
        assert_eq!(out, "<ol><li>a</li><li>2</li><li>true</li></ol>");
        assert!(sink.is_empty(), "{:?}", sink.messages());
    }

    #[test]
    fn null_and_nested_array_items_are_skipped() {
        let (out, sink) = render_debug(
            r#"<ol><li data-repeat-on="xs">[[this]]</li></ol>"#,
            json!({"xs": ["a", null, [1], "b"]}),
        );
        assert_eq!(out, "<ol><li>a</li><li>b</li></ol>");
        assert_eq!(sink.len(), 2);
        assert!(matches!(
            &sink.issues[0],
            Issue::BadArrayElement { index: 1, found: "null", .. }
        ));
    }
}
