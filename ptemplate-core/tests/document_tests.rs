//! Tree adapter integration tests: parsing, marker queries and mutation
//! through the `TemplateTree` trait only.

use ptemplate_core::{Document, Marker, MarkerKind, NodeKind, TemplateTree, TreeError};

const TEMPLATE: &str = r#"<section>
<h1>[[title]]</h1>
<ul>
<li data-repeat-on="animals"><span data-if="loop_first">first</span>[[name]]</li>
</ul>
<p data-if="show">shown<em data-else>hidden</em></p>
</section>"#;

fn section(doc: &Document) -> ptemplate_core::NodeId {
    doc.first_element_child(doc.root()).expect("section")
}

// ---------------------------------------------------------------------------
// 1. Parsing and queries
// ---------------------------------------------------------------------------

#[test]
fn parse_preserves_source_text() {
    let doc = Document::parse(TEMPLATE).expect("parse");
    assert_eq!(doc.to_string(), TEMPLATE);
}

#[test]
fn markers_of_each_kind_are_found() {
    let doc = Document::parse(TEMPLATE).expect("parse");
    let root = section(&doc);
    assert_eq!(doc.find_by_marker(root, MarkerKind::Repeat).len(), 1);
    assert_eq!(doc.find_by_marker(root, MarkerKind::Conditional).len(), 2);
    assert_eq!(doc.find_by_marker(root, MarkerKind::Else).len(), 1);
}

#[test]
fn find_by_marker_excludes_scope_itself() {
    let doc = Document::parse(r#"<p data-if="x"><b data-if="y"></b></p>"#).expect("parse");
    let p = section(&doc);
    let found = doc.find_by_marker(p, MarkerKind::Conditional);
    assert_eq!(found.len(), 1);
    assert_eq!(doc.marker(found[0], MarkerKind::Conditional), Some("y"));
}

#[test]
fn markers_in_lists_every_marker() {
    let doc = Document::parse(TEMPLATE).expect("parse");
    let kinds: Vec<MarkerKind> = doc
        .markers_in(doc.root())
        .into_iter()
        .map(|(_, m)| m.kind())
        .collect();
    assert_eq!(
        kinds,
        vec![
            MarkerKind::Repeat,
            MarkerKind::Conditional,
            MarkerKind::Conditional,
            MarkerKind::Else
        ]
    );
}

#[test]
fn broken_markup_is_a_parse_error() {
    let err = Document::parse("<div><!-- never closed").unwrap_err();
    assert!(matches!(err, TreeError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("markup parse error"));
}

// ---------------------------------------------------------------------------
// 2. Mutation
// ---------------------------------------------------------------------------

#[test]
fn set_inner_markup_reparses_markers() {
    let mut doc = Document::parse("<div></div>").expect("parse");
    let div = section(&doc);
    doc.set_inner_markup(div, r#"<i data-repeat-on="xs">x</i>"#)
        .expect("set");
    let found = doc.find_by_marker(div, MarkerKind::Repeat);
    assert_eq!(found.len(), 1);
    assert_eq!(doc.parent_of(found[0]), Some(div));
}

#[test]
fn failed_set_inner_markup_leaves_children() {
    let mut doc = Document::parse("<div>keep</div>").expect("parse");
    let div = section(&doc);
    assert!(doc.set_inner_markup(div, "<!-- open").is_err());
    assert_eq!(doc.to_string(), "<div>keep</div>");
}

#[test]
fn removed_nodes_keep_their_content() {
    let mut doc = Document::parse("<a><b>x</b></a>").expect("parse");
    let a = section(&doc);
    let b = doc.first_element_child(a).expect("b");
    doc.remove(b);
    assert_eq!(doc.to_string(), "<a></a>");
    assert_eq!(doc.outer_markup(b), "<b>x</b>");
    assert!(matches!(doc.kind(b), NodeKind::Element(_)));
}

#[test]
fn append_child_moves_node() {
    let mut doc = Document::parse("<a><b></b></a><c></c>").expect("parse");
    let a = section(&doc);
    let b = doc.first_element_child(a).expect("b");
    let c = doc.children(doc.root())[1];
    doc.append_child(c, b);
    assert_eq!(doc.to_string(), "<a></a><c><b></b></c>");
}

#[test]
fn suppression_flag_round_trips() {
    let mut doc = Document::parse(r#"<p data-if="x"></p>"#).expect("parse");
    let p = section(&doc);
    doc.set_suppressed(p, true);
    assert!(doc.is_suppressed(p));
    doc.set_suppressed(p, false);
    assert!(!doc.is_suppressed(p));
}

#[test]
fn set_marker_writes_attribute() {
    let mut doc = Document::parse("<li>x</li>").expect("parse");
    let li = section(&doc);
    doc.set_marker(li, Marker::Repeat("rows".into()));
    assert_eq!(doc.to_string(), r#"<li data-repeat-on="rows">x</li>"#);
    doc.remove_marker(li, MarkerKind::Repeat);
    assert_eq!(doc.to_string(), "<li>x</li>");
}
