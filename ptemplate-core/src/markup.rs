//! Markup adapter: HTML/XHTML fragments to and from [`Document`] nodes.
//!
//! Parsing is built on `quick-xml` with end-name checks disabled so that
//! ordinary HTML fragments are accepted:
//!
//! - void elements (`<br>`, `<img ...>`) need no closing tag;
//! - an end tag closes the nearest open element of the same name, and a
//!   stray end tag is dropped;
//! - elements still open at end of input are closed implicitly;
//! - text and plain attribute values are stored raw, entities untouched.
//!
//! Marker attributes (`data-repeat-on`, `data-if`, `data-else`) are lifted
//! into [`Marker`]s on parse and written back in the same attribute slot.

use std::borrow::Cow;
use std::fmt::Write as _;

use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::document::{Attribute, Document, Element, NodeKind};
use crate::error::TreeError;
use crate::tree::TemplateTree;
use crate::types::{Marker, MarkerKind, NodeId};

/// Comment text prefix used for sealed-subtree placeholders.
pub(crate) const PLACEHOLDER_PREFIX: &str = "ptemplate-sealed:";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse `source` and append the resulting nodes to `parent`.
pub(crate) fn parse_into(doc: &mut Document, parent: NodeId, source: &str) -> Result<(), TreeError> {
    let mut reader = Reader::from_str(source);
    {
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
    }

    // Open elements; index 0 is the parse target and is never popped.
    let mut open: Vec<(NodeId, String)> = vec![(parent, String::new())];

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(err) => {
                return Err(TreeError::Parse {
                    position: reader.buffer_position() as u64,
                    message: err.to_string(),
                })
            }
        };
        let top = open.last().map(|(id, _)| *id).unwrap_or(parent);
        match event {
            Event::Start(start) => {
                let element = element_from(&start, false)?;
                let name = element.name.clone();
                let id = doc.create_node(NodeKind::Element(element));
                doc.append_child(top, id);
                if !is_void(&name) {
                    open.push((id, name));
                }
            }
            Event::Empty(start) => {
                let element = element_from(&start, true)?;
                let id = doc.create_node(NodeKind::Element(element));
                doc.append_child(top, id);
            }
            Event::End(end) => {
                let name = std::str::from_utf8(end.name().as_ref())?.to_string();
                if let Some(pos) = open.iter().skip(1).rposition(|(_, n)| *n == name) {
                    open.truncate(pos + 1);
                }
            }
            Event::Text(text) => {
                let text = std::str::from_utf8(&text)?;
                if !text.is_empty() {
                    let id = doc.create_text(text);
                    doc.append_child(top, id);
                }
            }
            Event::CData(data) => {
                let id = doc.create_node(NodeKind::CData(std::str::from_utf8(&data)?.to_string()));
                doc.append_child(top, id);
            }
            Event::Comment(comment) => {
                let id =
                    doc.create_node(NodeKind::Comment(std::str::from_utf8(&comment)?.to_string()));
                doc.append_child(top, id);
            }
            Event::Eof => break,
            // Declarations, processing instructions and doctypes have no
            // place inside a template fragment.
            _ => {}
        }
    }
    Ok(())
}

fn element_from(start: &BytesStart<'_>, self_closing: bool) -> Result<Element, TreeError> {
    let name = std::str::from_utf8(start.name().as_ref())?.to_string();
    if name.contains(|c| c == '<' || c == '/') {
        return Err(TreeError::Parse {
            position: 0,
            message: format!("bad element name <{name}>"),
        });
    }
    let mut element = Element::new(name);
    element.self_closing = self_closing;

    for attr in start.html_attributes() {
        let attr = attr.map_err(|err| TreeError::Parse {
            position: 0,
            message: format!("bad attribute on <{}>: {err}", element.name),
        })?;
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let raw = std::str::from_utf8(&attr.value)?;
        let slot = match MarkerKind::from_attribute(key) {
            Some(kind) => {
                let value = unescape(raw).unwrap_or(Cow::Borrowed(raw));
                Attribute::Marker(Marker::from_parts(kind, value.into_owned()))
            }
            None => Attribute::Plain {
                name: key.to_string(),
                value: raw.to_string(),
            },
        };
        element.attributes.push(slot);
    }
    Ok(element)
}

/// Node a placeholder comment points at, if `comment` is one.
pub(crate) fn placeholder_target(comment: &str) -> Option<NodeId> {
    comment
        .strip_prefix(PLACEHOLDER_PREFIX)
        .and_then(|id| id.parse::<usize>().ok())
        .map(NodeId)
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Serialize `node` into `out`. With `placeholders`, sealed nodes are written
/// as placeholder comments instead of their content.
pub(crate) fn write_node(doc: &Document, node: NodeId, out: &mut String, placeholders: bool) {
    if placeholders && doc.is_sealed(node) {
        let _ = write!(out, "<!--{PLACEHOLDER_PREFIX}{}-->", node.0);
        return;
    }
    match doc.kind(node) {
        NodeKind::Fragment => write_children(doc, node, out, placeholders),
        NodeKind::Text(text) => out.push_str(text),
        NodeKind::Comment(text) => {
            let _ = write!(out, "<!--{text}-->");
        }
        NodeKind::CData(text) => {
            let _ = write!(out, "<![CDATA[{text}]]>");
        }
        NodeKind::Element(element) => {
            out.push('<');
            out.push_str(&element.name);
            for attr in &element.attributes {
                write_attribute(attr, out);
            }
            let childless = doc.children(node).is_empty();
            if childless && element.self_closing {
                out.push_str("/>");
            } else if childless && is_void(&element.name) {
                out.push('>');
            } else {
                out.push('>');
                write_children(doc, node, out, placeholders);
                let _ = write!(out, "</{}>", element.name);
            }
        }
    }
}

fn write_children(doc: &Document, node: NodeId, out: &mut String, placeholders: bool) {
    for child in doc.children(node) {
        write_node(doc, *child, out, placeholders);
    }
}

fn write_attribute(attr: &Attribute, out: &mut String) {
    match attr {
        Attribute::Plain { name, value } => {
            if !value.contains('"') {
                let _ = write!(out, " {name}=\"{value}\"");
            } else if !value.contains('\'') {
                let _ = write!(out, " {name}='{value}'");
            } else {
                let _ = write!(out, " {name}=\"{}\"", value.replace('"', "&quot;"));
            }
        }
        Attribute::Marker(Marker::Else) => {
            out.push(' ');
            out.push_str(MarkerKind::Else.attribute());
        }
        Attribute::Marker(marker) => {
            let _ = write!(
                out,
                " {}=\"{}\"",
                marker.kind().attribute(),
                escape(marker.value())
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("<p>plain text</p>")]
    #[case(r#"<div class="a b"><span id='x'>1</span></div>"#)]
    #[case("<p>a &lt;b> &amp; c</p>")]
    #[case("<br/><img src=\"x.png\">")]
    #[case("<!-- note --><![CDATA[raw <b>]]>")]
    #[case(r#"<ul><li data-repeat-on="items">[[name|safe]]</li></ul>"#)]
    fn markup_round_trips(#[case] source: &str) {
        let doc = Document::parse(source).expect("parse");
        let expected = source.replace("id='x'", "id=\"x\"");
        assert_eq!(doc.to_string(), expected);
    }

    #[test]
    fn markers_are_lifted() {
        let doc = Document::parse(r#"<div data-if="a &amp;&amp; b"><p data-else>no</p></div>"#)
            .expect("parse");
        let div = doc.first_element_child(doc.root()).expect("div");
        assert_eq!(doc.marker(div, MarkerKind::Conditional), Some("a && b"));
        let p = doc.first_element_child(div).expect("p");
        assert_eq!(doc.marker(p, MarkerKind::Else), Some(""));
        assert!(doc.element(div).expect("element").attribute("data-if").is_none());
    }

    #[test]
    fn unclosed_elements_close_at_end() {
        let doc = Document::parse("<div><b>bold").expect("parse");
        assert_eq!(doc.to_string(), "<div><b>bold</b></div>");
    }

    #[test]
    fn stray_end_tag_is_dropped() {
        let doc = Document::parse("<p>a</i>b</p>").expect("parse");
        assert_eq!(doc.to_string(), "<p>ab</p>");
    }

    #[test]
    fn end_tag_closes_nearest_match() {
        let doc = Document::parse("<div><p>x</div>y").expect("parse");
        assert_eq!(doc.to_string(), "<div><p>x</p></div>y");
    }

    #[rstest]
    #[case("a<b</p>")]
    #[case("<b<i>x</i>")]
    #[case("<a/b>x</a/b>")]
    fn malformed_element_names_are_rejected(#[case] source: &str) {
        let err = Document::parse(source).unwrap_err();
        assert!(matches!(err, TreeError::Parse { .. }), "{err}");
    }

    #[rstest]
    #[case("say hi", r#" title="say hi""#)]
    #[case(r#"say "hi""#, r#" title='say "hi"'"#)]
    #[case(r#"it's "hi""#, r#" title="it's &quot;hi&quot;""#)]
    fn attribute_quotes_follow_the_value(#[case] value: &str, #[case] expected: &str) {
        let mut out = String::new();
        let attr = Attribute::Plain {
            name: "title".into(),
            value: value.into(),
        };
        write_attribute(&attr, &mut out);
        assert_eq!(out, expected);
        assert!(Document::parse(&format!("<p{out}></p>")).is_ok());
    }

    #[test]
    fn placeholder_comments_parse_to_ids() {
        assert_eq!(placeholder_target("ptemplate-sealed:12"), Some(NodeId(12)));
        assert_eq!(placeholder_target("ptemplate-sealed:x"), None);
        assert_eq!(placeholder_target(" note "), None);
    }
}
