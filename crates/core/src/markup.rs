//! Markup codec: parses SVG/HTML fragments into a [`Document`] and
//! serializes subtrees back to markup.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::dom::{Document, Namespace, NodeId, NodeKind};
use crate::error::{Error, Result};

/// HTML elements that never have content and may appear without an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// HTML elements whose text is emitted without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &["style", "script"];

/// Named entities that show up in authored HTML but are not predefined in XML.
fn resolve_html_entity(name: &str) -> Option<&'static str> {
    match name {
        "nbsp" => Some("\u{a0}"),
        "copy" => Some("\u{a9}"),
        "reg" => Some("\u{ae}"),
        "hellip" => Some("\u{2026}"),
        "mdash" => Some("\u{2014}"),
        "ndash" => Some("\u{2013}"),
        "lsquo" => Some("\u{2018}"),
        "rsquo" => Some("\u{2019}"),
        "ldquo" => Some("\u{201c}"),
        "rdquo" => Some("\u{201d}"),
        _ => None,
    }
}

/// Parse a standalone document.
pub fn parse_document(markup: &str) -> Result<Document> {
    let mut doc = Document::new();
    let root = doc.root();
    parse_fragment(&mut doc, root, markup)?;
    Ok(doc)
}

/// Parse `markup` and append the resulting nodes to `parent`.
///
/// Returns the top-level nodes that were appended. Namespaces are inferred
/// from `parent`: content below an SVG element is SVG unless it sits inside
/// a `foreignObject`.
pub fn parse_fragment(doc: &mut Document, parent: NodeId, markup: &str) -> Result<Vec<NodeId>> {
    let mut reader = Reader::from_str(markup);
    reader.trim_text(false);
    reader.check_end_names(false);

    let mut stack: Vec<NodeId> = Vec::new();
    let mut top_level = Vec::new();

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(Error::Xml(format!(
                    "error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
        };

        let current = stack.last().copied().unwrap_or(parent);

        match event {
            Event::Start(ref e) => {
                let id = open_element(doc, current, e);
                attach(doc, current, parent, id, &mut top_level);
                let is_void = doc.namespace(id) == Some(Namespace::Html)
                    && doc.tag_name(id).is_some_and(|n| VOID_ELEMENTS.contains(&n));
                if !is_void {
                    stack.push(id);
                }
            }
            Event::Empty(ref e) => {
                let id = open_element(doc, current, e);
                attach(doc, current, parent, id, &mut top_level);
            }
            Event::End(ref e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                // Unmatched end tags (including void elements) are ignored.
                if let Some(pos) = stack
                    .iter()
                    .rposition(|&n| doc.element(n).is_some_and(|el| el.name == name))
                {
                    stack.truncate(pos);
                }
            }
            Event::Text(ref t) => {
                let text = t
                    .unescape_with(resolve_html_entity)
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(t).into_owned());
                if !text.is_empty() {
                    let id = doc.create_text(text);
                    attach(doc, current, parent, id, &mut top_level);
                }
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                let id = doc.create_text(text);
                attach(doc, current, parent, id, &mut top_level);
            }
            Event::Comment(ref c) => {
                let id = doc.create_comment(String::from_utf8_lossy(c).into_owned());
                attach(doc, current, parent, id, &mut top_level);
            }
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    Ok(top_level)
}

fn attach(doc: &mut Document, current: NodeId, parent: NodeId, id: NodeId, top: &mut Vec<NodeId>) {
    doc.append_child(current, id);
    if current == parent {
        top.push(id);
    }
}

fn open_element(doc: &mut Document, parent: NodeId, e: &BytesStart<'_>) -> NodeId {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let local = name.rsplit(':').next().unwrap_or(&name);

    let namespace = if local == "svg" {
        Namespace::Svg
    } else {
        match doc.element(parent) {
            Some(p) if p.namespace == Namespace::Svg && p.local_name() != "foreignObject" => {
                Namespace::Svg
            }
            _ => Namespace::Html,
        }
    };

    let id = doc.create_element(name, namespace);
    for attr in e.attributes().with_checks(false).flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value_with(resolve_html_entity)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
        doc.set_attr(id, &key, value);
    }
    id
}

/// Serialize a node including its own tag.
pub fn outer_markup(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, id, false, &mut out);
    out
}

/// Serialize only the children of a node.
pub fn inner_markup(doc: &Document, id: NodeId) -> String {
    let raw_text = is_raw_text_container(doc, id);
    let mut out = String::new();
    for &child in doc.children(id) {
        write_node(doc, child, raw_text, &mut out);
    }
    out
}

fn is_raw_text_container(doc: &Document, id: NodeId) -> bool {
    doc.element(id).is_some_and(|el| {
        el.namespace == Namespace::Html && RAW_TEXT_ELEMENTS.contains(&el.local_name())
    })
}

fn write_node(doc: &Document, id: NodeId, raw_text: bool, out: &mut String) {
    match doc.kind(id) {
        NodeKind::Document => {
            for &child in doc.children(id) {
                write_node(doc, child, false, out);
            }
        }
        NodeKind::Text(text) => {
            if raw_text {
                out.push_str(text);
            } else {
                out.push_str(&escape(text.as_str()));
            }
        }
        NodeKind::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeKind::Raw(markup) => out.push_str(markup),
        NodeKind::Element(el) => {
            out.push('<');
            out.push_str(&el.name);
            for attr in &el.attributes {
                out.push(' ');
                out.push_str(&attr.name);
                out.push_str("=\"");
                out.push_str(&escape(attr.value.as_str()));
                out.push('"');
            }

            let children = doc.children(id);
            let self_closing = children.is_empty()
                && (el.namespace == Namespace::Svg || VOID_ELEMENTS.contains(&el.local_name()));
            if self_closing {
                out.push_str("/>");
                return;
            }

            out.push('>');
            let raw_children = is_raw_text_container(doc, id);
            for &child in children {
                write_node(doc, child, raw_children, out);
            }
            out.push_str("</");
            out.push_str(&el.name);
            out.push('>');
        }
    }
}
