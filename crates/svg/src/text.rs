//! Text handling: viewport padding, selectable overlays, run joining and
//! cross-reference repair.

use slidedrive_core::{Document, NodeId, Result, TextSelectionMode};

use crate::geometry::{relative_bbox, viewport_element, BBox, Geometry, BBOX_FILL_CLASS};

pub const OVERLAY_CONTAINER_CLASS: &str = "SVGContainer-selectable-text-container";
pub const OVERLAY_CLASS: &str = "SVGContainer-selectable-text-overlay";
pub const HIGHLIGHT_CLASS: &str = "SVGContainer-highlighted-text";

/// Background behind highlighted text.
const HIGHLIGHT_BACKGROUND: &str = "rgba(255, 255, 255, 0.5)";

/// Give every viewport that (directly or indirectly) holds text an
/// invisible rect filling it, so its box is the whole viewport.
pub fn pad_text_viewports(doc: &mut Document, root: NodeId) -> usize {
    let mut viewports: Vec<NodeId> = Vec::new();
    for text in doc.elements_by_tag(root, "text") {
        let mut current = viewport_element(doc, text);
        while let Some(vp) = current {
            if !viewports.contains(&vp) {
                viewports.push(vp);
            }
            if vp == root {
                break;
            }
            current = viewport_element(doc, vp);
        }
    }

    let mut padded = 0;
    for vp in viewports {
        if doc
            .find_descendant(vp, |d, n| d.has_class(n, BBOX_FILL_CLASS))
            .is_some()
        {
            continue;
        }
        let filler = doc.create_svg("rect");
        doc.set_attr(filler, "class", BBOX_FILL_CLASS);
        for (name, value) in [
            ("x", "0"),
            ("y", "0"),
            ("width", "100%"),
            ("height", "100%"),
            ("fill", "none"),
            ("stroke", "none"),
        ] {
            doc.set_attr(filler, name, value);
        }
        doc.append_child(vp, filler);
        padded += 1;
    }
    padded
}

/// Make the text of `root` selectable on a target with the given mode.
///
/// Overlays are placed in `container`, positioned by percentage so they
/// follow the scale container. Returns the overlay container, if one was
/// created.
pub fn normalize_text_selection(
    doc: &mut Document,
    root: NodeId,
    container: NodeId,
    mode: TextSelectionMode,
    geometry: &impl Geometry,
) -> Result<Option<NodeId>> {
    match mode {
        TextSelectionMode::Native => Ok(None),
        TextSelectionMode::Overlay => overlay_selectable_spans(doc, root, container, geometry).map(Some),
        TextSelectionMode::InlineHighlight => highlight_text(doc, root, container, geometry).map(Some),
    }
}

/// Lay an invisible span of plain text over every text run.
///
/// Spans are sized in container query units of the overlay container, which
/// covers the whole scale container, so the text height follows the slide.
pub fn overlay_selectable_spans(
    doc: &mut Document,
    root: NodeId,
    container: NodeId,
    geometry: &impl Geometry,
) -> Result<NodeId> {
    let overlays = fresh_overlay_container(doc, container);
    position(doc, overlays, BBox::new(0.0, 0.0, 1.0, 1.0));
    doc.set_style_property(overlays, "container-type", "size");
    let mut skipped = 0;
    for text in doc.elements_by_tag(root, "text") {
        let bbox = relative_bbox(geometry, doc, root, text)?;
        if bbox.is_degenerate_fraction() {
            skipped += 1;
            continue;
        }
        let content = doc.text_content(text);
        let span = doc.create_html("span");
        doc.add_class(span, OVERLAY_CLASS);
        doc.set_text_content(span, &content);
        position(doc, span, bbox);
        // Glyph height relative to the overlay container's height.
        doc.set_style_property(span, "font-size", &format!("{}cqh", bbox.height * 100.0));
        doc.set_style_property(span, "line-height", "1");
        for (property, value) in [
            ("cursor", "text"),
            ("overflow", "hidden"),
            ("text-align", "center"),
            ("white-space", "pre"),
            ("color", "rgba(0, 0, 0, 0)"),
            ("z-index", "10"),
        ] {
            doc.set_style_property(span, property, value);
        }
        doc.append_child(overlays, span);
    }
    if skipped > 0 {
        log::debug!("skipped {} text overlays with degenerate boxes", skipped);
    }
    Ok(overlays)
}

/// Show real HTML text over each run with a translucent background, and
/// hide the vector glyphs underneath. Runs inside links become links.
pub fn highlight_text(
    doc: &mut Document,
    root: NodeId,
    container: NodeId,
    geometry: &impl Geometry,
) -> Result<NodeId> {
    let overlays = fresh_overlay_container(doc, container);
    for text in doc.elements_by_tag(root, "text") {
        let bbox = relative_bbox(geometry, doc, root, text)?;
        if bbox.is_degenerate_fraction() {
            continue;
        }
        let href = doc
            .ancestors(text)
            .take_while(|&a| a != root)
            .find(|&a| doc.is_tag(a, "a"))
            .and_then(|a| doc.attr(a, "xlink:href").or_else(|| doc.attr(a, "href")))
            .map(str::to_string);

        let content = doc.text_content(text);
        let run = match href {
            Some(href) => {
                let link = doc.create_html("a");
                doc.set_attr(link, "href", href);
                link
            }
            None => doc.create_html("span"),
        };
        doc.add_class(run, HIGHLIGHT_CLASS);
        doc.set_text_content(run, &content);
        position(doc, run, bbox);
        doc.set_style_property(run, "white-space", "pre");
        doc.set_style_property(run, "background-color", HIGHLIGHT_BACKGROUND);
        if let Some(fill) = doc.attr(text, "fill").map(str::to_string) {
            doc.set_style_property(run, "color", &fill);
        }
        doc.append_child(overlays, run);
        doc.set_attr(text, "fill-opacity", "0");
    }
    Ok(overlays)
}

fn fresh_overlay_container(doc: &mut Document, container: NodeId) -> NodeId {
    for old in doc.elements_by_class(container, OVERLAY_CONTAINER_CLASS) {
        doc.detach(old);
    }
    let overlays = doc.create_html("div");
    doc.add_class(overlays, OVERLAY_CONTAINER_CLASS);
    doc.append_child(container, overlays);
    overlays
}

fn position(doc: &mut Document, node: NodeId, bbox: BBox) {
    doc.set_style_property(node, "position", "absolute");
    doc.set_style_property(node, "top", &percent(bbox.y));
    doc.set_style_property(node, "left", &percent(bbox.x));
    doc.set_style_property(node, "width", &percent(bbox.width));
    doc.set_style_property(node, "height", &percent(bbox.height));
}

fn percent(fraction: f64) -> String {
    format!("{}%", fraction * 100.0)
}

/// Merge runs of sibling `text` elements into one `text` of `tspan`s.
///
/// Every attribute of a run is copied onto its `tspan`, valid there or not.
/// Returns the number of merged groups.
pub fn join_adjacent_text(doc: &mut Document, root: NodeId) -> usize {
    let texts = doc.elements_by_tag(root, "text");
    let mut groups = 0;
    let mut i = 0;
    while i < texts.len() {
        let first = texts[i];
        let mut run = vec![first];
        while i + 1 < texts.len() && doc.next_element_sibling(texts[i]) == Some(texts[i + 1]) {
            i += 1;
            run.push(texts[i]);
        }
        i += 1;
        if run.len() < 2 {
            continue;
        }

        let joined = doc.create_svg("text");
        for name in ["x", "y"] {
            if let Some(value) = doc.attr(first, name).map(str::to_string) {
                doc.set_attr(joined, name, value);
            }
        }
        for &old in &run {
            let tspan = doc.create_svg("tspan");
            let attributes = doc
                .element(old)
                .map(|el| el.attributes.clone())
                .unwrap_or_default();
            for attr in attributes {
                doc.set_attr(tspan, &attr.name, attr.value);
            }
            for child in doc.children(old).to_vec() {
                doc.append_child(tspan, child);
            }
            doc.append_child(joined, tspan);
            if old != first {
                doc.detach(old);
            }
        }
        doc.replace(first, joined);
        groups += 1;
    }
    if groups > 0 {
        log::debug!("joined {} groups of adjacent text runs", groups);
    }
    groups
}

/// Re-set `xlink:href` on images so the reference is written back out.
pub fn fix_xlink_references(doc: &mut Document, root: NodeId) -> usize {
    let mut fixed = 0;
    for image in doc.elements_by_tag(root, "image") {
        if let Some(href) = doc.remove_attr(image, "xlink:href") {
            doc.set_attr(image, "xlink:href", href);
            fixed += 1;
        }
    }
    fixed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::AttributeGeometry;
    use slidedrive_core::markup::{outer_markup, parse_document};

    fn svg_of(doc: &Document) -> NodeId {
        doc.elements_by_tag(doc.root(), "svg")[0]
    }

    #[test]
    fn test_pad_text_viewports_once_per_viewport() {
        let mut doc = parse_document(
            r#"<svg viewBox="0 0 10 10"><text>a</text><svg viewBox="0 0 5 5"><text>b</text><text>c</text></svg><svg viewBox="0 0 5 5"><rect/></svg></svg>"#,
        )
        .unwrap();
        let root = svg_of(&doc);
        assert_eq!(pad_text_viewports(&mut doc, root), 2);
        assert_eq!(pad_text_viewports(&mut doc, root), 0);

        let fillers = doc.elements_by_class(root, BBOX_FILL_CLASS);
        assert_eq!(fillers.len(), 2);
        assert_eq!(doc.attr(fillers[0], "width"), Some("100%"));
        assert_eq!(doc.attr(fillers[0], "fill"), Some("none"));
    }

    #[test]
    fn test_join_adjacent_text() {
        let mut doc = parse_document(
            r#"<svg><g><text x="1" y="2" class="a">one</text><text x="5" y="2" font-size="3">two</text></g><text x="9" y="9">alone</text></svg>"#,
        )
        .unwrap();
        let root = svg_of(&doc);
        assert_eq!(join_adjacent_text(&mut doc, root), 1);
        assert_eq!(
            outer_markup(&doc, root),
            r#"<svg><g><text x="1" y="2"><tspan x="1" y="2" class="a">one</tspan><tspan x="5" y="2" font-size="3">two</tspan></text></g><text x="9" y="9">alone</text></svg>"#
        );
    }

    #[test]
    fn test_join_skips_non_adjacent() {
        let mut doc =
            parse_document(r#"<svg><text>a</text><rect/><text>b</text></svg>"#).unwrap();
        let root = svg_of(&doc);
        assert_eq!(join_adjacent_text(&mut doc, root), 0);
    }

    #[test]
    fn test_overlay_spans_positioned_by_percent() {
        let mut doc = parse_document(
            r#"<div><svg viewBox="0 0 1000 1000"><text x="100" y="240" font-size="50">abcd</text><text x="0" y="0"></text></svg></div>"#,
        )
        .unwrap();
        let root = svg_of(&doc);
        let container = doc.parent(root).unwrap();
        let overlays =
            overlay_selectable_spans(&mut doc, root, container, &AttributeGeometry::default()).unwrap();

        let spans = doc.element_children(overlays);
        assert_eq!(spans.len(), 1);
        let span = spans[0];
        assert_eq!(doc.text_content(span), "abcd");
        assert_eq!(doc.style_property(span, "left").as_deref(), Some("10%"));
        assert_eq!(doc.style_property(span, "top").as_deref(), Some("20%"));
        assert_eq!(doc.style_property(span, "height").as_deref(), Some("5%"));
        assert_eq!(doc.style_property(span, "font-size").as_deref(), Some("5cqh"));
        assert_eq!(doc.style_property(overlays, "container-type").as_deref(), Some("size"));
        assert_eq!(doc.style_property(overlays, "width").as_deref(), Some("100%"));

        // A second pass replaces the first.
        overlay_selectable_spans(&mut doc, root, container, &AttributeGeometry::default()).unwrap();
        assert_eq!(doc.elements_by_class(container, OVERLAY_CONTAINER_CLASS).len(), 1);
    }

    #[test]
    fn test_highlight_links() {
        let mut doc = parse_document(
            r#"<div><svg viewBox="0 0 1000 1000"><a xlink:href="https://example.org/"><text x="100" y="240" font-size="50">link</text></a><text x="100" y="540" font-size="50" fill="red">plain</text></svg></div>"#,
        )
        .unwrap();
        let root = svg_of(&doc);
        let container = doc.parent(root).unwrap();
        let overlays = normalize_text_selection(
            &mut doc,
            root,
            container,
            TextSelectionMode::InlineHighlight,
            &AttributeGeometry::default(),
        )
        .unwrap()
        .unwrap();

        let runs = doc.element_children(overlays);
        assert_eq!(runs.len(), 2);
        assert!(doc.is_tag(runs[0], "a"));
        assert_eq!(doc.attr(runs[0], "href"), Some("https://example.org/"));
        assert!(doc.is_tag(runs[1], "span"));
        assert_eq!(doc.style_property(runs[1], "color").as_deref(), Some("red"));
        for text in doc.elements_by_tag(root, "text") {
            assert_eq!(doc.attr(text, "fill-opacity"), Some("0"));
        }
    }

    #[test]
    fn test_native_selection_is_untouched() {
        let mut doc = parse_document(r#"<div><svg viewBox="0 0 10 10"><text x="1" y="5">a</text></svg></div>"#)
            .unwrap();
        let root = svg_of(&doc);
        let container = doc.parent(root).unwrap();
        let before = outer_markup(&doc, container);
        let result = normalize_text_selection(
            &mut doc,
            root,
            container,
            TextSelectionMode::Native,
            &AttributeGeometry::default(),
        )
        .unwrap();
        assert!(result.is_none());
        assert_eq!(outer_markup(&doc, container), before);
    }

    #[test]
    fn test_fix_xlink_references() {
        let mut doc = parse_document(
            r#"<svg><image xlink:href="a.png" width="1"/><image href="b.png"/></svg>"#,
        )
        .unwrap();
        let root = svg_of(&doc);
        assert_eq!(fix_xlink_references(&mut doc, root), 1);
        let image = doc.elements_by_tag(root, "image")[0];
        assert_eq!(doc.attr(image, "xlink:href"), Some("a.png"));
    }
}
