//! Removal of content that never renders.

use slidedrive_core::normalize::is_blank;
use slidedrive_core::{Document, NodeId, NodeKind};

/// Class LibreOffice puts on groups holding a line shape.
pub const LINE_SHAPE_CLASS: &str = "com.sun.star.drawing.LineShape";

/// Elements whose whitespace is significant.
const TEXT_CONTAINERS: &[&str] = &["text", "tspan", "textPath", "title", "desc", "style", "script"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visibility {
    Visible,
    Hidden,
}

fn declared(doc: &Document, node: NodeId, property: &str) -> Option<String> {
    doc.style_property(node, property)
        .or_else(|| doc.attr(node, property).map(str::to_string))
        .map(|v| v.trim().to_ascii_lowercase())
}

fn explicit_visibility(doc: &Document, node: NodeId) -> Option<Visibility> {
    match declared(doc, node, "visibility")?.as_str() {
        "visible" => Some(Visibility::Visible),
        "hidden" | "collapse" => Some(Visibility::Hidden),
        _ => None,
    }
}

fn is_display_none(doc: &Document, node: NodeId) -> bool {
    declared(doc, node, "display").as_deref() == Some("none")
}

/// Remove everything below `root` that cannot render.
///
/// Elements with `display: none` go with their whole subtree. An element
/// whose effective visibility is hidden goes unless some descendant sets
/// itself visible again; visibility is inherited, and an explicit value
/// overrides the inherited one at every level. Returns the number of
/// removed subtrees.
pub fn prune_invisible(doc: &mut Document, root: NodeId) -> usize {
    let inherited = explicit_visibility(doc, root).unwrap_or(Visibility::Visible);
    let mut removed = 0;
    for child in doc.element_children(root) {
        prune_node(doc, child, inherited, &mut removed);
    }
    if removed > 0 {
        log::debug!("pruned {} invisible subtrees", removed);
    }
    removed
}

/// Returns whether anything visible remains in the subtree.
fn prune_node(doc: &mut Document, node: NodeId, inherited: Visibility, removed: &mut usize) -> bool {
    if is_display_none(doc, node) {
        doc.detach(node);
        *removed += 1;
        return false;
    }
    let visibility = explicit_visibility(doc, node).unwrap_or(inherited);

    let mut has_visible_descendant = false;
    for child in doc.element_children(node) {
        has_visible_descendant |= prune_node(doc, child, visibility, removed);
    }

    if visibility == Visibility::Visible || has_visible_descendant {
        true
    } else {
        doc.detach(node);
        *removed += 1;
        false
    }
}

/// Strip empty `defs` and whitespace-only text outside text containers.
pub fn minify(doc: &mut Document, root: NodeId) -> usize {
    let mut removed = 0;
    for node in doc.descendants(root).collect::<Vec<_>>() {
        let drop = match doc.kind(node) {
            NodeKind::Text(text) => {
                is_blank(text)
                    && !doc
                        .parent(node)
                        .and_then(|p| doc.element(p))
                        .is_some_and(|el| TEXT_CONTAINERS.contains(&el.local_name()))
            }
            NodeKind::Element(el) if el.local_name() == "defs" => doc
                .children(node)
                .iter()
                .all(|&c| matches!(doc.kind(c), NodeKind::Text(t) if is_blank(t))),
            _ => false,
        };
        if drop {
            doc.detach(node);
            removed += 1;
        }
    }
    removed
}

/// Remove the masks LibreOffice attaches to line shapes; they clip the
/// line away in most renderers.
pub fn remove_line_shape_masks(doc: &mut Document, root: NodeId) -> usize {
    let masks: Vec<NodeId> = doc
        .elements_by_class(root, LINE_SHAPE_CLASS)
        .into_iter()
        .flat_map(|shape| doc.elements_by_tag(shape, "mask"))
        .collect();
    let mut removed = 0;
    for mask in masks {
        if doc.is_attached(mask) {
            doc.detach(mask);
            removed += 1;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use slidedrive_core::markup::{outer_markup, parse_document};

    fn pruned(markup: &str) -> String {
        let mut doc = parse_document(markup).unwrap();
        let root = doc.elements_by_tag(doc.root(), "svg")[0];
        prune_invisible(&mut doc, root);
        outer_markup(&doc, root)
    }

    #[test]
    fn test_display_none_removes_visible_descendants() {
        assert_eq!(
            pruned(r#"<svg><g style="display: none"><rect visibility="visible"/></g><rect id="kept"/></svg>"#),
            r#"<svg><rect id="kept"/></svg>"#
        );
    }

    #[test]
    fn test_visible_descendant_keeps_hidden_ancestors() {
        assert_eq!(
            pruned(
                r#"<svg><g visibility="hidden"><g><rect id="shown" visibility="visible"/></g><rect id="gone"/><g><circle/></g></g></svg>"#
            ),
            r#"<svg><g visibility="hidden"><g><rect id="shown" visibility="visible"/></g></g></svg>"#
        );
    }

    #[test]
    fn test_hidden_root_keeps_visible_slide() {
        assert_eq!(
            pruned(
                r#"<svg><g visibility="hidden"><g class="Slide" id="a" visibility="visible"><text>A</text></g><g class="Slide" id="b"><text>B</text></g></g></svg>"#
            ),
            r#"<svg><g visibility="hidden"><g class="Slide" id="a" visibility="visible"><text>A</text></g></g></svg>"#
        );
    }

    #[test]
    fn test_collapse_in_style_counts_as_hidden() {
        assert_eq!(
            pruned(r#"<svg><rect style="visibility: collapse"/><rect/></svg>"#),
            r#"<svg><rect/></svg>"#
        );
    }

    #[test]
    fn test_minify() {
        let mut doc = parse_document(
            "<svg>\n  <defs>\n  </defs>\n  <defs><font/></defs>\n  <text> a <tspan> </tspan></text>\n</svg>",
        )
        .unwrap();
        let root = doc.elements_by_tag(doc.root(), "svg")[0];
        minify(&mut doc, root);
        assert_eq!(
            outer_markup(&doc, root),
            "<svg><defs><font/></defs><text> a <tspan> </tspan></text></svg>"
        );
    }

    #[test]
    fn test_remove_line_shape_masks() {
        let mut doc = parse_document(
            r#"<svg><g class="com.sun.star.drawing.LineShape"><mask id="m"/><path d="M0 0"/></g><mask id="other"/></svg>"#,
        )
        .unwrap();
        let root = doc.elements_by_tag(doc.root(), "svg")[0];
        assert_eq!(remove_line_shape_masks(&mut doc, root), 1);
        assert_eq!(doc.elements_by_tag(root, "mask").len(), 1);
    }
}
