//! Geometry of SVG elements, measured without a renderer.
//!
//! Text overlays are positioned from boxes expressed as fractions of the
//! root svg. A [`Geometry`] supplies per-element boxes in local user space
//! and the mapping each nested viewport establishes; [`relative_bbox`]
//! composes them up to the root.

use slidedrive_core::scale::{parse_length, ViewBox};
use slidedrive_core::{Document, Error, NodeId, Result};

/// Class of the invisible rect that makes a viewport fill its box.
pub const BBOX_FILL_CLASS: &str = "SVGContainer-bbox-fill";

/// An axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest box containing both.
    pub fn union(self, other: BBox) -> BBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);
        BBox::new(x, y, right - x, bottom - y)
    }

    /// Whether a box relative to the root looks like a failed measurement:
    /// empty, or spanning the whole root in either direction.
    pub fn is_degenerate_fraction(&self) -> bool {
        const EPSILON: f64 = 1e-9;
        let bad = |v: f64| !v.is_finite() || v <= EPSILON || (v - 1.0).abs() <= EPSILON;
        bad(self.width) || bad(self.height)
    }
}

/// Placement of a nested viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// The viewport's box in its parent's user space.
    pub outer: BBox,
    /// The user space it establishes (its viewBox).
    pub inner: BBox,
}

/// Source of element measurements.
pub trait Geometry {
    /// Box of `node` in the user space of its nearest viewport.
    fn bbox(&self, doc: &Document, node: NodeId) -> Option<BBox>;

    /// Placement of the viewport established by the `svg` element `svg`.
    fn viewport(&self, doc: &Document, svg: NodeId) -> Option<Viewport>;
}

/// The nearest `svg` ancestor of `node`.
pub fn viewport_element(doc: &Document, node: NodeId) -> Option<NodeId> {
    doc.ancestors(node).find(|&a| doc.is_tag(a, "svg"))
}

/// Box of `child` as fractions of the width and height of `root`.
///
/// An element that cannot be measured yields an empty box; callers treat
/// that like any other degenerate box.
pub fn relative_bbox<G: Geometry + ?Sized>(
    geometry: &G,
    doc: &Document,
    root: NodeId,
    child: NodeId,
) -> Result<BBox> {
    let mut current = viewport_element(doc, child).ok_or_else(outside_root)?;
    let Some(mut bbox) = geometry.bbox(doc, child) else {
        return Ok(BBox::default());
    };

    loop {
        let Some(view) = geometry.viewport(doc, current) else {
            return Ok(BBox::default());
        };
        let outer = if current == root {
            BBox::new(0.0, 0.0, 1.0, 1.0)
        } else {
            view.outer
        };
        let inner = view.inner;
        if inner.width <= 0.0 || inner.height <= 0.0 {
            return Ok(BBox::default());
        }
        bbox = BBox::new(
            outer.x + (bbox.x - inner.x) * outer.width / inner.width,
            outer.y + (bbox.y - inner.y) * outer.height / inner.height,
            bbox.width * outer.width / inner.width,
            bbox.height * outer.height / inner.height,
        );
        if current == root {
            return Ok(bbox);
        }
        current = viewport_element(doc, current).ok_or_else(outside_root)?;
    }
}

fn outside_root() -> Error {
    Error::InvalidArgument("element must be a descendant of the svg root".to_string())
}

/// Measures elements from their declared attributes.
///
/// Shapes use their position and size attributes, text is estimated from
/// its font size and character count, and containers take the union of
/// their children. Transforms are not applied.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeGeometry {
    /// Font size used when none is declared.
    pub default_font_size: f64,
    /// Average advance of one character, in ems.
    pub char_width: f64,
    /// Height above the baseline, in ems.
    pub ascent: f64,
}

impl Default for AttributeGeometry {
    fn default() -> Self {
        Self {
            default_font_size: 16.0,
            char_width: 0.6,
            ascent: 0.8,
        }
    }
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
}

impl AttributeGeometry {
    /// User space of the viewport `node` lives in.
    fn user_space(&self, doc: &Document, node: NodeId) -> Option<BBox> {
        let svg = viewport_element(doc, node)?;
        self.viewport(doc, svg).map(|v| v.inner)
    }

    /// A length attribute, resolving percentages against the user space.
    fn length(&self, doc: &Document, node: NodeId, name: &str, axis: Axis) -> Option<f64> {
        let raw = doc.attr(node, name)?.trim();
        // Lists such as `x="10 20 30"` position the first glyph first.
        let first = raw.split(|c: char| c.is_whitespace() || c == ',').next()?;
        match first.strip_suffix('%') {
            Some(percent) => {
                let fraction = percent.trim().parse::<f64>().ok()? / 100.0;
                let space = self.user_space(doc, node)?;
                Some(match axis {
                    Axis::X => space.width * fraction,
                    Axis::Y => space.height * fraction,
                })
            }
            None => parse_length(first),
        }
    }

    fn font_size(&self, doc: &Document, node: NodeId) -> f64 {
        std::iter::once(node)
            .chain(doc.ancestors(node))
            .find_map(|n| {
                doc.style_property(n, "font-size")
                    .or_else(|| doc.attr(n, "font-size").map(str::to_string))
                    .and_then(|v| parse_length(&v))
                    .filter(|v| *v > 0.0)
            })
            .unwrap_or(self.default_font_size)
    }

    fn text_bbox(&self, doc: &Document, node: NodeId) -> Option<BBox> {
        let positioned = doc.has_attr(node, "x") || doc.has_attr(node, "y");
        if !positioned {
            // Unpositioned text takes its place from positioned runs inside it.
            if let Some(union) = self.children_union(doc, node) {
                return Some(union);
            }
        }

        let text = doc.text_content(node);
        let chars = text.trim().chars().count();
        if chars == 0 {
            return None;
        }
        let size = self.font_size(doc, node);
        let width = chars as f64 * self.char_width * size;
        let x = self.length(doc, node, "x", Axis::X).unwrap_or(0.0);
        let y = self.length(doc, node, "y", Axis::Y).unwrap_or(0.0);
        let anchor = std::iter::once(node)
            .chain(doc.ancestors(node))
            .find_map(|n| doc.attr(n, "text-anchor"));
        let left = match anchor {
            Some("middle") => x - width / 2.0,
            Some("end") => x - width,
            _ => x,
        };
        Some(BBox::new(left, y - self.ascent * size, width, size))
    }

    fn children_union(&self, doc: &Document, node: NodeId) -> Option<BBox> {
        doc.element_children(node)
            .into_iter()
            .filter_map(|c| self.bbox(doc, c))
            .reduce(BBox::union)
    }

    fn rect_like(&self, doc: &Document, node: NodeId) -> Option<BBox> {
        let width = self.length(doc, node, "width", Axis::X)?;
        let height = self.length(doc, node, "height", Axis::Y)?;
        Some(BBox::new(
            self.length(doc, node, "x", Axis::X).unwrap_or(0.0),
            self.length(doc, node, "y", Axis::Y).unwrap_or(0.0),
            width,
            height,
        ))
    }

    fn points_bbox(points: &str) -> Option<BBox> {
        let values: Vec<f64> = points
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter_map(|v| v.parse().ok())
            .collect();
        values
            .chunks_exact(2)
            .map(|p| BBox::new(p[0], p[1], 0.0, 0.0))
            .reduce(BBox::union)
    }
}

impl Geometry for AttributeGeometry {
    fn bbox(&self, doc: &Document, node: NodeId) -> Option<BBox> {
        let element = doc.element(node)?;
        match element.local_name() {
            "text" | "tspan" => self.text_bbox(doc, node),
            "rect" | "image" | "use" | "foreignObject" => self.rect_like(doc, node),
            "svg" => self.viewport(doc, node).map(|v| v.outer),
            "circle" => {
                let r = self.length(doc, node, "r", Axis::X)?;
                let cx = self.length(doc, node, "cx", Axis::X).unwrap_or(0.0);
                let cy = self.length(doc, node, "cy", Axis::Y).unwrap_or(0.0);
                Some(BBox::new(cx - r, cy - r, 2.0 * r, 2.0 * r))
            }
            "ellipse" => {
                let rx = self.length(doc, node, "rx", Axis::X)?;
                let ry = self.length(doc, node, "ry", Axis::Y)?;
                let cx = self.length(doc, node, "cx", Axis::X).unwrap_or(0.0);
                let cy = self.length(doc, node, "cy", Axis::Y).unwrap_or(0.0);
                Some(BBox::new(cx - rx, cy - ry, 2.0 * rx, 2.0 * ry))
            }
            "line" => {
                let x1 = self.length(doc, node, "x1", Axis::X).unwrap_or(0.0);
                let y1 = self.length(doc, node, "y1", Axis::Y).unwrap_or(0.0);
                let x2 = self.length(doc, node, "x2", Axis::X).unwrap_or(0.0);
                let y2 = self.length(doc, node, "y2", Axis::Y).unwrap_or(0.0);
                Some(BBox::new(x1.min(x2), y1.min(y2), (x2 - x1).abs(), (y2 - y1).abs()))
            }
            "polygon" | "polyline" => Self::points_bbox(doc.attr(node, "points")?),
            "defs" | "style" | "script" | "title" | "desc" | "mask" | "clipPath" => None,
            _ => self.children_union(doc, node),
        }
    }

    fn viewport(&self, doc: &Document, svg: NodeId) -> Option<Viewport> {
        let width = self.length(doc, svg, "width", Axis::X);
        let height = self.length(doc, svg, "height", Axis::Y);
        let view_box = doc.attr(svg, "viewBox").and_then(ViewBox::parse);

        let inner = match view_box {
            Some(vb) => BBox::new(vb.min_x, vb.min_y, vb.width, vb.height),
            None => BBox::new(0.0, 0.0, width?, height?),
        };
        let outer = BBox::new(
            self.length(doc, svg, "x", Axis::X).unwrap_or(0.0),
            self.length(doc, svg, "y", Axis::Y).unwrap_or(0.0),
            width.unwrap_or(inner.width),
            height.unwrap_or(inner.height),
        );
        Some(Viewport { outer, inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slidedrive_core::markup::parse_document;

    fn first(doc: &Document, tag: &str) -> NodeId {
        doc.elements_by_tag(doc.root(), tag)[0]
    }

    #[test]
    fn test_rect_relative_to_root() {
        let doc = parse_document(
            r#"<svg viewBox="0 0 200 100"><rect x="50" y="25" width="100" height="50"/></svg>"#,
        )
        .unwrap();
        let bbox = relative_bbox(&AttributeGeometry::default(), &doc, first(&doc, "svg"), first(&doc, "rect"))
            .unwrap();
        assert_eq!(bbox, BBox::new(0.25, 0.25, 0.5, 0.5));
        assert!(!bbox.is_degenerate_fraction());
    }

    #[test]
    fn test_nested_viewport_composes() {
        // The inner svg covers the right half and zooms in by two.
        let doc = parse_document(
            r#"<svg viewBox="0 0 200 100"><svg x="100" y="0" width="100" height="100" viewBox="0 0 50 50"><rect x="0" y="25" width="25" height="25"/></svg></svg>"#,
        )
        .unwrap();
        let root = first(&doc, "svg");
        let bbox = relative_bbox(&AttributeGeometry::default(), &doc, root, first(&doc, "rect")).unwrap();
        assert_eq!(bbox, BBox::new(0.5, 0.5, 0.25, 0.5));
    }

    #[test]
    fn test_text_estimate() {
        let doc = parse_document(
            r#"<svg viewBox="0 0 1000 1000"><text x="100" y="200" font-size="50">abcd</text></svg>"#,
        )
        .unwrap();
        let geometry = AttributeGeometry::default();
        let bbox = geometry.bbox(&doc, first(&doc, "text")).unwrap();
        assert_eq!(bbox, BBox::new(100.0, 160.0, 120.0, 50.0));
    }

    #[test]
    fn test_unpositioned_text_uses_runs() {
        let doc = parse_document(
            r#"<svg viewBox="0 0 1000 1000"><text font-size="10"><tspan x="10" y="20">ab</tspan><tspan x="10" y="40">cd</tspan></text></svg>"#,
        )
        .unwrap();
        let bbox = AttributeGeometry::default().bbox(&doc, first(&doc, "text")).unwrap();
        assert_eq!(bbox, BBox::new(10.0, 12.0, 12.0, 30.0));
    }

    #[test]
    fn test_percent_lengths_fill_viewport() {
        let doc = parse_document(
            r#"<svg viewBox="0 0 300 150"><rect class="SVGContainer-bbox-fill" x="0" y="0" width="100%" height="100%"/></svg>"#,
        )
        .unwrap();
        let root = first(&doc, "svg");
        let geometry = AttributeGeometry::default();
        assert_eq!(geometry.bbox(&doc, first(&doc, "rect")), Some(BBox::new(0.0, 0.0, 300.0, 150.0)));
        let bbox = relative_bbox(&geometry, &doc, root, first(&doc, "rect")).unwrap();
        assert!(bbox.is_degenerate_fraction());
    }

    #[test]
    fn test_unmeasurable_is_empty() {
        let doc = parse_document(r#"<svg viewBox="0 0 10 10"><text x="1" y="1"> </text></svg>"#).unwrap();
        let bbox = relative_bbox(&AttributeGeometry::default(), &doc, first(&doc, "svg"), first(&doc, "text"))
            .unwrap();
        assert!(bbox.is_degenerate_fraction());
    }

    #[test]
    fn test_outside_root_is_rejected() {
        let mut doc = Document::new();
        let rect = doc.create_svg("rect");
        let svg = doc.create_svg("svg");
        assert!(matches!(
            relative_bbox(&AttributeGeometry::default(), &doc, svg, rect),
            Err(Error::InvalidArgument(_))
        ));
    }
}
