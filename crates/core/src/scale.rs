//! Scale container keeping an inline SVG at its aspect ratio.
//!
//! The svg is absolutely positioned over an image whose intrinsic size has
//! the svg's aspect ratio; sizing that image by width or by height sizes the
//! container, and the svg follows.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};
use crate::media::Size;

pub const CONTAINER_CLASS: &str = "SVGContainer";
pub const SCALER_CLASS: &str = "SVGContainer-scaler";

/// Which dimension of the target the container follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Measure {
    Width,
    Height,
}

/// The `viewBox` of an svg element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewBox {
    pub fn parse(value: &str) -> Option<Self> {
        let parts: Vec<f64> = value
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|p| !p.is_empty())
            .map(|p| p.parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .ok()?;
        match parts.as_slice() {
            &[min_x, min_y, width, height] if width > 0.0 && height > 0.0 => Some(Self {
                min_x,
                min_y,
                width,
                height,
            }),
            _ => None,
        }
    }

    /// The viewBox of `svg`, falling back to its width/height attributes.
    pub fn of(doc: &Document, svg: NodeId) -> Option<Self> {
        if let Some(vb) = doc.attr(svg, "viewBox").and_then(Self::parse) {
            return Some(vb);
        }
        let width = doc.attr(svg, "width").and_then(parse_length)?;
        let height = doc.attr(svg, "height").and_then(parse_length)?;
        (width > 0.0 && height > 0.0).then_some(Self {
            min_x: 0.0,
            min_y: 0.0,
            width,
            height,
        })
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }

    /// Width and height divided by their greatest common divisor.
    pub fn reduced_ratio(&self) -> (u64, u64) {
        let w = self.width.round().max(1.0) as u64;
        let h = self.height.round().max(1.0) as u64;
        let d = gcd(w, h);
        (w / d, h / d)
    }
}

/// Parse a length such as `28cm` or `1024px`, ignoring the unit.
pub fn parse_length(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let end = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+' || c == 'e'))
        .unwrap_or(trimmed.len());
    trimmed[..end].parse().ok()
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

/// Wrap `svg` in a scale container, or return the one already around it.
pub fn wrap(doc: &mut Document, svg: NodeId) -> Result<NodeId> {
    if !doc.is_tag(svg, "svg") {
        return Err(Error::InvalidArgument(
            "scale container must wrap an svg element".to_string(),
        ));
    }
    if let Some(parent) = doc.parent(svg).filter(|&p| doc.has_class(p, CONTAINER_CLASS)) {
        return Ok(parent);
    }

    let container = doc.create_html("div");
    doc.add_class(container, CONTAINER_CLASS);
    doc.set_style_property(container, "position", "relative");

    for (property, value) in [
        ("position", "absolute"),
        ("top", "0"),
        ("bottom", "0"),
        ("left", "0"),
        ("right", "0"),
        ("width", "100%"),
        ("height", "100%"),
    ] {
        doc.set_style_property(svg, property, value);
    }

    let (w, h) = ViewBox::of(doc, svg).map_or((1, 1), |vb| vb.reduced_ratio());
    let scaler = doc.create_html("img");
    doc.add_class(scaler, SCALER_CLASS);
    doc.set_attr(scaler, "src", ratio_image_uri(w, h));
    for (property, value) in [
        ("width", "100%"),
        ("height", "auto"),
        ("max-width", "none"),
        ("max-height", "none"),
        ("min-height", "none"),
        ("display", "block"),
    ] {
        doc.set_style_property(scaler, property, value);
    }

    if doc.parent(svg).is_some() {
        doc.replace(svg, container);
    }
    doc.append_child(container, svg);
    doc.append_child(container, scaler);
    Ok(container)
}

/// An empty image with the given intrinsic size.
fn ratio_image_uri(width: u64, height: u64) -> String {
    let svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}"/>"#,
        width, height
    );
    format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg))
}

fn scaler_of(doc: &Document, container: NodeId) -> Result<NodeId> {
    doc.find_descendant(container, |d, n| d.has_class(n, SCALER_CLASS))
        .ok_or_else(|| Error::NotFound(format!("no .{} in container", SCALER_CLASS)))
}

/// Size the container by the width or the height of its parent.
pub fn scale_to(doc: &mut Document, container: NodeId, measure: Measure) -> Result<()> {
    let scaler = scaler_of(doc, container)?;
    let (width, height) = match measure {
        Measure::Width => ("100%", "auto"),
        Measure::Height => ("auto", "100%"),
    };
    doc.set_style_property(scaler, "width", width);
    doc.set_style_property(scaler, "height", height);
    Ok(())
}

/// Pick the measure that keeps the whole svg visible inside `target`.
pub fn fit_in(doc: &mut Document, container: NodeId, target: Size) -> Result<Measure> {
    let svg = doc
        .element_children(container)
        .into_iter()
        .find(|&c| doc.is_tag(c, "svg"))
        .ok_or_else(|| Error::NotFound("no svg in scale container".to_string()))?;

    let measure = match ViewBox::of(doc, svg) {
        Some(vb) if target.height > 0.0 && target.width / target.height > vb.aspect_ratio() => {
            Measure::Height
        }
        _ => Measure::Width,
    };
    scale_to(doc, container, measure)?;
    Ok(measure)
}

/// Every scale container below `scope`.
pub fn containers(doc: &Document, scope: NodeId) -> Vec<NodeId> {
    doc.elements_by_class(scope, CONTAINER_CLASS)
}
