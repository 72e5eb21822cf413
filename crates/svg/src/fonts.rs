//! Embedded font handling for imported SVG documents.

use slidedrive_core::normalize::normalize_font_family;
use slidedrive_core::{Document, FontRegistry, NodeId, Result};

/// Elements that make up an embedded SVG font.
const FONT_ELEMENTS: &[&str] = &["font", "font-face", "missing-glyph", "glyph"];

/// Rewrite every `font-family` attribute to its normalized form.
pub fn normalize_font_families(doc: &mut Document, root: NodeId) -> usize {
    let carriers = doc.find_descendants(root, |d, n| d.has_attr(n, "font-family"));
    for &node in &carriers {
        if let Some(family) = doc.attr(node, "font-family").map(normalize_font_family) {
            doc.set_attr(node, "font-family", family);
        }
    }
    carriers.len()
}

/// Load every `font` below `root` into `registry`, then detach all font
/// elements from the document.
///
/// Returns the detached `font` elements so a caller can place them again.
pub fn extract_fonts(doc: &mut Document, root: NodeId, registry: &mut FontRegistry) -> Result<Vec<NodeId>> {
    let fonts = doc.elements_by_tag(root, "font");
    for &font in &fonts {
        registry.load_font(doc, font)?;
    }

    // Stray faces and glyphs outside a font go as well.
    let strays: Vec<NodeId> = doc
        .find_descendants(root, |d, n| {
            d.element(n).is_some_and(|el| FONT_ELEMENTS.contains(&el.local_name()))
        })
        .into_iter()
        .filter(|&n| !doc.ancestors(n).any(|a| fonts.contains(&a)))
        .collect();
    for node in strays {
        doc.detach(node);
    }
    if !fonts.is_empty() {
        log::debug!("extracted {} embedded fonts", fonts.len());
    }
    Ok(fonts)
}

/// Place font elements under the first `defs` of `svg`, creating one
/// when there is none.
pub fn attach_fonts(doc: &mut Document, svg: NodeId, fonts: &[NodeId]) {
    if fonts.is_empty() {
        return;
    }
    let defs = match doc.element_children(svg).into_iter().find(|&c| doc.is_tag(c, "defs")) {
        Some(defs) => defs,
        None => {
            let defs = doc.create_svg("defs");
            let first = doc.first_child(svg);
            doc.insert_before(svg, defs, first);
            defs
        }
    };
    for &font in fonts {
        doc.append_child(defs, font);
    }
}
