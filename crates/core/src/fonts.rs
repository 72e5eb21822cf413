//! Font Resource Manager.
//!
//! Embedded SVG fonts are a document-level resource. Each distinct
//! `<font-face>` description becomes one [`FontResource`]; glyphs loaded
//! for the same description accumulate. The registry persists itself into
//! the page as a style sheet (for rendering) plus a JSON script (for
//! reloading), so a saved deck carries its fonts with it.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::dom::{Document, Namespace, NodeId};
use crate::error::{Error, Result};
use crate::markup;

/// Id of the `<style>` element holding the `@font-face` rules.
pub const FONT_STYLE_ID: &str = "SVGFontHelper-style";

/// Id of the `<script type="application/json">` element holding font data.
pub const FONT_DATA_ID: &str = "SVGFontHelper-data";

/// Key identifying a font resource, read from an SVG `<font-face>`.
///
/// Field order defines the comparison order used for deduplication and for
/// the (otherwise insignificant) persisted sort order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontDescriptor {
    pub font_family: String,
    pub font_style: String,
    pub font_size: String,
    pub font_variant: String,
    pub font_weight: String,
    pub font_stretch: String,
    pub units_per_em: String,
    pub ascent: String,
    pub descent: String,
}

impl FontDescriptor {
    /// Build a descriptor from a `<font-face>` element.
    pub fn from_font_face(doc: &Document, face: NodeId) -> Result<Self> {
        let get = |name: &str, default: &str| {
            doc.attr(face, name)
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
                .to_string()
        };

        let font_family = get("font-family", "");
        if font_family.is_empty() {
            return Err(Error::MalformedFont("font-family not specified".to_string()));
        }

        Ok(Self {
            font_family,
            font_style: get("font-style", "all"),
            font_size: get("font-size", "all"),
            font_variant: get("font-variant", "normal"),
            font_weight: get("font-weight", "normal"),
            font_stretch: get("font-stretch", "all"),
            units_per_em: get("units-per-em", "1000"),
            ascent: get("ascent", ""),
            descent: get("descent", ""),
        })
    }
}

/// Outline and advance of one glyph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Glyph {
    pub horiz_adv_x: Option<String>,
    pub d: Option<String>,
}

impl Glyph {
    fn from_element(doc: &Document, el: NodeId) -> Self {
        Self {
            horiz_adv_x: doc.attr(el, "horiz-adv-x").map(str::to_string),
            d: doc.attr(el, "d").map(str::to_string),
        }
    }
}

/// Glyph data of one font resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontResource {
    pub missing_glyph: Option<Glyph>,
    /// Glyphs keyed by the `unicode` attribute (usually one code point).
    pub unicode_glyphs: BTreeMap<String, Glyph>,
}

impl FontResource {
    /// Merge another resource's glyphs into this one; incoming glyphs win.
    pub fn merge(&mut self, other: FontResource) {
        if other.missing_glyph.is_some() {
            self.missing_glyph = other.missing_glyph;
        }
        self.unicode_glyphs.extend(other.unicode_glyphs);
    }

    /// Merge another resource's glyphs without replacing ones already present.
    pub fn fill_from(&mut self, other: FontResource) {
        if self.missing_glyph.is_none() {
            self.missing_glyph = other.missing_glyph;
        }
        for (unicode, glyph) in other.unicode_glyphs {
            self.unicode_glyphs.entry(unicode).or_insert(glyph);
        }
    }
}

/// Registry of font resources owned by one deck.
#[derive(Debug, Clone, Default)]
pub struct FontRegistry {
    fonts: BTreeMap<FontDescriptor, FontResource>,
    reloaded: bool,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn get(&self, descriptor: &FontDescriptor) -> Option<&FontResource> {
        self.fonts.get(descriptor)
    }

    /// Resources in descriptor order.
    pub fn iter(&self) -> impl Iterator<Item = (&FontDescriptor, &FontResource)> {
        self.fonts.iter()
    }

    /// Whether [`FontRegistry::reload`] has run.
    pub fn has_reloaded(&self) -> bool {
        self.reloaded
    }

    /// Load an SVG `<font>` element, merging its glyphs into the keyed resource.
    pub fn load_font(&mut self, doc: &Document, font_el: NodeId) -> Result<FontDescriptor> {
        let face = doc
            .find_descendant(font_el, |d, n| d.is_tag(n, "font-face"))
            .ok_or_else(|| Error::MalformedFont("No <font-face /> found in font.".to_string()))?;
        let descriptor = FontDescriptor::from_font_face(doc, face)?;

        let mut incoming = FontResource::default();
        if let Some(missing) = doc.find_descendant(font_el, |d, n| d.is_tag(n, "missing-glyph")) {
            incoming.missing_glyph = Some(Glyph::from_element(doc, missing));
        }
        for glyph in doc.elements_by_tag(font_el, "glyph") {
            match doc.attr(glyph, "unicode") {
                Some(unicode) => {
                    incoming
                        .unicode_glyphs
                        .insert(unicode.to_string(), Glyph::from_element(doc, glyph));
                }
                None => log::warn!("Skipping glyph without unicode in {}", descriptor.font_family),
            }
        }

        log::debug!(
            "Loaded font {} ({} glyphs)",
            descriptor.font_family,
            incoming.unicode_glyphs.len()
        );

        self.merge_entry(descriptor.clone(), incoming);
        Ok(descriptor)
    }

    fn merge_entry(&mut self, descriptor: FontDescriptor, resource: FontResource) {
        self.fonts.entry(descriptor).or_default().merge(resource);
    }

    /// Merge the resources persisted in `doc` into the registry.
    ///
    /// Safe to call repeatedly; marks the registry as reloaded.
    pub fn reload(&mut self, doc: &Document) -> Result<()> {
        self.reloaded = true;
        self.reload_from(doc)
    }

    /// Merge resources persisted in some other document (e.g. an imported deck).
    pub fn reload_from(&mut self, doc: &Document) -> Result<()> {
        let Some(data_el) = doc.element_by_id(FONT_DATA_ID) else {
            return Ok(());
        };
        let json = doc.text_content(data_el);
        if json.trim().is_empty() {
            return Ok(());
        }
        let entries: Vec<(FontDescriptor, FontResource)> = serde_json::from_str(&json)?;
        log::debug!("Reloading {} persisted font resources", entries.len());
        for (descriptor, resource) in entries {
            // In-memory glyphs are newer than the persisted copy.
            self.fonts.entry(descriptor).or_default().fill_from(resource);
        }
        Ok(())
    }

    /// Persist every resource into `doc` as a style sheet plus JSON data.
    ///
    /// Reloads first if that has not happened yet, so resources that were
    /// already in the page are not clobbered.
    pub fn write_fonts(&mut self, doc: &mut Document) -> Result<()> {
        if !self.reloaded {
            self.reload(doc)?;
        }

        let host = doc
            .find_descendant(doc.root(), |d, n| d.is_tag(n, "head"))
            .unwrap_or_else(|| doc.root());

        let style_el = ensure_element(doc, host, "style", FONT_STYLE_ID);
        let data_el = ensure_element(doc, host, "script", FONT_DATA_ID);
        doc.set_attr(data_el, "type", "application/json");

        let entries: Vec<(&FontDescriptor, &FontResource)> = self.fonts.iter().collect();
        let json = escape_script_json(&serde_json::to_string_pretty(&entries)?);
        doc.set_text_content(data_el, &json);

        let rules = self
            .fonts
            .iter()
            .map(|(d, r)| font_face_rule(d, r))
            .collect::<Vec<_>>()
            .join("\n");
        doc.set_text_content(style_el, &rules);

        log::info!("Wrote {} font resources", self.fonts.len());
        Ok(())
    }
}

/// Escape markup-significant characters so the JSON can sit in a `script`
/// body and still parse as markup. The escapes are valid JSON string escapes.
fn escape_script_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            c => out.push(c),
        }
    }
    out
}

fn ensure_element(doc: &mut Document, host: NodeId, tag: &str, id: &str) -> NodeId {
    if let Some(existing) = doc.element_by_id(id) {
        return existing;
    }
    let el = doc.create_element(tag, Namespace::Html);
    doc.set_attr(el, "id", id);
    doc.append_child(host, el);
    el
}

fn font_face_rule(d: &FontDescriptor, resource: &FontResource) -> String {
    let mut rule = String::from("@font-face {\n");
    rule.push_str(&format!("  font-family: \"{}\";\n", d.font_family));
    rule.push_str(&format!("  font-style: {};\n", d.font_style));
    rule.push_str(&format!("  font-size: {};\n", d.font_size));
    rule.push_str(&format!("  font-variant: {};\n", d.font_variant));
    rule.push_str(&format!("  font-weight: {};\n", d.font_weight));
    rule.push_str(&format!("  font-stretch: {};\n", d.font_stretch));
    rule.push_str(&format!("  units-per-em: {};\n", d.units_per_em));
    if !d.ascent.is_empty() {
        rule.push_str(&format!("  ascent: {};\n", d.ascent));
    }
    if !d.descent.is_empty() {
        rule.push_str(&format!("  descent: {};\n", d.descent));
    }
    rule.push_str(&format!("  src: local(\"{}\"),\n", d.font_family));
    rule.push_str(&format!(
        "       url(\"{}\") format(\"svg\");\n",
        font_data_uri(d, resource)
    ));
    rule.push_str(" }");
    rule
}

/// Base64 `data:` URI of a standalone SVG font document for one resource.
pub fn font_data_uri(d: &FontDescriptor, resource: &FontResource) -> String {
    let mut doc = Document::new();
    let svg = doc.create_svg("svg");
    doc.set_attr(svg, "xmlns", "http://www.w3.org/2000/svg");
    let defs = doc.create_svg("defs");
    let font = doc.create_svg("font");
    let face = doc.create_svg("font-face");
    let root = doc.root();
    doc.append_child(root, svg);
    doc.append_child(svg, defs);
    doc.append_child(defs, font);
    doc.append_child(font, face);

    for (name, value) in [
        ("font-family", &d.font_family),
        ("font-style", &d.font_style),
        ("font-size", &d.font_size),
        ("font-variant", &d.font_variant),
        ("font-weight", &d.font_weight),
        ("font-stretch", &d.font_stretch),
        ("units-per-em", &d.units_per_em),
        ("ascent", &d.ascent),
        ("descent", &d.descent),
    ] {
        doc.set_attr(face, name, value.as_str());
    }

    if let Some(missing) = &resource.missing_glyph {
        let el = doc.create_svg("missing-glyph");
        set_glyph_attrs(&mut doc, el, missing);
        doc.append_child(font, el);
    }
    for (unicode, glyph) in &resource.unicode_glyphs {
        let el = doc.create_svg("glyph");
        doc.set_attr(el, "unicode", unicode.as_str());
        set_glyph_attrs(&mut doc, el, glyph);
        doc.append_child(font, el);
    }

    let body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>{}",
        markup::outer_markup(&doc, svg)
    );
    format!("data:image/svg+xml;base64,{}", STANDARD.encode(body.as_bytes()))
}

fn set_glyph_attrs(doc: &mut Document, el: NodeId, glyph: &Glyph) {
    if let Some(d) = &glyph.d {
        doc.set_attr(el, "d", d.as_str());
    }
    if let Some(adv) = &glyph.horiz_adv_x {
        doc.set_attr(el, "horiz-adv-x", adv.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse_document;

    fn font_doc(glyphs: &str) -> (Document, NodeId) {
        let src = format!(
            r#"<svg><defs><font horiz-adv-x="2048"><font-face font-family="sans embedded" units-per-em="2048" ascent="1854"/><missing-glyph horiz-adv-x="2048" d="M0 0"/>{}</font></defs></svg>"#,
            glyphs
        );
        let doc = parse_document(&src).unwrap();
        let font = doc.elements_by_tag(doc.root(), "font")[0];
        (doc, font)
    }

    #[test]
    fn test_load_font_merges_glyph_sets() {
        let mut registry = FontRegistry::new();
        let (a, fa) = font_doc(r#"<glyph unicode="A" horiz-adv-x="1366" d="M1 1"/>"#);
        let (b, fb) = font_doc(r#"<glyph unicode="B" horiz-adv-x="1366" d="M2 2"/>"#);

        let key = registry.load_font(&a, fa).unwrap();
        registry.load_font(&b, fb).unwrap();

        assert_eq!(registry.len(), 1);
        let resource = registry.get(&key).unwrap();
        assert!(resource.unicode_glyphs.contains_key("A"));
        assert!(resource.unicode_glyphs.contains_key("B"));
        assert!(resource.missing_glyph.is_some());
    }

    #[test]
    fn test_descriptor_defaults() {
        let (doc, font) = font_doc("");
        let face = doc.elements_by_tag(font, "font-face")[0];
        let d = FontDescriptor::from_font_face(&doc, face).unwrap();
        assert_eq!(d.font_style, "all");
        assert_eq!(d.font_weight, "normal");
        assert_eq!(d.units_per_em, "2048");
        assert_eq!(d.descent, "");
    }

    #[test]
    fn test_descriptor_ordering_is_lexicographic() {
        let (doc, font) = font_doc("");
        let face = doc.elements_by_tag(font, "font-face")[0];
        let base = FontDescriptor::from_font_face(&doc, face).unwrap();
        let mut bolder = base.clone();
        bolder.font_weight = "bold".to_string();
        let mut other_family = base.clone();
        other_family.font_family = "aaa".to_string();

        assert!(bolder < base);
        assert!(other_family < bolder);
    }

    #[test]
    fn test_missing_font_face_is_malformed() {
        let doc = parse_document("<svg><font><glyph unicode=\"A\"/></font></svg>").unwrap();
        let font = doc.elements_by_tag(doc.root(), "font")[0];
        let mut registry = FontRegistry::new();
        assert!(matches!(
            registry.load_font(&doc, font),
            Err(Error::MalformedFont(_))
        ));
    }

    #[test]
    fn test_missing_family_is_malformed() {
        let doc = parse_document("<svg><font><font-face units-per-em=\"10\"/></font></svg>").unwrap();
        let font = doc.elements_by_tag(doc.root(), "font")[0];
        let mut registry = FontRegistry::new();
        assert!(matches!(
            registry.load_font(&doc, font),
            Err(Error::MalformedFont(_))
        ));
    }

    #[test]
    fn test_write_fonts_is_idempotent_and_reloadable() {
        let mut page = parse_document("<html><head></head><body></body></html>").unwrap();
        let (src, font) = font_doc(r#"<glyph unicode="A" d="M1 1"/>"#);

        let mut registry = FontRegistry::new();
        registry.load_font(&src, font).unwrap();
        registry.write_fonts(&mut page).unwrap();
        registry.write_fonts(&mut page).unwrap();

        let head = page.elements_by_tag(page.root(), "head")[0];
        assert_eq!(page.element_children(head).len(), 2);
        let style = page.element_by_id(FONT_STYLE_ID).unwrap();
        assert!(page.text_content(style).contains("font-family: \"sans embedded\""));
        assert!(page.text_content(style).contains("data:image/svg+xml;base64,"));

        let mut fresh = FontRegistry::new();
        fresh.reload(&page).unwrap();
        assert!(fresh.has_reloaded());
        assert_eq!(fresh.len(), 1);
        let (_, resource) = fresh.iter().next().unwrap();
        assert!(resource.unicode_glyphs.contains_key("A"));
    }

    #[test]
    fn test_markup_significant_glyphs_survive_page_round_trip() {
        let mut page = parse_document("<html><head></head><body></body></html>").unwrap();
        let (src, font) = font_doc(
            r#"<glyph unicode="&lt;" d="M1 1"/><glyph unicode="&amp;" d="M2 2"/><glyph unicode="&gt;" d="M3 3"/>"#,
        );
        let mut registry = FontRegistry::new();
        registry.load_font(&src, font).unwrap();
        registry.write_fonts(&mut page).unwrap();

        let data = page.element_by_id(FONT_DATA_ID).unwrap();
        assert!(!page.text_content(data).contains('<'));

        let saved = crate::markup::outer_markup(&page, page.root());
        let reloaded_page = parse_document(&saved).unwrap();
        let mut fresh = FontRegistry::new();
        fresh.reload(&reloaded_page).unwrap();
        let (_, resource) = fresh.iter().next().unwrap();
        for glyph in ["<", "&", ">"] {
            assert!(resource.unicode_glyphs.contains_key(glyph), "lost {:?}", glyph);
        }
    }

    #[test]
    fn test_write_fonts_reloads_existing_page_fonts_first() {
        let mut page = parse_document("<html><head></head></html>").unwrap();
        let (a, fa) = font_doc(r#"<glyph unicode="A"/>"#);
        let mut first = FontRegistry::new();
        first.load_font(&a, fa).unwrap();
        first.write_fonts(&mut page).unwrap();

        // A new registry on the same page only knows about "B" in memory.
        let (b, fb) = font_doc(r#"<glyph unicode="B"/>"#);
        let mut second = FontRegistry::new();
        second.load_font(&b, fb).unwrap();
        second.write_fonts(&mut page).unwrap();

        let (_, resource) = second.iter().next().unwrap();
        assert!(resource.unicode_glyphs.contains_key("A"));
        assert!(resource.unicode_glyphs.contains_key("B"));
    }
}
