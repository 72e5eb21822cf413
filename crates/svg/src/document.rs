//! The slide-document value the normalization steps operate on.

use slidedrive_core::markup::{outer_markup, parse_document, parse_fragment};
use slidedrive_core::{scale, Document, Error, Measure, NodeId, Result};

/// A document holding one root `svg`, wrapped in its scale container.
#[derive(Debug, Clone)]
pub struct SlideDocument {
    doc: Document,
    root: NodeId,
    container: NodeId,
}

impl SlideDocument {
    /// Wrap `svg` in a scale container (or reuse the one around it).
    pub fn new(mut doc: Document, svg: NodeId) -> Result<Self> {
        let container = scale::wrap(&mut doc, svg)?;
        Ok(Self {
            doc,
            root: svg,
            container,
        })
    }

    /// Parse markup and take its first `svg` element as the root.
    pub fn parse(markup: &str) -> Result<Self> {
        let doc = parse_document(markup)?;
        let svg = first_svg(&doc, doc.root())?;
        Self::new(doc, svg)
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// The root `svg` element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The `div.SVGContainer` around the root.
    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn into_document(self) -> Document {
        self.doc
    }

    /// Serialize the root and parse it back in place.
    ///
    /// Drops anything the markup codec cannot represent, such as nodes
    /// built with structure that does not round-trip.
    pub fn reparse(&mut self) -> Result<()> {
        let markup = outer_markup(&self.doc, self.root);
        let scratch = self.doc.create_html("div");
        parse_fragment(&mut self.doc, scratch, &markup)?;
        let replacement = first_svg(&self.doc, scratch)?;
        self.doc.replace(self.root, replacement);
        self.root = replacement;
        log::debug!("reparsed svg root ({} bytes)", markup.len());
        Ok(())
    }

    pub fn scale_to(&mut self, measure: Measure) -> Result<()> {
        scale::scale_to(&mut self.doc, self.container, measure)
    }

    /// Markup of the scale container and everything in it.
    pub fn markup(&self) -> String {
        outer_markup(&self.doc, self.container)
    }
}

fn first_svg(doc: &Document, scope: NodeId) -> Result<NodeId> {
    doc.find_descendant(scope, |d, n| d.is_tag(n, "svg"))
        .ok_or_else(|| Error::NotFound("no svg element in document".to_string()))
}
