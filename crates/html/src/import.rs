//! Importing slides from a dropped HTML document.

use std::rc::Rc;

use slidedrive_core::interval::{parse_time, SLIDE_CLASS, START_ATTR};
use slidedrive_core::markup::parse_document;
use slidedrive_core::{Deck, Document, NodeId, Result, SlideInterval};

/// Importer for HTML slide decks.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlImporter;

impl HtmlImporter {
    /// Create a new HTML importer.
    pub fn new() -> Self {
        Self
    }

    /// Parse dropped markup.
    pub fn parse(&self, markup: &str) -> Result<Document> {
        parse_document(markup)
    }

    /// Slides of `doc` that are not nested in another slide.
    pub fn outer_slides(&self, doc: &Document) -> Vec<NodeId> {
        doc.elements_by_class(doc.root(), SLIDE_CLASS)
            .into_iter()
            .filter(|&s| !doc.ancestors(s).any(|a| doc.has_class(a, SLIDE_CLASS)))
            .collect()
    }

    /// Copy the outer slides of `dropped` into `deck`.
    ///
    /// Font resources persisted in `dropped` are merged into the deck's
    /// registry and written back out. Each slide keeps its persisted start;
    /// a slide without one starts at `start` plus its position in the
    /// dropped document. Slides are moved into start order as they arrive.
    pub fn import(
        &self,
        deck: &mut Deck,
        dropped: &Document,
        start: f64,
    ) -> Result<Vec<Rc<SlideInterval>>> {
        deck.fonts_mut().reload_from(dropped)?;
        deck.write_fonts()?;

        let slides = self.outer_slides(dropped);
        let mut intervals = Vec::with_capacity(slides.len());
        for (i, slide) in slides.into_iter().enumerate() {
            let persisted = dropped.attr(slide, START_ATTR).and_then(parse_time);
            let node = deck.document_mut().import_node(dropped, slide);
            let renamed = release_taken_ids(deck, node);
            deck.append_slide(node);

            let interval = deck.interval(node)?;
            if renamed {
                let id = deck.slide_id(&interval);
                log::info!("imported slide renamed to #{} to keep ids unique", id);
            }
            let t = persisted.unwrap_or(start + i as f64);
            deck.set_start(&interval, t)?;
            intervals.push(interval);
        }
        log::info!("imported {} slides from HTML", intervals.len());
        Ok(intervals)
    }
}

/// Drop the ids of slides under the detached `node` that the deck already
/// uses. Returns whether `node` itself lost its id.
fn release_taken_ids(deck: &mut Deck, node: NodeId) -> bool {
    let doc = deck.document_mut();
    let mut slides = vec![node];
    slides.extend(doc.elements_by_class(node, SLIDE_CLASS));

    let mut renamed = false;
    for slide in slides {
        let taken = doc
            .attr(slide, "id")
            .is_some_and(|id| doc.element_by_id(id).is_some());
        if taken {
            doc.remove_attr(slide, "id");
            renamed |= slide == node;
        }
    }
    renamed
}

/// Parse `markup` and import its slides into `deck`.
pub fn import_html(deck: &mut Deck, markup: &str, start: f64) -> Result<Vec<Rc<SlideInterval>>> {
    let importer = HtmlImporter::new();
    let dropped = importer.parse(markup)?;
    importer.import(deck, &dropped, start)
}
