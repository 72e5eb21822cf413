//! The deck: a document holding slide nodes, their intervals and fonts.

use std::collections::HashMap;
use std::rc::Rc;

use rand::Rng;

use crate::dom::{Document, Namespace, NodeId};
use crate::error::{Error, Result};
use crate::fonts::FontRegistry;
use crate::interval::{
    format_time, parse_time, Reposition, SlideInterval, SlideRef, SLIDE_CLASS, START_ATTR,
    TRANSCRIPT_CLASS,
};
use crate::markup::{inner_markup, parse_fragment};
use crate::normalize::{slide_id_stem, to_base36};

/// Class of the element hosting the deck's slides.
pub const CONTAINER_CLASS: &str = "deck-container";

/// Upper bound (exclusive) of the random suffix of generated slide ids.
const ID_SUFFIX_RANGE: u32 = 1 << 30;

/// Two slides whose intervals share some time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overlap {
    pub earlier: NodeId,
    pub later: NodeId,
    /// Seconds both slides claim.
    pub seconds: f64,
}

/// Context object owning the deck document and everything keyed on its nodes.
#[derive(Debug)]
pub struct Deck {
    doc: Document,
    container: NodeId,
    intervals: HashMap<NodeId, Rc<SlideInterval>>,
    fonts: FontRegistry,
}

impl Deck {
    /// Wrap a document whose slides live under `container`.
    pub fn new(doc: Document, container: NodeId) -> Self {
        Self {
            doc,
            container,
            intervals: HashMap::new(),
            fonts: FontRegistry::new(),
        }
    }

    /// An empty deck with a fresh `div.deck-container`.
    pub fn empty() -> Self {
        let mut doc = Document::new();
        let container = doc.create_html("div");
        doc.add_class(container, CONTAINER_CLASS);
        let root = doc.root();
        doc.append_child(root, container);
        Self::new(doc, container)
    }

    /// Use the first `.deck-container` element of a parsed page.
    pub fn from_document(doc: Document) -> Result<Self> {
        let container = doc
            .elements_by_class(doc.root(), CONTAINER_CLASS)
            .first()
            .copied()
            .ok_or_else(|| Error::NotFound(format!("no .{} element", CONTAINER_CLASS)))?;
        Ok(Self::new(doc, container))
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn fonts(&self) -> &FontRegistry {
        &self.fonts
    }

    pub fn fonts_mut(&mut self) -> &mut FontRegistry {
        &mut self.fonts
    }

    /// Persist the font registry into the deck document.
    pub fn write_fonts(&mut self) -> Result<()> {
        self.fonts.write_fonts(&mut self.doc)
    }

    /// All slide elements in the container, in document order.
    pub fn slides(&self) -> Vec<NodeId> {
        self.doc.elements_by_class(self.container, SLIDE_CLASS)
    }

    /// Slides that are not nested inside another slide.
    pub fn outer_slides(&self) -> Vec<NodeId> {
        self.slides()
            .into_iter()
            .filter(|&s| self.outer_slide(s) == s)
            .collect()
    }

    /// The outermost slide containing `node`, or `node` when none does.
    pub fn outer_slide(&self, node: NodeId) -> NodeId {
        let mut outer = node;
        for ancestor in self.doc.ancestors(node) {
            if ancestor == self.container {
                break;
            }
            if self.doc.has_class(ancestor, SLIDE_CLASS) {
                outer = ancestor;
            }
        }
        outer
    }

    /// Append a slide node to the container.
    pub fn append_slide(&mut self, node: NodeId) {
        self.doc.append_child(self.container, node);
    }

    /// Resolve a slide reference to its node.
    pub fn resolve(&self, target: &SlideRef) -> Result<NodeId> {
        match target {
            SlideRef::Id(id) => self
                .doc
                .element_by_id(id)
                .ok_or_else(|| Error::NotFound(format!("no slide with id {:?}", id))),
            SlideRef::Node(node) if self.doc.is_element(*node) => Ok(*node),
            SlideRef::Node(node) => Err(Error::InvalidArgument(format!(
                "node {} is not an element",
                node.index()
            ))),
        }
    }

    /// The interval for a slide, created on first access.
    ///
    /// Every later call for the same node returns the same instance.
    pub fn interval(&mut self, target: impl Into<SlideRef>) -> Result<Rc<SlideInterval>> {
        let node = self.resolve(&target.into())?;
        if let Some(existing) = self.intervals.get(&node) {
            return Ok(Rc::clone(existing));
        }
        let interval = Rc::new(SlideInterval::new(node, self.node_start(node)));
        self.intervals.insert(node, Rc::clone(&interval));
        Ok(interval)
    }

    /// The interval for a node if one was already created.
    pub fn existing_interval(&self, node: NodeId) -> Option<Rc<SlideInterval>> {
        self.intervals.get(&node).cloned()
    }

    /// Intervals of all outer slides, in document order.
    pub fn intervals(&mut self) -> Result<Vec<Rc<SlideInterval>>> {
        self.outer_slides()
            .into_iter()
            .map(|node| self.interval(node))
            .collect()
    }

    /// Start time read from the node; absent or unparseable means 0.
    pub fn start(&self, interval: &SlideInterval) -> f64 {
        self.node_start(interval.node())
    }

    /// Start time of a slide node, without creating its interval.
    pub fn node_start(&self, node: NodeId) -> f64 {
        self.doc
            .attr(node, START_ATTR)
            .and_then(parse_time)
            .unwrap_or(0.0)
    }

    /// Persist a new start time and keep siblings ordered by start.
    ///
    /// The node is placed before the first other sibling (in document order)
    /// whose start is at least `t`, or last when there is none. Siblings
    /// without a start attribute are left where they are.
    pub fn set_start(&mut self, interval: &SlideInterval, t: f64) -> Result<Reposition> {
        if !t.is_finite() {
            return Err(Error::InvalidArgument(format!("start time {} is not finite", t)));
        }
        let node = interval.node();
        self.doc.set_attr(node, START_ATTR, format_time(t));

        let parent = self.doc.parent(node).ok_or(Error::DetachedNode(node))?;
        let timed: Vec<NodeId> = self
            .doc
            .children(parent)
            .iter()
            .copied()
            .filter(|&c| self.doc.attr(c, START_ATTR).is_some_and(|v| !v.is_empty()))
            .collect();

        let successor = timed.iter().copied().find(|&c| {
            c != node
                && self
                    .doc
                    .attr(c, START_ATTR)
                    .and_then(parse_time)
                    .is_some_and(|s| s >= t)
        });
        let next = timed
            .iter()
            .position(|&c| c == node)
            .and_then(|pos| timed.get(pos + 1).copied());

        if next == successor {
            return Ok(Reposition::Unchanged);
        }
        log::debug!(
            "moving slide {} to start {} before {:?}",
            node.index(),
            t,
            successor.map(NodeId::index)
        );
        self.doc.insert_before(parent, node, successor);
        Ok(Reposition::Moved)
    }

    /// Whether `t` falls in the half-open span `[start, end)`.
    pub fn contains_time(&self, interval: &SlideInterval, t: f64) -> bool {
        t >= self.start(interval) && t < interval.end()
    }

    /// The slide active at `t`.
    ///
    /// When intervals overlap the slide that starts latest wins.
    pub fn active_at(&mut self, t: f64) -> Result<Option<Rc<SlideInterval>>> {
        let mut best: Option<(f64, Rc<SlideInterval>)> = None;
        for interval in self.intervals()? {
            if !self.contains_time(&interval, t) {
                continue;
            }
            let start = self.start(&interval);
            if best.as_ref().map_or(true, |(s, _)| start >= *s) {
                best = Some((start, interval));
            }
        }
        Ok(best.map(|(_, iv)| iv))
    }

    /// Pairs of consecutive slides whose intervals overlap.
    pub fn overlapping_intervals(&mut self) -> Result<Vec<Overlap>> {
        let mut spans: Vec<(f64, Rc<SlideInterval>)> = self
            .intervals()?
            .into_iter()
            .map(|iv| (self.start(&iv), iv))
            .collect();
        spans.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut overlaps = Vec::new();
        for pair in spans.windows(2) {
            let (_, earlier) = &pair[0];
            let (later_start, later) = &pair[1];
            let seconds = earlier.end().min(later.end()) - later_start;
            if seconds > 0.0 {
                log::warn!(
                    "slides {} and {} overlap by {:.3}s",
                    earlier.node().index(),
                    later.node().index(),
                    seconds
                );
                overlaps.push(Overlap {
                    earlier: earlier.node(),
                    later: later.node(),
                    seconds,
                });
            }
        }
        Ok(overlaps)
    }

    /// The slide's id, generating and persisting one when it has none.
    ///
    /// Generated ids are the first letters of the slide text followed by a
    /// random base-36 suffix, unique within the document.
    pub fn slide_id(&mut self, interval: &SlideInterval) -> String {
        let node = interval.node();
        if let Some(id) = self.doc.attr(node, "id").filter(|id| !id.is_empty()) {
            return id.to_string();
        }
        let stem = slide_id_stem(&self.doc.text_content(node));
        let mut rng = rand::rng();
        let id = loop {
            let candidate = format!("{}-{}", stem, to_base36(rng.random_range(0..ID_SUFFIX_RANGE)));
            if self.doc.element_by_id(&candidate).is_none() {
                break candidate;
            }
        };
        self.doc.set_attr(node, "id", id.clone());
        id
    }

    /// Detach the slide with the given id and forget the intervals of it
    /// and its nested slides. Returns whether one was found.
    pub fn remove_slide(&mut self, id: &str) -> bool {
        match self.doc.element_by_id(id) {
            Some(node) => {
                let doc = &self.doc;
                self.intervals
                    .retain(|&n, _| n != node && !doc.ancestors(n).any(|a| a == node));
                self.doc.detach(node);
                true
            }
            None => false,
        }
    }

    fn transcript_element(&self, node: NodeId) -> Option<NodeId> {
        self.doc
            .find_descendant(node, |d, n| d.has_class(n, TRANSCRIPT_CLASS))
    }

    /// Markup of the slide's caption, or an empty string.
    pub fn transcript_source(&self, interval: &SlideInterval) -> String {
        match self.transcript_element(interval.node()) {
            Some(el) if self.doc.namespace(el) == Some(Namespace::Html) => {
                inner_markup(&self.doc, el)
            }
            Some(el) => self.doc.text_content(el),
            None => String::new(),
        }
    }

    /// Replace the slide's caption, creating the caption element if needed.
    ///
    /// HTML slides get a `div.transcript` holding the markup. SVG slides get
    /// a hidden `text.transcript` holding it as character data.
    pub fn set_transcript_source(&mut self, interval: &SlideInterval, source: &str) {
        let node = interval.node();
        let el = match self.transcript_element(node) {
            Some(el) => el,
            None => {
                let el = match self.doc.namespace(node) {
                    Some(Namespace::Svg) => {
                        let el = self.doc.create_svg("text");
                        self.doc.set_attr(el, "visibility", "hidden");
                        el
                    }
                    _ => self.doc.create_html("div"),
                };
                self.doc.add_class(el, TRANSCRIPT_CLASS);
                let first = self.doc.first_child(node);
                self.doc.insert_before(node, el, first);
                el
            }
        };

        if self.doc.namespace(el) == Some(Namespace::Html) {
            self.set_inner_markup(el, source);
        } else {
            self.doc.set_text_content(el, source);
        }
    }

    /// Parse `source` into `el`, keeping it verbatim when parsing would alter it.
    fn set_inner_markup(&mut self, el: NodeId, source: &str) {
        self.doc.remove_children(el);
        if parse_fragment(&mut self.doc, el, source).is_ok() && inner_markup(&self.doc, el) == source {
            return;
        }
        self.doc.remove_children(el);
        if !source.is_empty() {
            let raw = self.doc.create_raw(source);
            self.doc.append_child(el, raw);
        }
    }
}
