//! Splitting a multi-slide SVG document into one document per slide.
//!
//! Presentation exports mark each slide's subtree with the `Slide` class.
//! Every emitted slide is a full copy of the document with all other
//! slide subtrees removed, wrapped in a deck `section` and run through
//! the normalization [`Pipeline`]. Copies are expensive, so they are made
//! lazily: [`SlideSplitter`] yields one per `next`, and [`SlideEmitter`]
//! spaces them out in time and can be cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use slidedrive_core::interval::{format_time, SLIDE_CLASS, START_ATTR, TRANSCRIPT_CLASS};
use slidedrive_core::{
    Document, Error, FontRegistry, NodeId, Result, SlideDriveConfig, SplitConfig,
    TargetCapabilities,
};

use crate::document::SlideDocument;
use crate::fonts::{attach_fonts, extract_fonts, normalize_font_families};
use crate::geometry::{AttributeGeometry, Geometry};
use crate::pipeline::Pipeline;
use crate::prune::{minify, prune_invisible};

/// Class marking a slide subtree in exported documents.
pub const BOUNDARY_CLASS: &str = "Slide";

/// Class slide subtrees carry once they have been claimed for splitting.
pub const RETAGGED_CLASS: &str = "libreoffice-slide";

/// A multi-slide document, prepared for splitting.
#[derive(Debug, Clone)]
pub struct SplitSource {
    doc: Document,
    root: NodeId,
    fonts: Vec<NodeId>,
    boundary_ids: Vec<String>,
}

impl SplitSource {
    /// Normalize font families, move embedded fonts into `registry`, and
    /// claim the slide subtrees of `doc`.
    pub fn prepare(mut doc: Document, registry: &mut FontRegistry) -> Result<Self> {
        let root = doc
            .find_descendant(doc.root(), |d, n| d.is_tag(n, "svg"))
            .ok_or_else(|| Error::NotFound("no svg element in document".to_string()))?;

        normalize_font_families(&mut doc, root);
        let fonts = extract_fonts(&mut doc, root, registry)?;

        let mut boundary_ids = Vec::new();
        for (i, boundary) in doc.elements_by_class(root, BOUNDARY_CLASS).into_iter().enumerate() {
            let existing = doc
                .attr(boundary, "id")
                .filter(|id| !id.is_empty())
                .map(str::to_string);
            let id = match existing {
                Some(id) => id,
                None => {
                    let id = format!("{}-{}", RETAGGED_CLASS, i + 1);
                    doc.set_attr(boundary, "id", id.as_str());
                    id
                }
            };
            doc.remove_class(boundary, BOUNDARY_CLASS);
            doc.add_class(boundary, RETAGGED_CLASS);
            // Each copy shows its own subtree, so none of them is pruned as hidden.
            doc.set_attr(boundary, "visibility", "visible");
            boundary_ids.push(id);
        }

        prune_invisible(&mut doc, root);
        minify(&mut doc, root);

        log::debug!(
            "prepared svg with {} slides and {} embedded fonts",
            boundary_ids.len(),
            fonts.len()
        );
        Ok(Self {
            doc,
            root,
            fonts,
            boundary_ids,
        })
    }

    pub fn len(&self) -> usize {
        self.boundary_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundary_ids.is_empty()
    }

    pub fn boundary_ids(&self) -> &[String] {
        &self.boundary_ids
    }

    /// Copy the document for the slide at `index`, inside a new `section`.
    ///
    /// Only the first slide carries the embedded fonts.
    fn copy_slide(&self, index: usize, start: f64) -> Result<(Document, NodeId, NodeId)> {
        let target = self
            .boundary_ids
            .get(index)
            .ok_or_else(|| Error::NotFound(format!("no slide boundary at index {}", index)))?;

        let mut doc = Document::new();
        let section = doc.create_html("section");
        doc.set_attr(section, "class", SLIDE_CLASS);
        doc.set_attr(section, START_ATTR, format_time(start));
        let transcript = doc.create_html("div");
        doc.set_attr(transcript, "class", TRANSCRIPT_CLASS);
        doc.append_child(section, transcript);
        let root = doc.root();
        doc.append_child(root, section);

        let svg = doc.import_node(&self.doc, self.root);
        doc.append_child(section, svg);
        for boundary in doc.elements_by_class(svg, RETAGGED_CLASS) {
            if doc.attr(boundary, "id") != Some(target.as_str()) {
                doc.detach(boundary);
            }
        }

        if index == 0 {
            let fonts: Vec<NodeId> = self
                .fonts
                .iter()
                .map(|&font| doc.import_node(&self.doc, font))
                .collect();
            attach_fonts(&mut doc, svg, &fonts);
        }
        Ok((doc, section, svg))
    }
}

/// One slide split out of a document.
#[derive(Debug, Clone)]
pub struct SplitSlide {
    /// The normalized slide; its container sits inside `section`.
    pub slide: SlideDocument,
    /// The deck `section` holding the slide.
    pub section: NodeId,
    /// Id of the slide subtree this copy shows.
    pub boundary_id: String,
    pub index: usize,
    pub start: f64,
    pub end: f64,
}

impl SplitSlide {
    pub fn document(&self) -> &Document {
        self.slide.document()
    }
}

/// Yields the slides of a [`SplitSource`] one at a time.
///
/// Slide `i` starts where slide `i - 1` ends; durations come from the
/// configured policy applied to the media time left.
#[derive(Debug)]
pub struct SlideSplitter<G = AttributeGeometry> {
    source: SplitSource,
    next: usize,
    start: f64,
    media_duration: f64,
    elapsed: f64,
    split: SplitConfig,
    capabilities: TargetCapabilities,
    pipeline: Pipeline,
    geometry: G,
}

impl SlideSplitter {
    /// Split `source` starting at `start` on a timeline of `media_duration`.
    pub fn new(source: SplitSource, start: f64, media_duration: f64, config: &SlideDriveConfig) -> Self {
        Self {
            source,
            next: 0,
            start,
            media_duration,
            elapsed: 0.0,
            split: config.split.clone(),
            capabilities: config.capabilities.clone(),
            pipeline: Pipeline::standard(),
            geometry: AttributeGeometry::default(),
        }
    }
}

impl<G: Geometry> SlideSplitter<G> {
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_geometry<H: Geometry>(self, geometry: H) -> SlideSplitter<H> {
        SlideSplitter {
            source: self.source,
            next: self.next,
            start: self.start,
            media_duration: self.media_duration,
            elapsed: self.elapsed,
            split: self.split,
            capabilities: self.capabilities,
            pipeline: self.pipeline,
            geometry,
        }
    }

    /// Number of slides not yet produced.
    pub fn remaining(&self) -> usize {
        self.source.len() - self.next
    }

    fn emit(&mut self) -> Result<SplitSlide> {
        let index = self.next;
        self.next += 1;

        let start = self.start + self.elapsed;
        let duration = self.split.slide_duration(self.media_duration - start);
        self.elapsed += duration;

        let (doc, section, svg) = self.source.copy_slide(index, start)?;
        let mut slide = SlideDocument::new(doc, svg)?;
        self.pipeline.apply(&mut slide, &self.capabilities, &self.geometry)?;

        let boundary_id = self.source.boundary_ids[index].clone();
        log::debug!("split slide {} ({}) at {}s", index + 1, boundary_id, start);
        Ok(SplitSlide {
            slide,
            section,
            boundary_id,
            index,
            start,
            end: start + duration,
        })
    }
}

impl<G: Geometry> Iterator for SlideSplitter<G> {
    type Item = Result<SplitSlide>;

    fn next(&mut self) -> Option<Self::Item> {
        (self.next < self.source.len()).then(|| self.emit())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

/// Stops a [`SlideEmitter`] before its next slide.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    /// A handle no emitter listens to yet.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }
}

/// Emits split slides with a fixed delay before each one.
#[derive(Debug)]
pub struct SlideEmitter<G = AttributeGeometry> {
    splitter: SlideSplitter<G>,
    interval: Duration,
    cancelled: watch::Receiver<bool>,
}

impl<G: Geometry> SlideEmitter<G> {
    pub fn new(splitter: SlideSplitter<G>, interval: Duration) -> (Self, CancelHandle) {
        let cancel = CancelHandle::new();
        (Self::with_cancel(splitter, interval, &cancel), cancel)
    }

    /// Emitter stopped by an existing handle, which may be shared.
    pub fn with_cancel(splitter: SlideSplitter<G>, interval: Duration, cancel: &CancelHandle) -> Self {
        Self {
            splitter,
            interval,
            cancelled: cancel.sender.subscribe(),
        }
    }

    /// Emitter using the configured delay between slides.
    pub fn with_config(splitter: SlideSplitter<G>, config: &SplitConfig) -> (Self, CancelHandle) {
        Self::new(splitter, config.emit_interval())
    }

    pub fn remaining(&self) -> usize {
        self.splitter.remaining()
    }

    fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Wait out the delay, then produce the next slide.
    ///
    /// Returns `None` once every slide was produced or after cancellation.
    pub async fn next(&mut self) -> Option<Result<SplitSlide>> {
        if self.is_cancelled() || self.splitter.remaining() == 0 {
            return None;
        }

        let delay = tokio::time::sleep(self.interval);
        tokio::pin!(delay);
        loop {
            tokio::select! {
                _ = &mut delay => break,
                changed = self.cancelled.changed() => match changed {
                    Ok(()) if *self.cancelled.borrow_and_update() => {
                        log::info!("slide emission cancelled with {} slides left", self.remaining());
                        return None;
                    }
                    Ok(()) => {}
                    Err(_) => {
                        // Nobody can cancel any more.
                        (&mut delay).await;
                        break;
                    }
                },
            }
        }
        self.splitter.next()
    }

    /// Hand every slide to `sink` as it is produced.
    ///
    /// Returns the number of slides delivered; stops at the first error.
    pub async fn for_each(mut self, mut sink: impl FnMut(SplitSlide) -> Result<()>) -> Result<usize> {
        let mut delivered = 0;
        while let Some(slide) = self.next().await {
            sink(slide?)?;
            delivered += 1;
        }
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slidedrive_core::config::DurationPolicy;
    use slidedrive_core::interval::parse_time;
    use slidedrive_core::markup::parse_document;

    const THREE_SLIDES: &str = r#"<svg viewBox="0 0 2800 2100"><defs><font id="EmbeddedFont_1"><font-face font-family="Liberation Sans embedded" units-per-em="2048"/><missing-glyph d="M0 0"/><glyph unicode="F" horiz-adv-x="1251" d="M1 1"/></font></defs><g class="SlideGroup"><g visibility="hidden" class="Slide" id="container-id1"><text x="200" y="300" font-family="Liberation Sans embedded" font-size="100">First</text></g><g visibility="hidden" class="Slide" id="container-id2"><text x="200" y="300" font-size="100">Second</text><g visibility="hidden"><rect width="10" height="10"/></g></g><g visibility="hidden" class="Slide" id="container-id3"><text x="200" y="300" font-size="100">Third</text></g></g></svg>"#;

    fn source(registry: &mut FontRegistry) -> SplitSource {
        SplitSource::prepare(parse_document(THREE_SLIDES).unwrap(), registry).unwrap()
    }

    #[test]
    fn test_prepare() {
        let mut registry = FontRegistry::new();
        let source = source(&mut registry);
        assert_eq!(source.boundary_ids(), ["container-id1", "container-id2", "container-id3"]);
        assert_eq!(registry.len(), 1);
        assert!(source.doc.elements_by_tag(source.root, "font").is_empty());
        assert!(source.doc.elements_by_class(source.root, BOUNDARY_CLASS).is_empty());
        // The nested hidden group is gone; the slides survive.
        assert!(source.doc.elements_by_tag(source.root, "rect").is_empty());
        assert_eq!(source.doc.elements_by_class(source.root, RETAGGED_CLASS).len(), 3);
    }

    #[test]
    fn test_split_three_slides() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut registry = FontRegistry::new();
        let splitter = SlideSplitter::new(source(&mut registry), 0.0, 100.0, &SlideDriveConfig::default());
        assert_eq!(splitter.remaining(), 3);
        let slides: Vec<SplitSlide> = splitter.collect::<Result<_>>().unwrap();
        assert_eq!(slides.len(), 3);

        let starts: Vec<f64> = slides.iter().map(|s| s.start).collect();
        assert!(starts.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(starts[0], 0.0);
        assert_eq!(slides[0].end, 10.0);

        for (i, split) in slides.iter().enumerate() {
            let doc = split.document();
            let persisted = doc.attr(split.section, START_ATTR).and_then(parse_time);
            assert_eq!(persisted, Some(split.start));
            assert!(doc.has_class(split.section, SLIDE_CLASS));
            assert!(doc.has_class(doc.element_children(split.section)[0], TRANSCRIPT_CLASS));

            let boundaries = doc.elements_by_class(split.slide.root(), RETAGGED_CLASS);
            assert_eq!(boundaries.len(), 1);
            assert_eq!(doc.attr(boundaries[0], "id"), Some(split.boundary_id.as_str()));
            assert_eq!(doc.attr(boundaries[0], "visibility"), Some("visible"));

            let fonts = doc.elements_by_tag(split.slide.root(), "font").len();
            assert_eq!(fonts, usize::from(i == 0));
        }

        let first = slides[0].document();
        let text = first.elements_by_tag(slides[0].slide.root(), "text")[0];
        assert_eq!(first.attr(text, "font-family"), Some("liberation sans"));
    }

    #[test]
    fn test_fixed_duration_policy() {
        let mut registry = FontRegistry::new();
        let config = SlideDriveConfig::default().with_split(
            SplitConfig::default().with_duration(DurationPolicy::Fixed { seconds: 5.0 }),
        );
        let starts: Vec<f64> = SlideSplitter::new(source(&mut registry), 30.0, 0.0, &config)
            .map(|s| s.unwrap().start)
            .collect();
        assert_eq!(starts, vec![30.0, 35.0, 40.0]);
    }

    #[test]
    fn test_minimum_duration_past_media_end() {
        let mut registry = FontRegistry::new();
        let starts: Vec<f64> =
            SlideSplitter::new(source(&mut registry), 50.0, 10.0, &SlideDriveConfig::default())
                .map(|s| s.unwrap().start)
                .collect();
        assert_eq!(starts, vec![50.0, 51.0, 52.0]);
    }

    #[test]
    fn test_boundaries_without_ids() {
        let doc = parse_document(r#"<svg><g class="Slide"><rect/></g><g class="Slide"><rect/></g></svg>"#).unwrap();
        let source = SplitSource::prepare(doc, &mut FontRegistry::new()).unwrap();
        assert_eq!(source.boundary_ids(), ["libreoffice-slide-1", "libreoffice-slide-2"]);
    }

    #[test]
    fn test_document_without_boundaries() {
        let doc = parse_document(r#"<svg><rect/></svg>"#).unwrap();
        let source = SplitSource::prepare(doc, &mut FontRegistry::new()).unwrap();
        assert!(source.is_empty());
        let mut splitter = SlideSplitter::new(source, 0.0, 10.0, &SlideDriveConfig::default());
        assert!(splitter.next().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_emitter_spaces_slides() {
        let mut registry = FontRegistry::new();
        let splitter = SlideSplitter::new(source(&mut registry), 0.0, 100.0, &SlideDriveConfig::default());
        let (emitter, _cancel) = SlideEmitter::with_config(splitter, &SplitConfig::default());

        let began = tokio::time::Instant::now();
        let mut times = Vec::new();
        let delivered = emitter
            .for_each(|_| {
                times.push(began.elapsed());
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(delivered, 3);
        for (i, elapsed) in times.iter().enumerate() {
            let expected = Duration::from_millis(200 * (i as u64 + 1));
            assert!(*elapsed >= expected && *elapsed < expected + Duration::from_millis(10));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_emitter_cancel() {
        let mut registry = FontRegistry::new();
        let splitter = SlideSplitter::new(source(&mut registry), 0.0, 100.0, &SlideDriveConfig::default());
        let (mut emitter, cancel) = SlideEmitter::new(splitter, Duration::from_millis(200));

        assert!(emitter.next().await.unwrap().is_ok());
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });
        assert!(emitter.next().await.is_none());
        assert!(cancel.is_cancelled());
        assert_eq!(emitter.remaining(), 2);
        assert!(emitter.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_emitter_outlives_dropped_handle() {
        let mut registry = FontRegistry::new();
        let splitter = SlideSplitter::new(source(&mut registry), 0.0, 100.0, &SlideDriveConfig::default());
        let (emitter, cancel) = SlideEmitter::new(splitter, Duration::from_millis(200));
        drop(cancel);
        let began = tokio::time::Instant::now();
        assert_eq!(emitter.for_each(|_| Ok(())).await.unwrap(), 3);
        assert!(began.elapsed() >= Duration::from_millis(600));
    }
}
