//! Routing dropped files into a synchronized deck.

use std::io;
use std::rc::Rc;

use tokio::task::JoinSet;

use slidedrive_core::markup::parse_document;
use slidedrive_core::{
    Error, NodeId, PresentationWidget, Result, SlideDriveConfig, SlideInterval, Synchronizer,
    TimelineHost, TrackId,
};
use slidedrive_html::HtmlImporter;
use slidedrive_svg::{CancelHandle, SlideEmitter, SlideSplitter, SplitSlide, SplitSource};

use crate::classify::{FileKind, FilesDropped};

/// What one drop produced.
#[derive(Debug, Default)]
pub struct DropReport {
    /// Slide nodes added to the deck, in the order they were added.
    pub slides: Vec<NodeId>,
    /// Names of files that were not a supported type.
    pub skipped: Vec<String>,
    /// Files that could not be read or imported.
    pub failed: Vec<(String, Error)>,
}

/// Imports dropped files into a deck driven by a [`Synchronizer`].
#[derive(Debug, Clone, Default)]
pub struct Ingestor {
    config: SlideDriveConfig,
    cancel: CancelHandle,
}

impl Ingestor {
    pub fn new(config: SlideDriveConfig) -> Self {
        Self {
            config,
            cancel: CancelHandle::new(),
        }
    }

    pub fn config(&self) -> &SlideDriveConfig {
        &self.config
    }

    /// Handle that aborts the drop in progress: pending reads are dropped
    /// and no further slides are emitted.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Read and import every supported file of a drop.
    ///
    /// Files are read concurrently and imported in the order their reads
    /// complete. Each file's slides start at the drop position plus one
    /// second per slide produced by the files imported before it, so the
    /// offsets depend on completion order. Unsupported files are skipped
    /// and failures are reported per file; neither aborts the batch.
    pub async fn ingest<W: PresentationWidget>(
        &self,
        sync: &mut Synchronizer<W>,
        host: &mut impl TimelineHost,
        drop: FilesDropped,
    ) -> Result<DropReport> {
        let mut report = DropReport::default();
        let mut reads = JoinSet::new();

        for file in drop.files {
            let Some(kind) = file.kind() else {
                log::warn!("skipping unsupported file {} ({})", file.name, file.mime);
                report.skipped.push(file.name);
                continue;
            };
            let name = file.name;
            let source = file.source;
            reads.spawn(async move { (name, kind, source.read().await) });
        }

        let mut slides_passed = 0usize;
        while let Some(joined) = reads.join_next().await {
            if self.cancel.is_cancelled() {
                log::info!("drop cancelled; abandoning {} pending reads", reads.len());
                reads.abort_all();
                break;
            }
            let (name, kind, content) = joined.map_err(|e| Error::Io(io::Error::other(e)))?;
            let start = drop.start + slides_passed as f64;

            let imported = match content {
                Ok(content) => {
                    log::info!("read {:?} file {}", kind, name);
                    match kind {
                        FileKind::Svg => self.import_svg(sync, host, drop.track, &content, start).await,
                        FileKind::Html => import_html(sync, host, drop.track, &content, start),
                    }
                }
                Err(e) => Err(e),
            };

            match imported {
                Ok(nodes) => {
                    slides_passed += nodes.len();
                    report.slides.extend(nodes);
                }
                Err(e) => {
                    log::warn!("failed to import {}: {}", name, e);
                    report.failed.push((name, e));
                }
            }
        }
        Ok(report)
    }

    /// Split an SVG document into slides, adding each as it is emitted.
    async fn import_svg<W: PresentationWidget>(
        &self,
        sync: &mut Synchronizer<W>,
        host: &mut impl TimelineHost,
        track: TrackId,
        content: &str,
        start: f64,
    ) -> Result<Vec<NodeId>> {
        let doc = parse_document(content)?;
        let source = SplitSource::prepare(doc, sync.deck_mut().fonts_mut())?;
        sync.deck_mut().write_fonts()?;

        let media_duration = sync.clock().borrow().duration();
        let splitter = SlideSplitter::new(source, start, media_duration, &self.config);
        let mut emitter =
            SlideEmitter::with_cancel(splitter, self.config.split.emit_interval(), &self.cancel);

        let mut nodes = Vec::new();
        while let Some(split) = emitter.next().await {
            nodes.push(add_split_slide(sync, host, track, split?)?);
        }
        Ok(nodes)
    }
}

/// Move a split slide into the deck and announce it.
fn add_split_slide<W: PresentationWidget>(
    sync: &mut Synchronizer<W>,
    host: &mut impl TimelineHost,
    track: TrackId,
    split: SplitSlide,
) -> Result<NodeId> {
    let deck = sync.deck_mut();
    let node = deck.document_mut().import_node(split.document(), split.section);
    deck.append_slide(node);
    let interval = deck.interval(node)?;
    deck.set_start(&interval, split.start)?;
    interval.set_end(split.end);

    sync.publish_slide(host, track, &interval)?;
    Ok(node)
}

fn import_html<W: PresentationWidget>(
    sync: &mut Synchronizer<W>,
    host: &mut impl TimelineHost,
    track: TrackId,
    content: &str,
    start: f64,
) -> Result<Vec<NodeId>> {
    let importer = HtmlImporter::new();
    let dropped = importer.parse(content)?;
    let intervals: Vec<Rc<SlideInterval>> = importer.import(sync.deck_mut(), &dropped, start)?;
    sync.publish_slides(host, track, &intervals)?;
    Ok(intervals.iter().map(|iv| iv.node()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::DroppedFile;
    use slidedrive_core::fonts::FONT_STYLE_ID;
    use slidedrive_core::{
        Deck, MediaClock, Size, SlideChange, SyncConfig, TrackEvent,
    };
    use std::cell::RefCell;
    use std::time::Duration;

    const THREE_SLIDES: &str = r#"<svg viewBox="0 0 2800 2100"><defs><font id="EmbeddedFont_1"><font-face font-family="Liberation Sans embedded" units-per-em="2048"/><missing-glyph d="M0 0"/><glyph unicode="S" horiz-adv-x="1251" d="M1 1"/></font></defs><g class="SlideGroup"><g visibility="hidden" class="Slide" id="container-id1"><text x="200" y="300" font-family="Liberation Sans embedded" font-size="100">Slide one</text></g><g visibility="hidden" class="Slide" id="container-id2"><text x="200" y="300" font-size="100">Slide two</text></g><g visibility="hidden" class="Slide" id="container-id3"><text x="200" y="300" font-size="100">Slide three</text></g></g></svg>"#;

    const PAGE: &str = r#"<html><head></head><body><div class="deck-container"><section class="slide" id="intro" data-popcorn-slideshow="0">Intro</section></div></body></html>"#;

    struct Clock {
        time: f64,
        duration: f64,
    }

    impl MediaClock for Clock {
        fn current_time(&self) -> f64 {
            self.time
        }
        fn set_current_time(&mut self, t: f64) {
            self.time = t;
        }
        fn duration(&self) -> f64 {
            self.duration
        }
        fn play(&mut self) {}
        fn pause(&mut self) {}
        fn paused(&self) -> bool {
            true
        }
        fn volume(&self) -> f64 {
            1.0
        }
        fn set_volume(&mut self, _: f64) {}
    }

    #[derive(Default)]
    struct Widget {
        slides: Vec<NodeId>,
        current: Option<NodeId>,
    }

    impl PresentationWidget for Widget {
        fn rescan(&mut self, slides: &[NodeId]) {
            self.slides = slides.to_vec();
            self.current = self.slides.first().copied();
        }
        fn go_to(&mut self, slide: NodeId) -> Option<SlideChange> {
            if self.current == Some(slide) || !self.slides.contains(&slide) {
                return None;
            }
            let from = self.current.replace(slide);
            Some(SlideChange { from, to: slide })
        }
        fn current(&self) -> Option<NodeId> {
            self.current
        }
        fn slides(&self) -> Vec<NodeId> {
            self.slides.clone()
        }
        fn rendered_size(&self, _: NodeId) -> Size {
            Size::new(800.0, 600.0)
        }
    }

    #[derive(Default)]
    struct Host {
        events: Vec<(TrackId, TrackEvent)>,
    }

    impl TimelineHost for Host {
        fn add_track(&mut self, _: &str) -> TrackId {
            TrackId(0)
        }
        fn add_track_event(&mut self, track: TrackId, event: TrackEvent) {
            self.events.push((track, event));
        }
    }

    fn setup() -> (Synchronizer<Widget>, Host, TrackId) {
        let _ = env_logger::builder().is_test(true).try_init();
        let deck = Deck::from_document(parse_document(PAGE).unwrap()).unwrap();
        let clock = Rc::new(RefCell::new(Clock {
            time: 0.0,
            duration: 100.0,
        }));
        let mut sync = Synchronizer::new(deck, clock, Widget::default(), SyncConfig::default());
        let mut host = Host::default();
        let track = sync.setup(&mut host).unwrap();
        host.events.clear();
        (sync, host, track)
    }

    #[tokio::test(start_paused = true)]
    async fn test_svg_drop_splits_into_slides() {
        let (mut sync, mut host, track) = setup();
        let drop = FilesDropped::new(
            vec![DroppedFile::in_memory("talk.svg", "image/svg+xml", THREE_SLIDES)],
            track,
            10.0,
        );
        let report = Ingestor::default().ingest(&mut sync, &mut host, drop).await.unwrap();

        assert_eq!(report.slides.len(), 3);
        assert!(report.failed.is_empty());
        assert_eq!(host.events.len(), 3);

        let deck = sync.deck();
        let starts: Vec<f64> = report.slides.iter().map(|&s| deck.node_start(s)).collect();
        assert_eq!(starts[0], 10.0);
        assert!(starts.windows(2).all(|w| w[0] < w[1]));

        let doc = deck.document();
        let fonts: Vec<usize> = report
            .slides
            .iter()
            .map(|&s| doc.elements_by_tag(s, "font").len())
            .collect();
        assert_eq!(fonts, vec![1, 0, 0]);

        assert_eq!(deck.fonts().len(), 1);
        assert!(doc.element_by_id(FONT_STYLE_ID).is_some());
        assert_eq!(sync.widget().slides.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mixed_drop_skips_unsupported() {
        let (mut sync, mut host, track) = setup();
        let html = r#"<section class="slide" id="saved">Saved</section>"#;
        let drop = FilesDropped::new(
            vec![
                DroppedFile::in_memory("photo.png", "image/png", ""),
                DroppedFile::in_memory("saved.html", "text/html", html),
                DroppedFile::in_memory("talk.svg", "", THREE_SLIDES),
            ],
            track,
            20.0,
        );
        let report = Ingestor::default().ingest(&mut sync, &mut host, drop).await.unwrap();

        assert_eq!(report.skipped, vec!["photo.png".to_string()]);
        assert_eq!(report.slides.len(), 4);
        assert_eq!(host.events.len(), 4);

        // Whichever file finished first starts at the drop position; the
        // other is pushed back by one second per slide before it.
        let deck = sync.deck();
        let saved = deck.document().element_by_id("saved").unwrap();
        let saved_start = deck.node_start(saved);
        assert!(saved_start == 20.0 || saved_start == 23.0);

        let outer: Vec<f64> = deck.outer_slides().iter().map(|&s| deck.node_start(s)).collect();
        assert!(outer.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_unreadable_file_does_not_abort_batch() {
        let (mut sync, mut host, track) = setup();
        let drop = FilesDropped::new(
            vec![
                DroppedFile::from_path("/nonexistent/slides.svg"),
                DroppedFile::in_memory("saved.html", "text/html", r#"<section class="slide">x</section>"#),
            ],
            track,
            0.0,
        );
        let report = Ingestor::default().ingest(&mut sync, &mut host, drop).await.unwrap();
        assert_eq!(report.slides.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "slides.svg");
        assert!(matches!(report.failed[0].1, Error::Io(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_emission() {
        let (mut sync, mut host, track) = setup();
        let ingestor = Ingestor::default();
        let cancel = ingestor.cancel_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            cancel.cancel();
        });

        let drop = FilesDropped::new(
            vec![DroppedFile::in_memory("talk.svg", "image/svg+xml", THREE_SLIDES)],
            track,
            0.0,
        );
        let report = ingestor.ingest(&mut sync, &mut host, drop).await.unwrap();
        assert_eq!(report.slides.len(), 1);
        assert_eq!(sync.deck().outer_slides().len(), 2);
    }
}
