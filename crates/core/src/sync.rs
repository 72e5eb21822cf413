//! Deck/Timeline Synchronizer.
//!
//! Keeps the presentation widget, the media clock and the slide intervals
//! consistent. Every notification from a collaborator enters through one of
//! the `on_*` methods; deferred work (timeline markers, svg rescaling) is
//! scheduled on debouncers and run from [`Synchronizer::tick`].

use std::rc::Rc;
use std::time::Instant;

use crate::config::SyncConfig;
use crate::deck::{Deck, Overlap};
use crate::debounce::Debouncer;
use crate::dom::NodeId;
use crate::error::{Error, Result};
use crate::interval::{HandlerFlow, Reposition, SlideInterval, SlideRef, SLIDE_CLASS};
use crate::markers::{compute_markers, write_markers, TimelineMarker};
use crate::media::{ClockEvent, PresentationWidget, SharedClock, SlideChange, SyncedVideo, TimelineHost};
use crate::scale;
use crate::types::{SlideEvent, TrackEvent, TrackId, SLIDES_TRACK};

/// Id of the element showing the active slide's caption.
pub const TRANSCRIPT_DISPLAY_ID: &str = "slideshow-transcript";

/// Gap left between a slide's end and the next slide's start.
const SLIDE_GAP: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckState {
    Uninitialized,
    Initialized,
}

pub struct Synchronizer<W: PresentationWidget> {
    deck: Deck,
    clock: SharedClock,
    widget: W,
    config: SyncConfig,
    state: DeckState,
    active: Option<Rc<SlideInterval>>,
    videos: Vec<Rc<SyncedVideo>>,
    marker_refresh: Debouncer,
    rescale: Debouncer,
    markers: Vec<TimelineMarker>,
    overlaps: Vec<Overlap>,
}

impl<W: PresentationWidget> Synchronizer<W> {
    pub fn new(deck: Deck, clock: SharedClock, widget: W, config: SyncConfig) -> Self {
        let marker_refresh = Debouncer::new(config.marker_debounce());
        let rescale = Debouncer::new(config.rescale_debounce());
        Self {
            deck,
            clock,
            widget,
            config,
            state: DeckState::Uninitialized,
            active: None,
            videos: Vec::new(),
            marker_refresh,
            rescale,
            markers: Vec::new(),
            overlaps: Vec::new(),
        }
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn deck_mut(&mut self) -> &mut Deck {
        &mut self.deck
    }

    pub fn widget(&self) -> &W {
        &self.widget
    }

    pub fn widget_mut(&mut self) -> &mut W {
        &mut self.widget
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn state(&self) -> DeckState {
        self.state
    }

    /// The interval of the slide active at the last time update.
    pub fn active(&self) -> Option<&Rc<SlideInterval>> {
        self.active.as_ref()
    }

    /// Markers from the last rebuild.
    pub fn markers(&self) -> &[TimelineMarker] {
        &self.markers
    }

    /// Overlapping slide pairs found at the last initialization.
    pub fn overlaps(&self) -> &[Overlap] {
        &self.overlaps
    }

    pub fn videos(&self) -> &[Rc<SyncedVideo>] {
        &self.videos
    }

    fn current_time(&self) -> f64 {
        self.clock.borrow().current_time()
    }

    fn seek(&self, t: f64) {
        self.clock.borrow_mut().set_current_time(t);
    }

    /// Register the page's slides with the host, initialize the deck and
    /// show the slide under the clock.
    pub fn setup(&mut self, host: &mut impl TimelineHost) -> Result<TrackId> {
        let track = self.register_existing_slides(host)?;
        self.init_deck()?;
        self.request_rescale(Instant::now());
        self.on_time_update()?;
        Ok(track)
    }

    /// Add a `Slides` track with one event per slide already in the deck.
    ///
    /// Each slide ends just before the next one starts; the last one ends
    /// with the media.
    pub fn register_existing_slides(&mut self, host: &mut impl TimelineHost) -> Result<TrackId> {
        let track = host.add_track(SLIDES_TRACK);
        let slides = self.deck.slides();
        let intervals = slides
            .into_iter()
            .map(|s| self.deck.interval(s))
            .collect::<Result<Vec<_>>>()?;

        for pair in intervals.windows(2) {
            pair[0].set_end(self.deck.start(&pair[1]) - SLIDE_GAP);
        }
        if let Some(last) = intervals.last() {
            last.set_end(self.clock.borrow().duration());
        }

        for interval in &intervals {
            let event = SlideEvent::from_interval(&mut self.deck, interval);
            host.add_track_event(track, TrackEvent::slide(event));
        }
        log::info!("registered {} existing slides", intervals.len());
        Ok(track)
    }

    /// Announce a slide that was just added to the deck, then reinitialize.
    pub fn publish_slide(
        &mut self,
        host: &mut impl TimelineHost,
        track: TrackId,
        interval: &SlideInterval,
    ) -> Result<()> {
        self.publish_slides(host, track, std::slice::from_ref(interval))
    }

    /// Announce several new slides, reinitializing once.
    pub fn publish_slides<I: std::borrow::Borrow<SlideInterval>>(
        &mut self,
        host: &mut impl TimelineHost,
        track: TrackId,
        intervals: &[I],
    ) -> Result<()> {
        for interval in intervals {
            let event = SlideEvent::from_interval(&mut self.deck, interval.borrow());
            host.add_track_event(track, TrackEvent::slide(event));
        }
        self.request_rescale(Instant::now());
        self.init_deck()
    }

    /// Initialize the widget, or reinitialize it after slides were added,
    /// moved or removed without losing the active slide.
    pub fn init_deck(&mut self) -> Result<()> {
        match self.state {
            DeckState::Uninitialized => {
                log::info!("initializing deck");
                self.state = DeckState::Initialized;
                self.widget.rescan(&self.deck.slides());

                if let Some(target) = self.config.permalink.clone() {
                    match self.deck.document().element_by_id(&target) {
                        Some(node) => {
                            log::info!("navigating to permalink target #{}", target);
                            self.go_to(node)?;
                        }
                        None => log::warn!("permalink target #{} not found", target),
                    }
                }
            }
            DeckState::Initialized => {
                log::info!("re-initializing deck");
                let t = self.current_time();
                let current = self
                    .widget
                    .current()
                    .map(|node| self.deck.interval(node))
                    .transpose()?;

                self.widget.rescan(&self.deck.slides());

                match current {
                    Some(interval)
                        if t >= self.deck.start(&interval) && t <= interval.end() =>
                    {
                        self.go_to(interval.node())?;
                    }
                    // A slide may now start at the current time; leave and
                    // come back so it gets picked up.
                    _ => self.seek(0.0),
                }
                self.seek(t);
                self.on_time_update()?;
            }
        }

        self.refresh_video_starts();
        self.overlaps = self.deck.overlapping_intervals()?;
        if !self.overlaps.is_empty() {
            log::warn!(
                "{} overlapping slide pairs; the later start wins while both are active",
                self.overlaps.len()
            );
        }
        self.marker_refresh.call(Instant::now());
        Ok(())
    }

    /// Ask the widget to show `slide`, handling the resulting change.
    pub fn go_to(&mut self, slide: NodeId) -> Result<()> {
        match self.widget.go_to(slide) {
            Some(change) => self.on_slide_changed(change),
            None => Ok(()),
        }
    }

    /// The widget moved to another slide.
    pub fn on_slide_changed(&mut self, change: SlideChange) -> Result<()> {
        if change.from == Some(change.to) {
            return Ok(());
        }

        // Size by the outer slide, not a nested sub-slide.
        let outer = self.deck.outer_slide(change.to);
        let container = self.deck.container();
        let overflows =
            self.widget.rendered_size(outer).height > self.widget.rendered_size(container).height;
        let doc = self.deck.document_mut();
        if overflows {
            doc.set_style_property(container, "overflow-y", "auto");
        } else {
            doc.set_style_property(container, "overflow", "hidden");
        }

        let interval = self.deck.interval(change.to)?;
        let caption = self.deck.transcript_source(&interval);
        let doc = self.deck.document_mut();
        if let Some(display) = doc.element_by_id(TRANSCRIPT_DISPLAY_ID) {
            doc.remove_children(display);
            if !caption.is_empty() {
                let raw = doc.create_raw(caption);
                doc.append_child(display, raw);
            }
        }

        let t = self.current_time();
        let start = self.deck.start(&interval);
        if t < start || t >= interval.end() {
            log::debug!("seeking to {} to match slide {}", start, change.to.index());
            self.seek(start);
        }
        Ok(())
    }

    /// The clock moved; activate the slide under it.
    pub fn on_time_update(&mut self) -> Result<()> {
        let t = self.current_time();
        let next = self.deck.active_at(t)?;
        let changed = match (&self.active, &next) {
            (Some(a), Some(b)) => !Rc::ptr_eq(a, b),
            (None, None) => false,
            _ => true,
        };

        if changed {
            if let Some(previous) = self.active.take() {
                previous.run_end_handlers();
            }
            self.active = next.clone();
        }
        if let Some(interval) = next {
            self.go_to(interval.node())?;
            if changed {
                interval.run_start_handlers();
            }
        }
        Ok(())
    }

    /// The host removed a track event.
    pub fn on_track_event_removed(&mut self, event: &TrackEvent) -> Result<()> {
        if !event.is_slide() {
            return Ok(());
        }
        if !self.deck.remove_slide(&event.payload.slide_id) {
            log::debug!("removed slide {} was not in the deck", event.payload.slide_id);
        }
        self.init_deck()
    }

    /// Forward a master clock notification to synced videos.
    pub fn on_clock_event(&mut self, event: ClockEvent) {
        for video in &self.videos {
            video.on_clock_event(event);
        }
    }

    /// Move a slide in time, reinitializing when it changed position.
    pub fn set_start(&mut self, target: impl Into<SlideRef>, t: f64) -> Result<Reposition> {
        let interval = self.deck.interval(target)?;
        let outcome = self.deck.set_start(&interval, t)?;
        match outcome {
            Reposition::Moved => self.init_deck()?,
            Reposition::Unchanged => {
                self.refresh_video_starts();
                self.marker_refresh.call(Instant::now());
            }
        }
        Ok(outcome)
    }

    /// Lock the clock of an inline video to the master while its slide is active.
    pub fn sync_video(&mut self, video: NodeId, local: SharedClock) -> Result<Rc<SyncedVideo>> {
        let slide = self
            .deck
            .document()
            .closest(video, |d, n| d.has_class(n, SLIDE_CLASS))
            .ok_or_else(|| Error::NotFound(format!("video {} is not inside a slide", video.index())))?;
        let interval = self.deck.interval(slide)?;
        let synced = Rc::new(SyncedVideo::new(
            slide,
            self.deck.start(&interval),
            local,
            Rc::clone(&self.clock),
        ));

        let on_start = Rc::clone(&synced);
        interval.on_start(move || {
            on_start.attach();
            HandlerFlow::Continue
        });
        let on_end = Rc::clone(&synced);
        interval.on_end(move || {
            on_end.detach();
            HandlerFlow::Continue
        });

        log::debug!("synced video {} to slide {}", video.index(), slide.index());
        self.videos.push(Rc::clone(&synced));
        Ok(synced)
    }

    /// Sync every `video` element inside a slide, creating clocks with `clock_for`.
    pub fn sync_all_videos(
        &mut self,
        mut clock_for: impl FnMut(NodeId) -> SharedClock,
    ) -> Result<Vec<Rc<SyncedVideo>>> {
        let container = self.deck.container();
        let videos = self.deck.document().elements_by_tag(container, "video");
        let mut synced = Vec::new();
        for video in videos {
            if self
                .deck
                .document()
                .closest(video, |d, n| d.has_class(n, SLIDE_CLASS))
                .is_none()
            {
                continue;
            }
            let local = clock_for(video);
            synced.push(self.sync_video(video, local)?);
        }
        Ok(synced)
    }

    fn refresh_video_starts(&self) {
        for video in &self.videos {
            video.set_slide_start(self.deck.node_start(video.slide()));
        }
    }

    /// Schedule a rescale of every svg in the deck.
    pub fn request_rescale(&mut self, now: Instant) {
        self.rescale.call(now);
    }

    /// Schedule a rebuild of the timeline markers.
    pub fn request_markers(&mut self, now: Instant) {
        self.marker_refresh.call(now);
    }

    /// Run debounced work whose deadline has passed.
    pub fn tick(&mut self, now: Instant) -> Result<()> {
        if self.marker_refresh.fire_due(now) {
            self.refresh_markers()?;
        }
        if self.rescale.fire_due(now) {
            self.rescale_svgs()?;
        }
        Ok(())
    }

    /// Rebuild timeline markers from the widget's slides.
    pub fn refresh_markers(&mut self) -> Result<&[TimelineMarker]> {
        log::debug!("setting slide indicators on timeline");
        let slides = self.widget.slides();
        let duration = self.clock.borrow().duration();
        let markers = compute_markers(&mut self.deck, &slides, duration)?;
        write_markers(self.deck.document_mut(), &markers);
        self.markers = markers;
        Ok(&self.markers)
    }

    /// Fit every scale container into the deck container.
    pub fn rescale_svgs(&mut self) -> Result<()> {
        let container = self.deck.container();
        let target = self.widget.rendered_size(container);
        let doc = self.deck.document_mut();
        for svg_container in scale::containers(doc, container) {
            scale::fit_in(doc, svg_container, target)?;
        }
        Ok(())
    }
}
