//! Collaborators the synchronizer drives: the media clock, the deck
//! presentation widget and the timeline-editing host.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::dom::NodeId;
use crate::types::{TrackEvent, TrackId};

/// A playback engine exposing a seekable clock.
pub trait MediaClock {
    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    fn set_current_time(&mut self, t: f64);

    /// Total media length in seconds.
    fn duration(&self) -> f64;

    fn play(&mut self);

    fn pause(&mut self);

    fn paused(&self) -> bool;

    fn volume(&self) -> f64;

    fn set_volume(&mut self, volume: f64);
}

/// The master clock, shared between the synchronizer and synced videos.
pub type SharedClock = Rc<RefCell<dyn MediaClock>>;

/// Notifications emitted by the master clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    Play,
    Pause,
    Seeked,
    VolumeChange,
}

/// The active slide moved from one slide to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideChange {
    pub from: Option<NodeId>,
    pub to: NodeId,
}

/// Rendered size of an element in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// The widget presenting one slide at a time.
pub trait PresentationWidget {
    /// Re-read the slide set. Widgets typically reset to the first slide.
    fn rescan(&mut self, slides: &[NodeId]);

    /// Show `slide`; returns the change when the shown slide differs.
    fn go_to(&mut self, slide: NodeId) -> Option<SlideChange>;

    /// The slide currently shown.
    fn current(&self) -> Option<NodeId>;

    /// Slides the widget knows about, in order.
    fn slides(&self) -> Vec<NodeId>;

    /// Layout size of a node as rendered.
    fn rendered_size(&self, node: NodeId) -> Size;
}

/// The timeline editor hosting slide track events.
pub trait TimelineHost {
    fn add_track(&mut self, name: &str) -> TrackId;

    fn add_track_event(&mut self, track: TrackId, event: TrackEvent);
}

/// An inline video whose own clock follows the master while its slide is active.
pub struct SyncedVideo {
    slide: NodeId,
    local: SharedClock,
    master: SharedClock,
    slide_start: Cell<f64>,
    attached: Cell<bool>,
}

impl std::fmt::Debug for SyncedVideo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncedVideo")
            .field("slide", &self.slide)
            .field("slide_start", &self.slide_start.get())
            .field("attached", &self.attached.get())
            .finish()
    }
}

impl SyncedVideo {
    pub fn new(slide: NodeId, slide_start: f64, local: SharedClock, master: SharedClock) -> Self {
        Self {
            slide,
            local,
            master,
            slide_start: Cell::new(slide_start),
            attached: Cell::new(false),
        }
    }

    /// The slide hosting this video.
    pub fn slide(&self) -> NodeId {
        self.slide
    }

    pub fn slide_start(&self) -> f64 {
        self.slide_start.get()
    }

    pub fn set_slide_start(&self, start: f64) {
        self.slide_start.set(start);
    }

    pub fn is_attached(&self) -> bool {
        self.attached.get()
    }

    fn local_time(&self) -> f64 {
        self.master.borrow().current_time() - self.slide_start.get()
    }

    /// Lock the local clock to the master and start following it.
    pub fn attach(&self) {
        let t = self.local_time();
        let mut local = self.local.borrow_mut();
        local.set_current_time(t);
        local.play();
        self.attached.set(true);
    }

    /// Pause and stop following the master.
    pub fn detach(&self) {
        self.local.borrow_mut().pause();
        self.attached.set(false);
    }

    /// React to a master clock notification.
    ///
    /// Volume is always mirrored; transport events only while attached.
    pub fn on_clock_event(&self, event: ClockEvent) {
        match event {
            ClockEvent::VolumeChange => {
                let volume = self.master.borrow().volume();
                self.local.borrow_mut().set_volume(volume);
            }
            _ if !self.attached.get() => {}
            ClockEvent::Play => self.local.borrow_mut().play(),
            ClockEvent::Pause => self.local.borrow_mut().pause(),
            ClockEvent::Seeked => {
                let t = self.local_time();
                self.local.borrow_mut().set_current_time(t);
            }
        }
    }
}
