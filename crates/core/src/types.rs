//! Values exchanged with the timeline-editing host.

use serde::{Deserialize, Serialize};

use crate::deck::Deck;
use crate::interval::SlideInterval;

/// Track event type carried by slide events.
pub const SLIDE_EVENT_TYPE: &str = "slidedrive";

/// Name of the track holding the slides already in a page.
pub const SLIDES_TRACK: &str = "Slides";

/// Handle of a track created by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(pub usize);

/// Editable properties of one slide as the timeline sees them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideEvent {
    /// When the slide becomes active, in seconds.
    pub start: f64,

    /// When the slide stops being active, in seconds.
    pub end: f64,

    /// Id of the slide element.
    pub slide_id: String,

    /// Caption markup shown while the slide is active.
    pub transcript_source: String,
}

impl SlideEvent {
    /// Snapshot an interval, generating the slide id if needed.
    pub fn from_interval(deck: &mut Deck, interval: &SlideInterval) -> Self {
        Self {
            start: deck.start(interval),
            end: interval.end(),
            slide_id: deck.slide_id(interval),
            transcript_source: deck.transcript_source(interval),
        }
    }
}

/// A typed event on a host track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEvent {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(rename = "popcornOptions")]
    pub payload: SlideEvent,
}

impl TrackEvent {
    /// Wrap slide properties as a slide track event.
    pub fn slide(payload: SlideEvent) -> Self {
        Self {
            kind: SLIDE_EVENT_TYPE.to_string(),
            payload,
        }
    }

    pub fn is_slide(&self) -> bool {
        self.kind == SLIDE_EVENT_TYPE
    }
}
