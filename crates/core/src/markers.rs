//! Timeline markers: one tick on the scrubber per slide start.

use crate::deck::Deck;
use crate::dom::{Document, NodeId};
use crate::error::Result;

/// Class of the scrubber bar markers are drawn on.
pub const TIMELINE_BAR_CLASS: &str = "mejs-time-total";

/// Class of the element holding the ticks.
pub const INDICATORS_CLASS: &str = "timeline-indicators";

const TICK_STYLE: &str = "position: absolute; top: 0; height: 10px; width: 1px; background: black";

/// A tick for one slide, positioned as a fraction of the media duration.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineMarker {
    pub slide: NodeId,
    pub start: f64,
    pub fraction: f64,
}

impl TimelineMarker {
    pub fn left_percent(&self) -> f64 {
        self.fraction * 100.0
    }
}

/// Markers for every slide not starting at zero.
pub fn compute_markers(deck: &mut Deck, slides: &[NodeId], duration: f64) -> Result<Vec<TimelineMarker>> {
    if !(duration.is_finite() && duration > 0.0) {
        log::debug!("no timeline markers for media duration {}", duration);
        return Ok(Vec::new());
    }

    let mut markers = Vec::new();
    for &slide in slides {
        let interval = deck.interval(slide)?;
        let start = deck.start(&interval);
        if start == 0.0 {
            continue;
        }
        markers.push(TimelineMarker {
            slide,
            start,
            fraction: start / duration,
        });
    }
    Ok(markers)
}

/// Replace the tick container under the scrubber bar.
///
/// Returns the new container, or `None` when the document has no bar.
pub fn write_markers(doc: &mut Document, markers: &[TimelineMarker]) -> Option<NodeId> {
    for old in doc.elements_by_class(doc.root(), INDICATORS_CLASS) {
        doc.detach(old);
    }

    let bar = doc
        .elements_by_class(doc.root(), TIMELINE_BAR_CLASS)
        .first()
        .copied()?;
    doc.set_style_property(bar, "position", "relative");

    let container = doc.create_html("div");
    doc.add_class(container, INDICATORS_CLASS);
    for marker in markers {
        let tick = doc.create_html("div");
        doc.set_attr(
            tick,
            "style",
            format!("{}; left: {}%", TICK_STYLE, marker.left_percent()),
        );
        doc.append_child(container, tick);
    }
    doc.append_child(bar, container);
    Some(container)
}
