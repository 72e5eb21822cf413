//! Interval Model: the time span a slide occupies on the media timeline.

use std::cell::{Cell, RefCell};
use std::fmt;

use crate::dom::NodeId;

/// Attribute persisting a slide's start time on its node.
pub const START_ATTR: &str = "data-popcorn-slideshow";

/// Class tagging slide elements in the deck.
pub const SLIDE_CLASS: &str = "slide";

/// Class of the caption fragment nested inside a slide.
pub const TRANSCRIPT_CLASS: &str = "transcript";

/// A slide named either by its `id` attribute or by its node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlideRef {
    Id(String),
    Node(NodeId),
}

impl From<&str> for SlideRef {
    fn from(id: &str) -> Self {
        SlideRef::Id(id.to_string())
    }
}

impl From<String> for SlideRef {
    fn from(id: String) -> Self {
        SlideRef::Id(id)
    }
}

impl From<NodeId> for SlideRef {
    fn from(node: NodeId) -> Self {
        SlideRef::Node(node)
    }
}

/// What a start/end handler asks of the remaining handlers in its pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerFlow {
    Continue,
    /// Skip the rest of the handlers in this pass.
    Stop,
}

/// Callback run when a slide becomes active or inactive.
pub type SlideHandler = Box<dyn FnMut() -> HandlerFlow>;

/// Outcome of assigning a new start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reposition {
    /// The node moved among its siblings; the deck needs reinitializing.
    Moved,
    /// Already in order; only timeline markers need refreshing.
    Unchanged,
}

/// Per-node interval state.
///
/// One instance exists per slide node in a deck (see
/// [`Deck::interval`](crate::deck::Deck::interval)); the start time itself
/// lives on the node so it survives serialization.
pub struct SlideInterval {
    node: NodeId,
    end: Cell<f64>,
    start_handlers: RefCell<Vec<SlideHandler>>,
    end_handlers: RefCell<Vec<SlideHandler>>,
}

impl fmt::Debug for SlideInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlideInterval")
            .field("node", &self.node)
            .field("end", &self.end.get())
            .field("start_handlers", &self.start_handlers.borrow().len())
            .field("end_handlers", &self.end_handlers.borrow().len())
            .finish()
    }
}

impl SlideInterval {
    pub(crate) fn new(node: NodeId, start: f64) -> Self {
        Self {
            node,
            end: Cell::new(start + 1.0),
            start_handlers: RefCell::new(Vec::new()),
            end_handlers: RefCell::new(Vec::new()),
        }
    }

    /// The slide node this interval belongs to.
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn end(&self) -> f64 {
        self.end.get()
    }

    /// Set the end time. Ordering against `start` and other slides is the caller's concern.
    pub fn set_end(&self, end: f64) {
        self.end.set(end);
    }

    /// Register a handler run when the slide becomes active.
    pub fn on_start(&self, handler: impl FnMut() -> HandlerFlow + 'static) {
        self.start_handlers.borrow_mut().push(Box::new(handler));
    }

    /// Register a handler run when the slide stops being active.
    pub fn on_end(&self, handler: impl FnMut() -> HandlerFlow + 'static) {
        self.end_handlers.borrow_mut().push(Box::new(handler));
    }

    pub fn start_handler_count(&self) -> usize {
        self.start_handlers.borrow().len()
    }

    pub fn end_handler_count(&self) -> usize {
        self.end_handlers.borrow().len()
    }

    /// Run start handlers in registration order until one returns `Stop`.
    pub fn run_start_handlers(&self) -> HandlerFlow {
        run_handlers(&self.start_handlers)
    }

    /// Run end handlers in registration order until one returns `Stop`.
    pub fn run_end_handlers(&self) -> HandlerFlow {
        run_handlers(&self.end_handlers)
    }
}

fn run_handlers(slot: &RefCell<Vec<SlideHandler>>) -> HandlerFlow {
    // Handlers may register further handlers while running.
    let mut handlers = std::mem::take(&mut *slot.borrow_mut());
    let mut flow = HandlerFlow::Continue;
    for handler in handlers.iter_mut() {
        if handler() == HandlerFlow::Stop {
            flow = HandlerFlow::Stop;
            break;
        }
    }
    let mut current = slot.borrow_mut();
    handlers.append(&mut current);
    *current = handlers;
    flow
}

/// Parse a persisted start attribute the way the deck reads it.
pub fn parse_time(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|t| t.is_finite())
}

/// Format a time for persisting on a node.
pub fn format_time(t: f64) -> String {
    t.to_string()
}
