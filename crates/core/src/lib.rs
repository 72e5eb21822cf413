//! Document tree, slide intervals, font resources and deck/timeline
//! synchronization for slide decks driven by a media clock.

pub mod config;
pub mod debounce;
pub mod deck;
pub mod dom;
pub mod error;
pub mod fonts;
pub mod interval;
pub mod markers;
pub mod markup;
pub mod media;
pub mod normalize;
pub mod scale;
pub mod selection;
pub mod sync;
pub mod types;

pub use config::{
    DurationPolicy, SlideDriveConfig, SplitConfig, SyncConfig, TargetCapabilities,
    TextSelectionMode,
};
pub use debounce::Debouncer;
pub use deck::{Deck, Overlap};
pub use dom::{Document, Namespace, NodeId, NodeKind};
pub use error::{Error, Result};
pub use fonts::{FontDescriptor, FontRegistry, FontResource, Glyph};
pub use interval::{HandlerFlow, Reposition, SlideInterval, SlideRef};
pub use markers::TimelineMarker;
pub use media::{
    ClockEvent, MediaClock, PresentationWidget, SharedClock, Size, SlideChange, SyncedVideo,
    TimelineHost,
};
pub use scale::Measure;
pub use selection::SelectionPrompt;
pub use sync::{DeckState, Synchronizer};
pub use types::{SlideEvent, TrackEvent, TrackId};
