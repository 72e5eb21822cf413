//! SVG slide normalization.
//!
//! Turns externally authored SVG documents into slides that render and
//! select consistently: an ordered [`Pipeline`] of steps over a
//! [`SlideDocument`], plus splitting of multi-slide documents into one
//! document per slide boundary.

pub mod document;
pub mod fonts;
pub mod geometry;
pub mod pipeline;
pub mod prune;
pub mod split;
pub mod text;

pub use document::SlideDocument;
pub use geometry::{AttributeGeometry, BBox, Geometry, Viewport};
pub use pipeline::{Pipeline, Step};
pub use split::{CancelHandle, SlideEmitter, SlideSplitter, SplitSlide, SplitSource};
