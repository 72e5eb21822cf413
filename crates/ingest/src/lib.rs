//! File-drop ingestion.
//!
//! Dropped files are classified by declared type or extension, read
//! concurrently, and routed to the SVG splitter or the HTML importer.
//! Slides land in the deck with start times offset so that files from one
//! drop do not collide.

pub mod classify;
pub mod ingestor;

pub use classify::{DroppedFile, FileKind, FileSource, FilesDropped};
pub use ingestor::{DropReport, Ingestor};
