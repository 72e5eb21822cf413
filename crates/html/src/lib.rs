//! HTML deck import.
//!
//! A saved deck page carries its slides with their start times and its
//! embedded font resources; importing merges both into a live deck.

pub mod import;

pub use import::{import_html, HtmlImporter};
