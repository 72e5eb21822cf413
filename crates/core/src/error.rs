//! Error types for slide deck synchronization and SVG ingestion.

use thiserror::Error;

use crate::dom::NodeId;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, normalizing or synchronizing a deck.
#[derive(Error, Debug)]
pub enum Error {
    /// A slide id or node could not be resolved in the deck.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An argument was neither a slide id nor an element of the document.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An SVG `<font>` lacked its `<font-face>` or family name.
    #[error("Malformed font: {0}")]
    MalformedFont(String),

    /// Tried to reposition a slide that has no parent.
    #[error("Cannot reposition detached node {0:?}")]
    DetachedNode(NodeId),

    /// Markup could not be parsed.
    #[error("XML parsing error: {0}")]
    Xml(String),

    /// Persisted font data could not be read or written.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to read an input file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// The dropped file type is not supported.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    /// An in-flight operation was cancelled.
    #[error("Cancelled: {0}")]
    Cancelled(String),
}
