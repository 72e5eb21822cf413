//! Dropped files and their classification.

use std::path::{Path, PathBuf};

use slidedrive_core::{Error, Result, TrackId};

/// Kinds of documents a drop can import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Svg,
    Html,
}

impl FileKind {
    /// Classify by declared MIME type, falling back to the file extension.
    pub fn classify(mime: &str, name: &str) -> Option<Self> {
        let mime = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match mime.as_str() {
            "image/svg+xml" => return Some(FileKind::Svg),
            "text/html" => return Some(FileKind::Html),
            _ => {}
        }

        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("svg") => Some(FileKind::Svg),
            Some("html") | Some("htm") => Some(FileKind::Html),
            _ => None,
        }
    }
}

/// Where the content of a dropped file comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Path(PathBuf),
    /// Content the host already read.
    Memory(String),
}

impl FileSource {
    pub async fn read(self) -> Result<String> {
        match self {
            FileSource::Path(path) => Ok(tokio::fs::read_to_string(&path).await?),
            FileSource::Memory(content) => Ok(content),
        }
    }
}

/// One file of a drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedFile {
    pub name: String,
    /// Declared MIME type; may be empty.
    pub mime: String,
    pub source: FileSource,
}

impl DroppedFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, source: FileSource) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            source,
        }
    }

    /// A file on disk, typed by its extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(name, "", FileSource::Path(path))
    }

    pub fn in_memory(name: impl Into<String>, mime: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(name, mime, FileSource::Memory(content.into()))
    }

    pub fn kind(&self) -> Option<FileKind> {
        FileKind::classify(&self.mime, &self.name)
    }

    /// Classify, failing for unsupported files.
    pub fn require_kind(&self) -> Result<FileKind> {
        self.kind()
            .ok_or_else(|| Error::UnsupportedFormat(format!("{} ({})", self.name, self.mime)))
    }
}

/// The host's `filesdropped` notification.
#[derive(Debug, Clone, PartialEq)]
pub struct FilesDropped {
    pub files: Vec<DroppedFile>,
    pub track: TrackId,
    /// Timeline position of the drop, in seconds.
    pub start: f64,
}

impl FilesDropped {
    pub fn new(files: Vec<DroppedFile>, track: TrackId, start: f64) -> Self {
        Self {
            files,
            track,
            start,
        }
    }
}
