//! Configuration for synchronization, splitting and target capabilities.
//!
//! Every value has builder-style `with_*` setters and deserializes from
//! JSON with defaults for missing fields.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::markup::{outer_markup, parse_document};

/// How vector text is made selectable on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSelectionMode {
    /// Invisible positioned HTML spans over each text run.
    #[default]
    Overlay,
    /// Real text kept in place with a semi-transparent highlight.
    InlineHighlight,
    /// The target selects SVG text itself.
    Native,
}

/// Rendering-target quirks, resolved once and passed down.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetCapabilities {
    /// Re-set `xlink:href` attributes so they survive serialization.
    pub fix_xlink_references: bool,
    pub text_selection: TextSelectionMode,
}

impl TargetCapabilities {
    /// Capabilities of the built-in markup codec.
    pub fn probe() -> Self {
        Self {
            fix_xlink_references: probe_xlink_serialization(),
            ..Self::default()
        }
    }

    pub fn with_fix_xlink_references(mut self, fix: bool) -> Self {
        self.fix_xlink_references = fix;
        self
    }

    pub fn with_text_selection(mut self, mode: TextSelectionMode) -> Self {
        self.text_selection = mode;
        self
    }
}

/// Whether `xlink:href` is lost when an image is serialized and reparsed.
pub fn probe_xlink_serialization() -> bool {
    let survives = parse_document(r#"<svg><image xlink:href="about:blank"></image></svg>"#)
        .map(|doc| outer_markup(&doc, doc.root()).contains("xlink:href"))
        .unwrap_or(false);
    !survives
}

/// How long each slide split out of one SVG document lasts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DurationPolicy {
    /// A fraction of the media time left after the slide's start.
    FractionOfRemaining { fraction: f64 },
    /// The same length for every slide.
    Fixed { seconds: f64 },
}

impl Default for DurationPolicy {
    fn default() -> Self {
        DurationPolicy::FractionOfRemaining { fraction: 0.10 }
    }
}

impl DurationPolicy {
    /// Raw duration for a slide with `remaining` seconds of media after it.
    pub fn duration(&self, remaining: f64) -> f64 {
        match *self {
            DurationPolicy::FractionOfRemaining { fraction } => remaining.max(0.0) * fraction,
            DurationPolicy::Fixed { seconds } => seconds,
        }
    }
}

/// Settings for splitting a multi-slide SVG document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub duration: DurationPolicy,
    /// Shortest duration a split slide gets, so starts strictly increase.
    pub min_seconds: f64,
    /// Delay between two emitted slides, in milliseconds.
    pub emit_interval_ms: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            duration: DurationPolicy::default(),
            min_seconds: 1.0,
            emit_interval_ms: 200,
        }
    }
}

impl SplitConfig {
    pub fn with_duration(mut self, policy: DurationPolicy) -> Self {
        self.duration = policy;
        self
    }

    pub fn with_min_seconds(mut self, seconds: f64) -> Self {
        self.min_seconds = seconds;
        self
    }

    pub fn with_emit_interval_ms(mut self, ms: u64) -> Self {
        self.emit_interval_ms = ms;
        self
    }

    pub fn emit_interval(&self) -> Duration {
        Duration::from_millis(self.emit_interval_ms)
    }

    /// Duration of a slide given the media time left after its start.
    pub fn slide_duration(&self, remaining: f64) -> f64 {
        let raw = self.duration.duration(remaining);
        if raw.is_finite() {
            raw.max(self.min_seconds)
        } else {
            self.min_seconds
        }
    }
}

/// Settings for the deck/timeline synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Slide id to show on first initialization.
    pub permalink: Option<String>,
    pub marker_debounce_ms: u64,
    pub rescale_debounce_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            permalink: None,
            marker_debounce_ms: 250,
            rescale_debounce_ms: 200,
        }
    }
}

impl SyncConfig {
    pub fn with_permalink(mut self, slide_id: impl Into<String>) -> Self {
        self.permalink = Some(slide_id.into());
        self
    }

    /// Take the permalink from a page address fragment such as `#intro-3k`.
    pub fn with_fragment(mut self, fragment: &str) -> Self {
        let id = fragment.trim_start_matches('#');
        self.permalink = (!id.is_empty()).then(|| id.to_string());
        self
    }

    pub fn with_marker_debounce_ms(mut self, ms: u64) -> Self {
        self.marker_debounce_ms = ms;
        self
    }

    pub fn with_rescale_debounce_ms(mut self, ms: u64) -> Self {
        self.rescale_debounce_ms = ms;
        self
    }

    pub fn marker_debounce(&self) -> Duration {
        Duration::from_millis(self.marker_debounce_ms)
    }

    pub fn rescale_debounce(&self) -> Duration {
        Duration::from_millis(self.rescale_debounce_ms)
    }
}

/// All settings a host provides.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideDriveConfig {
    pub capabilities: TargetCapabilities,
    pub sync: SyncConfig,
    pub split: SplitConfig,
}

impl SlideDriveConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_capabilities(mut self, capabilities: TargetCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_split(mut self, split: SplitConfig) -> Self {
        self.split = split;
        self
    }
}
