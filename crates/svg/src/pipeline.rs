//! Ordered normalization steps over a [`SlideDocument`].
//!
//! Order is significant: viewports must be padded before text is measured,
//! and overlays are measured before runs are joined.

use slidedrive_core::{Measure, Result, TargetCapabilities};

use crate::document::SlideDocument;
use crate::geometry::Geometry;
use crate::{prune, text};

/// One normalization step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Drop the masks LibreOffice attaches to line shapes.
    RemoveLineShapeMasks,
    PadTextViewports,
    /// Re-set `xlink:href` references when the target loses them.
    FixCrossReferences,
    /// Round-trip the root through markup.
    Reparse,
    NormalizeTextSelection,
    JoinAdjacentText,
    PruneInvisible,
    Minify,
    ScaleTo(Measure),
}

impl Step {
    pub fn apply(
        self,
        slide: &mut SlideDocument,
        capabilities: &TargetCapabilities,
        geometry: &impl Geometry,
    ) -> Result<()> {
        let root = slide.root();
        let container = slide.container();
        match self {
            Step::RemoveLineShapeMasks => {
                prune::remove_line_shape_masks(slide.document_mut(), root);
            }
            Step::PadTextViewports => {
                text::pad_text_viewports(slide.document_mut(), root);
            }
            Step::FixCrossReferences => {
                if capabilities.fix_xlink_references {
                    text::fix_xlink_references(slide.document_mut(), root);
                }
            }
            Step::Reparse => slide.reparse()?,
            Step::NormalizeTextSelection => {
                text::normalize_text_selection(
                    slide.document_mut(),
                    root,
                    container,
                    capabilities.text_selection,
                    geometry,
                )?;
            }
            Step::JoinAdjacentText => {
                text::join_adjacent_text(slide.document_mut(), root);
            }
            Step::PruneInvisible => {
                prune::prune_invisible(slide.document_mut(), root);
            }
            Step::Minify => {
                prune::minify(slide.document_mut(), root);
            }
            Step::ScaleTo(measure) => slide.scale_to(measure)?,
        }
        Ok(())
    }
}

/// An ordered list of steps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The steps every imported slide goes through.
    pub fn standard() -> Self {
        Self::new()
            .then(Step::RemoveLineShapeMasks)
            .then(Step::PadTextViewports)
            .then(Step::FixCrossReferences)
            .then(Step::Reparse)
            .then(Step::NormalizeTextSelection)
            .then(Step::JoinAdjacentText)
            .then(Step::PruneInvisible)
            .then(Step::Minify)
            .then(Step::ScaleTo(Measure::Width))
    }

    pub fn then(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Run every step in order, stopping at the first failure.
    pub fn apply(
        &self,
        slide: &mut SlideDocument,
        capabilities: &TargetCapabilities,
        geometry: &impl Geometry,
    ) -> Result<()> {
        for &step in &self.steps {
            log::debug!("applying {:?}", step);
            step.apply(slide, capabilities, geometry)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{AttributeGeometry, BBOX_FILL_CLASS};
    use crate::text::{OVERLAY_CLASS, OVERLAY_CONTAINER_CLASS};
    use slidedrive_core::scale::SCALER_CLASS;

    const AUTHORED: &str = r#"<svg viewBox="0 0 1000 1000">
  <defs> </defs>
  <g class="com.sun.star.drawing.LineShape"><mask id="m"/><path d="M0 0 L10 10"/></g>
  <g visibility="hidden"><rect width="5" height="5"/></g>
  <text x="100" y="240" font-size="50">Hello</text><text x="400" y="240" font-size="50">world</text>
</svg>"#;

    #[test]
    fn test_standard_order() {
        let steps = Pipeline::standard().steps().to_vec();
        assert_eq!(steps.first(), Some(&Step::RemoveLineShapeMasks));
        assert_eq!(steps.last(), Some(&Step::ScaleTo(Measure::Width)));
        let pad = steps.iter().position(|s| *s == Step::PadTextViewports).unwrap();
        let select = steps.iter().position(|s| *s == Step::NormalizeTextSelection).unwrap();
        let join = steps.iter().position(|s| *s == Step::JoinAdjacentText).unwrap();
        assert!(pad < select && select < join);
    }

    #[test]
    fn test_standard_pipeline() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut slide = SlideDocument::parse(AUTHORED).unwrap();
        Pipeline::standard()
            .apply(&mut slide, &TargetCapabilities::default(), &AttributeGeometry::default())
            .unwrap();

        let doc = slide.document();
        let root = slide.root();
        assert!(doc.elements_by_tag(root, "mask").is_empty());
        assert!(doc.elements_by_tag(root, "defs").is_empty());
        assert!(doc.elements_by_tag(root, "rect").iter().all(|&r| doc.has_class(r, BBOX_FILL_CLASS)));
        assert_eq!(doc.elements_by_class(root, BBOX_FILL_CLASS).len(), 1);

        // Runs were measured separately, then joined.
        let overlays = doc.elements_by_class(slide.container(), OVERLAY_CLASS);
        assert_eq!(overlays.len(), 2);
        assert_eq!(doc.elements_by_class(slide.container(), OVERLAY_CONTAINER_CLASS).len(), 1);
        let texts = doc.elements_by_tag(root, "text");
        assert_eq!(texts.len(), 1);
        assert_eq!(doc.elements_by_tag(texts[0], "tspan").len(), 2);

        let scaler = doc.elements_by_class(slide.container(), SCALER_CLASS)[0];
        assert_eq!(doc.style_property(scaler, "width").as_deref(), Some("100%"));
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let mut slide = SlideDocument::parse(AUTHORED).unwrap();
        let before = slide.markup();
        Pipeline::new()
            .apply(&mut slide, &TargetCapabilities::default(), &AttributeGeometry::default())
            .unwrap();
        assert_eq!(slide.markup(), before);
    }
}
