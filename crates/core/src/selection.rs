//! Interactive target selection and SVG text links.

use std::fmt;

use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};

/// Class marking the elements a pending prompt accepts.
pub const SELECTABLE_CLASS: &str = "selectable-target";

/// Reason given to a prompt superseded by a newer one.
pub const SUPERSEDED: &str = "Cancelled by new selection action.";

/// Reason given to a prompt the user dismissed.
pub const DISMISSED: &str = "cancelled";

type SelectionCallback = Box<dyn FnOnce(Result<NodeId>)>;

struct Pending {
    candidates: Vec<NodeId>,
    label: String,
    callback: SelectionCallback,
}

/// At most one outstanding "pick an element" request.
///
/// Starting a new prompt cancels the previous one; its callback receives
/// `Error::Cancelled`.
#[derive(Default)]
pub struct SelectionPrompt {
    pending: Option<Pending>,
}

impl fmt::Debug for SelectionPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionPrompt")
            .field("label", &self.pending.as_ref().map(|p| p.label.as_str()))
            .finish()
    }
}

impl SelectionPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(
        &mut self,
        doc: &mut Document,
        candidates: Vec<NodeId>,
        label: &str,
        callback: impl FnOnce(Result<NodeId>) + 'static,
    ) {
        self.finish(doc, Err(Error::Cancelled(SUPERSEDED.to_string())));
        for &c in &candidates {
            doc.add_class(c, SELECTABLE_CLASS);
        }
        self.pending = Some(Pending {
            candidates,
            label: label.to_string(),
            callback: Box::new(callback),
        });
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Prompt text for the pending selection.
    pub fn message(&self) -> Option<String> {
        self.pending
            .as_ref()
            .map(|p| format!("Please select {}", p.label))
    }

    /// Complete the prompt with `node`. Returns false if it is not a candidate.
    pub fn select(&mut self, doc: &mut Document, node: NodeId) -> bool {
        let accepted = self
            .pending
            .as_ref()
            .is_some_and(|p| p.candidates.contains(&node));
        if accepted {
            self.finish(doc, Ok(node));
        }
        accepted
    }

    /// Dismiss the pending prompt, if any.
    pub fn cancel(&mut self, doc: &mut Document) {
        self.finish(doc, Err(Error::Cancelled(DISMISSED.to_string())));
    }

    fn finish(&mut self, doc: &mut Document, outcome: Result<NodeId>) {
        if let Some(pending) = self.pending.take() {
            for &c in &pending.candidates {
                doc.remove_class(c, SELECTABLE_CLASS);
            }
            (pending.callback)(outcome);
        }
    }
}

/// Wrap an SVG element in an underlined `a` pointing at `href`.
pub fn link_text(doc: &mut Document, target: NodeId, href: &str) -> NodeId {
    let link = doc.create_svg("a");
    doc.set_attr(link, "xlink:href", href);
    doc.set_style_property(link, "text-decoration", "underline");
    if doc.parent(target).is_some() {
        doc.replace(target, link);
    }
    doc.append_child(link, target);
    link
}

/// Replace a link by its children.
pub fn unlink(doc: &mut Document, link: NodeId) -> Result<()> {
    if !doc.is_tag(link, "a") {
        return Err(Error::InvalidArgument("only links can be unlinked".to_string()));
    }
    let parent = doc.parent(link).ok_or(Error::DetachedNode(link))?;
    for child in doc.children(link).to_vec() {
        doc.insert_before(parent, child, Some(link));
    }
    doc.detach(link);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{outer_markup, parse_document};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn doc() -> (Document, Vec<NodeId>) {
        let doc = parse_document(r#"<svg><text>one</text><text>two</text></svg>"#).unwrap();
        let texts = doc.elements_by_tag(doc.root(), "text");
        (doc, texts)
    }

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl FnOnce(Result<NodeId>) + 'static) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        (log, move |r: Result<NodeId>| {
            sink.borrow_mut().push(match r {
                Ok(n) => format!("ok {}", n.index()),
                Err(Error::Cancelled(reason)) => reason,
                Err(e) => e.to_string(),
            })
        })
    }

    #[test]
    fn test_new_prompt_cancels_previous() {
        let (mut doc, texts) = doc();
        let mut prompt = SelectionPrompt::new();
        let (first, cb) = recorder();
        prompt.begin(&mut doc, texts.clone(), "SVG text to link", cb);
        assert!(doc.has_class(texts[0], SELECTABLE_CLASS));
        assert_eq!(prompt.message().as_deref(), Some("Please select SVG text to link"));

        let (second, cb) = recorder();
        prompt.begin(&mut doc, vec![texts[1]], "SVG link to remove", cb);
        assert_eq!(*first.borrow(), vec![SUPERSEDED.to_string()]);
        assert!(!doc.has_class(texts[0], SELECTABLE_CLASS));

        assert!(!prompt.select(&mut doc, texts[0]));
        assert!(prompt.select(&mut doc, texts[1]));
        assert_eq!(*second.borrow(), vec![format!("ok {}", texts[1].index())]);
        assert!(!prompt.is_pending());
        assert!(!doc.has_class(texts[1], SELECTABLE_CLASS));
    }

    #[test]
    fn test_cancel() {
        let (mut doc, texts) = doc();
        let mut prompt = SelectionPrompt::new();
        let (log, cb) = recorder();
        prompt.begin(&mut doc, texts, "anything", cb);
        prompt.cancel(&mut doc);
        prompt.cancel(&mut doc);
        assert_eq!(*log.borrow(), vec![DISMISSED.to_string()]);
    }

    #[test]
    fn test_link_and_unlink() {
        let (mut doc, texts) = doc();
        let svg = doc.parent(texts[0]).unwrap();
        let link = link_text(&mut doc, texts[0], "https://example.org/");
        assert_eq!(
            outer_markup(&doc, svg),
            r#"<svg><a xlink:href="https://example.org/" style="text-decoration: underline"><text>one</text></a><text>two</text></svg>"#
        );
        unlink(&mut doc, link).unwrap();
        assert_eq!(outer_markup(&doc, svg), "<svg><text>one</text><text>two</text></svg>");
        assert!(matches!(unlink(&mut doc, texts[1]), Err(Error::InvalidArgument(_))));
    }
}
