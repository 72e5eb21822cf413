//! Arena-backed document tree.
//!
//! Slides, SVG fragments and the deck container all live in a [`Document`].
//! Nodes are addressed by [`NodeId`], which stays valid for the lifetime of
//! the document: detaching a node never frees or reuses its slot, so a
//! `NodeId` is a stable identity that can key side tables.

/// Stable identity of a node inside one [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Index of the node in its document's arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Markup vocabulary an element belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// HTML elements; their children may be arbitrary markup.
    Html,
    /// SVG elements; text children are plain character data.
    Svg,
}

/// A single attribute, stored with its qualified name (`xlink:href`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Element payload of a node.
#[derive(Debug, Clone)]
pub struct Element {
    /// Qualified name as written in the source markup.
    pub name: String,
    pub namespace: Namespace,
    /// Attributes in source order.
    pub attributes: Vec<Attribute>,
}

impl Element {
    /// The name without any namespace prefix.
    pub fn local_name(&self) -> &str {
        match self.name.split_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }

    /// Look up an attribute by qualified name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}

/// What a node is.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// The document root. There is exactly one, at [`Document::root`].
    Document,
    Element(Element),
    Text(String),
    Comment(String),
    /// Markup that is kept verbatim because it did not survive a strict parse.
    Raw(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An arena of nodes with a single document root.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document containing only its root.
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// The document root node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Whether `id` addresses a node of this document.
    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    /// Number of nodes ever allocated, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the document holds nothing but its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(id.0)?.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    /// Local name of an element node, `None` for anything else.
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(Element::local_name)
    }

    /// Whether `id` is an element with the given local name.
    pub fn is_tag(&self, id: NodeId, local: &str) -> bool {
        self.tag_name(id) == Some(local)
    }

    pub fn namespace(&self, id: NodeId) -> Option<Namespace> {
        self.element(id).map(|el| el.namespace)
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Create a detached element.
    pub fn create_element(&mut self, name: impl Into<String>, namespace: Namespace) -> NodeId {
        self.push(NodeKind::Element(Element {
            name: name.into(),
            namespace,
            attributes: Vec::new(),
        }))
    }

    pub fn create_html(&mut self, name: impl Into<String>) -> NodeId {
        self.create_element(name, Namespace::Html)
    }

    pub fn create_svg(&mut self, name: impl Into<String>) -> NodeId {
        self.create_element(name, Namespace::Svg)
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Comment(text.into()))
    }

    pub fn create_raw(&mut self, markup: impl Into<String>) -> NodeId {
        self.push(NodeKind::Raw(markup.into()))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].children.first().copied()
    }

    /// Element children only, in order.
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
            .collect()
    }

    pub fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&s| s == id)?;
        siblings[pos + 1..]
            .iter()
            .copied()
            .find(|&s| self.is_element(s))
    }

    /// Remove a node from its parent. The node and its subtree stay usable.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Insert `child` before `reference`, or append when there is no reference.
    ///
    /// A reference that is not a child of `parent` also appends.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        self.detach(child);
        let pos = reference
            .and_then(|r| self.nodes[parent.0].children.iter().position(|&c| c == r))
            .unwrap_or(self.nodes[parent.0].children.len());
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(pos, child);
    }

    /// Put `replacement` where `old` is, detaching `old`.
    pub fn replace(&mut self, old: NodeId, replacement: NodeId) {
        if let Some(parent) = self.parent(old) {
            self.insert_before(parent, replacement, Some(old));
            self.detach(old);
        }
    }

    pub fn remove_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
    }

    /// Whether the node is reachable from the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root() || self.ancestors(id).any(|a| a == self.root())
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(id),
        }
    }

    /// The node itself or its nearest ancestor satisfying `pred`.
    pub fn closest(&self, id: NodeId, pred: impl Fn(&Document, NodeId) -> bool) -> Option<NodeId> {
        if pred(self, id) {
            return Some(id);
        }
        self.ancestors(id).find(|&a| pred(self, a))
    }

    /// Preorder traversal of the subtree below `id`, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants { doc: self, stack }
    }

    pub fn find_descendant(
        &self,
        id: NodeId,
        pred: impl Fn(&Document, NodeId) -> bool,
    ) -> Option<NodeId> {
        self.descendants(id).find(|&d| pred(self, d))
    }

    pub fn find_descendants(
        &self,
        id: NodeId,
        pred: impl Fn(&Document, NodeId) -> bool,
    ) -> Vec<NodeId> {
        self.descendants(id).filter(|&d| pred(self, d)).collect()
    }

    /// Elements below `scope` with the given local name, in document order.
    pub fn elements_by_tag(&self, scope: NodeId, local: &str) -> Vec<NodeId> {
        self.find_descendants(scope, |doc, n| doc.is_tag(n, local))
    }

    /// Elements below `scope` carrying `class`, in document order.
    pub fn elements_by_class(&self, scope: NodeId, class: &str) -> Vec<NodeId> {
        self.find_descendants(scope, |doc, n| doc.has_class(n, class))
    }

    /// The first attached element whose `id` attribute equals `id`.
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.find_descendant(self.root(), |doc, n| doc.attr(n, "id") == Some(id))
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attr(name)
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(el) = self.element_mut(id) {
            match el.attributes.iter_mut().find(|a| a.name == name) {
                Some(existing) => existing.value = value,
                None => el.attributes.push(Attribute {
                    name: name.to_string(),
                    value,
                }),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        let el = self.element_mut(id)?;
        let pos = el.attributes.iter().position(|a| a.name == name)?;
        Some(el.attributes.remove(pos).value)
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .map(|c| c.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if self.has_class(id, class) {
            return;
        }
        let joined = match self.attr(id, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
            _ => class.to_string(),
        };
        self.set_attr(id, "class", joined);
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        let Some(existing) = self.attr(id, "class") else {
            return;
        };
        let kept: Vec<&str> = existing.split_whitespace().filter(|&c| c != class).collect();
        let kept = kept.join(" ");
        if kept.is_empty() {
            self.remove_attr(id, "class");
        } else {
            self.set_attr(id, "class", kept);
        }
    }

    /// Value of a property declared in the inline `style` attribute.
    pub fn style_property(&self, id: NodeId, property: &str) -> Option<String> {
        let style = self.attr(id, "style")?;
        style
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case(property))
            .map(|(_, value)| value.trim().to_string())
    }

    /// Set (or replace) a property in the inline `style` attribute.
    pub fn set_style_property(&mut self, id: NodeId, property: &str, value: &str) {
        let mut decls: Vec<(String, String)> = self
            .attr(id, "style")
            .unwrap_or("")
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
            .filter(|(n, _)| !n.is_empty())
            .collect();
        match decls.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(property)) {
            Some(decl) => decl.1 = value.to_string(),
            None => decls.push((property.to_string(), value.to_string())),
        }
        let style = decls
            .iter()
            .map(|(n, v)| format!("{}: {}", n, v))
            .collect::<Vec<_>>()
            .join("; ");
        self.set_attr(id, "style", style);
    }

    /// Concatenated character data of the subtree.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let NodeKind::Text(t) | NodeKind::Raw(t) = self.kind(id) {
            out.push_str(t);
        }
        for d in self.descendants(id) {
            if let NodeKind::Text(t) | NodeKind::Raw(t) = self.kind(d) {
                out.push_str(t);
            }
        }
        out
    }

    /// Replace all children with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        self.remove_children(id);
        if !text.is_empty() {
            let t = self.create_text(text);
            self.append_child(id, t);
        }
    }

    /// Copy a subtree; the copy is detached.
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let copy = self.push(self.nodes[id.0].kind.clone());
        for child in self.children(id).to_vec() {
            let child_copy = self.deep_clone(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Copy a subtree of another document into this one; the copy is detached.
    ///
    /// Importing another document's root copies its children under a
    /// detached `Document` node, so callers normally import elements.
    pub fn import_node(&mut self, other: &Document, id: NodeId) -> NodeId {
        let copy = self.push(other.kind(id).clone());
        for &child in other.children(id) {
            let child_copy = self.import_node(other, child);
            self.append_child(copy, child_copy);
        }
        copy
    }
}

/// Iterator over a node's ancestors.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}

/// Preorder iterator over a subtree.
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(current).iter().rev().copied());
        Some(current)
    }
}
