use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::DomError;

/// Identity of an element inside one document. Ids are never reused, so a
/// detached element keeps its id and can still be looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Rect {
        Rect {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Edge contact counts as overlap, matching a zero threshold observer.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Inherit,
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Display {
    #[default]
    Block,
    Inline,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    Static,
    Relative,
    Absolute,
    Fixed,
    Sticky,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overflow {
    #[default]
    Visible,
    Hidden,
    Scroll,
    Auto,
}

impl Overflow {
    pub fn is_user_scrollable(self) -> bool {
        matches!(self, Overflow::Scroll | Overflow::Auto)
    }
}

/// Computed style subset the tracker and the scroll effects look at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    pub visibility: Visibility,
    pub display: Display,
    pub opacity: f64,
    pub position: Position,
    pub overflow_x: Overflow,
    pub overflow_y: Overflow,
}

impl Default for Style {
    fn default() -> Self {
        Style {
            visibility: Visibility::Inherit,
            display: Display::Block,
            opacity: 1.0,
            position: Position::Static,
            overflow_x: Overflow::Visible,
            overflow_y: Overflow::Visible,
        }
    }
}

/// Scroll geometry of a box: content extent vs. the visible client area.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollBox {
    pub left: f64,
    pub top: f64,
    pub scroll_width: f64,
    pub scroll_height: f64,
    pub client_width: f64,
    pub client_height: f64,
}

impl ScrollBox {
    pub fn overflows_x(&self) -> bool {
        self.scroll_width > self.client_width
    }

    pub fn overflows_y(&self) -> bool {
        self.scroll_height > self.client_height
    }
}

/// One element as the host page describes it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Element {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub style: Style,
    /// Layout box in document coordinates, before any container scrolling
    pub rect: Rect,
    /// Direct text-node children, in order
    pub text: Vec<String>,
    pub has_onclick: bool,
    /// Current value of a form control
    pub value: Option<String>,
    pub scroll: ScrollBox,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Element {
            tag: tag.to_ascii_lowercase(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text.push(text.to_string());
        self
    }

    pub fn with_rect(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.rect = Rect::new(x, y, width, height);
        self
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn with_onclick(mut self) -> Self {
        self.has_onclick = true;
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn with_scroll(mut self, scroll: ScrollBox) -> Self {
        self.scroll = scroll;
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }
}

/// Nested element description, used to build documents from fixtures.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ElementTree {
    #[serde(flatten)]
    pub element: Element,
    #[serde(default)]
    pub children: Vec<ElementTree>,
}

impl ElementTree {
    pub fn new(element: Element) -> Self {
        ElementTree {
            element,
            children: Vec::new(),
        }
    }

    pub fn child(mut self, child: ElementTree) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationRecord {
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    Attributes {
        target: NodeId,
        name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caret {
    pub node: NodeId,
    pub offset: usize,
}

#[derive(Debug, Clone)]
struct NodeEntry {
    element: Element,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// The element tree of one frame, plus the bits of browser state the
/// effects touch (focus, hover, selection, scroll position).
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeEntry>,
    root: NodeId,
    body: NodeId,
    url: String,
    title: String,
    viewport: Rect,
    has_focus: bool,
    focused: Option<NodeId>,
    hovered: BTreeSet<NodeId>,
    selection: Option<Caret>,
    clicks: Vec<NodeId>,
    records: Vec<MutationRecord>,
}

impl Document {
    /// Empty `<html><body></body></html>` with a 1280x720 viewport at the origin.
    pub fn new(url: &str, title: &str) -> Self {
        let mut doc = Document {
            nodes: Vec::new(),
            root: NodeId(0),
            body: NodeId(0),
            url: url.to_string(),
            title: title.to_string(),
            viewport: Rect::new(0.0, 0.0, 1280.0, 720.0),
            has_focus: true,
            focused: None,
            hovered: BTreeSet::new(),
            selection: None,
            clicks: Vec::new(),
            records: Vec::new(),
        };

        let root = doc.alloc(Element::new("html").with_rect(0.0, 0.0, 1280.0, 720.0));
        let body = doc.alloc(Element::new("body").with_rect(0.0, 0.0, 1280.0, 720.0));
        doc.nodes[body.0].parent = Some(root);
        doc.nodes[root.0].children.push(body);
        doc.root = root;
        doc.body = body;
        doc
    }

    fn alloc(&mut self, element: Element) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeEntry {
            element,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn entry(&self, id: NodeId) -> Result<&NodeEntry, DomError> {
        self.nodes.get(id.0).ok_or(DomError::UnknownNode(id))
    }

    fn entry_mut(&mut self, id: NodeId) -> Result<&mut NodeEntry, DomError> {
        self.nodes.get_mut(id.0).ok_or(DomError::UnknownNode(id))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Host part of the document URL, used to key custom selectors.
    pub fn host(&self) -> &str {
        let rest = self
            .url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.url);
        rest.split(['/', '?', '#']).next().unwrap_or("")
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    // ------------------------------------------------------------------
    // Tree
    // ------------------------------------------------------------------

    /// Create a detached element. It only becomes part of the page once appended.
    pub fn create_element(&mut self, element: Element) -> NodeId {
        self.alloc(element)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.entry(parent)?;
        self.entry(child)?;
        if self.contains(child, parent) {
            return Err(DomError::Cycle { parent, child });
        }

        if let Some(old_parent) = self.nodes[child.0].parent {
            self.nodes[old_parent.0].children.retain(|c| *c != child);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);

        self.records.push(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
            removed: vec![],
        });
        Ok(())
    }

    /// Build a whole subtree detached, then attach it with a single record.
    pub fn append_tree(&mut self, parent: NodeId, tree: &ElementTree) -> Result<NodeId, DomError> {
        let top = self.build_detached(tree);
        self.append_child(parent, top)?;
        Ok(top)
    }

    fn build_detached(&mut self, tree: &ElementTree) -> NodeId {
        let mut element = tree.element.clone();
        element.tag = element.tag.to_ascii_lowercase();
        let id = self.alloc(element);
        for child in &tree.children {
            let child_id = self.build_detached(child);
            self.nodes[child_id.0].parent = Some(id);
            self.nodes[id.0].children.push(child_id);
        }
        id
    }

    /// Detach a node (and with it its subtree) from its parent.
    pub fn remove(&mut self, node: NodeId) -> Result<(), DomError> {
        let parent = match self.entry(node)?.parent {
            Some(p) => p,
            None => return Ok(()),
        };
        self.nodes[parent.0].children.retain(|c| *c != node);
        self.nodes[node.0].parent = None;

        if self.focused.is_some_and(|f| self.contains(node, f)) {
            self.focused = None;
        }

        self.records.push(MutationRecord::ChildList {
            target: parent,
            added: vec![],
            removed: vec![node],
        });
        Ok(())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Pre-order descendants, excluding `node` itself.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Inclusive, like `Node.contains`.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.nodes.get(node.0).is_some() && self.contains(self.root, node)
    }

    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(node);
        while let Some(id) = current {
            out.push(id);
            current = self.parent(id);
        }
        out
    }

    pub fn element(&self, node: NodeId) -> Result<&Element, DomError> {
        Ok(&self.entry(node)?.element)
    }

    /// First connected element whose `id` attribute matches.
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        std::iter::once(self.root)
            .chain(self.descendants(self.root))
            .find(|n| self.nodes[n.0].element.attr("id") == Some(id))
    }

    /// Text of the node and all its descendants, whitespace-collapsed.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut pieces: Vec<&str> = Vec::new();
        for id in std::iter::once(node).chain(self.descendants(node)) {
            if let Some(entry) = self.nodes.get(id.0) {
                pieces.extend(entry.element.text.iter().map(String::as_str));
            }
        }
        pieces
            .iter()
            .flat_map(|p| p.split_whitespace())
            .collect::<Vec<_>>()
            .join(" ")
    }

    // ------------------------------------------------------------------
    // Attributes and style
    // ------------------------------------------------------------------

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.entry_mut(node)?
            .element
            .attributes
            .insert(name.to_string(), value.to_string());
        self.records.push(MutationRecord::Attributes {
            target: node,
            name: name.to_string(),
        });
        Ok(())
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), DomError> {
        self.entry_mut(node)?.element.attributes.remove(name);
        self.records.push(MutationRecord::Attributes {
            target: node,
            name: name.to_string(),
        });
        Ok(())
    }

    /// Style changes surface as a `style` attribute mutation.
    pub fn set_style(&mut self, node: NodeId, style: Style) -> Result<(), DomError> {
        self.entry_mut(node)?.element.style = style;
        self.records.push(MutationRecord::Attributes {
            target: node,
            name: "style".into(),
        });
        Ok(())
    }

    /// Layout changes produce no mutation record; only the next intersection
    /// pass notices them.
    pub fn set_rect(&mut self, node: NodeId, rect: Rect) -> Result<(), DomError> {
        self.entry_mut(node)?.element.rect = rect;
        Ok(())
    }

    pub fn set_onclick(&mut self, node: NodeId, has_onclick: bool) -> Result<(), DomError> {
        self.entry_mut(node)?.element.has_onclick = has_onclick;
        Ok(())
    }

    /// Mutation records accumulated since the last call, oldest first.
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    // ------------------------------------------------------------------
    // Layout and scrolling
    // ------------------------------------------------------------------

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    pub fn set_viewport_size(&mut self, width: f64, height: f64) {
        self.viewport.width = width;
        self.viewport.height = height;
    }

    /// Box as currently displayed: the layout rect shifted by the scroll
    /// offsets of every scrolled ancestor below the document element.
    pub fn visible_rect(&self, node: NodeId) -> Result<Rect, DomError> {
        let mut rect = self.entry(node)?.element.rect;
        for ancestor in self.ancestors(node) {
            if ancestor == self.root {
                break;
            }
            let scroll = self.nodes[ancestor.0].element.scroll;
            rect = rect.translated(-scroll.left, -scroll.top);
        }
        Ok(rect)
    }

    pub fn intersects_viewport(&self, node: NodeId) -> bool {
        if !self.is_connected(node) {
            return false;
        }
        self.visible_rect(node)
            .map(|r| r.intersects(&self.viewport))
            .unwrap_or(false)
    }

    /// Scroll extent of the whole page, derived from connected layout boxes.
    pub fn document_extent(&self) -> (f64, f64) {
        std::iter::once(self.root)
            .chain(self.descendants(self.root))
            .map(|n| self.nodes[n.0].element.rect)
            .fold((self.viewport.width, self.viewport.height), |(w, h), r| {
                (w.max(r.right()), h.max(r.bottom()))
            })
    }

    /// Scroll geometry, with the document element reporting the viewport.
    pub fn scroll_box(&self, node: NodeId) -> Result<ScrollBox, DomError> {
        if node == self.root {
            let (scroll_width, scroll_height) = self.document_extent();
            return Ok(ScrollBox {
                left: self.viewport.x,
                top: self.viewport.y,
                scroll_width,
                scroll_height,
                client_width: self.viewport.width,
                client_height: self.viewport.height,
            });
        }
        Ok(self.entry(node)?.element.scroll)
    }

    /// Scroll a container, clamping to its scrollable range. Scrolling the
    /// document element moves the viewport.
    pub fn scroll_by(&mut self, container: NodeId, dx: f64, dy: f64) -> Result<(), DomError> {
        let current = self.scroll_box(container)?;
        let max_left = (current.scroll_width - current.client_width).max(0.0);
        let max_top = (current.scroll_height - current.client_height).max(0.0);
        let left = (current.left + dx).clamp(0.0, max_left);
        let top = (current.top + dy).clamp(0.0, max_top);

        if container == self.root {
            self.viewport.x = left;
            self.viewport.y = top;
        } else {
            let scroll = &mut self.entry_mut(container)?.element.scroll;
            scroll.left = left;
            scroll.top = top;
        }
        Ok(())
    }

    pub fn scroll_viewport_to(&mut self, x: f64, y: f64) {
        let dx = x - self.viewport.x;
        let dy = y - self.viewport.y;
        // The root always exists.
        let _ = self.scroll_by(self.root, dx, dy);
    }

    // ------------------------------------------------------------------
    // Interaction state
    // ------------------------------------------------------------------

    pub fn has_focus(&self) -> bool {
        self.has_focus
    }

    pub fn set_has_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    pub fn focus(&mut self, node: NodeId) -> Result<(), DomError> {
        self.entry(node)?;
        self.focused = Some(node);
        Ok(())
    }

    pub fn hovered(&self) -> Vec<NodeId> {
        self.hovered.iter().copied().collect()
    }

    pub fn hover(&mut self, node: NodeId) -> Result<(), DomError> {
        self.entry(node)?;
        self.hovered.insert(node);
        Ok(())
    }

    pub fn clear_hover(&mut self) {
        self.hovered.clear();
    }

    /// Record a synthetic click; focusable targets also take focus.
    pub fn click(&mut self, node: NodeId) -> Result<(), DomError> {
        self.entry(node)?;
        self.clicks.push(node);
        if super::classify::is_focusable(self, node) {
            self.focused = Some(node);
        }
        Ok(())
    }

    /// Every synthetic click so far, oldest first.
    pub fn clicks(&self) -> &[NodeId] {
        &self.clicks
    }

    pub fn value(&self, node: NodeId) -> Result<Option<&str>, DomError> {
        Ok(self.entry(node)?.element.value.as_deref())
    }

    pub fn set_value(&mut self, node: NodeId, value: &str) -> Result<(), DomError> {
        self.entry_mut(node)?.element.value = Some(value.to_string());
        Ok(())
    }

    pub fn selection(&self) -> Option<Caret> {
        self.selection
    }

    pub fn set_selection(&mut self, caret: Caret) -> Result<(), DomError> {
        self.entry(caret.node)?;
        self.selection = Some(caret);
        Ok(())
    }
}
