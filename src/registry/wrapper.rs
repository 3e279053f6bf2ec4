use crate::dom::classify::{clickable_kind, is_visible, ClickableKind};
use crate::dom::document::{Document, NodeId};
use crate::dom::selector::SelectorFilter;
use crate::hints::label::HintLabel;

/// Long-lived record for one tracked element. Everything here is derived
/// state cached so nobody else re-derives it.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementWrapper {
    pub node: NodeId,
    pub is_visible: bool,
    pub is_intersecting_viewport: bool,
    pub clickable_kind: ClickableKind,
    /// Matched by a custom include selector
    pub included: bool,
    /// Matched by a custom exclude selector
    pub excluded: bool,
    pub hint: Option<HintLabel>,
    /// Marked for keyboard clicking
    pub keyboard_reachable: bool,
    /// Assignment order of the current hint; lower is older
    pub(crate) hint_seq: u64,
}

impl ElementWrapper {
    pub fn new(doc: &Document, node: NodeId, filter: &SelectorFilter) -> Self {
        let mut wrapper = ElementWrapper {
            node,
            is_visible: false,
            is_intersecting_viewport: false,
            clickable_kind: ClickableKind::None,
            included: false,
            excluded: false,
            hint: None,
            keyboard_reachable: false,
            hint_seq: 0,
        };
        wrapper.refresh(doc, filter);
        wrapper
    }

    /// Re-derive classification and visibility after a structural or
    /// attribute change.
    pub fn refresh(&mut self, doc: &Document, filter: &SelectorFilter) {
        self.clickable_kind = clickable_kind(doc, self.node);
        self.included = filter.is_included(doc, self.node);
        self.excluded = filter.is_excluded(doc, self.node);
        self.refresh_visibility(doc);
    }

    pub fn refresh_visibility(&mut self, doc: &Document) {
        self.is_visible = is_visible(doc, self.node);
    }

    /// Eligible for a label at all, regardless of where it is right now.
    pub fn is_hintable(&self) -> bool {
        !self.excluded && (self.clickable_kind.is_clickable() || self.included)
    }

    /// On screen, visible, eligible, and still without a label.
    pub fn wants_hint(&self) -> bool {
        self.hint.is_none() && self.is_hintable() && self.is_visible && self.is_intersecting_viewport
    }
}
