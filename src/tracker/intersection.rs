use std::collections::BTreeMap;

use crate::dom::document::{Document, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntersectionEntry {
    pub node: NodeId,
    pub is_intersecting: bool,
}

/// Per-frame viewport intersection bookkeeping. `take_records` is the
/// animation-frame callback: it reports each observed element whose state
/// changed since the previous frame, and every newly observed element once.
#[derive(Debug, Default)]
pub struct IntersectionObserver {
    observed: BTreeMap<NodeId, Option<bool>>,
}

impl IntersectionObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, node: NodeId) {
        self.observed.entry(node).or_insert(None);
    }

    pub fn unobserve(&mut self, node: NodeId) {
        self.observed.remove(&node);
    }

    pub fn disconnect(&mut self) {
        self.observed.clear();
    }

    pub fn is_observing(&self, node: NodeId) -> bool {
        self.observed.contains_key(&node)
    }

    pub fn len(&self) -> usize {
        self.observed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }

    pub fn take_records(&mut self, doc: &Document) -> Vec<IntersectionEntry> {
        let mut entries = Vec::new();
        for (node, last) in self.observed.iter_mut() {
            let now = doc.intersects_viewport(*node);
            if *last != Some(now) {
                *last = Some(now);
                entries.push(IntersectionEntry {
                    node: *node,
                    is_intersecting: now,
                });
            }
        }
        entries
    }
}
